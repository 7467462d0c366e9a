// GrowWatch - Sensor telemetry alerting and analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Sensor readings and sensor types.

use crate::error::ReadingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of environmental sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Temperature,
    Humidity,
    Ph,
    Ec,
    Co2,
    Vpd,
    SoilMoisture,
    LightIntensity,
    Dli,
    Oxygen,
    Pressure,
}

impl SensorType {
    /// Every sensor type, in declaration order.
    pub const ALL: [SensorType; 11] = [
        SensorType::Temperature,
        SensorType::Humidity,
        SensorType::Ph,
        SensorType::Ec,
        SensorType::Co2,
        SensorType::Vpd,
        SensorType::SoilMoisture,
        SensorType::LightIntensity,
        SensorType::Dli,
        SensorType::Oxygen,
        SensorType::Pressure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Temperature => "temperature",
            SensorType::Humidity => "humidity",
            SensorType::Ph => "ph",
            SensorType::Ec => "ec",
            SensorType::Co2 => "co2",
            SensorType::Vpd => "vpd",
            SensorType::SoilMoisture => "soil_moisture",
            SensorType::LightIntensity => "light_intensity",
            SensorType::Dli => "dli",
            SensorType::Oxygen => "oxygen",
            SensorType::Pressure => "pressure",
        }
    }

    /// Physically plausible range for this sensor type.
    pub fn plausible_range(&self) -> ValueRange {
        let (min, max) = match self {
            SensorType::Temperature => (-50.0, 150.0),
            SensorType::Humidity => (0.0, 100.0),
            SensorType::Ph => (0.0, 14.0),
            SensorType::Ec => (0.0, 10.0),
            SensorType::Co2 => (0.0, 5000.0),
            SensorType::Vpd => (0.0, 10.0),
            SensorType::SoilMoisture => (0.0, 100.0),
            SensorType::LightIntensity => (0.0, 200_000.0),
            SensorType::Dli => (0.0, 100.0),
            SensorType::Oxygen => (0.0, 100.0),
            SensorType::Pressure => (300.0, 1100.0),
        };
        ValueRange { min, max }
    }
}

/// Inclusive value range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Quality tag attached by the upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    #[default]
    Good,
    Fair,
    Poor,
}

impl Quality {
    /// Weight used by the data quality score.
    pub fn weight(&self) -> f64 {
        match self {
            Quality::Good => 100.0,
            Quality::Fair => 50.0,
            Quality::Poor => 0.0,
        }
    }
}

/// A single sensor reading. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub sensor_id: String,
    pub sensor_type: SensorType,
    pub value: f64,
    #[serde(default)]
    pub quality: Quality,
    pub timestamp: DateTime<Utc>,
    /// Grow room or tent the sensor belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

impl Reading {
    pub fn new(
        sensor_id: impl Into<String>,
        sensor_type: SensorType,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            sensor_type,
            value,
            quality: Quality::Good,
            timestamp,
            room_id: None,
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    /// Check that the reading can enter the pipeline at all.
    ///
    /// Out-of-range values are admissible (see [`crate::validation`]);
    /// NaN and infinities are not, since they would poison the window.
    pub fn admissible(&self) -> std::result::Result<(), ReadingError> {
        if self.sensor_id.is_empty() {
            return Err(ReadingError::EmptySensorId);
        }
        if !self.value.is_finite() {
            return Err(ReadingError::NonFiniteValue {
                sensor_id: self.sensor_id.clone(),
                value: self.value,
            });
        }
        Ok(())
    }
}
