// GrowWatch - Sensor telemetry alerting and analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Plausibility checks for incoming readings.
//!
//! Warnings are advisory: a reading outside its plausible range is still
//! admitted into the pipeline, since sensors may report transient extremes.

use crate::config::ValidationConfig;
use crate::reading::{Reading, SensorType, ValueRange};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-fatal finding about a reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationWarning {
    /// Value outside the plausible range for its sensor type.
    OutOfRange {
        sensor_type: SensorType,
        value: f64,
        range: ValueRange,
    },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::OutOfRange {
                sensor_type,
                value,
                range,
            } => write!(
                f,
                "{} value {} outside plausible range [{}, {}]",
                sensor_type.as_str(),
                value,
                range.min,
                range.max
            ),
        }
    }
}

/// Validates readings against per-type ranges.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Return every warning for the reading; empty when it is plausible.
    pub fn validate(&self, reading: &Reading) -> Vec<ValidationWarning> {
        if !self.config.enabled {
            return Vec::new();
        }

        let range = self.config.range_for(reading.sensor_type);
        let mut warnings = Vec::new();
        if !range.contains(reading.value) {
            warnings.push(ValidationWarning::OutOfRange {
                sensor_type: reading.sensor_type,
                value: reading.value,
                range,
            });
        }
        warnings
    }
}
