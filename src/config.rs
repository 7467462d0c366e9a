// GrowWatch - Sensor telemetry alerting and analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Engine configuration.

use crate::error::ConfigError;
use crate::reading::{SensorType, ValueRange};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Master configuration for the telemetry engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rolling window settings.
    pub window: WindowConfig,

    /// Trend classification settings.
    pub trend: TrendConfig,

    /// Anomaly detection settings.
    pub anomaly: AnomalyConfig,

    /// Reading validation settings.
    pub validation: ValidationConfig,
}

impl EngineConfig {
    /// Parse a configuration from JSON. Missing sections fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json(&raw)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check every section for unusable values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "window.capacity",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.trend.sub_window == 0 {
            return Err(ConfigError::InvalidValue {
                field: "trend.sub_window",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.trend.rising_factor >= 1.0 && self.trend.rising_factor.is_finite()) {
            return Err(ConfigError::InvalidValue {
                field: "trend.rising_factor",
                reason: format!("{} is not a finite factor >= 1.0", self.trend.rising_factor),
            });
        }
        if !(self.trend.falling_factor > 0.0 && self.trend.falling_factor <= 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "trend.falling_factor",
                reason: format!("{} is not in (0, 1]", self.trend.falling_factor),
            });
        }

        let a = &self.anomaly;
        if !(a.z_low > 0.0 && a.z_low < a.z_medium && a.z_medium < a.z_high) {
            return Err(ConfigError::InvalidValue {
                field: "anomaly",
                reason: format!(
                    "z thresholds must satisfy 0 < low < medium < high (got {}, {}, {})",
                    a.z_low, a.z_medium, a.z_high
                ),
            });
        }
        if a.min_points < 2 {
            return Err(ConfigError::InvalidValue {
                field: "anomaly.min_points",
                reason: "must be at least 2".to_string(),
            });
        }

        for (sensor_type, range) in &self.validation.range_overrides {
            if !(range.min <= range.max) {
                return Err(ConfigError::InvalidValue {
                    field: "validation.range_overrides",
                    reason: format!(
                        "{}: min {} exceeds max {}",
                        sensor_type.as_str(),
                        range.min,
                        range.max
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Rolling window configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Maximum readings kept per sensor (oldest evicted first).
    pub capacity: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

/// Trend classification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Size of the "recent" and "older" halves compared.
    pub sub_window: usize,
    /// recentAvg above olderAvg * factor is rising.
    pub rising_factor: f64,
    /// recentAvg below olderAvg * factor is falling.
    pub falling_factor: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            sub_window: 10,
            rising_factor: 1.05,
            falling_factor: 0.95,
        }
    }
}

/// Anomaly detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Enable anomaly detection.
    pub enabled: bool,

    /// Minimum window size before scoring.
    pub min_points: usize,

    /// z-score above which a low anomaly is flagged.
    pub z_low: f64,

    /// z-score above which a medium anomaly is flagged.
    pub z_medium: f64,

    /// z-score above which a high anomaly is flagged.
    pub z_high: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_points: 10,
            z_low: 1.5,
            z_medium: 2.0,
            z_high: 3.0,
        }
    }
}

/// Reading validation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Enable plausibility checks.
    pub enabled: bool,

    /// Replacement ranges for specific sensor types.
    pub range_overrides: HashMap<SensorType, ValueRange>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            range_overrides: HashMap::new(),
        }
    }
}

impl ValidationConfig {
    /// Effective range for a sensor type.
    pub fn range_for(&self, sensor_type: SensorType) -> ValueRange {
        self.range_overrides
            .get(&sensor_type)
            .copied()
            .unwrap_or_else(|| sensor_type.plausible_range())
    }
}
