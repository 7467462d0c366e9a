// GrowWatch - Sensor telemetry alerting and analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! z-score anomaly detection over the rolling window.

use crate::config::AnomalyConfig;
use crate::window::SensorWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of an anomaly flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
}

impl AnomalySeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalySeverity::Low => "low",
            AnomalySeverity::Medium => "medium",
            AnomalySeverity::High => "high",
        }
    }
}

/// Transient flag for a reading that deviates from its window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFlag {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub z_score: f64,
    pub severity: AnomalySeverity,
}

/// Population mean and standard deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub mean: f64,
    pub std_dev: f64,
}

impl Moments {
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            mean,
            std_dev: variance.sqrt(),
        })
    }

    /// |value - mean| / std_dev, or 0 when the series has no spread.
    pub fn z_score(&self, value: f64) -> f64 {
        if self.std_dev == 0.0 {
            0.0
        } else {
            (value - self.mean).abs() / self.std_dev
        }
    }
}

/// Scores only the newest reading of a window; history is never re-scanned.
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
}

impl AnomalyDetector {
    pub fn new(config: AnomalyConfig) -> Self {
        Self { config }
    }

    /// Flag the newest reading if its z-score crosses a threshold.
    ///
    /// Windows shorter than `min_points` yield `None`.
    pub fn detect(&self, window: &SensorWindow) -> Option<AnomalyFlag> {
        if !self.config.enabled || window.len() < self.config.min_points {
            return None;
        }

        let latest = window.latest()?;
        let moments = Moments::of(&window.values())?;
        let z_score = moments.z_score(latest.value);
        let severity = self.classify(z_score)?;

        Some(AnomalyFlag {
            timestamp: latest.timestamp,
            value: latest.value,
            z_score,
            severity,
        })
    }

    /// Map a z-score to a severity. Lower bounds are exclusive.
    pub fn classify(&self, z_score: f64) -> Option<AnomalySeverity> {
        if z_score > self.config.z_high {
            Some(AnomalySeverity::High)
        } else if z_score > self.config.z_medium {
            Some(AnomalySeverity::Medium)
        } else if z_score > self.config.z_low {
            Some(AnomalySeverity::Low)
        } else {
            None
        }
    }
}
