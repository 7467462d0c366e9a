// GrowWatch - Sensor telemetry alerting and analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! AnalyticsSnapshot - on-demand view of a sensor's rolling statistics.

use crate::reading::SensorType;
use crate::window::{SensorWindow, Trend};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version of the snapshot format.
pub const SNAPSHOT_VERSION: &str = "0.1.0";

/// Current statistics for one sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    /// Format version.
    pub version: String,
    pub sensor_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<SensorType>,
    /// Readings currently in the window.
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub current: f64,
    pub trend: Trend,
    pub trend_percentage: f64,
    /// Weighted quality score over the window, 0-100.
    pub data_quality: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl AnalyticsSnapshot {
    pub fn from_window(sensor_id: &str, window: &SensorWindow) -> Self {
        let stats = window.stats();
        let latest = window.latest();
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            sensor_id: sensor_id.to_string(),
            sensor_type: latest.map(|r| r.sensor_type),
            count: window.len(),
            min: stats.min,
            max: stats.max,
            average: stats.average,
            current: stats.current,
            trend: stats.trend,
            trend_percentage: stats.trend_percentage,
            data_quality: window.data_quality(),
            last_timestamp: latest.map(|r| r.timestamp),
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrendConfig;
    use crate::reading::{Quality, Reading};
    use chrono::Duration;

    #[test]
    fn test_from_window() {
        let mut window = SensorWindow::new(50, TrendConfig::default());
        let start = Utc::now();
        for (i, (v, q)) in [(800.0, Quality::Good), (900.0, Quality::Fair), (1000.0, Quality::Good)]
            .into_iter()
            .enumerate()
        {
            window.update(
                Reading::new("co2-1", SensorType::Co2, v, start + Duration::minutes(i as i64))
                    .with_quality(q),
            );
        }

        let snapshot = AnalyticsSnapshot::from_window("co2-1", &window);
        assert_eq!(snapshot.count, 3);
        assert_eq!(snapshot.min, 800.0);
        assert_eq!(snapshot.max, 1000.0);
        assert_eq!(snapshot.current, 1000.0);
        assert_eq!(snapshot.trend, Trend::Stable);
        assert!((snapshot.data_quality - 250.0 / 3.0).abs() < 1e-9);
        assert_eq!(snapshot.sensor_type, Some(SensorType::Co2));
        assert_eq!(snapshot.last_timestamp, Some(start + Duration::minutes(2)));
    }

    #[test]
    fn test_json_roundtrip() {
        let mut window = SensorWindow::new(10, TrendConfig::default());
        window.update(Reading::new("rh-1", SensorType::Humidity, 55.0, Utc::now()));
        let snapshot = AnalyticsSnapshot::from_window("rh-1", &window);

        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"version\""));
        assert!(json.contains("\"trend\":\"stable\""));

        let restored = AnalyticsSnapshot::from_json(&json).unwrap();
        assert_eq!(restored, snapshot);
    }
}
