// GrowWatch - Sensor telemetry alerting and analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Sensor metadata and the predicates behind metadata rules.

use crate::rule::MetadataCheck;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Device-level facts about a sensor, owned by the device registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorMetadata {
    pub sensor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    /// Battery level in percent.
    #[serde(default)]
    pub battery_level: Option<f64>,
    #[serde(default)]
    pub next_calibration: Option<DateTime<Utc>>,
}

impl SensorMetadata {
    pub fn new(sensor_id: impl Into<String>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            room_id: None,
            last_seen: None,
            battery_level: None,
            next_calibration: None,
        }
    }

    pub fn with_last_seen(mut self, at: DateTime<Utc>) -> Self {
        self.last_seen = Some(at);
        self
    }

    pub fn with_battery(mut self, percent: f64) -> Self {
        self.battery_level = Some(percent);
        self
    }

    pub fn with_next_calibration(mut self, at: DateTime<Utc>) -> Self {
        self.next_calibration = Some(at);
        self
    }

    pub fn with_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }
}

/// Supplies the match predicate for metadata rules.
///
/// Returns the observed value to report when the check matches, `None`
/// otherwise.
pub trait MetadataProbe: Send + Sync {
    fn observe(
        &self,
        check: &MetadataCheck,
        metadata: &SensorMetadata,
        now: DateTime<Utc>,
    ) -> Option<f64>;
}

/// Default predicates.
///
/// - offline: minutes since `last_seen` exceed the limit
/// - battery_low: level strictly below the limit
/// - calibration_due: `now` is within `lead_days` of `next_calibration`
///
/// Missing metadata never matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardProbe;

impl MetadataProbe for StandardProbe {
    fn observe(
        &self,
        check: &MetadataCheck,
        metadata: &SensorMetadata,
        now: DateTime<Utc>,
    ) -> Option<f64> {
        match *check {
            MetadataCheck::Offline { after_minutes } => {
                let limit = Duration::try_minutes(after_minutes)?;
                let silent = now.signed_duration_since(metadata.last_seen?);
                (silent > limit).then(|| silent.num_minutes() as f64)
            }
            MetadataCheck::BatteryLow { below_percent } => {
                let level = metadata.battery_level?;
                (level < below_percent).then_some(level)
            }
            MetadataCheck::CalibrationDue { lead_days } => {
                let due = metadata.next_calibration?;
                let opens = due.checked_sub_signed(Duration::try_days(lead_days)?)?;
                (now >= opens).then(|| due.signed_duration_since(now).num_days().max(0) as f64)
            }
        }
    }
}
