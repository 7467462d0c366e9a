// GrowWatch - Sensor telemetry alerting and analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Rolling per-sensor window and its derived statistics.

use crate::config::TrendConfig;
use crate::quality;
use crate::reading::Reading;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Direction of the recent-vs-older comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Rising,
    Falling,
    #[default]
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Rising => "rising",
            Trend::Falling => "falling",
            Trend::Stable => "stable",
        }
    }
}

/// Statistics recomputed on every insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub current: f64,
    pub trend: Trend,
    pub trend_percentage: f64,
}

/// Bounded, time-ordered buffer of the most recent readings for one sensor.
#[derive(Debug, Clone)]
pub struct SensorWindow {
    capacity: usize,
    trend_config: TrendConfig,
    readings: VecDeque<Reading>,
    stats: WindowStats,
}

impl SensorWindow {
    pub fn new(capacity: usize, trend_config: TrendConfig) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            trend_config,
            readings: VecDeque::with_capacity(capacity),
            stats: WindowStats::default(),
        }
    }

    /// Append a reading, evicting the oldest beyond capacity, and refresh stats.
    pub fn update(&mut self, reading: Reading) -> &WindowStats {
        self.readings.push_back(reading);
        while self.readings.len() > self.capacity {
            self.readings.pop_front();
        }
        self.recompute();
        &self.stats
    }

    pub fn stats(&self) -> &WindowStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Readings, oldest first.
    pub fn readings(&self) -> impl DoubleEndedIterator<Item = &Reading> + ExactSizeIterator {
        self.readings.iter()
    }

    /// Values, oldest first.
    pub fn values(&self) -> Vec<f64> {
        self.readings.iter().map(|r| r.value).collect()
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    /// The reading inserted just before the latest one.
    pub fn previous(&self) -> Option<&Reading> {
        let len = self.readings.len();
        if len < 2 {
            None
        } else {
            self.readings.get(len - 2)
        }
    }

    /// Data quality score over the readings currently held.
    pub fn data_quality(&self) -> f64 {
        quality::score(self.readings.iter().map(|r| r.quality))
    }

    pub fn clear(&mut self) {
        self.readings.clear();
        self.stats = WindowStats::default();
    }

    fn recompute(&mut self) {
        let values = self.values();
        let Some(&current) = values.last() else {
            self.stats = WindowStats::default();
            return;
        };

        let (min, max, sum) = values.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), &v| (min.min(v), max.max(v), sum + v),
        );
        let (trend, trend_percentage) = compute_trend(&values, &self.trend_config);

        if trend != self.stats.trend {
            log::debug!(
                "trend changed from {} to {} ({:.1}%)",
                self.stats.trend.as_str(),
                trend.as_str(),
                trend_percentage
            );
        }

        self.stats = WindowStats {
            min,
            max,
            average: sum / values.len() as f64,
            current,
            trend,
            trend_percentage,
        };
    }
}

/// Compare the last `sub_window` values against the `sub_window` before them.
///
/// Returns `(Stable, 0.0)` when there is no older half to compare against.
/// A zero older average yields a percentage of 0.
pub fn compute_trend(values: &[f64], config: &TrendConfig) -> (Trend, f64) {
    let k = config.sub_window.max(1);
    let recent_start = values.len().saturating_sub(k);
    let older_start = recent_start.saturating_sub(k);

    let recent = &values[recent_start..];
    let older = &values[older_start..recent_start];
    if recent.is_empty() || older.is_empty() {
        return (Trend::Stable, 0.0);
    }

    let recent_avg = mean(recent);
    let older_avg = mean(older);

    let trend = if recent_avg > older_avg * config.rising_factor {
        Trend::Rising
    } else if recent_avg < older_avg * config.falling_factor {
        Trend::Falling
    } else {
        Trend::Stable
    };

    let percentage = if older_avg == 0.0 {
        0.0
    } else {
        round1((recent_avg - older_avg).abs() / older_avg.abs() * 100.0)
    };

    (trend, percentage)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
