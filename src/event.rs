// GrowWatch - Sensor telemetry alerting and analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Notification events and the sinks that receive them.

use crate::anomaly::AnomalyFlag;
use crate::rule::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// One successful (non-suppressed) rule trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: Uuid,
    pub sensor_id: String,
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

impl NotificationEvent {
    pub fn new(
        sensor_id: impl Into<String>,
        rule_id: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
        value: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sensor_id: sensor_id.into(),
            rule_id: rule_id.into(),
            severity,
            message: message.into(),
            timestamp,
            value,
            room_id: None,
        }
    }

    pub fn with_room(mut self, room_id: Option<String>) -> Self {
        self.room_id = room_id;
        self
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Receives engine output. Ownership of the event passes to the sink.
///
/// Sinks are called after the sensor's lock is released and must not block.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: NotificationEvent);

    /// Anomaly flags are optional for consumers.
    fn anomaly(&self, _sensor_id: &str, _flag: &AnomalyFlag) {}
}

/// In-memory sink with bounded capacity (oldest dropped first).
#[derive(Debug)]
pub struct MemorySink {
    notifications: Mutex<Vec<NotificationEvent>>,
    anomalies: Mutex<Vec<(String, AnomalyFlag)>>,
    max_events: usize,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl MemorySink {
    pub fn new(max_events: usize) -> Self {
        Self {
            notifications: Mutex::new(Vec::with_capacity(max_events.min(1000))),
            anomalies: Mutex::new(Vec::new()),
            max_events,
        }
    }

    pub fn notifications(&self) -> Vec<NotificationEvent> {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn anomalies(&self) -> Vec<(String, AnomalyFlag)> {
        self.anomalies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every stored notification.
    pub fn drain(&self) -> Vec<NotificationEvent> {
        std::mem::take(&mut *self.notifications.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn clear(&self) {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.anomalies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventSink for MemorySink {
    fn notify(&self, event: NotificationEvent) {
        let mut events = self
            .notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if events.len() >= self.max_events {
            events.remove(0);
        }
        events.push(event);
    }

    fn anomaly(&self, sensor_id: &str, flag: &AnomalyFlag) {
        let mut anomalies = self.anomalies.lock().unwrap_or_else(PoisonError::into_inner);
        if anomalies.len() >= self.max_events {
            anomalies.remove(0);
        }
        anomalies.push((sensor_id.to_string(), flag.clone()));
    }
}

/// Writes every event to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn notify(&self, event: NotificationEvent) {
        match event.severity {
            Severity::Critical | Severity::High => log::warn!(
                "[{}] {} ({}): {}",
                event.severity.as_str(),
                event.sensor_id,
                event.rule_id,
                event.message
            ),
            Severity::Medium | Severity::Low => log::info!(
                "[{}] {} ({}): {}",
                event.severity.as_str(),
                event.sensor_id,
                event.rule_id,
                event.message
            ),
        }
    }

    fn anomaly(&self, sensor_id: &str, flag: &AnomalyFlag) {
        log::info!(
            "anomaly on {}: value {} z={:.2} ({})",
            sensor_id,
            flag.value,
            flag.z_score,
            flag.severity.as_str()
        );
    }
}
