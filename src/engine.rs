// GrowWatch - Sensor telemetry alerting and analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! TelemetryEngine - the façade driving validation, statistics, anomaly
//! detection and rule evaluation for each incoming reading.
//!
//! Per-sensor state (the window plus the cooldown timestamps of every rule
//! bound to that sensor) sits behind its own mutex, so readings for
//! different sensors proceed in parallel while readings for one sensor are
//! applied one at a time. Lock order is always sensor map, then sensor,
//! then rule book; rule book writers never take a sensor lock.

use crate::anomaly::{AnomalyDetector, AnomalyFlag};
use crate::config::EngineConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{ReadingError, Result};
use crate::evaluator::RuleEvaluator;
use crate::event::{EventSink, NotificationEvent};
use crate::metadata::{MetadataProbe, SensorMetadata, StandardProbe};
use crate::reading::Reading;
use crate::rule::{AlertRule, RuleCondition, RuleDefinition, RuleTarget};
use crate::scheduler::SingleFlight;
use crate::snapshot::AnalyticsSnapshot;
use crate::validation::{ValidationWarning, Validator};
use crate::window::SensorWindow;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Outcome of ingesting one reading.
#[derive(Debug, Clone)]
pub struct EngineResult {
    /// Statistics after the reading was added.
    pub window: AnalyticsSnapshot,
    pub anomaly: Option<AnomalyFlag>,
    pub notifications: Vec<NotificationEvent>,
    /// Advisory; the reading was processed regardless.
    pub warnings: Vec<ValidationWarning>,
}

#[derive(Debug, Default)]
struct RuleBook {
    generation: u64,
    rules: Vec<AlertRule>,
}

impl RuleBook {
    fn touch(&mut self) {
        self.generation += 1;
    }
}

/// Everything owned by one sensor.
#[derive(Debug)]
struct SensorState {
    window: SensorWindow,
    /// Rules bound to this sensor, carrying this sensor's cooldown stamps.
    rules: Vec<AlertRule>,
    synced_generation: Option<u64>,
    room_id: Option<String>,
}

impl SensorState {
    fn new(config: &EngineConfig) -> Self {
        Self {
            window: SensorWindow::new(config.window.capacity, config.trend.clone()),
            rules: Vec::new(),
            synced_generation: None,
            room_id: None,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(rw: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rw.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(rw: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rw.write().unwrap_or_else(PoisonError::into_inner)
}

/// Sensor telemetry alerting and analytics engine.
pub struct TelemetryEngine {
    config: EngineConfig,
    validator: Validator,
    detector: AnomalyDetector,
    evaluator: RuleEvaluator,
    probe: Box<dyn MetadataProbe>,
    sensors: RwLock<HashMap<String, Arc<Mutex<SensorState>>>>,
    rules: RwLock<RuleBook>,
    diagnostics: Diagnostics,
    sinks: Vec<Arc<dyn EventSink>>,
    readings_ingested: AtomicU64,
}

impl TelemetryEngine {
    /// Create an engine after validating its configuration.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            validator: Validator::new(config.validation.clone()),
            detector: AnomalyDetector::new(config.anomaly.clone()),
            evaluator: RuleEvaluator::new(),
            probe: Box::new(StandardProbe),
            sensors: RwLock::new(HashMap::new()),
            rules: RwLock::new(RuleBook::default()),
            diagnostics: Diagnostics::new(),
            sinks: Vec::new(),
            readings_ingested: AtomicU64::new(0),
            config,
        })
    }

    /// Forward every notification and anomaly flag to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Replace the predicate used for metadata rules.
    pub fn with_probe(mut self, probe: impl MetadataProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Rule configuration errors seen during evaluation or loading.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn readings_ingested(&self) -> u64 {
        self.readings_ingested.load(Ordering::Relaxed)
    }

    /// Validate, aggregate, score and evaluate rules for one reading.
    ///
    /// Duplicate readings are not detected: ingesting the same reading twice
    /// counts it twice.
    pub fn ingest(&self, reading: Reading) -> Result<EngineResult> {
        reading.admissible()?;

        let warnings = self.validator.validate(&reading);
        for warning in &warnings {
            log::warn!("{}: {}", reading.sensor_id, warning);
        }

        let state = self.sensor_state(&reading.sensor_id);
        let (window, anomaly, notifications) = {
            let mut guard = lock(&state);
            let state = &mut *guard;
            self.sync_rules(state, &reading.sensor_id);
            if reading.room_id.is_some() {
                state.room_id = reading.room_id.clone();
            }

            state.window.update(reading.clone());
            let anomaly = self.detector.detect(&state.window);
            if let Some(flag) = &anomaly {
                log::debug!(
                    "{} anomaly on {}: z={:.2}",
                    flag.severity.as_str(),
                    reading.sensor_id,
                    flag.z_score
                );
            }

            let mut notifications = Vec::new();
            for rule in state.rules.iter_mut() {
                match self.evaluator.evaluate(rule, &reading, &state.window) {
                    Ok(Some(event)) => notifications.push(event),
                    Ok(None) => {}
                    Err(err) => {
                        self.diagnostics.report(err);
                    }
                }
            }

            let window = AnalyticsSnapshot::from_window(&reading.sensor_id, &state.window);
            (window, anomaly, notifications)
        };

        self.readings_ingested.fetch_add(1, Ordering::Relaxed);
        self.record_triggers(&notifications);
        self.dispatch(&reading.sensor_id, anomaly.as_ref(), &notifications);

        Ok(EngineResult {
            window,
            anomaly,
            notifications,
            warnings,
        })
    }

    /// Evaluate metadata rules (offline, battery, calibration) for a sensor.
    pub fn check_metadata(
        &self,
        metadata: &SensorMetadata,
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationEvent>> {
        if metadata.sensor_id.is_empty() {
            return Err(ReadingError::EmptySensorId.into());
        }

        let state = self.sensor_state(&metadata.sensor_id);
        let notifications = {
            let mut guard = lock(&state);
            let state = &mut *guard;
            self.sync_rules(state, &metadata.sensor_id);
            let room_id = metadata.room_id.clone().or_else(|| state.room_id.clone());

            let mut notifications = Vec::new();
            for rule in state.rules.iter_mut() {
                let RuleCondition::Metadata(check) = rule.condition else {
                    continue;
                };
                let observed = self.probe.observe(&check, metadata, now);
                match self.evaluator.evaluate_metadata(
                    rule,
                    &metadata.sensor_id,
                    observed,
                    now,
                    room_id.clone(),
                ) {
                    Ok(Some(event)) => notifications.push(event),
                    Ok(None) => {}
                    Err(err) => {
                        self.diagnostics.report(err);
                    }
                }
            }
            notifications
        };

        self.record_triggers(&notifications);
        self.dispatch(&metadata.sensor_id, None, &notifications);
        Ok(notifications)
    }

    /// Run [`check_metadata`](Self::check_metadata) if the scheduler grants a
    /// flight for this sensor; `None` when not due or already running.
    pub fn poll_metadata(
        &self,
        scheduler: &SingleFlight<String>,
        metadata: &SensorMetadata,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<NotificationEvent>>> {
        let Some(flight) = scheduler.try_start(metadata.sensor_id.clone(), now) else {
            return Ok(None);
        };
        let notifications = self.check_metadata(metadata, now)?;
        flight.complete();
        Ok(Some(notifications))
    }

    /// Current statistics for a sensor with at least one reading.
    pub fn snapshot(&self, sensor_id: &str) -> Option<AnalyticsSnapshot> {
        let state = read(&self.sensors).get(sensor_id).cloned()?;
        let guard = lock(&state);
        if guard.window.is_empty() {
            return None;
        }
        Some(AnalyticsSnapshot::from_window(sensor_id, &guard.window))
    }

    /// Known sensor ids, sorted.
    pub fn sensor_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = read(&self.sensors).keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Drop a sensor's window and cooldown state.
    pub fn remove_sensor(&self, sensor_id: &str) -> bool {
        write(&self.sensors).remove(sensor_id).is_some()
    }

    /// Release all per-sensor state. Rules are kept.
    pub fn clear(&self) {
        write(&self.sensors).clear();
    }

    /// Insert or replace a rule by id. Cooldown stamps already held by
    /// sensors survive the edit.
    pub fn upsert_rule(&self, rule: AlertRule) {
        self.diagnostics.clear_rule(&rule.id);
        let mut book = write(&self.rules);
        match book.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => {
                let last = existing.last_triggered_at;
                *existing = rule;
                existing.last_triggered_at = existing.last_triggered_at.max(last);
            }
            None => book.rules.push(rule),
        }
        book.touch();
    }

    /// Load rules from their loose definitions. Malformed definitions are
    /// reported to diagnostics and skipped. Returns how many were loaded.
    pub fn load_rules<I>(&self, definitions: I) -> usize
    where
        I: IntoIterator<Item = RuleDefinition>,
    {
        let mut loaded = 0;
        for definition in definitions {
            match AlertRule::try_from(definition) {
                Ok(rule) => {
                    self.upsert_rule(rule);
                    loaded += 1;
                }
                Err(err) => {
                    self.diagnostics.report(err);
                }
            }
        }
        loaded
    }

    pub fn remove_rule(&self, rule_id: &str) -> Option<AlertRule> {
        self.diagnostics.clear_rule(rule_id);
        let mut book = write(&self.rules);
        let index = book.rules.iter().position(|r| r.id == rule_id)?;
        let removed = book.rules.remove(index);
        book.touch();
        Some(removed)
    }

    /// Enable or disable a rule. Returns false if the rule is unknown.
    pub fn set_rule_enabled(&self, rule_id: &str, enabled: bool) -> bool {
        let mut book = write(&self.rules);
        let Some(rule) = book.rules.iter_mut().find(|r| r.id == rule_id) else {
            return false;
        };
        rule.enabled = enabled;
        book.touch();
        true
    }

    /// Configured rules. `last_triggered_at` is the latest trigger on any sensor.
    pub fn rules(&self) -> Vec<AlertRule> {
        read(&self.rules).rules.clone()
    }

    /// Rules bound to a sensor with that sensor's cooldown stamps.
    pub fn bound_rules(&self, sensor_id: &str) -> Vec<AlertRule> {
        let Some(state) = read(&self.sensors).get(sensor_id).cloned() else {
            return Vec::new();
        };
        let rules = lock(&state).rules.clone();
        rules
    }

    fn sensor_state(&self, sensor_id: &str) -> Arc<Mutex<SensorState>> {
        if let Some(state) = read(&self.sensors).get(sensor_id) {
            return Arc::clone(state);
        }
        let mut sensors = write(&self.sensors);
        Arc::clone(
            sensors
                .entry(sensor_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(SensorState::new(&self.config)))),
        )
    }

    /// Rebind the sensor's rules if the rule book changed since last sync.
    fn sync_rules(&self, state: &mut SensorState, sensor_id: &str) {
        let book = read(&self.rules);
        if state.synced_generation == Some(book.generation) {
            return;
        }

        let mut stamps: HashMap<String, Option<DateTime<Utc>>> = state
            .rules
            .drain(..)
            .map(|rule| (rule.id, rule.last_triggered_at))
            .collect();

        state.rules = book
            .rules
            .iter()
            .filter(|rule| rule.target.matches(sensor_id))
            .map(|rule| {
                // The book's stamp for a wildcard rule belongs to whichever
                // sensor fired last, so only sensor rules inherit it.
                let inherited = match rule.target {
                    RuleTarget::Sensor(_) => rule.last_triggered_at,
                    RuleTarget::Any => None,
                };
                let mut bound = rule.clone();
                bound.last_triggered_at = stamps.remove(&rule.id).flatten().or(inherited);
                bound
            })
            .collect();
        state.synced_generation = Some(book.generation);
    }

    /// Write trigger times back to the rule book.
    fn record_triggers(&self, notifications: &[NotificationEvent]) {
        if notifications.is_empty() {
            return;
        }
        let mut book = write(&self.rules);
        for event in notifications {
            if let Some(rule) = book.rules.iter_mut().find(|r| r.id == event.rule_id) {
                rule.last_triggered_at = rule.last_triggered_at.max(Some(event.timestamp));
            }
        }
    }

    fn dispatch(
        &self,
        sensor_id: &str,
        anomaly: Option<&AnomalyFlag>,
        notifications: &[NotificationEvent],
    ) {
        for sink in &self.sinks {
            if let Some(flag) = anomaly {
                sink.anomaly(sensor_id, flag);
            }
            for event in notifications {
                sink.notify(event.clone());
            }
        }
    }
}
