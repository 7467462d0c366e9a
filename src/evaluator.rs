// GrowWatch - Sensor telemetry alerting and analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Alert rule evaluation with per-rule cooldown.
//!
//! Each rule is either idle or cooling down. A match while idle emits a
//! notification and stamps `last_triggered_at`; the rule returns to idle
//! once `cooldown_minutes` have elapsed, checked lazily on the next
//! evaluation. Disabled rules and rules in cooldown never touch
//! `last_triggered_at`.

use crate::error::RuleConfigError;
use crate::event::NotificationEvent;
use crate::reading::Reading;
use crate::rule::{AlertRule, RuleCondition};
use crate::window::SensorWindow;
use chrono::{DateTime, Utc};

/// Evaluates stream and metadata rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEvaluator;

impl RuleEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate a stream rule against the newest reading.
    ///
    /// `window` must already contain `reading` as its latest entry; the
    /// reading before it is used for `rate_of_change`. The evaluation clock
    /// is the reading's timestamp. Disabled rules return `Ok(None)` before
    /// validation, so a malformed rule is only reported once enabled.
    pub fn evaluate(
        &self,
        rule: &mut AlertRule,
        reading: &Reading,
        window: &SensorWindow,
    ) -> Result<Option<NotificationEvent>, RuleConfigError> {
        if !rule.enabled {
            return Ok(None);
        }
        rule.validate()?;

        if !rule.condition.is_stream()
            || !rule.target.matches(&reading.sensor_id)
        {
            return Ok(None);
        }

        let now = reading.timestamp;
        if rule.in_cooldown(now) {
            log::debug!(
                "rule {} on {} suppressed until {:?}",
                rule.id,
                reading.sensor_id,
                rule.cooldown_until()
            );
            return Ok(None);
        }

        let matched = match rule.condition {
            RuleCondition::Threshold { comparison, value } => comparison.holds(reading.value, value),
            RuleCondition::Range { mode, low, high } => mode.holds(reading.value, low, high),
            RuleCondition::RateOfChange { per_minute } => match rate_per_minute(reading, window) {
                Some(rate) => rate.abs() > per_minute,
                None => {
                    log::debug!(
                        "rule {} on {} skipped: no elapsed time to compute a rate",
                        rule.id,
                        reading.sensor_id
                    );
                    false
                }
            },
            RuleCondition::Metadata(_) => false,
        };

        if !matched {
            return Ok(None);
        }

        Ok(Some(self.trigger(
            rule,
            &reading.sensor_id,
            reading.value,
            now,
            reading.room_id.clone(),
        )))
    }

    /// Evaluate a metadata rule given the probe's verdict.
    ///
    /// `observed` is `Some(value)` when the metadata predicate matched.
    pub fn evaluate_metadata(
        &self,
        rule: &mut AlertRule,
        sensor_id: &str,
        observed: Option<f64>,
        now: DateTime<Utc>,
        room_id: Option<String>,
    ) -> Result<Option<NotificationEvent>, RuleConfigError> {
        if !rule.enabled {
            return Ok(None);
        }
        rule.validate()?;

        if rule.condition.is_stream() || !rule.target.matches(sensor_id) {
            return Ok(None);
        }
        if rule.in_cooldown(now) {
            log::debug!("rule {} on {} suppressed", rule.id, sensor_id);
            return Ok(None);
        }

        Ok(observed.map(|value| self.trigger(rule, sensor_id, value, now, room_id)))
    }

    fn trigger(
        &self,
        rule: &mut AlertRule,
        sensor_id: &str,
        value: f64,
        now: DateTime<Utc>,
        room_id: Option<String>,
    ) -> NotificationEvent {
        rule.last_triggered_at = Some(now);
        log::info!(
            "rule {} triggered on {} ({} {})",
            rule.id,
            sensor_id,
            rule.condition.operator(),
            value
        );
        NotificationEvent::new(
            sensor_id,
            rule.id.clone(),
            rule.severity,
            rule.render_message(sensor_id, value),
            now,
            value,
        )
        .with_room(room_id)
    }
}

/// Change per minute between the window's previous reading and `reading`.
///
/// `None` when there is no previous reading or no time elapsed.
fn rate_per_minute(reading: &Reading, window: &SensorWindow) -> Option<f64> {
    let previous = window.previous()?;
    let elapsed_ms = (reading.timestamp - previous.timestamp).num_milliseconds();
    if elapsed_ms <= 0 {
        return None;
    }
    let minutes = elapsed_ms as f64 / 60_000.0;
    Some((reading.value - previous.value) / minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrendConfig;
    use crate::reading::SensorType;
    use crate::rule::{MetadataCheck, RuleTarget, Severity};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap()
    }

    fn reading_at(value: f64, minutes: i64) -> Reading {
        Reading::new("ph-1", SensorType::Ph, value, t0() + Duration::minutes(minutes))
    }

    /// Push the reading into a window and evaluate, as the engine does.
    fn run(
        rule: &mut AlertRule,
        window: &mut SensorWindow,
        reading: Reading,
    ) -> Option<NotificationEvent> {
        window.update(reading.clone());
        RuleEvaluator::new().evaluate(rule, &reading, window).unwrap()
    }

    fn window() -> SensorWindow {
        SensorWindow::new(100, TrendConfig::default())
    }

    #[test]
    fn test_between_boundaries() {
        let mut rule =
            AlertRule::for_sensor("in-band", "ph-1", RuleCondition::between(5.8, 6.5), Severity::Low)
                .with_cooldown(0);
        let mut w = window();
        assert!(run(&mut rule, &mut w, reading_at(5.8, 0)).is_some());
        assert!(run(&mut rule, &mut w, reading_at(6.5, 1)).is_some());
        assert!(run(&mut rule, &mut w, reading_at(5.79, 2)).is_none());
        assert!(run(&mut rule, &mut w, reading_at(6.51, 3)).is_none());
    }

    #[test]
    fn test_outside_boundaries() {
        let mut rule =
            AlertRule::for_sensor("out", "ph-1", RuleCondition::outside(5.8, 6.5), Severity::Medium)
                .with_cooldown(0);
        let mut w = window();
        assert!(run(&mut rule, &mut w, reading_at(5.8, 0)).is_none());
        assert!(run(&mut rule, &mut w, reading_at(6.5, 1)).is_none());
        assert!(run(&mut rule, &mut w, reading_at(5.79, 2)).is_some());
        assert!(run(&mut rule, &mut w, reading_at(6.51, 3)).is_some());
    }

    #[test]
    fn test_event_fields() {
        let mut rule = AlertRule::for_sensor("acidic", "ph-1", RuleCondition::lt(5.5), Severity::Critical);
        let mut w = window();
        let event = run(&mut rule, &mut w, reading_at(5.2, 0).with_room("veg-room")).unwrap();
        assert_eq!(event.sensor_id, "ph-1");
        assert_eq!(event.rule_id, "acidic");
        assert_eq!(event.severity, Severity::Critical);
        assert_eq!(event.value, 5.2);
        assert_eq!(event.timestamp, t0());
        assert_eq!(event.room_id.as_deref(), Some("veg-room"));
        assert!(event.message.contains("5.2"));
        assert_eq!(rule.last_triggered_at, Some(t0()));
    }

    #[test]
    fn test_cooldown_suppresses_then_releases() {
        let mut rule = AlertRule::for_sensor("acidic", "ph-1", RuleCondition::lt(5.5), Severity::High)
            .with_cooldown(15);
        let mut w = window();

        assert!(run(&mut rule, &mut w, reading_at(5.0, 0)).is_some());
        for minute in [1, 5, 14] {
            assert!(run(&mut rule, &mut w, reading_at(5.0, minute)).is_none());
        }
        // Suppressed evaluations leave the trigger time alone.
        assert_eq!(rule.last_triggered_at, Some(t0()));

        let late = Reading::new(
            "ph-1",
            SensorType::Ph,
            5.0,
            t0() + Duration::minutes(15) + Duration::milliseconds(1),
        );
        assert!(run(&mut rule, &mut w, late).is_some());
    }

    #[test]
    fn test_disabled_rule_does_nothing() {
        let mut rule =
            AlertRule::for_sensor("acidic", "ph-1", RuleCondition::lt(5.5), Severity::High).disabled();
        let mut w = window();
        assert!(run(&mut rule, &mut w, reading_at(5.0, 0)).is_none());
        assert!(rule.last_triggered_at.is_none());
    }

    #[test]
    fn test_other_sensor_ignored() {
        let mut rule = AlertRule::for_sensor("acidic", "ph-2", RuleCondition::lt(5.5), Severity::High);
        let mut w = window();
        assert!(run(&mut rule, &mut w, reading_at(5.0, 0)).is_none());

        let mut any = AlertRule::new("acidic", RuleTarget::Any, RuleCondition::lt(5.5), Severity::High);
        assert!(run(&mut any, &mut w, reading_at(5.0, 1)).is_some());
    }

    #[test]
    fn test_rate_of_change() {
        let mut rule = AlertRule::for_sensor(
            "swing",
            "ph-1",
            RuleCondition::RateOfChange { per_minute: 0.1 },
            Severity::Medium,
        )
        .with_cooldown(0);
        let mut w = window();

        // First reading has no predecessor.
        assert!(run(&mut rule, &mut w, reading_at(6.0, 0)).is_none());
        // 0.1 over 2 minutes = 0.05/min
        assert!(run(&mut rule, &mut w, reading_at(6.1, 2)).is_none());
        // -0.5 over 1 minute
        let event = run(&mut rule, &mut w, reading_at(5.6, 3)).unwrap();
        assert_eq!(event.value, 5.6);
    }

    #[test]
    fn test_rate_skipped_without_elapsed_time() {
        let mut rule = AlertRule::for_sensor(
            "swing",
            "ph-1",
            RuleCondition::RateOfChange { per_minute: 0.1 },
            Severity::Medium,
        );
        let mut w = window();
        assert!(run(&mut rule, &mut w, reading_at(6.0, 0)).is_none());
        assert!(run(&mut rule, &mut w, reading_at(9.0, 0)).is_none());
        assert!(rule.last_triggered_at.is_none());
    }

    #[test]
    fn test_malformed_rule_is_an_error() {
        let mut rule = AlertRule::for_sensor(
            "bad",
            "ph-1",
            RuleCondition::between(6.5, 5.8),
            Severity::Low,
        );
        let mut w = window();
        let reading = reading_at(6.0, 0);
        w.update(reading.clone());
        let result = RuleEvaluator::new().evaluate(&mut rule, &reading, &w);
        assert!(matches!(result, Err(RuleConfigError::InvertedRange { .. })));
    }

    #[test]
    fn test_disabled_malformed_rule_is_silent() {
        let evaluator = RuleEvaluator::new();
        let mut rule = AlertRule::for_sensor(
            "bad",
            "ph-1",
            RuleCondition::between(6.5, 5.8),
            Severity::Low,
        )
        .disabled();
        let mut w = window();
        let reading = reading_at(6.0, 0);
        w.update(reading.clone());
        assert_eq!(evaluator.evaluate(&mut rule, &reading, &w), Ok(None));

        let mut rule = AlertRule::for_sensor(
            "silent",
            "ph-1",
            RuleCondition::Metadata(MetadataCheck::Offline { after_minutes: -5 }),
            Severity::Low,
        )
        .disabled();
        assert_eq!(
            evaluator.evaluate_metadata(&mut rule, "ph-1", Some(1.0), t0(), None),
            Ok(None)
        );
    }

    #[test]
    fn test_metadata_rule_ignored_on_stream() {
        let mut rule = AlertRule::for_sensor(
            "batt",
            "ph-1",
            RuleCondition::Metadata(MetadataCheck::BatteryLow { below_percent: 20.0 }),
            Severity::Low,
        );
        let mut w = window();
        assert!(run(&mut rule, &mut w, reading_at(1.0, 0)).is_none());
    }

    #[test]
    fn test_metadata_evaluation_uses_cooldown() {
        let evaluator = RuleEvaluator::new();
        let mut rule = AlertRule::for_sensor(
            "batt",
            "ph-1",
            RuleCondition::Metadata(MetadataCheck::BatteryLow { below_percent: 20.0 }),
            Severity::Low,
        )
        .with_cooldown(60);

        let first = evaluator
            .evaluate_metadata(&mut rule, "ph-1", Some(12.0), t0(), None)
            .unwrap()
            .unwrap();
        assert_eq!(first.message, "ph-1 battery at 12%");

        let again = evaluator
            .evaluate_metadata(&mut rule, "ph-1", Some(11.0), t0() + Duration::minutes(30), None)
            .unwrap();
        assert!(again.is_none());

        let unmatched = evaluator
            .evaluate_metadata(&mut rule, "ph-1", None, t0() + Duration::minutes(90), None)
            .unwrap();
        assert!(unmatched.is_none());
        assert_eq!(rule.last_triggered_at, Some(t0()));
    }
}
