// GrowWatch - Sensor telemetry alerting and analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Alert rule model.
//!
//! Rules arrive from the management surface in a loose shape
//! ([`RuleDefinition`]: an operator string plus a number-or-pair value) and
//! are converted into [`AlertRule`], whose [`RuleCondition`] ties each
//! operator to the threshold shape it needs.

use crate::error::RuleConfigError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Wildcard accepted in place of a sensor id.
pub const ANY_SENSOR: &str = "*";

/// Default cooldown between two notifications of the same rule.
pub const DEFAULT_COOLDOWN_MINUTES: u32 = 15;

/// Longest accepted `offline` silence (one year).
pub const MAX_OFFLINE_MINUTES: i64 = 366 * 24 * 60;

/// Longest accepted `calibration_due` lead time.
pub const MAX_CALIBRATION_LEAD_DAYS: i64 = 3650;

/// Notification severity configured on a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Which sensors a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleTarget {
    Sensor(String),
    Any,
}

impl RuleTarget {
    pub fn parse(raw: &str) -> Self {
        if raw == ANY_SENSOR {
            RuleTarget::Any
        } else {
            RuleTarget::Sensor(raw.to_string())
        }
    }

    pub fn matches(&self, sensor_id: &str) -> bool {
        match self {
            RuleTarget::Any => true,
            RuleTarget::Sensor(id) => id == sensor_id,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RuleTarget::Any => ANY_SENSOR,
            RuleTarget::Sensor(id) => id,
        }
    }
}

/// Single-threshold comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Gt,
    Lt,
    Eq,
    Gte,
    Lte,
}

impl Comparison {
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::Gt => value > threshold,
            Comparison::Lt => value < threshold,
            Comparison::Eq => value == threshold,
            Comparison::Gte => value >= threshold,
            Comparison::Lte => value <= threshold,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Gt => "gt",
            Comparison::Lt => "lt",
            Comparison::Eq => "eq",
            Comparison::Gte => "gte",
            Comparison::Lte => "lte",
        }
    }

    fn phrase(&self) -> &'static str {
        match self {
            Comparison::Gt => "above",
            Comparison::Lt => "below",
            Comparison::Eq => "equal to",
            Comparison::Gte => "at or above",
            Comparison::Lte => "at or below",
        }
    }
}

/// Two-bound comparisons. Both bounds belong to the band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeMode {
    /// low <= v <= high
    Between,
    /// v < low || v > high
    Outside,
}

impl RangeMode {
    pub fn holds(&self, value: f64, low: f64, high: f64) -> bool {
        let inside = value >= low && value <= high;
        match self {
            RangeMode::Between => inside,
            RangeMode::Outside => !inside,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RangeMode::Between => "between",
            RangeMode::Outside => "outside",
        }
    }
}

/// Checks evaluated against sensor metadata instead of the reading stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetadataCheck {
    /// No reading for longer than this many minutes.
    Offline { after_minutes: i64 },
    /// Battery level strictly below this percentage.
    BatteryLow { below_percent: f64 },
    /// Calibration date within this many days (0 = on the day).
    CalibrationDue { lead_days: i64 },
}

impl MetadataCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataCheck::Offline { .. } => "offline",
            MetadataCheck::BatteryLow { .. } => "battery_low",
            MetadataCheck::CalibrationDue { .. } => "calibration_due",
        }
    }

    fn parameter_name(&self) -> &'static str {
        match self {
            MetadataCheck::Offline { .. } => "minutes",
            MetadataCheck::BatteryLow { .. } => "percent",
            MetadataCheck::CalibrationDue { .. } => "days",
        }
    }

    /// Current parameter and its upper bound; the lower bound is always 0.
    fn bounds(&self) -> (f64, f64) {
        match *self {
            MetadataCheck::BatteryLow { below_percent } => (below_percent, 100.0),
            MetadataCheck::Offline { after_minutes } => {
                (after_minutes as f64, MAX_OFFLINE_MINUTES as f64)
            }
            MetadataCheck::CalibrationDue { lead_days } => {
                (lead_days as f64, MAX_CALIBRATION_LEAD_DAYS as f64)
            }
        }
    }

    fn parameter(&self) -> f64 {
        match *self {
            MetadataCheck::Offline { after_minutes } => after_minutes as f64,
            MetadataCheck::BatteryLow { below_percent } => below_percent,
            MetadataCheck::CalibrationDue { lead_days } => lead_days as f64,
        }
    }
}

/// Operator paired with the threshold shape it requires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleCondition {
    Threshold { comparison: Comparison, value: f64 },
    Range { mode: RangeMode, low: f64, high: f64 },
    /// Absolute change per minute between the two newest readings.
    RateOfChange { per_minute: f64 },
    Metadata(MetadataCheck),
}

impl RuleCondition {
    pub fn gt(value: f64) -> Self {
        Self::Threshold {
            comparison: Comparison::Gt,
            value,
        }
    }

    pub fn lt(value: f64) -> Self {
        Self::Threshold {
            comparison: Comparison::Lt,
            value,
        }
    }

    pub fn between(low: f64, high: f64) -> Self {
        Self::Range {
            mode: RangeMode::Between,
            low,
            high,
        }
    }

    pub fn outside(low: f64, high: f64) -> Self {
        Self::Range {
            mode: RangeMode::Outside,
            low,
            high,
        }
    }

    pub fn operator(&self) -> &'static str {
        match self {
            RuleCondition::Threshold { comparison, .. } => comparison.as_str(),
            RuleCondition::Range { mode, .. } => mode.as_str(),
            RuleCondition::RateOfChange { .. } => "rate_of_change",
            RuleCondition::Metadata(check) => check.as_str(),
        }
    }

    /// True for conditions computed from readings.
    pub fn is_stream(&self) -> bool {
        !matches!(self, RuleCondition::Metadata(_))
    }

    /// Human-readable threshold, used by message templates.
    pub fn threshold_label(&self) -> String {
        match self {
            RuleCondition::Threshold { value, .. } => value.to_string(),
            RuleCondition::Range { low, high, .. } => format!("[{}, {}]", low, high),
            RuleCondition::RateOfChange { per_minute } => format!("{}/min", per_minute),
            RuleCondition::Metadata(check) => check.parameter().to_string(),
        }
    }

    /// Default notification text when the rule has no template.
    pub(crate) fn default_message(&self, sensor_id: &str, value: f64) -> String {
        match self {
            RuleCondition::Threshold { comparison, value: t } => {
                format!("{} reading {} is {} {}", sensor_id, value, comparison.phrase(), t)
            }
            RuleCondition::Range {
                mode: RangeMode::Between,
                low,
                high,
            } => format!("{} reading {} is within [{}, {}]", sensor_id, value, low, high),
            RuleCondition::Range {
                mode: RangeMode::Outside,
                low,
                high,
            } => format!("{} reading {} is outside [{}, {}]", sensor_id, value, low, high),
            RuleCondition::RateOfChange { per_minute } => format!(
                "{} changing faster than {}/min (now {})",
                sensor_id, per_minute, value
            ),
            RuleCondition::Metadata(MetadataCheck::Offline { .. }) => {
                format!("{} has not reported for {:.0} minutes", sensor_id, value)
            }
            RuleCondition::Metadata(MetadataCheck::BatteryLow { .. }) => {
                format!("{} battery at {}%", sensor_id, value)
            }
            RuleCondition::Metadata(MetadataCheck::CalibrationDue { .. }) => {
                format!("{} calibration due in {:.0} days", sensor_id, value)
            }
        }
    }

    /// Reject shapes that cannot be evaluated.
    pub fn check(&self, rule_id: &str) -> Result<(), RuleConfigError> {
        let non_finite = || RuleConfigError::NonFiniteThreshold {
            rule_id: rule_id.to_string(),
        };
        match *self {
            RuleCondition::Threshold { value, .. } => {
                if !value.is_finite() {
                    return Err(non_finite());
                }
            }
            RuleCondition::Range { low, high, .. } => {
                if !low.is_finite() || !high.is_finite() {
                    return Err(non_finite());
                }
                if low > high {
                    return Err(RuleConfigError::InvertedRange {
                        rule_id: rule_id.to_string(),
                        low,
                        high,
                    });
                }
            }
            RuleCondition::RateOfChange { per_minute } => {
                if !(per_minute.is_finite() && per_minute >= 0.0) {
                    return Err(RuleConfigError::MissingRate {
                        rule_id: rule_id.to_string(),
                    });
                }
            }
            RuleCondition::Metadata(check) => {
                let (value, max) = check.bounds();
                bounded(rule_id, check.parameter_name(), value, max)?;
            }
        }
        Ok(())
    }
}

/// A configured alert rule.
///
/// `last_triggered_at` is written only by the rule evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RuleDefinition", into = "RuleDefinition")]
pub struct AlertRule {
    pub id: String,
    pub target: RuleTarget,
    pub condition: RuleCondition,
    pub severity: Severity,
    pub cooldown_minutes: u32,
    pub enabled: bool,
    /// Template with `{sensor}`, `{value}`, `{threshold}`, `{severity}` placeholders.
    pub message: Option<String>,
    pub last_triggered_at: Option<DateTime<Utc>>,
}

impl AlertRule {
    pub fn new(
        id: impl Into<String>,
        target: RuleTarget,
        condition: RuleCondition,
        severity: Severity,
    ) -> Self {
        Self {
            id: id.into(),
            target,
            condition,
            severity,
            cooldown_minutes: DEFAULT_COOLDOWN_MINUTES,
            enabled: true,
            message: None,
            last_triggered_at: None,
        }
    }

    /// Rule bound to one sensor.
    pub fn for_sensor(
        id: impl Into<String>,
        sensor_id: impl Into<String>,
        condition: RuleCondition,
        severity: Severity,
    ) -> Self {
        Self::new(id, RuleTarget::Sensor(sensor_id.into()), condition, severity)
    }

    pub fn with_cooldown(mut self, minutes: u32) -> Self {
        self.cooldown_minutes = minutes;
        self
    }

    pub fn with_message(mut self, template: impl Into<String>) -> Self {
        self.message = Some(template.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn validate(&self) -> Result<(), RuleConfigError> {
        if self.id.is_empty() {
            return Err(RuleConfigError::EmptyId);
        }
        self.condition.check(&self.id)
    }

    /// Whether a trigger at `now` would still be suppressed.
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        match self.last_triggered_at {
            Some(last) => now - last < Duration::minutes(i64::from(self.cooldown_minutes)),
            None => false,
        }
    }

    /// Time at which the rule leaves cooldown, if it is cooling down at all.
    pub fn cooldown_until(&self) -> Option<DateTime<Utc>> {
        self.last_triggered_at
            .map(|last| last + Duration::minutes(i64::from(self.cooldown_minutes)))
    }

    /// Render the notification text for a triggering value.
    pub fn render_message(&self, sensor_id: &str, value: f64) -> String {
        match &self.message {
            Some(template) => template
                .replace("{sensor}", sensor_id)
                .replace("{value}", &value.to_string())
                .replace("{threshold}", &self.condition.threshold_label())
                .replace("{severity}", self.severity.as_str())
                .replace("{rule}", &self.id),
            None => self.condition.default_message(sensor_id, value),
        }
    }
}

/// Threshold as it appears in loosely-typed rule input: a number or a pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdValue {
    Single(f64),
    Pair(Vec<f64>),
}

/// Condition as sent by the management surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionDefinition {
    pub operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ThresholdValue>,
}

/// Serialized form of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    /// Sensor id, or `*` for every sensor.
    pub sensor_id: String,
    pub condition: ConditionDefinition,
    pub severity: Severity,
    #[serde(default = "default_cooldown")]
    pub cooldown_minutes: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_triggered_at: Option<DateTime<Utc>>,
}

fn default_cooldown() -> u32 {
    DEFAULT_COOLDOWN_MINUTES
}

fn default_enabled() -> bool {
    true
}

impl TryFrom<RuleDefinition> for AlertRule {
    type Error = RuleConfigError;

    fn try_from(def: RuleDefinition) -> Result<Self, Self::Error> {
        if def.id.is_empty() {
            return Err(RuleConfigError::EmptyId);
        }

        let condition = parse_condition(&def.id, &def.condition)?;
        let rule = AlertRule {
            target: RuleTarget::parse(&def.sensor_id),
            id: def.id,
            condition,
            severity: def.severity,
            cooldown_minutes: def.cooldown_minutes,
            enabled: def.enabled,
            message: def.message,
            last_triggered_at: def.last_triggered_at,
        };
        rule.validate()?;
        Ok(rule)
    }
}

impl From<AlertRule> for RuleDefinition {
    fn from(rule: AlertRule) -> Self {
        let value = match rule.condition {
            RuleCondition::Threshold { value, .. } => Some(ThresholdValue::Single(value)),
            RuleCondition::Range { low, high, .. } => Some(ThresholdValue::Pair(vec![low, high])),
            RuleCondition::RateOfChange { per_minute } => Some(ThresholdValue::Single(per_minute)),
            RuleCondition::Metadata(check) => Some(ThresholdValue::Single(check.parameter())),
        };
        RuleDefinition {
            sensor_id: rule.target.as_str().to_string(),
            condition: ConditionDefinition {
                operator: rule.condition.operator().to_string(),
                value,
            },
            id: rule.id,
            severity: rule.severity,
            cooldown_minutes: rule.cooldown_minutes,
            enabled: rule.enabled,
            message: rule.message,
            last_triggered_at: rule.last_triggered_at,
        }
    }
}

/// Accept `value` only if it is finite and within `[0, max]`.
fn bounded(
    rule_id: &str,
    parameter: &'static str,
    value: f64,
    max: f64,
) -> Result<f64, RuleConfigError> {
    if !value.is_finite() {
        return Err(RuleConfigError::NonFiniteThreshold {
            rule_id: rule_id.to_string(),
        });
    }
    if !(0.0..=max).contains(&value) {
        return Err(RuleConfigError::ParameterOutOfRange {
            rule_id: rule_id.to_string(),
            parameter,
            value,
            min: 0.0,
            max,
        });
    }
    Ok(value)
}

fn parse_condition(
    rule_id: &str,
    def: &ConditionDefinition,
) -> Result<RuleCondition, RuleConfigError> {
    let op = def.operator.as_str();
    let single = match &def.value {
        Some(ThresholdValue::Single(v)) => Some(*v),
        _ => None,
    };

    let comparison = match op {
        "gt" => Some(Comparison::Gt),
        "lt" => Some(Comparison::Lt),
        "eq" => Some(Comparison::Eq),
        "gte" => Some(Comparison::Gte),
        "lte" => Some(Comparison::Lte),
        _ => None,
    };
    if let Some(comparison) = comparison {
        let value = single.ok_or_else(|| RuleConfigError::MissingThreshold {
            rule_id: rule_id.to_string(),
            operator: op.to_string(),
        })?;
        return Ok(RuleCondition::Threshold { comparison, value });
    }

    let missing_parameter = |parameter: &'static str| RuleConfigError::MissingParameter {
        rule_id: rule_id.to_string(),
        operator: op.to_string(),
        parameter,
    };

    match op {
        "between" | "outside" => {
            let (low, high) = match &def.value {
                Some(ThresholdValue::Pair(pair)) if pair.len() == 2 => (pair[0], pair[1]),
                _ => {
                    return Err(RuleConfigError::MissingRange {
                        rule_id: rule_id.to_string(),
                        operator: op.to_string(),
                    })
                }
            };
            let mode = if op == "between" {
                RangeMode::Between
            } else {
                RangeMode::Outside
            };
            Ok(RuleCondition::Range { mode, low, high })
        }
        "rate_of_change" => {
            let per_minute = single.ok_or_else(|| RuleConfigError::MissingRate {
                rule_id: rule_id.to_string(),
            })?;
            Ok(RuleCondition::RateOfChange { per_minute })
        }
        "offline" => {
            let minutes = single.ok_or_else(|| missing_parameter("minutes"))?;
            let minutes = bounded(rule_id, "minutes", minutes, MAX_OFFLINE_MINUTES as f64)?;
            Ok(RuleCondition::Metadata(MetadataCheck::Offline {
                after_minutes: minutes.round() as i64,
            }))
        }
        "battery_low" => {
            let percent = single.ok_or_else(|| missing_parameter("percent"))?;
            let percent = bounded(rule_id, "percent", percent, 100.0)?;
            Ok(RuleCondition::Metadata(MetadataCheck::BatteryLow {
                below_percent: percent,
            }))
        }
        "calibration_due" => {
            let days = bounded(
                rule_id,
                "days",
                single.unwrap_or(0.0),
                MAX_CALIBRATION_LEAD_DAYS as f64,
            )?;
            Ok(RuleCondition::Metadata(MetadataCheck::CalibrationDue {
                lead_days: days.round() as i64,
            }))
        }
        _ => Err(RuleConfigError::UnknownOperator {
            rule_id: rule_id.to_string(),
            operator: op.to_string(),
        }),
    }
}
