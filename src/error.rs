// GrowWatch - Sensor telemetry alerting and analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for GrowWatch
//!
//! Validation warnings are not errors: they live in [`crate::validation`]
//! and never abort ingestion. Everything here is scoped to a single call.

use thiserror::Error;

/// Result type alias for GrowWatch operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type returned by the engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Reading could not be admitted
    #[error("Invalid reading: {0}")]
    InvalidReading(#[from] ReadingError),

    /// Engine configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Rule configuration error
    #[error("Rule error: {0}")]
    Rule(#[from] RuleConfigError),
}

/// Readings that cannot enter the pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReadingError {
    /// Sensor id is empty
    #[error("Reading has an empty sensor id")]
    EmptySensorId,

    /// Value is NaN or infinite
    #[error("Sensor {sensor_id} reported a non-finite value: {value}")]
    NonFiniteValue { sensor_id: String, value: f64 },
}

/// Malformed alert rules
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleConfigError {
    /// Rule id is empty
    #[error("Rule has an empty id")]
    EmptyId,

    /// Operator string not recognised
    #[error("Rule {rule_id}: unknown operator '{operator}'")]
    UnknownOperator { rule_id: String, operator: String },

    /// Comparison operator without a single threshold
    #[error("Rule {rule_id}: operator '{operator}' requires a single numeric threshold")]
    MissingThreshold { rule_id: String, operator: String },

    /// Range operator without a two-element threshold
    #[error("Rule {rule_id}: operator '{operator}' requires a [low, high] threshold pair")]
    MissingRange { rule_id: String, operator: String },

    /// Range bounds in the wrong order
    #[error("Rule {rule_id}: range low {low} exceeds high {high}")]
    InvertedRange { rule_id: String, low: f64, high: f64 },

    /// rate_of_change without a rate
    #[error("Rule {rule_id}: rate_of_change requires a non-negative per-minute rate")]
    MissingRate { rule_id: String },

    /// Threshold is NaN or infinite
    #[error("Rule {rule_id}: threshold must be finite")]
    NonFiniteThreshold { rule_id: String },

    /// Metadata rule without its parameter
    #[error("Rule {rule_id}: operator '{operator}' is missing parameter '{parameter}'")]
    MissingParameter {
        rule_id: String,
        operator: String,
        parameter: &'static str,
    },

    /// Metadata parameter outside its accepted bounds
    #[error("Rule {rule_id}: {parameter} {value} is outside [{min}, {max}]")]
    ParameterOutOfRange {
        rule_id: String,
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl RuleConfigError {
    /// Id of the offending rule (empty for [`RuleConfigError::EmptyId`])
    pub fn rule_id(&self) -> &str {
        match self {
            Self::EmptyId => "",
            Self::UnknownOperator { rule_id, .. }
            | Self::MissingThreshold { rule_id, .. }
            | Self::MissingRange { rule_id, .. }
            | Self::InvertedRange { rule_id, .. }
            | Self::MissingRate { rule_id }
            | Self::NonFiniteThreshold { rule_id }
            | Self::MissingParameter { rule_id, .. }
            | Self::ParameterOutOfRange { rule_id, .. } => rule_id,
        }
    }
}

/// Engine configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A field holds an unusable value
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// Config file could not be read
    #[error("Failed to read config file: {0}")]
    Io(String),

    /// Config JSON could not be parsed
    #[error("Failed to parse config: {0}")]
    Parse(String),
}
