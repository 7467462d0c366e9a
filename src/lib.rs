// GrowWatch - Sensor telemetry alerting and analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # GrowWatch - Sensor telemetry alerting and analytics
//!
//! Turns a stream of environmental sensor readings into rolling statistics,
//! statistical anomaly flags and rate-limited rule notifications.
//!
//! ## Key Features
//!
//! - **Rolling windows**: min/max/average/trend over the last N readings per sensor
//! - **Anomaly detection**: z-score flags with low/medium/high severity
//! - **Alert rules**: threshold, range and rate-of-change conditions with per-sensor cooldown
//! - **Metadata rules**: offline, battery and calibration checks
//!
//! ## Quick Start
//!
//! ```rust
//! use growwatch::{AlertRule, EngineConfig, Reading, RuleCondition, SensorType, Severity, TelemetryEngine};
//! use chrono::Utc;
//!
//! let engine = TelemetryEngine::new(EngineConfig::default()).unwrap();
//! engine.upsert_rule(AlertRule::for_sensor(
//!     "tent-hot",
//!     "temp-1",
//!     RuleCondition::gt(30.0),
//!     Severity::High,
//! ));
//!
//! let result = engine
//!     .ingest(Reading::new("temp-1", SensorType::Temperature, 31.5, Utc::now()))
//!     .unwrap();
//! assert_eq!(result.notifications.len(), 1);
//! assert_eq!(result.window.current, 31.5);
//! ```
//!
//! ## Modules
//!
//! - [`reading`]: Readings, sensor types and quality
//! - [`window`]: Rolling window statistics and trend
//! - [`anomaly`]: Z-score anomaly detection
//! - [`rule`]: Alert rule model and loose definitions
//! - [`evaluator`]: Rule matching and cooldown
//! - [`engine`]: The engine façade

pub mod anomaly;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod metadata;
pub mod quality;
pub mod reading;
pub mod rule;
pub mod scheduler;
pub mod snapshot;
pub mod validation;
pub mod window;

// Re-exports for convenient access
pub use anomaly::{AnomalyDetector, AnomalyFlag, AnomalySeverity, Moments};
pub use config::{AnomalyConfig, EngineConfig, TrendConfig, ValidationConfig, WindowConfig};
pub use diagnostics::Diagnostics;
pub use engine::{EngineResult, TelemetryEngine};
pub use error::{ConfigError, EngineError, ReadingError, Result, RuleConfigError};
pub use evaluator::RuleEvaluator;
pub use event::{EventSink, LogSink, MemorySink, NotificationEvent};
pub use metadata::{MetadataProbe, SensorMetadata, StandardProbe};
pub use reading::{Quality, Reading, SensorType, ValueRange};
pub use rule::{
    AlertRule, Comparison, MetadataCheck, RangeMode, RuleCondition, RuleDefinition, RuleTarget,
    Severity, ANY_SENSOR, DEFAULT_COOLDOWN_MINUTES, MAX_CALIBRATION_LEAD_DAYS,
    MAX_OFFLINE_MINUTES,
};
pub use scheduler::{Flight, SingleFlight};
pub use snapshot::AnalyticsSnapshot;
pub use validation::{ValidationWarning, Validator};
pub use window::{SensorWindow, Trend, WindowStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
