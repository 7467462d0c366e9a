// GrowWatch - Sensor telemetry alerting and analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Once-per-rule reporting of rule configuration errors.

use crate::error::RuleConfigError;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Records each rule's configuration error the first time it is seen.
///
/// A rule is reported again only after [`Diagnostics::clear_rule`], which the
/// engine calls whenever the rule is edited or removed.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Mutex<HashMap<String, RuleConfigError>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error. Returns true when it was not already reported.
    pub fn report(&self, error: RuleConfigError) -> bool {
        let mut errors = self.errors.lock().unwrap_or_else(PoisonError::into_inner);
        let key = error.rule_id().to_string();
        if errors.get(&key) == Some(&error) {
            return false;
        }
        log::warn!("skipping malformed rule: {}", error);
        errors.insert(key, error);
        true
    }

    pub fn clear_rule(&self, rule_id: &str) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(rule_id);
    }

    /// Every outstanding error, ordered by rule id.
    pub fn errors(&self) -> Vec<RuleConfigError> {
        let errors = self.errors.lock().unwrap_or_else(PoisonError::into_inner);
        let mut list: Vec<_> = errors.values().cloned().collect();
        list.sort_by(|a, b| a.rule_id().cmp(b.rule_id()));
        list
    }

    pub fn is_empty(&self) -> bool {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub fn clear(&self) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
