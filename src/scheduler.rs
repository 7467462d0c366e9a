// GrowWatch - Sensor telemetry alerting and analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Single-flight scheduling for periodic re-evaluation.
//!
//! At most one evaluation per key is in flight at a time, and a new one is
//! granted only once the cadence interval has elapsed since the previous
//! start. A granted [`Flight`] completes when dropped and can be cancelled
//! from another thread.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Slot {
    last_started: Option<DateTime<Utc>>,
    in_flight: Option<Arc<AtomicBool>>,
}

type Slots<K> = Arc<Mutex<HashMap<K, Slot>>>;

fn lock<K>(slots: &Slots<K>) -> MutexGuard<'_, HashMap<K, Slot>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fixed-cadence, one-at-a-time gate keyed by `K`.
#[derive(Debug)]
pub struct SingleFlight<K: Eq + Hash + Clone> {
    interval: Duration,
    slots: Slots<K>,
}

impl<K: Eq + Hash + Clone> SingleFlight<K> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start a flight for `key` if none is running and the cadence is due.
    pub fn try_start(&self, key: K, now: DateTime<Utc>) -> Option<Flight<K>> {
        let mut slots = lock(&self.slots);
        let slot = slots.entry(key.clone()).or_default();

        if slot.in_flight.is_some() {
            return None;
        }
        if let Some(last) = slot.last_started {
            if now - last < self.interval {
                return None;
            }
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        slot.last_started = Some(now);
        slot.in_flight = Some(Arc::clone(&cancelled));

        Some(Flight {
            key,
            cancelled,
            slots: Arc::clone(&self.slots),
        })
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        lock(&self.slots)
            .get(key)
            .map_or(false, |slot| slot.in_flight.is_some())
    }

    /// Signal cancellation to the running flight. Returns false if idle.
    pub fn cancel(&self, key: &K) -> bool {
        match lock(&self.slots).get(key).and_then(|slot| slot.in_flight.as_ref()) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for slot in lock(&self.slots).values() {
            if let Some(flag) = &slot.in_flight {
                flag.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Cancel everything and forget all cadence history.
    pub fn clear(&self) {
        self.cancel_all();
        lock(&self.slots).clear();
    }
}

/// A granted evaluation. Completes on drop.
#[derive(Debug)]
pub struct Flight<K: Eq + Hash + Clone> {
    key: K,
    cancelled: Arc<AtomicBool>,
    slots: Slots<K>,
}

impl<K: Eq + Hash + Clone> Flight<K> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Finish explicitly; same as dropping.
    pub fn complete(self) {}
}

impl<K: Eq + Hash + Clone> Drop for Flight<K> {
    fn drop(&mut self) {
        let mut slots = lock(&self.slots);
        if let Some(slot) = slots.get_mut(&self.key) {
            let ours = slot
                .in_flight
                .as_ref()
                .map_or(false, |flag| Arc::ptr_eq(flag, &self.cancelled));
            if ours {
                slot.in_flight = None;
            }
        }
    }
}
