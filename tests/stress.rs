// GrowWatch - Stress Tests
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Stress tests for GrowWatch
//!
//! Run with: cargo test --release stress -- --ignored

use chrono::{Duration, TimeZone, Utc};
use growwatch::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

fn engine_with_rules() -> TelemetryEngine {
    let engine = TelemetryEngine::new(EngineConfig::default()).unwrap();
    engine.upsert_rule(AlertRule::new(
        "hot",
        RuleTarget::Any,
        RuleCondition::gt(32.0),
        Severity::High,
    ));
    engine.upsert_rule(AlertRule::new(
        "band",
        RuleTarget::Any,
        RuleCondition::outside(18.0, 30.0),
        Severity::Medium,
    ));
    engine.upsert_rule(AlertRule::new(
        "surge",
        RuleTarget::Any,
        RuleCondition::RateOfChange { per_minute: 2.0 },
        Severity::Low,
    ));
    engine
}

#[test]
#[ignore] // Run manually with --ignored
fn stress_test_single_sensor_ingest() {
    let engine = engine_with_rules();
    let mut rng = StdRng::seed_from_u64(7);
    let start_ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

    let iterations = 200_000;
    let start = Instant::now();

    for i in 0..iterations {
        let value = 24.0 + (i as f64 * 0.01).sin() * 4.0 + rng.gen_range(-0.5..0.5);
        let reading = Reading::new(
            "tent-1",
            SensorType::Temperature,
            value,
            start_ts + Duration::seconds(i as i64 * 10),
        );
        engine.ingest(reading).unwrap();
    }

    let elapsed = start.elapsed();
    let rate = iterations as f64 / elapsed.as_secs_f64();

    println!("Ingested {} readings in {:?}", iterations, elapsed);
    println!("Rate: {:.0} readings/second", rate);

    assert_eq!(engine.snapshot("tent-1").unwrap().count, 100);
    assert!(
        rate > 20_000.0,
        "Should ingest at least 20k readings/s, got {:.0}",
        rate
    );
}

#[test]
#[ignore]
fn stress_test_fleet_of_sensors() {
    let sink = Arc::new(MemorySink::new(1_000_000));
    let engine = Arc::new(engine_with_rules().with_sink(sink.clone()));
    let start_ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

    let threads = 8;
    let sensors_per_thread = 50;
    let readings_per_sensor = 500;
    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(t as u64);
                for i in 0..readings_per_sensor {
                    for s in 0..sensors_per_thread {
                        let sensor = format!("rh-{}-{}", t, s);
                        let spike = rng.gen_bool(0.01);
                        let value = if spike {
                            rng.gen_range(85.0..99.0)
                        } else {
                            rng.gen_range(55.0..65.0)
                        };
                        let reading = Reading::new(
                            sensor,
                            SensorType::Humidity,
                            value,
                            start_ts + Duration::seconds(i as i64 * 30),
                        );
                        engine.ingest(reading).unwrap();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let elapsed = start.elapsed();
    let total = threads * sensors_per_thread * readings_per_sensor;
    let rate = total as f64 / elapsed.as_secs_f64();

    println!("Fleet ingested {} readings in {:?}", total, elapsed);
    println!("Rate: {:.0} readings/second", rate);
    println!("Notifications: {}", sink.len());
    println!("Anomalies: {}", sink.anomalies().len());

    assert_eq!(engine.sensor_ids().len(), threads * sensors_per_thread);
    assert_eq!(engine.readings_ingested(), total as u64);
    assert!(
        rate > 10_000.0,
        "Should ingest at least 10k readings/s, got {:.0}",
        rate
    );
}

#[test]
#[ignore]
fn stress_test_rule_churn() {
    let engine = Arc::new(engine_with_rules());
    let start_ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for i in 0..5_000 {
                let threshold = 25.0 + (i % 10) as f64;
                engine.upsert_rule(AlertRule::new(
                    "hot",
                    RuleTarget::Any,
                    RuleCondition::gt(threshold),
                    Severity::High,
                ));
                engine.set_rule_enabled("band", i % 2 == 0);
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(100 + t);
                for i in 0..20_000 {
                    let reading = Reading::new(
                        format!("t{}", t),
                        SensorType::Temperature,
                        rng.gen_range(15.0..40.0),
                        start_ts + Duration::seconds(i * 5),
                    );
                    engine.ingest(reading).unwrap();
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(engine.rules().len(), 3);
    assert!(engine.diagnostics().is_empty());
}
