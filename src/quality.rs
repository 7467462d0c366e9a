// GrowWatch - Sensor telemetry alerting and analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Data quality scoring.

use crate::reading::Quality;

/// Weighted quality score in [0, 100]: good = 100, fair = 50, poor = 0.
///
/// An empty input scores 0.
pub fn score<I>(points: I) -> f64
where
    I: IntoIterator<Item = Quality>,
{
    let (total, count) = points
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), q| (sum + q.weight(), n + 1));

    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mixed_quality() {
        let points = [Quality::Good, Quality::Good, Quality::Fair, Quality::Poor];
        assert_relative_eq!(score(points), 62.5);
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(score(Vec::<Quality>::new()), 0.0);
    }

    #[test]
    fn test_extremes() {
        assert_eq!(score([Quality::Good; 5]), 100.0);
        assert_eq!(score([Quality::Poor; 5]), 0.0);
        assert_eq!(score([Quality::Fair]), 50.0);
    }
}
