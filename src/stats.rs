//! Statistics aggregator
//!
//! Pure reduction of captured [`RequestSample`]s into the flag-selected
//! aggregate figures. Never fails: families whose underlying data is
//! missing are simply omitted, as are fields whose flag is unset.

use serde::{Deserialize, Serialize};

use crate::context::{AggregateFlags, RequestSample, RowSample};

/// Arithmetic sample mean.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divisor N, not N-1).
#[must_use]
pub fn population_sd(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[allow(clippy::cast_possible_truncation)]
fn round_ms(value: f64) -> i64 {
    value.round() as i64
}

/// Aggregated figures of one run, all rounded to whole milliseconds.
/// Every field is present iff its flag was set and the samples carried
/// the underlying data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedResult {
    /// Mean full elapsed time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<i64>,
    /// Population SD of full elapsed times
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sd: Option<i64>,
    /// Mean time to first row
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_row_mean: Option<i64>,
    /// Population SD of first-row times
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_row_sd: Option<i64>,
    /// Mean pooled inter-row delta
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_row_mean: Option<i64>,
    /// Population SD of pooled inter-row deltas
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_row_sd: Option<i64>,
    /// Mean engine-reported CPU time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_cpu_time: Option<i64>,
    /// Mean engine-reported elapsed time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_elapsed_time: Option<i64>,
}

/// Inter-row deltas of one run with the cold-start edge excluded.
///
/// The leading delta (first sampled row to the next) absorbs dispatch and
/// warm-up skew and is dropped; the drain interval past the final sampled
/// row never produces a delta at all. Five samples therefore pool exactly
/// three interior deltas.
fn interior_deltas(samples: &[RowSample]) -> Vec<f64> {
    samples
        .windows(2)
        .skip(1)
        .map(|pair| pair[1].at_ms - pair[0].at_ms)
        .collect()
}

/// Reduce samples to the flag-selected aggregates.
#[must_use]
pub fn aggregate(flags: &AggregateFlags, samples: &[RequestSample]) -> AggregatedResult {
    let mut result = AggregatedResult::default();
    if samples.is_empty() {
        return result;
    }

    let full: Vec<f64> = samples.iter().map(|s| s.full_ms).collect();
    if flags.mean {
        result.mean = Some(round_ms(mean(&full)));
    }
    if flags.sd {
        result.sd = Some(round_ms(population_sd(&full)));
    }

    let first_row: Vec<f64> = samples.iter().filter_map(|s| s.first_row_ms).collect();
    if !first_row.is_empty() {
        if flags.first_row_mean {
            result.first_row_mean = Some(round_ms(mean(&first_row)));
        }
        if flags.first_row_sd {
            result.first_row_sd = Some(round_ms(population_sd(&first_row)));
        }
    }

    let pooled: Vec<f64> = samples
        .iter()
        .flat_map(|s| interior_deltas(&s.row_samples))
        .collect();
    if !pooled.is_empty() {
        if flags.by_row_mean {
            result.by_row_mean = Some(round_ms(mean(&pooled)));
        }
        if flags.by_row_sd {
            result.by_row_sd = Some(round_ms(population_sd(&pooled)));
        }
    }

    let cpu: Vec<f64> = samples.iter().filter_map(|s| s.cpu_ms).collect();
    if flags.mean_cpu_time && !cpu.is_empty() {
        result.mean_cpu_time = Some(round_ms(mean(&cpu)));
    }
    let elapsed: Vec<f64> = samples.iter().filter_map(|s| s.elapsed_ms).collect();
    if flags.mean_elapsed_time && !elapsed.is_empty() {
        result.mean_elapsed_time = Some(round_ms(mean(&elapsed)));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_with_rows(full_ms: f64, at: &[f64]) -> RequestSample {
        RequestSample {
            full_ms,
            first_row_ms: at.first().copied().or(Some(full_ms)),
            row_samples: at
                .iter()
                .enumerate()
                .map(|(i, &at_ms)| RowSample {
                    row_index: i as u64 * 1000 + 1,
                    at_ms,
                })
                .collect(),
            cpu_ms: None,
            elapsed_ms: None,
            rows: None,
        }
    }

    #[test]
    fn mean_and_population_sd() {
        let values = [10.0, 20.0, 30.0];
        assert!((mean(&values) - 20.0).abs() < f64::EPSILON);
        // population sd = sqrt(200/3) ~ 8.16
        assert!((population_sd(&values) - 8.164_965).abs() < 1e-5);
    }

    #[test]
    fn deterministic_full_times_round_as_specified() {
        let samples: Vec<RequestSample> = [10.0, 20.0, 30.0]
            .iter()
            .map(|&f| RequestSample::full_only(f))
            .collect();
        let result = aggregate(&AggregateFlags::timing(), &samples);
        assert_eq!(result.mean, Some(20));
        assert_eq!(result.sd, Some(8));
    }

    #[test]
    fn five_row_samples_pool_three_interior_deltas() {
        let sample = sample_with_rows(100.0, &[10.0, 20.0, 31.0, 43.0, 56.0]);
        let deltas = interior_deltas(&sample.row_samples);
        assert_eq!(deltas, vec![11.0, 12.0, 13.0]);

        let result = aggregate(&AggregateFlags::timing(), &[sample.clone(), sample]);
        // two runs, 3 deltas each, mean of [11,12,13,11,12,13] = 12
        assert_eq!(result.by_row_mean, Some(12));
    }

    #[test]
    fn unset_flags_leave_fields_absent() {
        let samples = [sample_with_rows(50.0, &[5.0, 10.0, 15.0, 20.0, 25.0])];
        let flags = AggregateFlags {
            mean: true,
            ..AggregateFlags::default()
        };
        let result = aggregate(&flags, &samples);
        assert!(result.mean.is_some());
        assert!(result.sd.is_none());
        assert!(result.first_row_mean.is_none());
        assert!(result.by_row_mean.is_none());
    }

    #[test]
    fn missing_source_data_omits_derived_families() {
        // Method-mode samples carry full times only.
        let samples = [RequestSample::full_only(40.0), RequestSample::full_only(60.0)];
        let result = aggregate(&AggregateFlags::timing(), &samples);
        assert_eq!(result.mean, Some(50));
        assert!(result.first_row_mean.is_none());
        assert!(result.by_row_mean.is_none());
        assert!(result.by_row_sd.is_none());
    }

    #[test]
    fn empty_sample_list_yields_empty_result() {
        let result = aggregate(&AggregateFlags::all(), &[]);
        assert_eq!(result, AggregatedResult::default());
    }

    #[test]
    fn cpu_and_elapsed_means_require_their_flags() {
        let mut sample = RequestSample::full_only(10.0);
        sample.cpu_ms = Some(101.0);
        sample.elapsed_ms = Some(2500.0);
        let without = aggregate(&AggregateFlags::timing(), &[sample.clone()]);
        assert!(without.mean_cpu_time.is_none());
        let with = aggregate(&AggregateFlags::all(), &[sample]);
        assert_eq!(with.mean_cpu_time, Some(101));
        assert_eq!(with.mean_elapsed_time, Some(2500));
    }

    proptest! {
        // sd is non-negative and zero for constant data, whatever the input
        #[test]
        fn sd_is_non_negative(values in proptest::collection::vec(0.0f64..1e6, 1..64)) {
            prop_assert!(population_sd(&values) >= 0.0);
        }

        #[test]
        fn constant_data_has_zero_sd(value in 0.0f64..1e6, len in 1usize..32) {
            let values = vec![value; len];
            prop_assert!(population_sd(&values).abs() < 1e-6);
        }
    }
}
