//! Aggregation contract: field presence tracks the flag set exactly, and
//! the by-row pooling keeps only interior deltas.

use rowbench::context::{AggregateFlags, RequestSample, RowSample};
use rowbench::stats::aggregate;

fn sample(full_ms: f64) -> RequestSample {
    RequestSample {
        full_ms,
        first_row_ms: Some(full_ms / 10.0),
        row_samples: (0..5)
            .map(|j| RowSample {
                row_index: j * 1000 + 1,
                at_ms: (j + 1) as f64 * 7.0,
            })
            .collect(),
        cpu_ms: Some(3.0),
        elapsed_ms: Some(9.0),
        rows: None,
    }
}

#[test]
fn every_flag_combination_yields_exactly_the_flagged_fields() {
    let samples = [sample(10.0), sample(20.0), sample(30.0)];

    for bits in 0u32..256 {
        let flags = AggregateFlags {
            mean: bits & 1 != 0,
            sd: bits & 2 != 0,
            first_row_mean: bits & 4 != 0,
            first_row_sd: bits & 8 != 0,
            by_row_mean: bits & 16 != 0,
            by_row_sd: bits & 32 != 0,
            mean_cpu_time: bits & 64 != 0,
            mean_elapsed_time: bits & 128 != 0,
        };
        let result = aggregate(&flags, &samples);

        assert_eq!(result.mean.is_some(), flags.mean, "mean at {bits:#b}");
        assert_eq!(result.sd.is_some(), flags.sd, "sd at {bits:#b}");
        assert_eq!(
            result.first_row_mean.is_some(),
            flags.first_row_mean,
            "first_row_mean at {bits:#b}"
        );
        assert_eq!(
            result.first_row_sd.is_some(),
            flags.first_row_sd,
            "first_row_sd at {bits:#b}"
        );
        assert_eq!(
            result.by_row_mean.is_some(),
            flags.by_row_mean,
            "by_row_mean at {bits:#b}"
        );
        assert_eq!(
            result.by_row_sd.is_some(),
            flags.by_row_sd,
            "by_row_sd at {bits:#b}"
        );
        assert_eq!(
            result.mean_cpu_time.is_some(),
            flags.mean_cpu_time,
            "mean_cpu_time at {bits:#b}"
        );
        assert_eq!(
            result.mean_elapsed_time.is_some(),
            flags.mean_elapsed_time,
            "mean_elapsed_time at {bits:#b}"
        );
    }
}

#[test]
fn deterministic_inputs_reduce_to_the_documented_figures() {
    let samples = [sample(10.0), sample(20.0), sample(30.0)];
    let result = aggregate(&AggregateFlags::all(), &samples);
    assert_eq!(result.mean, Some(20));
    assert_eq!(result.sd, Some(8));
    assert_eq!(result.mean_cpu_time, Some(3));
    assert_eq!(result.mean_elapsed_time, Some(9));
    // interior deltas are all exactly 7 ms
    assert_eq!(result.by_row_mean, Some(7));
    assert_eq!(result.by_row_sd, Some(0));
}

#[test]
fn by_row_pools_three_interior_deltas_per_five_sample_run() {
    // Two runs with different interior spacing; 3 deltas from each run.
    let mut one = sample(100.0);
    one.row_samples = [0.0, 10.0, 14.0, 18.0, 22.0]
        .iter()
        .enumerate()
        .map(|(j, &at_ms)| RowSample {
            row_index: j as u64 + 1,
            at_ms,
        })
        .collect();
    let mut two = sample(100.0);
    two.row_samples = [0.0, 50.0, 58.0, 66.0, 74.0]
        .iter()
        .enumerate()
        .map(|(j, &at_ms)| RowSample {
            row_index: j as u64 + 1,
            at_ms,
        })
        .collect();

    let result = aggregate(&AggregateFlags::timing(), &[one, two]);
    // pooled deltas: [4, 4, 4] and [8, 8, 8]; the 10 and 50 ms leading
    // deltas are excluded as cold-start skew
    assert_eq!(result.by_row_mean, Some(6));
}

#[test]
fn runs_without_row_samples_contribute_nothing_to_by_row() {
    let with_rows = sample(10.0);
    let mut without_rows = sample(10.0);
    without_rows.row_samples.clear();
    without_rows.first_row_ms = Some(10.0);

    let result = aggregate(&AggregateFlags::timing(), &[with_rows.clone(), without_rows]);
    let alone = aggregate(&AggregateFlags::timing(), &[with_rows]);
    assert_eq!(result.by_row_mean, alone.by_row_mean);
    assert_eq!(result.by_row_sd, alone.by_row_sd);
}
