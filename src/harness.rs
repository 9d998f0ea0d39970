use std::time::Instant;

use tracing::debug;

use crate::Error;

/// Timing statistics for one runner, consumed once for reporting.
pub struct BenchReport {
    pub name: String,
    pub mean_s: f64,
    pub stddev_s: f64,
    pub throughput_millions: f64,
}

/// Repeat `iter_fn` exactly `iterations` times, timing each call and
/// checking its sum against the reference before the next iteration
/// begins. `iter_fn` owns the whole lap: accumulator reset, execution,
/// and readback. A mismatch on any iteration aborts the entire run;
/// reduction races are often intermittent, so one bad lap must never
/// be averaged away.
pub fn run<F>(
    name: &str,
    iterations: usize,
    n: usize,
    reference: u32,
    mut iter_fn: F,
) -> Result<BenchReport, Error>
where
    F: FnMut() -> u32,
{
    let mut laps = Vec::with_capacity(iterations);
    for iter in 0..iterations {
        let start = Instant::now();
        let sum = iter_fn();
        let elapsed = start.elapsed().as_secs_f64();
        verify(sum, reference, name)?;
        debug!(name, iter, elapsed, "lap recorded");
        laps.push(elapsed);
    }

    let mean_s = mean(&laps);
    Ok(BenchReport {
        name: name.to_string(),
        mean_s,
        stddev_s: stddev(&laps, mean_s),
        throughput_millions: n as f64 / 1_000_000.0 / mean_s,
    })
}

/// Compare a computed sum against the reference oracle. Any mismatch
/// is fatal and reported with both values and the call site.
#[track_caller]
pub fn verify(actual: u32, expected: u32, label: &str) -> Result<(), Error> {
    if actual != expected {
        let loc = std::panic::Location::caller();
        return Err(Error::Mismatch {
            label: label.to_string(),
            expected,
            actual,
            at: format!("{}:{}", loc.file(), loc.line()),
        });
    }
    Ok(())
}

pub fn print_report(report: &BenchReport) {
    println!(
        "{}: {:.6}+-{:.6} s",
        report.name, report.mean_s, report.stddev_s
    );
    println!(
        "{}: {:.2} millions/s",
        report.name, report.throughput_millions
    );
    println!();
}

fn mean(laps: &[f64]) -> f64 {
    laps.iter().sum::<f64>() / laps.len() as f64
}

fn stddev(laps: &[f64], mean: f64) -> f64 {
    let variance = laps
        .iter()
        .map(|&lap| (lap - mean) * (lap - mean))
        .sum::<f64>()
        / laps.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_stddev_over_known_samples() {
        let laps = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let m = mean(&laps);
        assert_eq!(m, 5.0);
        assert_eq!(stddev(&laps, m), 2.0);
    }

    #[test]
    fn stddev_of_constant_samples_is_zero() {
        let laps = [0.25, 0.25, 0.25];
        assert_eq!(stddev(&laps, mean(&laps)), 0.0);
    }

    #[test]
    fn verify_accepts_matching_sums() {
        assert!(verify(42, 42, "test").is_ok());
    }

    #[test]
    fn verify_reports_both_values_on_mismatch() {
        let err = verify(41, 42, "test runner").unwrap_err();
        match err {
            Error::Mismatch {
                label,
                expected,
                actual,
                at,
            } => {
                assert_eq!(label, "test runner");
                assert_eq!(expected, 42);
                assert_eq!(actual, 41);
                assert!(at.contains("harness.rs"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn run_counts_iterations_and_derives_throughput() {
        let mut calls = 0;
        let report = run("counting", 10, 1_000_000, 7, || {
            calls += 1;
            7
        })
        .unwrap();
        assert_eq!(calls, 10);
        assert!(report.mean_s >= 0.0);
        assert!(report.throughput_millions > 0.0);
    }

    #[test]
    fn run_aborts_on_first_mismatch() {
        let mut calls = 0;
        let result = run("flaky", 10, 100, 7, || {
            calls += 1;
            if calls == 3 {
                8
            } else {
                7
            }
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }
}
