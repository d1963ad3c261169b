//! Summary statistics and ranking for benchmark samples.

use thiserror::Error;

use crate::schema::BenchmarkResult;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("cannot summarize '{0}': no samples")]
    Empty(String),
    #[error("cannot summarize '{name}': sample {index} is not finite")]
    NonFinite { name: String, index: usize },
}

/// Aggregate one test case's samples into a [`BenchmarkResult`].
///
/// The deviation is the sample standard deviation (N-1 denominator). A
/// single sample has no spread to measure and reports 0.0.
pub fn summarize(name: &str, samples: &[f64]) -> Result<BenchmarkResult, StatsError> {
    if samples.is_empty() {
        return Err(StatsError::Empty(name.to_string()));
    }
    if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
        return Err(StatsError::NonFinite {
            name: name.to_string(),
            index,
        });
    }

    let n = samples.len();
    let total: f64 = samples.iter().sum();
    let average = total / n as f64;

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let minimum = sorted[0];
    let maximum = sorted[n - 1];
    let median = if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    };

    let deviation = if n < 2 {
        0.0
    } else {
        let variance = samples.iter().map(|x| (x - average).powi(2)).sum::<f64>() / (n - 1) as f64;
        variance.sqrt()
    };

    Ok(BenchmarkResult {
        name: name.to_string(),
        result: samples.to_vec(),
        maximum,
        minimum,
        total,
        average,
        median,
        deviation,
        failed_commands: 0,
    })
}

/// A result together with its speed relative to the fastest case.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked<'a> {
    /// `fastest.total * 100 / this.total`, truncated.
    pub percent: u64,
    pub result: &'a BenchmarkResult,
}

/// Sort ascending by total time and compare everything against the fastest.
///
/// The sort is stable, so equal totals keep their registration order. The
/// fastest entry always reports exactly 100.
pub fn rank(results: &[BenchmarkResult]) -> Vec<Ranked<'_>> {
    let mut sorted: Vec<&BenchmarkResult> = results.iter().collect();
    sorted.sort_by(|a, b| a.total.total_cmp(&b.total));

    let Some(fastest) = sorted.first().map(|r| r.total) else {
        return Vec::new();
    };

    sorted
        .into_iter()
        .enumerate()
        .map(|(i, result)| {
            let percent = if i == 0 || result.total <= 0.0 {
                100
            } else {
                (fastest * 100.0 / result.total) as u64
            };
            Ranked { percent, result }
        })
        .collect()
}
