//! Result types shared by the harness, the publisher and the collector.
//!
//! A session publishes one JSON array of [`BenchmarkResult`]s. The collector
//! checks each entry against [`ResultRecord`] but stores and serves the
//! [`RawRecord`] it received, so clients that report extra statistics (or
//! older clients using `__name__`) get their records back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Aggregated timings for one test case.
///
/// All times are wall-clock seconds for one full pass over every staged
/// artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Test-case name, unique within a session.
    pub name: String,
    /// Raw per-pass samples in execution order.
    pub result: Vec<f64>,
    pub maximum: f64,
    pub minimum: f64,
    pub total: f64,
    pub average: f64,
    pub median: f64,
    /// Sample standard deviation (N-1); 0.0 for a single pass.
    pub deviation: f64,
    /// Fetch commands that exited non-zero while their time was still counted.
    #[serde(default)]
    pub failed_commands: u32,
}

/// Typed view of one published entry, used to validate submissions.
///
/// Only `name` and `total` are required; other fields are ignored here and
/// kept verbatim in the stored [`RawRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(alias = "__name__")]
    pub name: String,
    pub total: f64,
}

impl ResultRecord {
    pub fn from_raw(raw: &RawRecord) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(raw.clone()))
    }
}

/// A record exactly as the client sent it.
pub type RawRecord = Map<String, Value>;

/// One client submission: the ordered list a session published.
pub type Batch = Vec<RawRecord>;

/// Key under which the summary reports the number of stored batches.
pub const SUMMARY_COUNT_KEY: &str = "results";

/// Running totals over every stored batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of submitted batches.
    pub results: usize,
    /// Cumulative `total` per test-case name. Integer totals stay integers
    /// until a fractional total for the same name is added.
    #[serde(flatten)]
    pub totals: BTreeMap<String, Number>,
}

impl Summary {
    /// Fold every record of every batch into per-name totals.
    pub fn from_batches(batches: &[Batch]) -> Self {
        let mut totals: BTreeMap<String, Number> = BTreeMap::new();
        for (name, total) in batches.iter().flatten().filter_map(name_and_total) {
            let sum = match totals.get(name) {
                Some(acc) => add_numbers(acc, total),
                None => Some(total.clone()),
            };
            if let Some(sum) = sum {
                totals.insert(name.to_string(), sum);
            }
        }
        Self {
            results: batches.len(),
            totals,
        }
    }
}

fn name_and_total(raw: &RawRecord) -> Option<(&str, &Number)> {
    let name = raw
        .get("name")
        .or_else(|| raw.get("__name__"))
        .and_then(Value::as_str)?;
    match raw.get("total")? {
        Value::Number(total) => Some((name, total)),
        _ => None,
    }
}

fn add_numbers(a: &Number, b: &Number) -> Option<Number> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Some(sum.into());
        }
    }
    Number::from_f64(a.as_f64()? + b.as_f64()?)
}
