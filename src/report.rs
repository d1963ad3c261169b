//! Human-readable output: per-case details and the ranked summary.

use crate::runner::TestCase;
use crate::schema::BenchmarkResult;
use crate::stats::rank;

pub fn print_case(case: &TestCase, r: &BenchmarkResult) {
    println!();
    println!("====== {} ======", r.name);
    println!("  binary:      {}", case.binary().display());
    println!("  concurrency: {}", case.concurrency());
    println!("  iterations:  {}", case.iterations());
    println!("  total:       {:.3} s", r.total);
    println!("  minimum:     {:.3} s", r.minimum);
    println!("  maximum:     {:.3} s", r.maximum);
    println!("  average:     {:.3} s", r.average);
    println!("  median:      {:.3} s", r.median);
    println!("  deviation:   {:.3} s", r.deviation);
    if r.failed_commands > 0 {
        println!("  failed fetches (timed anyway): {}", r.failed_commands);
    }
}

/// `<pct>% -> <name>` per result, fastest first.
pub fn summary_lines(results: &[BenchmarkResult]) -> Vec<String> {
    rank(results)
        .iter()
        .map(|entry| format!("{}% -> {}", entry.percent, entry.result.name))
        .collect()
}

pub fn print_summary(results: &[BenchmarkResult]) {
    println!();
    println!("Summary:");
    if results.is_empty() {
        println!("  (no results)");
        return;
    }
    for line in summary_lines(results) {
        println!("{}", line);
    }
}
