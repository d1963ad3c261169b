//! Benchmark comparison tool.
//!
//! Compares two published batches (e.g. saved entries of `GET /results`) and
//! prints a table of total-time deltas per test case.
//!
//! Usage: `cargo run --bin bench-compare -- <baseline.json> <candidate.json>`

use fetch_benchmarks::collector::parse_batch;
use fetch_benchmarks::schema::ResultRecord;
use std::collections::HashMap;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <baseline.json> <candidate.json>", args[0]);
        std::process::exit(1);
    }

    let baseline = load_batch(&args[1]);
    let candidate = load_batch(&args[2]);

    let base_map: HashMap<&str, &ResultRecord> =
        baseline.iter().map(|r| (r.name.as_str(), r)).collect();
    let cand_map: HashMap<&str, &ResultRecord> =
        candidate.iter().map(|r| (r.name.as_str(), r)).collect();

    eprintln!("Baseline: {}", args[1]);
    eprintln!("Candidate: {}", args[2]);
    eprintln!();

    println!(
        "{:<32} | {:>12} | {:>12} | {:>12}",
        "Test case", "Base total", "New total", "Delta"
    );
    println!("{}", "-".repeat(76));

    let mut matched = 0u32;
    let mut only_cand = 0u32;

    for cand in &candidate {
        if let Some(base) = base_map.get(cand.name.as_str()) {
            matched += 1;
            print_comparison(&cand.name, base.total, cand.total);
        } else {
            only_cand += 1;
        }
    }

    let only_base = baseline
        .iter()
        .filter(|b| !cand_map.contains_key(b.name.as_str()))
        .count();

    println!("{}", "-".repeat(76));
    println!(
        "Compared: {} | Baseline only: {} | Candidate only: {}",
        matched, only_base, only_cand
    );
}

fn load_batch(path: &str) -> Vec<ResultRecord> {
    let contents = std::fs::read(path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {}", path, e);
        std::process::exit(1);
    });
    let batch = parse_batch(&contents).unwrap_or_else(|e| {
        eprintln!("Error parsing {}: {:?}", path, e);
        std::process::exit(1);
    });
    batch
        .iter()
        .filter_map(|raw| ResultRecord::from_raw(raw).ok())
        .collect()
}

fn print_comparison(name: &str, base: f64, cand: f64) {
    // Lower total is better.
    let delta_pct = if base > 0.0 {
        ((cand - base) / base) * 100.0
    } else {
        0.0
    };

    let hint = if delta_pct < -1.0 {
        "faster"
    } else if delta_pct > 1.0 {
        "slower"
    } else {
        "~same"
    };

    println!(
        "{:<32} | {:>10.3} s | {:>10.3} s | {:>+.1}% ({})",
        name, base, cand, delta_pct, hint,
    );
}
