//! Best-effort upload of a session's results to a collector.

use std::time::Duration;

use tracing::{info, warn};

use crate::schema::BenchmarkResult;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(30);

/// What happened to a publish attempt. Never an error for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// No endpoint configured.
    Skipped,
    /// The collector answered; non-2xx statuses are informational only.
    Responded { status: u16 },
    /// The request never completed.
    Failed(String),
}

/// POST all results as one JSON array to `endpoint`.
pub fn publish(results: &[BenchmarkResult], endpoint: Option<&str>) -> PublishOutcome {
    let Some(url) = endpoint.map(str::trim).filter(|u| !u.is_empty()) else {
        return PublishOutcome::Skipped;
    };

    let client = match reqwest::blocking::Client::builder()
        .timeout(PUBLISH_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "could not build HTTP client, results not published");
            return PublishOutcome::Failed(e.to_string());
        }
    };

    match client.post(url).json(results).send() {
        Ok(response) => {
            let status = response.status();
            if status.is_success() {
                info!(url, %status, count = results.len(), "results published");
            } else {
                warn!(url, %status, "collector rejected results");
            }
            PublishOutcome::Responded {
                status: status.as_u16(),
            }
        }
        Err(e) => {
            warn!(url, error = %e, "failed to publish results");
            PublishOutcome::Failed(e.to_string())
        }
    }
}
