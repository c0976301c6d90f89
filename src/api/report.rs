//! Best-effort image delivery telemetry.
//!
//! The MangaDex@Home network asks clients to report how image fetches went.
//! Reports are queued on an unbounded channel and drained by one background
//! task; submission never blocks the caller and failures are only logged.
//! The task stops when the owning client is dropped and the channel closes.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::client::transport::Transport;

/// One image delivery observation.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Full URL of the fetched image
    pub url: String,
    /// Whether the fetch succeeded
    pub success: bool,
    /// Whether the response was served from cache
    pub cached: bool,
    /// Bytes received
    pub bytes: u64,
    /// Wall time of the fetch in milliseconds
    pub duration: u64,
}

/// Handle to the report drain task.
#[derive(Clone)]
pub(crate) struct Reporter {
    tx: mpsc::UnboundedSender<Report>,
}

impl Reporter {
    /// Spawn the drain task. Must run inside a Tokio runtime.
    pub(crate) fn spawn(transport: Transport, report_url: String) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Report>();

        tokio::spawn(async move {
            while let Some(report) = rx.recv().await {
                let outcome = transport
                    .execute(transport.http().post(&report_url).json(&report))
                    .await;
                match outcome {
                    Ok(response) if response.status().is_success() => {
                        debug!(url = %report.url, "delivery report accepted");
                    }
                    Ok(response) => {
                        debug!(
                            url = %report.url,
                            status = response.status().as_u16(),
                            "delivery report rejected"
                        );
                    }
                    Err(err) => {
                        debug!(url = %report.url, error = %err, "delivery report failed");
                    }
                }
            }
            debug!("report queue closed, drain task stopping");
        });

        Self { tx }
    }

    /// Enqueue a report. Dropped silently if the drain task is gone.
    pub(crate) fn submit(&self, report: Report) {
        let _ = self.tx.send(report);
    }
}
