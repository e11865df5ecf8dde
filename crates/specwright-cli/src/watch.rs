//! Waits for the assistant to write a generate phase's output.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use color_eyre::eyre::{bail, eyre, Result};
use specwright_core::{AgentPhase, FileStorage, ProjectManager};
use tracing::{debug, warn};

pub enum WatchOutcome {
    /// The output appeared and the phase was completed.
    Completed(AgentPhase),
    /// The output changed but the project moved on in the meantime.
    NotSynced(AgentPhase),
    /// Nothing was written before the timeout.
    TimedOut(PathBuf),
}

/// Polls the current phase's output until it is created or modified.
///
/// An output that already exists must change before it counts, so a stale
/// file from an earlier run does not complete the phase.
pub async fn await_output(
    manager: &ProjectManager<FileStorage>,
    id: &str,
    interval: Duration,
    timeout: Duration,
) -> Result<WatchOutcome> {
    if interval.is_zero() {
        bail!("Poll interval must be greater than zero");
    }

    let (phase, path) = manager
        .pending_output(id)?
        .ok_or_else(|| eyre!("Project {id} is not waiting on generated output"))?;

    let baseline = modified_at(&path).await;
    debug!(project = id, %phase, path = %path.display(), "watching for output");

    let changed = async {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let current = modified_at(&path).await;
            if current.is_some() && current != baseline {
                break;
            }
        }
    };

    if tokio::time::timeout(timeout, changed).await.is_err() {
        warn!(project = id, path = %path.display(), "timed out waiting for output");
        return Ok(WatchOutcome::TimedOut(path));
    }

    Ok(match manager.sync_generated_output(id)? {
        Some(completed) => WatchOutcome::Completed(completed),
        None => WatchOutcome::NotSynced(phase),
    })
}

async fn modified_at(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .and_then(|meta| meta.modified().ok())
}
