use std::time::Duration;

use fg_common::Shutdown;
use fg_common::catalog::Catalog;
use fg_common::queue::{ProcessingState, Stage, Transition, plan_transition};
use fg_common::store::{KillmailStore, QueueError};
use tracing::{debug, info};

/// Sleep between claims when a stage finds nothing to do.
pub const DEFAULT_IDLE_INTERVAL_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub processed: u64,
    pub fits: u64,
    pub valued: u64,
}

impl WorkerSummary {
    fn record(&mut self, transition: &Transition) {
        self.processed += 1;
        if transition.fit.is_some() {
            self.fits += 1;
        }
        if transition.next == ProcessingState::Valued {
            self.valued += 1;
        }
    }
}

/// Claim and transform a single row. `Ok(None)` when nothing is eligible.
pub async fn process_one<S: KillmailStore>(
    stage: Stage,
    store: &S,
    catalog: &Catalog,
) -> Result<Option<Transition>, QueueError> {
    let transition = store
        .claim_and_apply(stage, |claimed| plan_transition(stage, claimed, catalog))
        .await?;

    if let Some(transition) = &transition {
        debug!(
            stage = stage.as_str(),
            killmail_id = transition.killmail_id,
            fit = transition.fit.is_some(),
            next = transition.next.as_str(),
            "killmail advanced"
        );
    }
    Ok(transition)
}

/// Process rows until none is eligible.
pub async fn drain<S: KillmailStore>(
    stage: Stage,
    store: &S,
    catalog: &Catalog,
) -> Result<WorkerSummary, QueueError> {
    let mut summary = WorkerSummary::default();
    while let Some(transition) = process_one(stage, store, catalog).await? {
        summary.record(&transition);
    }
    Ok(summary)
}

/// Long-running loop for one stage. Sleeps `idle` whenever the queue is empty
/// and stops between iterations once shutdown is requested.
pub async fn run_worker<S: KillmailStore>(
    stage: Stage,
    store: &S,
    catalog: &Catalog,
    idle: Duration,
    shutdown: &Shutdown,
) -> Result<WorkerSummary, QueueError> {
    let mut summary = WorkerSummary::default();

    while !shutdown.is_triggered() {
        match process_one(stage, store, catalog).await? {
            Some(transition) => summary.record(&transition),
            None => {
                if summary.processed > 0 {
                    info!(stage = stage.as_str(), processed = summary.processed, fits = summary.fits, "queue drained");
                }
                if shutdown.sleep_or_shutdown(idle).await {
                    break;
                }
            }
        }
    }

    Ok(summary)
}
