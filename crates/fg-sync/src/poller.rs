use fg_common::Shutdown;
use fg_common::killmail::FeedPackage;
use fg_common::store::{KillmailStore, NewKillmail};
use tracing::{debug, info, warn};

use crate::feed::{FeedError, FeedSource};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub received: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub failed: u64,
}

/// Raw rows for one feed package: the killmail and valuation sub-documents
/// are stored re-serialized, along with the valuation hash.
pub fn package_rows(package: &FeedPackage) -> Result<(NewKillmail, String), serde_json::Error> {
    let row = NewKillmail {
        id: package.kill_id,
        raw_killmail: serde_json::to_value(&package.killmail)?,
        raw_valuation: Some(serde_json::to_value(&package.zkb)?),
    };
    Ok((row, package.zkb.hash.clone()))
}

/// Pull packages until the feed is drained, errors, or shutdown is requested.
/// Insert failures are logged and skipped; feed errors end the run.
pub async fn run_poller<F, S>(feed: &F, store: &S, shutdown: &Shutdown) -> Result<PollSummary, FeedError>
where
    F: FeedSource,
    S: KillmailStore,
{
    let mut summary = PollSummary::default();

    while !shutdown.is_triggered() {
        let Some(package) = feed.next_package().await? else {
            debug!(received = summary.received, "feed drained");
            break;
        };
        summary.received += 1;

        let (row, hash) = match package_rows(&package) {
            Ok(rows) => rows,
            Err(err) => {
                summary.failed += 1;
                warn!(killmail_id = package.kill_id, error = %err, "cannot serialize feed package");
                continue;
            }
        };

        match store.insert_feed_delivery(&row, &hash).await {
            Ok(outcome) if outcome.is_duplicate() => {
                summary.duplicates += 1;
                debug!(killmail_id = row.id, "duplicate delivery");
            }
            Ok(_) => {
                summary.inserted += 1;
                info!(killmail_id = row.id, "killmail received");
            }
            Err(err) => {
                summary.failed += 1;
                warn!(killmail_id = row.id, error = %err, "failed to store feed package");
            }
        }
    }

    Ok(summary)
}
