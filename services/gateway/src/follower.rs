//! Chain follower
//!
//! Polls the provider for events after the indexer cursor and feeds them to
//! the journaled indexer one at a time. The follower is the indexer's only
//! writer. A failed poll is logged and retried on the next tick; a failed
//! ingest stops the batch so the event is fetched again from the unchanged
//! cursor.

use crate::provider::LedgerProvider;
use crate::state::AppState;
use indexer::{IngestOutcome, LedgerEvent};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use types::errors::Classify;

/// Outcome counts of one poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub applied: usize,
    pub skipped: usize,
    pub rollbacks: usize,
}

/// Fetch and ingest one batch
pub async fn poll_once(state: &AppState, provider: &dyn LedgerProvider) -> anyhow::Result<PollSummary> {
    let cursor = state.indexer.read().await.indexer().cursor();
    let events = provider.events_after(cursor).await?;
    let mut summary = PollSummary::default();
    if events.is_empty() {
        return Ok(summary);
    }

    let mut indexer = state.indexer.write().await;
    for event in &events {
        match indexer.ingest(event)? {
            IngestOutcome::Applied { entries, registered } => {
                summary.applied += 1;
                debug!(slot = event.slot(), entries, registered = registered.len(), "Event applied");
            }
            IngestOutcome::Duplicate | IngestOutcome::Ignored => summary.skipped += 1,
            IngestOutcome::RolledBack(_) => {
                summary.rollbacks += 1;
                if let LedgerEvent::RolledBack { slot } = event {
                    warn!(slot, "Chain rolled back");
                }
            }
        }
    }
    Ok(summary)
}

/// Poll until `shutdown` flips to true
pub async fn run(state: AppState, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    info!(interval_ms = interval.as_millis() as u64, "Chain follower started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        match poll_once(&state, state.provider.as_ref()).await {
            Ok(summary) if summary.applied > 0 || summary.rollbacks > 0 => {
                info!(
                    applied = summary.applied,
                    skipped = summary.skipped,
                    rollbacks = summary.rollbacks,
                    "Follower batch ingested"
                );
            }
            Ok(_) => {}
            Err(e) => match e.downcast_ref::<crate::provider::ProviderError>() {
                Some(p) if p.class().is_retryable() => warn!(error = %p, "Provider unavailable"),
                _ => error!(error = %e, "Follower batch failed"),
            },
        }
    }
    if let Err(e) = state.indexer.write().await.snapshot() {
        error!(error = %e, "Final snapshot failed");
    }
    info!("Chain follower stopped");
}
