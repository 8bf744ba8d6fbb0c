//! Follows one of the kernel's append-only logs (administrative events or the
//! data log) at the slower log cadence.

use crate::client::{AuditFeed, EventSource, SourceError};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};
use vitals_core::AuditRecord;

pub struct EventLogFollower<S> {
    source: S,
    feed: AuditFeed,
    seen: HashSet<String>,
}

impl<S: EventSource> EventLogFollower<S> {
    pub fn new(source: S, feed: AuditFeed) -> Self {
        Self {
            source,
            feed,
            seen: HashSet::new(),
        }
    }

    /// Keeps records not reported before, oldest first. Input is newest first.
    pub fn absorb(&mut self, records: Vec<AuditRecord>) -> Vec<AuditRecord> {
        let mut fresh: Vec<AuditRecord> = records
            .into_iter()
            .filter(|record| self.seen.insert(record.id.clone()))
            .collect();
        fresh.reverse();
        fresh
    }

    pub async fn poll_once(&mut self) -> Result<Vec<AuditRecord>, SourceError> {
        let records = self.source.fetch_events(self.feed).await?;
        Ok(self.absorb(records))
    }

    pub async fn run(mut self, period: Duration, out: mpsc::Sender<AuditRecord>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }
            if *shutdown.borrow() {
                break;
            }

            match self.poll_once().await {
                Ok(fresh) => {
                    for record in fresh {
                        if out.send(record).await.is_err() {
                            debug!(feed = ?self.feed, "log consumer gone");
                            return;
                        }
                    }
                }
                // retried on the next tick
                Err(e) => warn!(feed = ?self.feed, "log poll failed: {e}"),
            }
        }
    }
}
