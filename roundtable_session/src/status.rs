//! Snapshot publication for observers of a session.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use roundtable_core::Message;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::debug;
use uuid::Uuid;

use crate::agent::AgentRuntimeState;

const LIVE_CAPACITY: usize = 256;

/// Immutable picture of a session at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusSnapshot {
    /// Increases by one with every publication.
    pub seq: u64,
    pub running: bool,
    pub topic: Option<String>,
    pub session_id: Option<Uuid>,
    /// Trailing window of history.
    pub messages: Vec<Message>,
    pub agents: BTreeMap<String, AgentRuntimeState>,
    pub rate: f64,
    pub turn_count: u64,
    pub current_speaker: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl StatusSnapshot {
    #[must_use]
    pub fn idle(rate: f64) -> Self {
        Self {
            seq: 0,
            running: false,
            topic: None,
            session_id: None,
            messages: Vec::new(),
            agents: BTreeMap::new(),
            rate,
            turn_count: 0,
            current_speaker: None,
            updated_at: Utc::now(),
        }
    }
}

/// Holds the current snapshot and fans updates out to subscribers.
///
/// Publishing never waits on subscribers: slow ones lag and are re-synced
/// with the current snapshot.
pub struct StatusPublisher {
    current: watch::Sender<Arc<StatusSnapshot>>,
    live: broadcast::Sender<Arc<StatusSnapshot>>,
}

impl StatusPublisher {
    #[must_use]
    pub fn new(initial: StatusSnapshot) -> Self {
        let (current, _) = watch::channel(Arc::new(initial));
        let (live, _) = broadcast::channel(LIVE_CAPACITY);
        Self { current, live }
    }

    /// Replace the current snapshot. `seq` is overwritten with the next
    /// sequence number.
    pub fn publish(&self, snapshot: StatusSnapshot) -> Arc<StatusSnapshot> {
        let mut snapshot = snapshot;
        let mut published = self.current();
        self.current.send_modify(|current| {
            snapshot.seq = current.seq + 1;
            let next = Arc::new(snapshot);
            // No live subscribers is not an error
            let _ = self.live.send(Arc::clone(&next));
            *current = Arc::clone(&next);
            published = next;
        });
        debug!("Published status snapshot {}", published.seq);
        published
    }

    #[must_use]
    pub fn current(&self) -> Arc<StatusSnapshot> {
        Arc::clone(&self.current.borrow())
    }

    /// Stream of snapshots: the current one first, then every later
    /// publication in `seq` order.
    #[must_use]
    pub fn subscribe(&self) -> BoxStream<'static, Arc<StatusSnapshot>> {
        let rx = BroadcastStream::new(self.live.subscribe());
        let watch = self.current.subscribe();
        let first = latest(&watch);
        let floor = first.seq;

        let live = stream::unfold((rx, watch, floor), |(mut rx, watch, mut last)| async move {
            loop {
                let next = match rx.next().await? {
                    Ok(snapshot) => snapshot,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        debug!("Status subscriber lagged by {skipped}, re-syncing");
                        latest(&watch)
                    }
                };
                if next.seq > last {
                    last = next.seq;
                    return Some((next, (rx, watch, last)));
                }
            }
        });

        stream::once(async move { first }).chain(live).boxed()
    }
}

fn latest(watch: &watch::Receiver<Arc<StatusSnapshot>>) -> Arc<StatusSnapshot> {
    Arc::clone(&watch.borrow())
}
