// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Discovered-Token Writer
//!
//! Background task that records tokens the holdings pipeline resolved but
//! that are not yet in the token registry. Admins review the resulting
//! queue via `GET /api/admin/tokens/discovered`.
//!
//! ## Strategy
//!
//! Request handlers hand sightings to a [`DiscoverySink`], which pushes them
//! onto a bounded channel without waiting. The [`DiscoveryWriter`] drains
//! the channel and upserts each sighting into redb. Upserts are idempotent
//! and commutative, so ordering between requests does not matter.
//!
//! A full channel, a stopped writer or a failed write is logged and never
//! affects the response being built.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`. On cancellation the writer
//! drains what is already queued, then exits.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::storage::{DiscoveredToken, HoldingsDb};

/// Default capacity of the sighting channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Non-blocking handle used by the pipeline to report sightings.
#[derive(Clone)]
pub struct DiscoverySink {
    tx: mpsc::Sender<DiscoveredToken>,
}

impl DiscoverySink {
    /// Queue a sighting. Never waits; drops and logs when the queue is full.
    pub fn record(&self, sighting: DiscoveredToken) {
        match self.tx.try_send(sighting) {
            Ok(()) => {}
            Err(TrySendError::Full(s)) => {
                warn!(token = %s.address, "Discovered-token queue full, dropping sighting");
            }
            Err(TrySendError::Closed(s)) => {
                warn!(token = %s.address, "Discovered-token writer stopped, dropping sighting");
            }
        }
    }
}

/// Background writer that persists sightings.
pub struct DiscoveryWriter {
    db: Arc<HoldingsDb>,
    rx: mpsc::Receiver<DiscoveredToken>,
}

/// Create a connected sink/writer pair.
pub fn channel(db: Arc<HoldingsDb>, capacity: usize) -> (DiscoverySink, DiscoveryWriter) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (DiscoverySink { tx }, DiscoveryWriter { db, rx })
}

impl DiscoveryWriter {
    /// Run the writer loop until the cancellation token is triggered or
    /// every sink has been dropped.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(writer.run(shutdown.clone()));
    /// ```
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Discovered-token writer starting");

        loop {
            tokio::select! {
                received = self.rx.recv() => match received {
                    Some(sighting) => self.write(&sighting),
                    None => {
                        info!("Discovered-token writer: all senders dropped, exiting");
                        return;
                    }
                },
                _ = shutdown.cancelled() => {
                    self.drain();
                    info!("Discovered-token writer shutting down");
                    return;
                }
            }
        }
    }

    /// Persist everything already queued.
    fn drain(&mut self) {
        while let Ok(sighting) = self.rx.try_recv() {
            self.write(&sighting);
        }
    }

    fn write(&self, sighting: &DiscoveredToken) {
        match self.db.upsert_discovered(sighting) {
            Ok(()) => debug!(
                token = %sighting.address,
                symbol = %sighting.symbol,
                "Recorded discovered token"
            ),
            Err(e) => warn!(
                token = %sighting.address,
                error = %e,
                "Failed to record discovered token"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sighting(address: &str) -> DiscoveredToken {
        let now = Utc::now();
        DiscoveredToken {
            address: address.to_string(),
            symbol: "NEW".to_string(),
            name: "New".to_string(),
            decimals: 18,
            first_seen_wallet: "0x01".to_string(),
            first_seen_at: now,
            last_seen_at: now,
            seen_count: 1,
        }
    }

    fn temp_db() -> (Arc<HoldingsDb>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = HoldingsDb::open(&dir.path().join("test.redb")).unwrap();
        (Arc::new(db), dir)
    }

    #[tokio::test]
    async fn writer_persists_and_exits_when_senders_drop() {
        let (db, _dir) = temp_db();
        let (sink, writer) = channel(db.clone(), 8);

        sink.record(sighting("0xaa"));
        sink.record(sighting("0xaa"));
        sink.record(sighting("0xbb"));
        drop(sink);

        writer.run(CancellationToken::new()).await;

        let queued = db.list_discovered().unwrap();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].address, "0xaa");
        assert_eq!(queued[0].seen_count, 2);
    }

    #[tokio::test]
    async fn cancellation_drains_queue() {
        let (db, _dir) = temp_db();
        let (sink, writer) = channel(db.clone(), 8);
        sink.record(sighting("0xcc"));

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        writer.run(shutdown).await;

        assert!(db.get_discovered("0xcc").unwrap().is_some());
        drop(sink);
    }

    #[tokio::test]
    async fn full_or_closed_queue_does_not_block() {
        let (db, _dir) = temp_db();
        let (sink, writer) = channel(db, 1);
        sink.record(sighting("0x01"));
        // Queue is full; this returns immediately
        sink.record(sighting("0x02"));

        drop(writer);
        sink.record(sighting("0x03"));
    }
}
