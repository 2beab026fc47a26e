//! Push log heartbeats.

use std::time::Duration;

use tapr_protocol::PushLogEntry;
use tapr_types::Tx;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Start emitting heartbeats for `tx` every `interval`.
///
/// The first entry arrives one interval after the call and carries sequence
/// number 0; each later entry increments it by one. The emitter stops when
/// `cancel` fires or the receiver goes away.
pub fn spawn(tx: Tx, interval: Duration, cancel: CancellationToken) -> mpsc::Receiver<PushLogEntry> {
    let (sender, receiver) = mpsc::channel(1);

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut seq: i64 = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sender.closed() => break,
                _ = ticker.tick() => {}
            }

            trace!(%tx, seq, "push log heartbeat");
            let sent = tokio::select! {
                _ = cancel.cancelled() => false,
                res = sender.send(PushLogEntry { seq }) => res.is_ok(),
            };
            if !sent {
                break;
            }
            seq += 1;
        }
        debug!(%tx, entries = seq, "push log stream ended");
    });

    receiver
}
