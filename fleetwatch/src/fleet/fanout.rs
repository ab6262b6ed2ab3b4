//! Event fan-out task.
//!
//! Drains the aggregator's delivery queue. Each event is appended to the
//! session log (when enabled) and republished to subscribers. Slow
//! subscribers lag and lose the oldest events; having no subscribers is fine.
//!
//! On cancellation the queue is closed and whatever is already queued is
//! still delivered before the task exits.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::queue::EventQueue;
use super::session_log::SessionLog;
use super::state::FleetEvent;

/// Spawns the delivery task.
pub fn spawn_event_fanout(
    events: Arc<EventQueue>,
    broadcast_tx: broadcast::Sender<FleetEvent>,
    session_log: Option<SessionLog>,
    cancellation: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut fanout = Fanout {
            broadcast_tx,
            session_log,
            delivered: 0,
        };

        loop {
            tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    events.close();
                    while let Some(event) = events.try_recv() {
                        fanout.deliver(event);
                    }
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => fanout.deliver(event),
                    None => break,
                },
            }
        }

        if let Some(log) = fanout.session_log.as_mut() {
            log.close();
        }
        tracing::debug!(delivered = fanout.delivered, "Event fan-out stopped");
    })
}

struct Fanout {
    broadcast_tx: broadcast::Sender<FleetEvent>,
    session_log: Option<SessionLog>,
    delivered: u64,
}

impl Fanout {
    fn deliver(&mut self, event: FleetEvent) {
        if let Some(log) = self.session_log.as_mut() {
            if let Err(e) = log.record(&event) {
                tracing::warn!(error = %e, "Failed to write session log");
            }
        }

        // Err only means nobody is subscribed.
        let _ = self.broadcast_tx.send(event);
        self.delivered += 1;
    }
}
