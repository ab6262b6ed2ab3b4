//! Delivery queue between the aggregator and the fan-out task.
//!
//! Pushing never blocks and never fails. When the queue is full the oldest
//! queued report event is discarded to make room, so the newest state always
//! reaches the fan-out. Inactivity events are never discarded: if nothing
//! but inactivity events is queued the queue grows past its capacity.
//!
//! Single consumer. After [`EventQueue::close`] pushes are ignored and
//! [`EventQueue::recv`] returns the remaining events followed by `None`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::state::{EventKind, FleetEvent};

/// Default number of queued events before the oldest report is dropped.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

#[derive(Default)]
struct QueueState {
    events: VecDeque<FleetEvent>,
    closed: bool,
}

/// Bounded drop-oldest event queue.
pub struct EventQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
}

impl EventQueue {
    /// Create a queue holding up to `capacity` report events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue an event, discarding the oldest report event when full.
    ///
    /// Returns `false` if the queue was closed and the event was ignored.
    pub fn push(&self, event: FleetEvent) -> bool {
        {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }

            if state.events.len() >= self.capacity {
                let oldest_report = state
                    .events
                    .iter()
                    .position(|queued| queued.kind == EventKind::Report);
                if let Some(index) = oldest_report {
                    state.events.remove(index);
                    let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::warn!(dropped, "Event queue full, dropping oldest report event");
                }
            }

            state.events.push_back(event);
        }

        self.notify.notify_one();
        true
    }

    /// Wait for the next event. Returns `None` once closed and drained.
    pub async fn recv(&self) -> Option<FleetEvent> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock();
                if let Some(event) = state.events.pop_front() {
                    return Some(event);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Take the next event without waiting.
    pub fn try_recv(&self) -> Option<FleetEvent> {
        self.state.lock().events.pop_front()
    }

    /// Stop accepting events. Already queued events stay receivable.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Report events discarded to make room for newer ones.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::state::{ReportOrigin, ReportProtocol, Transport, VesselReport};
    use std::sync::Arc;
    use std::time::Duration;

    fn report_event(mmsi: u32) -> FleetEvent {
        let origin = ReportOrigin::new("127.0.0.1:7000".parse().unwrap(), Transport::Tcp);
        let mut report = VesselReport::empty(&origin, ReportProtocol::Nmea);
        report.mmsi = Some(mmsi);
        FleetEvent::report(&report, 1, None)
    }

    fn inactive_event() -> FleetEvent {
        FleetEvent::inactive(None, 1, None)
    }

    #[test]
    fn test_full_queue_drops_oldest_report() {
        let queue = EventQueue::new(2);
        for mmsi in 1..=4 {
            assert!(queue.push(report_event(mmsi)));
        }

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 2);
        assert_eq!(queue.try_recv().unwrap().mmsi, Some(3));
        assert_eq!(queue.try_recv().unwrap().mmsi, Some(4));
        assert!(queue.try_recv().is_none());
    }

    #[test]
    fn test_inactive_event_survives_full_queue() {
        let queue = EventQueue::new(2);
        queue.push(inactive_event());
        queue.push(report_event(1));
        queue.push(report_event(2));

        let first = queue.try_recv().unwrap();
        assert_eq!(first.kind, EventKind::Inactive);
        assert_eq!(queue.try_recv().unwrap().mmsi, Some(2));
        assert_eq!(queue.dropped(), 1);
    }

    #[test]
    fn test_inactive_events_may_exceed_capacity() {
        let queue = EventQueue::new(1);
        queue.push(inactive_event());
        queue.push(inactive_event());

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 0);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let queue = EventQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        queue.push(report_event(1));
        queue.push(report_event(2));
        assert_eq!(queue.try_recv().unwrap().mmsi, Some(2));
    }

    #[test]
    fn test_push_after_close_is_ignored() {
        let queue = EventQueue::new(4);
        queue.push(report_event(1));
        queue.close();

        assert!(!queue.push(report_event(2)));
        assert!(queue.is_closed());
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_recv_waits_for_push() {
        let queue = Arc::new(EventQueue::new(4));
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.recv().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(report_event(9));

        let event = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.unwrap().mmsi, Some(9));
    }

    #[tokio::test]
    async fn test_recv_drains_then_ends_after_close() {
        let queue = EventQueue::new(4);
        queue.push(report_event(1));
        queue.close();

        assert_eq!(queue.recv().await.unwrap().mmsi, Some(1));
        assert!(queue.recv().await.is_none());
    }
}
