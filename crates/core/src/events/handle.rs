use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::BookingEvent;

/// Envelope wrapping a booking event with the time it was emitted.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: BookingEvent,
}

/// Handle for publishing booking events.
///
/// Cheaply cloneable. Emitting never blocks a run: when the buffer is full
/// or the consumer is gone the event is dropped and a warning is logged.
#[derive(Clone)]
pub struct EventHandle {
    tx: mpsc::Sender<EventEnvelope>,
}

impl EventHandle {
    pub fn new(tx: mpsc::Sender<EventEnvelope>) -> Self {
        Self { tx }
    }

    /// A handle whose events go nowhere. Useful where nobody listens.
    pub fn disconnected() -> Self {
        let (tx, _) = mpsc::channel(1);
        Self { tx }
    }

    /// Publish an event. Returns true if it was buffered.
    pub fn emit(&self, event: BookingEvent) -> bool {
        let envelope = EventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(envelope)) => {
                tracing::warn!(
                    "Event buffer full, dropping {} event",
                    envelope.event.event_type()
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::trace!("Event consumer gone, event dropped");
                false
            }
        }
    }
}

/// Create an event bus.
///
/// Returns the handle (clone it into every run) and the receiver the host
/// drains, e.g. to forward events to WebSocket clients.
pub fn create_event_bus(buffer_size: usize) -> (EventHandle, mpsc::Receiver<EventEnvelope>) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (EventHandle::new(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::JobStatus;

    fn job_event(id: &str) -> BookingEvent {
        BookingEvent::JobUpdated {
            job_id: id.to_string(),
            status: JobStatus::Scheduled,
        }
    }

    #[test]
    fn test_emit_event() {
        let (handle, mut rx) = create_event_bus(10);
        assert!(handle.emit(job_event("a")));

        let envelope = rx.try_recv().expect("Should receive event");
        assert_eq!(envelope.event, job_event("a"));
    }

    #[test]
    fn test_multiple_handles_same_channel() {
        let (handle1, mut rx) = create_event_bus(10);
        let handle2 = handle1.clone();

        handle1.emit(job_event("first"));
        handle2.emit(job_event("second"));

        assert_eq!(rx.try_recv().unwrap().event, job_event("first"));
        assert_eq!(rx.try_recv().unwrap().event, job_event("second"));
    }

    #[test]
    fn test_full_channel_drops_without_blocking() {
        let (handle, _rx) = create_event_bus(1);
        assert!(handle.emit(job_event("a")));
        assert!(!handle.emit(job_event("b")));
    }

    #[test]
    fn test_closed_channel() {
        let (handle, rx) = create_event_bus(10);
        drop(rx);
        assert!(!handle.emit(job_event("a")));
        assert!(!EventHandle::disconnected().emit(job_event("b")));
    }

    #[test]
    fn test_envelope_has_timestamp() {
        let (handle, mut rx) = create_event_bus(10);
        let before = Utc::now();
        handle.emit(job_event("a"));
        let after = Utc::now();

        let envelope = rx.try_recv().unwrap();
        assert!(envelope.timestamp >= before);
        assert!(envelope.timestamp <= after);
    }
}
