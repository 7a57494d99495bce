//! Local event queue between the reader and the delivery thread.
//!
//! The reader pushes decoded events into a deduplicating [`EventQueue`]; the
//! delivery thread pops them and hands them to the public stream one at a
//! time. While the consumer is busy, repeated events for the same subject
//! collapse into the newest one instead of piling up.

use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use peaky_protocol::{Event, EventQueue, PushOutcome};
use tracing::trace;

use super::CLIENT_TARGET;

/// Distinct event subjects buffered before new subjects are dropped.
pub(crate) const EVENT_QUEUE_CAPACITY: usize = 128;

/// How long the delivery thread waits for a consumer before rechecking close.
const HANDOFF_POLL: Duration = Duration::from_millis(10);

#[derive(Debug)]
struct PumpState {
    queue: EventQueue,
    closed: bool,
}

#[derive(Debug)]
pub(crate) struct EventPump {
    state: Mutex<PumpState>,
    ready: Condvar,
}

impl Default for EventPump {
    fn default() -> Self {
        Self {
            state: Mutex::new(PumpState {
                queue: EventQueue::with_capacity(EVENT_QUEUE_CAPACITY),
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }
}

impl EventPump {
    fn lock(&self) -> MutexGuard<'_, PumpState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, event: Event) -> PushOutcome {
        let outcome = {
            let mut state = self.lock();
            if state.closed {
                return PushOutcome::Dropped;
            }
            state.queue.push(event)
        };
        if outcome == PushOutcome::Queued {
            self.ready.notify_one();
        }
        outcome
    }

    /// Blocks until an event is queued; `None` once the pump is closed.
    pub(crate) fn next(&self) -> Option<Event> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(event) = state.queue.pop() {
                return Some(event);
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Waits up to `timeout` for the pump to close; `true` once it has.
    fn wait_closed(&self, timeout: Duration) -> bool {
        let state = self.lock();
        if state.closed {
            return true;
        }
        let (state, _) = self
            .ready
            .wait_timeout(state, timeout)
            .unwrap_or_else(PoisonError::into_inner);
        state.closed
    }

    pub(crate) fn close(&self) {
        {
            let mut state = self.lock();
            state.closed = true;
            state.queue.clear();
        }
        self.ready.notify_all();
    }
}

/// Drains `pump` into the public stream until the pump closes or the
/// stream's receiver is dropped.
///
/// An event is only handed over while the pump is open, so nothing reaches
/// the consumer once the client has closed.
pub(crate) fn deliver(pump: &EventPump, stream: &SyncSender<Event>) {
    while let Some(mut event) = pump.next() {
        loop {
            match stream.try_send(event) {
                Ok(()) => break,
                Err(TrySendError::Full(unsent)) => {
                    if pump.wait_closed(HANDOFF_POLL) {
                        trace!(target: CLIENT_TARGET, "dropping undelivered event on close");
                        return;
                    }
                    event = unsent;
                }
                Err(TrySendError::Disconnected(_)) => {
                    trace!(target: CLIENT_TARGET, "event receiver dropped");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;

    use peaky_protocol::EventType;
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn pump() -> EventPump {
        EventPump::default()
    }

    fn focus(pane: &str, detail: &str) -> Event {
        Event::new(EventType::FocusChanged, 1)
            .with_pane(pane)
            .with_detail(detail)
    }

    #[rstest]
    fn repeated_subjects_collapse_into_the_newest(pump: EventPump) {
        assert_eq!(pump.push(focus("p1", "first")), PushOutcome::Queued);
        assert_eq!(pump.push(focus("p1", "second")), PushOutcome::Replaced);
        let event = pump.next().expect("event");
        assert_eq!(event.detail, "second");
        pump.close();
        assert!(pump.next().is_none());
    }

    #[rstest]
    fn distinct_subjects_keep_their_order(pump: EventPump) {
        pump.push(focus("p1", "a"));
        pump.push(focus("p2", "b"));
        let panes: Vec<_> = [pump.next(), pump.next()]
            .into_iter()
            .flatten()
            .map(|event| event.pane_id)
            .collect();
        assert_eq!(panes, vec!["p1", "p2"]);
    }

    #[rstest]
    fn closed_pumps_drop_events(pump: EventPump) {
        pump.close();
        assert_eq!(pump.push(focus("p1", "late")), PushOutcome::Dropped);
    }

    #[rstest]
    fn delivery_stops_when_the_pump_closes() {
        let pump = Arc::new(EventPump::default());
        let (sender, receiver) = mpsc::sync_channel(0);
        let worker = {
            let pump = Arc::clone(&pump);
            thread::spawn(move || deliver(&pump, &sender))
        };
        pump.push(focus("p1", "hello"));
        let event = receiver.recv().expect("delivered event");
        assert_eq!(event.detail, "hello");
        pump.close();
        worker.join().expect("join delivery");
        assert!(receiver.recv().is_err());
    }

    #[rstest]
    fn undelivered_events_are_dropped_on_close() {
        let pump = Arc::new(EventPump::default());
        let (sender, receiver) = mpsc::sync_channel(0);
        pump.push(focus("p1", "stale"));
        let worker = {
            let pump = Arc::clone(&pump);
            thread::spawn(move || deliver(&pump, &sender))
        };
        thread::sleep(HANDOFF_POLL * 3);
        pump.close();
        worker.join().expect("join delivery");
        assert_eq!(receiver.try_recv(), Err(mpsc::TryRecvError::Disconnected));
    }
}
