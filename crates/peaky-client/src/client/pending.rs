//! Table of calls waiting for their response.
//!
//! Every slot leaves the table exactly once: the reader removes it when the
//! matching response arrives, the caller removes it when its context ends
//! first, and [`PendingTable::fail_all`] removes whatever is left when the
//! connection closes.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use peaky_protocol::{Context, Envelope};

use crate::errors::ClientError;

/// Upper bound on how long a waiting caller goes without re-checking its
/// context.
const CANCEL_POLL: Duration = Duration::from_millis(20);

#[derive(Debug)]
enum Outcome {
    Response(Envelope),
    Closed,
}

/// Rendezvous between the reader thread and one waiting caller.
#[derive(Debug, Default)]
pub(crate) struct Slot {
    outcome: Mutex<Option<Outcome>>,
    ready: Condvar,
}

impl Slot {
    fn complete(&self, outcome: Outcome) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
        self.ready.notify_all();
    }

    /// Blocks until the response arrives, the connection closes, or
    /// `context` finishes.
    pub(crate) fn wait(&self, context: &Context) -> Result<Envelope, ClientError> {
        let mut outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match outcome.take() {
                Some(Outcome::Response(envelope)) => return Ok(envelope),
                Some(Outcome::Closed) => return Err(ClientError::Unavailable),
                None => {}
            }
            context.check()?;
            let pause = context
                .remaining()
                .map_or(CANCEL_POLL, |remaining| remaining.min(CANCEL_POLL));
            outcome = self
                .ready
                .wait_timeout(outcome, pause)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }
}

#[derive(Debug, Default)]
struct Slots {
    waiting: HashMap<u64, Arc<Slot>>,
    closed: bool,
}

/// Calls awaiting a response, keyed by correlation ID.
#[derive(Debug, Default)]
pub(crate) struct PendingTable {
    slots: Mutex<Slots>,
}

impl PendingTable {
    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a slot for `id`.
    pub(crate) fn register(&self, id: u64) -> Result<Arc<Slot>, ClientError> {
        let mut slots = self.lock();
        if slots.closed {
            return Err(ClientError::Unavailable);
        }
        let slot = Arc::new(Slot::default());
        slots.waiting.insert(id, Arc::clone(&slot));
        Ok(slot)
    }

    /// Hands `response` to the call waiting on its ID. Returns `false` when
    /// no call is waiting, as for a duplicate or late response.
    pub(crate) fn resolve(&self, response: Envelope) -> bool {
        let Some(slot) = self.lock().waiting.remove(&response.id) else {
            return false;
        };
        slot.complete(Outcome::Response(response));
        true
    }

    /// Forgets the slot for `id`, returning whether it was still present.
    pub(crate) fn remove(&self, id: u64) -> bool {
        self.lock().waiting.remove(&id).is_some()
    }

    /// Fails every waiting call and refuses new registrations.
    pub(crate) fn fail_all(&self) -> usize {
        let slots: Vec<Arc<Slot>> = {
            let mut state = self.lock();
            state.closed = true;
            state.waiting.drain().map(|(_, slot)| slot).collect()
        };
        let count = slots.len();
        for slot in slots {
            slot.complete(Outcome::Closed);
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().waiting.len()
    }
}
