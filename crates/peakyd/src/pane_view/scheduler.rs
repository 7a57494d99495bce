//! Per-connection coalescing scheduler for pane render jobs.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use peaky_protocol::payloads::{PaneViewPriority, PaneViewRequest};
use peaky_protocol::{CancelHandle, Envelope};

use super::STARVATION_WINDOW;

/// One pending render request for a pane.
#[derive(Debug, Clone)]
pub struct PaneViewJob {
    /// Request envelope the response must answer.
    pub envelope: Envelope,
    /// Decoded view request.
    pub request: PaneViewRequest,
    /// Per-pane sequence issued at enqueue time.
    pub seq: u64,
    /// When the pane's pending run started.
    pub received: Instant,
}

impl PaneViewJob {
    /// Pane the job renders.
    #[must_use]
    pub fn pane_id(&self) -> &str {
        &self.request.pane_id
    }

    fn effective_priority(&self, now: Instant) -> u8 {
        let declared = self.request.priority.level();
        match starvation_windows(self.received, now) {
            0 => declared,
            windows => declared
                .saturating_add(u8::try_from(windows).unwrap_or(u8::MAX))
                .min(PaneViewPriority::MAX_LEVEL),
        }
    }

    fn is_starved(&self, now: Instant) -> bool {
        starvation_windows(self.received, now) > 0
    }

    const fn deadline_key(&self) -> i64 {
        if self.request.deadline_unix_nano <= 0 {
            i64::MAX
        } else {
            self.request.deadline_unix_nano
        }
    }

    /// Scheduling order: starved jobs first, then effective priority, then
    /// the earlier deadline, then the older receipt.
    fn rank(&self, other: &Self, now: Instant) -> Ordering {
        self.is_starved(now)
            .cmp(&other.is_starved(now))
            .then_with(|| {
                self.effective_priority(now)
                    .cmp(&other.effective_priority(now))
            })
            .then_with(|| other.deadline_key().cmp(&self.deadline_key()))
            .then_with(|| other.received.cmp(&self.received))
    }
}

fn starvation_windows(received: Instant, now: Instant) -> u128 {
    let age = now.saturating_duration_since(received);
    age.as_millis()
        .checked_div(STARVATION_WINDOW.as_millis())
        .unwrap_or(0)
}

#[derive(Debug, Default)]
struct SchedulerState {
    pending: HashMap<String, PaneViewJob>,
    in_flight: HashSet<String>,
    seq: HashMap<String, u64>,
    cancels: HashMap<String, CancelHandle>,
    closed: bool,
}

impl SchedulerState {
    fn pick(&self, now: Instant) -> Option<String> {
        self.pending
            .iter()
            .filter(|(pane, _)| !self.in_flight.contains(*pane))
            .max_by(|(_, left), (_, right)| left.rank(right, now))
            .map(|(pane, _)| pane.clone())
    }

    fn claim(&mut self, now: Instant) -> Option<PaneViewJob> {
        let pane = self.pick(now)?;
        let job = self.pending.remove(&pane)?;
        self.in_flight.insert(pane);
        Some(job)
    }
}

/// Coalesces render requests per pane and hands them to workers.
///
/// Each pane has at most one pending job and at most one job in flight.
/// Enqueuing for a pane replaces its pending job and cancels its in-flight
/// render, so only the newest request is ever rendered to completion.
#[derive(Debug, Default)]
pub struct PaneViewScheduler {
    state: Mutex<SchedulerState>,
    ready: Condvar,
}

impl PaneViewScheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a render of `request.pane_id`, returning the job's sequence.
    ///
    /// A pending, not yet started job for the pane is replaced but keeps
    /// its receipt time. A render already in flight for the pane is
    /// cancelled before this returns.
    pub fn enqueue(&self, envelope: Envelope, request: PaneViewRequest) -> u64 {
        self.enqueue_at(envelope, request, Instant::now())
    }

    pub(crate) fn enqueue_at(
        &self,
        envelope: Envelope,
        request: PaneViewRequest,
        now: Instant,
    ) -> u64 {
        let pane = request.pane_id.clone();
        let (seq, cancel) = {
            let mut state = self.lock();
            let received = match state.pending.get(&pane) {
                Some(existing) if !state.in_flight.contains(&pane) => existing.received,
                _ => now,
            };
            let seq = state.seq.get(&pane).copied().unwrap_or(0) + 1;
            state.seq.insert(pane.clone(), seq);
            state.pending.insert(
                pane.clone(),
                PaneViewJob {
                    envelope,
                    request,
                    seq,
                    received,
                },
            );
            let cancel = state.cancels.remove(&pane);
            (seq, cancel)
        };
        self.ready.notify_one();
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        seq
    }

    /// Blocks until a job is eligible and claims it, or returns `None` once
    /// the scheduler is closed.
    pub fn next(&self) -> Option<PaneViewJob> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(job) = state.claim(Instant::now()) {
                return Some(job);
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`PaneViewScheduler::next`] but gives up after `timeout`.
    pub fn next_timeout(&self, timeout: Duration) -> Option<PaneViewJob> {
        let deadline = Instant::now().checked_add(timeout)?;
        let mut state = self.lock();
        loop {
            if state.closed {
                return None;
            }
            let now = Instant::now();
            if let Some(job) = state.claim(now) {
                return Some(job);
            }
            let remaining = deadline.checked_duration_since(now)?;
            state = self
                .ready
                .wait_timeout(state, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    /// Claims the best eligible job as ranked at `now` without blocking.
    pub(crate) fn try_next_at(&self, now: Instant) -> Option<PaneViewJob> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }
        state.claim(now)
    }

    /// Releases the pane after its render completed.
    pub fn finish(&self, pane_id: &str) {
        {
            let mut state = self.lock();
            state.in_flight.remove(pane_id);
            state.cancels.remove(pane_id);
        }
        self.ready.notify_one();
    }

    /// Registers the handle that cancels the claimed job's render.
    ///
    /// The handle fires at once when the scheduler is closed or when a newer
    /// request for the pane arrived after `job` was claimed.
    pub fn set_cancel(&self, job: &PaneViewJob, cancel: CancelHandle) {
        let mut state = self.lock();
        let latest = state.seq.get(job.pane_id()).copied().unwrap_or(0) == job.seq;
        if state.closed || !latest {
            drop(state);
            cancel.cancel();
            return;
        }
        state.cancels.insert(job.pane_id().to_owned(), cancel);
    }

    /// Forgets the pane's cancellation handle.
    pub fn clear_cancel(&self, pane_id: &str) {
        self.lock().cancels.remove(pane_id);
    }

    /// Returns `true` when `seq` is the newest sequence issued for the pane.
    #[must_use]
    pub fn is_latest(&self, pane_id: &str, seq: u64) -> bool {
        self.lock().seq.get(pane_id).copied().unwrap_or(0) == seq
    }

    /// Number of panes currently being rendered.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Number of jobs waiting for a worker.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Closes the scheduler: cancels every running render and wakes every
    /// waiting worker. Idempotent.
    pub fn close(&self) {
        let cancels: Vec<CancelHandle> = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.pending.clear();
            state.cancels.drain().map(|(_, cancel)| cancel).collect()
        };
        for cancel in cancels {
            cancel.cancel();
        }
        self.ready.notify_all();
    }

    /// Returns `true` once [`PaneViewScheduler::close`] ran.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
