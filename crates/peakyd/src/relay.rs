//! Output relays: forward one pane's output into other panes' input.
//!
//! Each relay runs on its own thread, following the source pane's output
//! sequence and writing every new line to the targets. A relay ends when it
//! is stopped, when the source or a target disappears, or when the session
//! manager closes; it removes itself from the registry on the way out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use peaky_protocol::Context;
use peaky_protocol::payloads::{RelayConfig, RelayInfo, RelayMode, RelayStatus};
use thiserror::Error;
use tracing::{debug, warn};

use crate::eventlog::now_unix_ms;
use crate::manager::{ManagerError, SessionManager};

const RELAY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::relay");

/// Errors raised by relay management.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// The configuration named no source pane.
    #[error("relay source is required")]
    MissingSource,
    /// The configuration resolved to no target panes.
    #[error("relay targets are required")]
    MissingTargets,
    /// A stop request named no relay.
    #[error("relay id is required")]
    MissingId,
    /// No running relay has the identifier.
    #[error("relay \"{id}\" not found")]
    NotFound {
        /// Requested relay.
        id: String,
    },
    /// The relay thread could not be started.
    #[error("failed to start relay: {message}")]
    Spawn {
        /// Operating system reason.
        message: String,
    },
}

struct Relay {
    info: RelayInfo,
    context: Context,
    worker: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Relays {
    running: HashMap<String, Relay>,
    order: Vec<String>,
}

impl Relays {
    fn remove(&mut self, id: &str) -> Option<Relay> {
        let relay = self.running.remove(id)?;
        self.order.retain(|known| known != id);
        Some(relay)
    }
}

/// Running relays of one daemon.
#[derive(Default)]
pub struct RelayRegistry {
    relays: Arc<Mutex<Relays>>,
    next_id: AtomicU64,
}

fn lock(relays: &Mutex<Relays>) -> MutexGuard<'_, Relays> {
    relays.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RelayRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a relay from `config`, whose targets must already be resolved.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::MissingSource`] or [`RelayError::MissingTargets`]
    /// for an incomplete configuration and [`RelayError::Spawn`] when the
    /// relay thread cannot start.
    pub fn create(
        &self,
        manager: Arc<dyn SessionManager>,
        config: &RelayConfig,
    ) -> Result<RelayInfo, RelayError> {
        let from = config.from_pane_id.trim();
        if from.is_empty() {
            return Err(RelayError::MissingSource);
        }
        let targets: Vec<String> = config
            .to_pane_ids
            .iter()
            .map(|target| target.trim())
            .filter(|target| !target.is_empty() && *target != from)
            .map(str::to_owned)
            .collect();
        if targets.is_empty() {
            return Err(RelayError::MissingTargets);
        }
        let id = format!("relay-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let info = RelayInfo {
            id: id.clone(),
            from_pane_id: from.to_owned(),
            to_pane_ids: targets,
            mode: config.mode,
            status: RelayStatus::Running,
            created_at_unix_ms: now_unix_ms(),
        };
        let context = Context::background();

        let mut relays = lock(&self.relays);
        let worker = {
            let info = info.clone();
            let context = context.clone();
            let registry = Arc::clone(&self.relays);
            thread::Builder::new()
                .name(format!("peakyd-{id}"))
                .spawn(move || {
                    forward(manager.as_ref(), &context, &info);
                    lock(&registry).remove(&info.id);
                    debug!(target: RELAY_TARGET, relay = %info.id, "relay ended");
                })
                .map_err(|error| RelayError::Spawn {
                    message: error.to_string(),
                })?
        };
        relays.order.push(id.clone());
        relays.running.insert(
            id,
            Relay {
                info: info.clone(),
                context,
                worker: Some(worker),
            },
        );
        Ok(info)
    }

    /// Running relays in creation order.
    #[must_use]
    pub fn list(&self) -> Vec<RelayInfo> {
        let relays = lock(&self.relays);
        relays
            .order
            .iter()
            .filter_map(|id| relays.running.get(id))
            .map(|relay| relay.info.clone())
            .collect()
    }

    /// Stops and removes the relay named `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::MissingId`] for a blank identifier and
    /// [`RelayError::NotFound`] when no such relay is running.
    pub fn stop(&self, id: &str) -> Result<RelayInfo, RelayError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(RelayError::MissingId);
        }
        let relay = lock(&self.relays)
            .remove(id)
            .ok_or_else(|| RelayError::NotFound { id: id.to_owned() })?;
        Ok(halt(relay))
    }

    /// Stops every relay, returning how many were running.
    pub fn stop_all(&self) -> usize {
        let stopped: Vec<Relay> = {
            let mut relays = lock(&self.relays);
            relays.order.clear();
            relays.running.drain().map(|(_, relay)| relay).collect()
        };
        let count = stopped.len();
        for relay in stopped {
            halt(relay);
        }
        count
    }

    /// Number of running relays.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.relays).running.len()
    }

    /// Returns `true` when no relay is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn halt(mut relay: Relay) -> RelayInfo {
    relay.context.cancel();
    if let Some(worker) = relay.worker.take()
        && worker.join().is_err()
    {
        warn!(target: RELAY_TARGET, relay = %relay.info.id, "relay thread panicked");
    }
    relay.info.status = RelayStatus::Stopped;
    relay.info
}

fn forward(manager: &dyn SessionManager, context: &Context, info: &RelayInfo) {
    if let Err(error) = run(manager, context, info) {
        debug!(target: RELAY_TARGET, relay = %info.id, %error, "relay failed");
    }
}

fn run(manager: &dyn SessionManager, context: &Context, info: &RelayInfo) -> Result<(), ManagerError> {
    let mut seq = manager.output_since(&info.from_pane_id, 0)?.next_seq;
    while !context.is_done() {
        let batch = manager.output_since(&info.from_pane_id, seq)?;
        if batch.lines.is_empty() {
            if !manager.wait_for_output(context, &info.from_pane_id) {
                return Ok(());
            }
            continue;
        }
        for line in &batch.lines {
            if context.is_done() {
                return Ok(());
            }
            let payload = match info.mode {
                RelayMode::Line => format!("{}\n", line.text),
                RelayMode::Raw => line.text.clone(),
            };
            for target in &info.to_pane_ids {
                manager.send_input(target, payload.as_bytes())?;
            }
        }
        seq = batch.next_seq;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use rstest::{fixture, rstest};

    use super::*;
    use crate::manager::MemoryManager;
    use peaky_protocol::payloads::StartSessionRequest;

    #[fixture]
    fn manager() -> Arc<MemoryManager> {
        let manager = Arc::new(MemoryManager::new());
        for name in ["alpha", "beta"] {
            manager
                .start_session(&StartSessionRequest {
                    name: name.to_owned(),
                    ..StartSessionRequest::default()
                })
                .expect("start session");
        }
        manager
    }

    fn pane_of(manager: &MemoryManager, session: &str) -> String {
        manager
            .snapshot(0)
            .into_iter()
            .find(|snapshot| snapshot.name == session)
            .and_then(|snapshot| snapshot.panes.into_iter().next())
            .map(|pane| pane.id)
            .expect("pane")
    }

    fn config(from: &str, to: &[&str]) -> RelayConfig {
        RelayConfig {
            from_pane_id: from.to_owned(),
            to_pane_ids: to.iter().map(|target| (*target).to_owned()).collect(),
            ..RelayConfig::default()
        }
    }

    #[rstest]
    #[case(config("", &["p-2"]), RelayError::MissingSource)]
    #[case(config("p-1", &[]), RelayError::MissingTargets)]
    #[case(config("p-1", &["p-1", " "]), RelayError::MissingTargets)]
    fn incomplete_configs_are_rejected(
        manager: Arc<MemoryManager>,
        #[case] config: RelayConfig,
        #[case] expected: RelayError,
    ) {
        let registry = RelayRegistry::new();
        let error = registry.create(manager, &config).expect_err("rejected");
        assert_eq!(error, expected);
        assert!(registry.is_empty());
    }

    #[rstest]
    fn relays_are_numbered_and_listed_in_order(manager: Arc<MemoryManager>) {
        let registry = RelayRegistry::new();
        let source = pane_of(&manager, "alpha");
        let target = pane_of(&manager, "beta");
        let first = registry
            .create(manager.clone(), &config(&source, &[&target]))
            .expect("first");
        let second = registry
            .create(manager, &config(&source, &[&target]))
            .expect("second");
        assert_eq!(first.id, "relay-1");
        assert_eq!(second.id, "relay-2");
        let ids: Vec<_> = registry.list().into_iter().map(|info| info.id).collect();
        assert_eq!(ids, vec!["relay-1", "relay-2"]);
        assert_eq!(registry.stop_all(), 2);
        assert!(registry.is_empty());
    }

    #[rstest]
    fn stop_removes_the_relay(manager: Arc<MemoryManager>) {
        let registry = RelayRegistry::new();
        let source = pane_of(&manager, "alpha");
        let target = pane_of(&manager, "beta");
        let info = registry
            .create(manager, &config(&source, &[&target]))
            .expect("create");
        let stopped = registry.stop(&info.id).expect("stop");
        assert_eq!(stopped.status, RelayStatus::Stopped);
        assert_eq!(
            registry.stop(&info.id),
            Err(RelayError::NotFound { id: info.id })
        );
        assert_eq!(registry.stop("  "), Err(RelayError::MissingId));
    }

    #[rstest]
    fn output_is_forwarded_to_targets(manager: Arc<MemoryManager>) {
        let registry = RelayRegistry::new();
        let source = pane_of(&manager, "alpha");
        let target = pane_of(&manager, "beta");
        registry
            .create(manager.clone(), &config(&source, &[&target]))
            .expect("create");
        thread::sleep(Duration::from_millis(20));
        manager.write_output(&source, "hello\n").expect("write");

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut relayed = Vec::new();
        while relayed.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
            relayed = manager.output_snapshot(&target, 10).expect("snapshot");
        }
        let texts: Vec<_> = relayed.into_iter().map(|line| line.text).collect();
        assert_eq!(texts, vec!["hello"]);
        registry.stop_all();
    }
}
