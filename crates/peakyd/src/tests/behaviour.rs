//! Behavioural tests for the daemon bootstrap sequence.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::bootstrap::{BootstrapError, Bootstrapped, ConfigLoader, bootstrap_with};

use super::support::{FailingConfigLoader, HealthEvent, RecordingHealthReporter, TestConfigLoader};

struct BootstrapWorld {
    loader: Box<dyn ConfigLoader>,
    socket_dir: Option<std::path::PathBuf>,
    reporter: RecordingHealthReporter,
    outcome: Option<Result<Bootstrapped, BootstrapError>>,
}

impl BootstrapWorld {
    fn new() -> Self {
        Self {
            loader: Box::new(FailingConfigLoader),
            socket_dir: None,
            reporter: RecordingHealthReporter::default(),
            outcome: None,
        }
    }
}

#[fixture]
fn world() -> RefCell<BootstrapWorld> {
    RefCell::new(BootstrapWorld::new())
}

#[given("a healthy configuration loader")]
fn given_healthy_loader(world: &RefCell<BootstrapWorld>) {
    let loader = TestConfigLoader::new();
    let mut world = world.borrow_mut();
    world.socket_dir = Some(loader.runtime_dir());
    world.loader = Box::new(loader);
}

#[given("a failing configuration loader")]
fn given_failing_loader(world: &RefCell<BootstrapWorld>) {
    world.borrow_mut().loader = Box::new(FailingConfigLoader);
}

#[when("the daemon bootstrap runs")]
fn when_bootstrap_runs(world: &RefCell<BootstrapWorld>) {
    let mut world = world.borrow_mut();
    let outcome = bootstrap_with(world.loader.as_ref(), &world.reporter);
    world.outcome = Some(outcome);
}

#[then("bootstrap succeeds")]
fn then_bootstrap_succeeds(world: &RefCell<BootstrapWorld>) {
    let world = world.borrow();
    match world.outcome.as_ref() {
        Some(Ok(_)) => {}
        other => panic!("expected bootstrap success, got {other:?}"),
    }
}

#[then("the socket directory exists")]
fn then_socket_directory_exists(world: &RefCell<BootstrapWorld>) {
    let world = world.borrow();
    let dir = world.socket_dir.as_ref().expect("healthy loader selected");
    assert!(dir.is_dir(), "socket directory {dir:?} missing");
}

#[then("bootstrap fails")]
fn then_bootstrap_fails(world: &RefCell<BootstrapWorld>) {
    let world = world.borrow();
    assert!(
        matches!(world.outcome, Some(Err(BootstrapError::Configuration { .. }))),
        "expected a configuration failure, got {:?}",
        world.outcome
    );
}

#[then("the reporter recorded bootstrap start")]
fn then_reporter_start(world: &RefCell<BootstrapWorld>) {
    let events = world.borrow().reporter.events();
    assert_eq!(events.first(), Some(&HealthEvent::BootstrapStarting));
}

#[then("the reporter recorded bootstrap success")]
fn then_reporter_success(world: &RefCell<BootstrapWorld>) {
    let events = world.borrow().reporter.events();
    assert!(
        events.contains(&HealthEvent::BootstrapSucceeded),
        "bootstrap success event missing: {events:?}"
    );
}

#[then("the reporter recorded bootstrap failure")]
fn then_reporter_failure(world: &RefCell<BootstrapWorld>) {
    let events = world.borrow().reporter.events();
    let failed = events
        .iter()
        .any(|event| matches!(event, HealthEvent::BootstrapFailed(_)));
    assert!(failed, "bootstrap failure event missing: {events:?}");
}

#[scenario(path = "tests/features/daemon_bootstrap.feature")]
fn daemon_bootstrap(#[from(world)] _: RefCell<BootstrapWorld>) {}
