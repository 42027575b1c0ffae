// Shared test helpers for integration tests
#![allow(dead_code)]

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use context_runner::core::config::RunConfig;
use context_runner::core::context::Context;
use context_runner::core::execution::Runner;
use context_runner::core::models::{Event, RunStats};
use context_runner::reporting::Reporter;

/// A reporter that records every event it receives, for asserting on the
/// exact stream a run produced.
pub struct RecordingReporter {
    events: Rc<RefCell<Vec<Event>>>,
}

impl RecordingReporter {
    pub fn new() -> (Self, Rc<RefCell<Vec<Event>>>) {
        let events = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                events: events.clone(),
            },
            events,
        )
    }
}

impl Reporter for RecordingReporter {
    fn on_event(&mut self, event: &Event) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// Runs the given roots with a recording reporter attached and returns
/// the final statistics together with the recorded event stream.
pub fn run_contexts(roots: &[Rc<Context>], config: RunConfig) -> (RunStats, Vec<Event>) {
    let (reporter, events) = RecordingReporter::new();
    let mut runner = Runner::new(config);
    runner.add_reporter(Box::new(reporter));
    let stats = runner.run(roots).expect("suite run failed");
    let recorded = events.borrow().clone();
    (stats, recorded)
}

/// The wire names of the recorded events, `log` entries excluded.
pub fn event_kinds(events: &[Event]) -> Vec<&'static str> {
    events
        .iter()
        .filter(|event| !matches!(event, Event::Log { .. }))
        .map(|event| event.kind())
        .collect()
}

/// The wire names of the per-test events only.
pub fn test_event_kinds(events: &[Event]) -> Vec<&'static str> {
    events
        .iter()
        .filter(|event| event.kind().starts_with("test:"))
        .map(|event| event.kind())
        .collect()
}

/// Drives a future to completion on a current-thread runtime with an
/// active `LocalSet`, the environment the engine itself runs under.
pub fn block_on_local<F: Future>(future: F) -> F::Output {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("failed to build runtime");
    let local = tokio::task::LocalSet::new();
    runtime.block_on(local.run_until(future))
}
