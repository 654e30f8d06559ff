use super::{CancelPredicate, Gate, MessageSink};
use crate::{message::Message, test_case::TestCase};
use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

/// Collects discovered test cases and signals once discovery completes.
pub struct DiscoverySink {
    cancel: CancelPredicate,
    test_cases: Mutex<Vec<TestCase>>,
    finished: Gate,
}

impl Default for DiscoverySink {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoverySink {
    pub fn new() -> Self {
        Self {
            cancel: Box::new(|| false),
            test_cases: Mutex::new(Vec::new()),
            finished: Gate::new(),
        }
    }

    pub fn with_cancel<F>(mut self, cancel: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.cancel = Box::new(cancel);
        self
    }

    pub fn finished(&self) -> &Gate {
        &self.finished
    }

    /// Test cases discovered so far, in arrival order.
    pub fn test_cases(&self) -> Vec<TestCase> {
        self.test_cases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Block until discovery completes and return what was found.
    pub fn wait(&self) -> Vec<TestCase> {
        self.finished.wait();
        self.test_cases()
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<Vec<TestCase>> {
        if self.finished.wait_timeout(timeout) {
            Some(self.test_cases())
        } else {
            None
        }
    }

    pub fn into_test_cases(self) -> Vec<TestCase> {
        self.test_cases
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl MessageSink for DiscoverySink {
    fn on_message(&self, message: &Message) -> bool {
        match message {
            Message::TestCaseDiscovered { test_case } => {
                if self.finished.is_open() {
                    log::warn!(
                        "protocol violation: {} discovered after discovery completed",
                        test_case.unique_id()
                    );
                } else {
                    self.test_cases
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(test_case.clone());
                }
            }
            Message::DiscoveryComplete { .. } => {
                if !self.finished.open() {
                    log::warn!("protocol violation: repeated discovery-complete message ignored");
                }
            }
            Message::Unknown => {
                log::warn!("protocol violation: unrecognized message ignored");
            }
            _ => {}
        }
        !(self.cancel)()
    }
}
