use super::{CancelPredicate, FailureReporter, Gate, LogReporter, MessageSink};
use crate::{
    message::{Category, Message},
    summary::ExecutionSummary,
};
use once_cell::sync::OnceCell;
use std::{
    sync::atomic::{AtomicU32, AtomicU8, Ordering},
    time::Duration,
};

const IDLE: u8 = 0;
const RECEIVING: u8 = 1;
const FINISHED: u8 = 2;

/// Lifecycle of an [ExecutionSink].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Idle,
    Receiving,
    Finished,
}

/// Aggregates an execution message stream into an [ExecutionSummary].
///
/// Failure-bearing messages are counted atomically whatever thread delivers
/// them. The first assembly-finished message publishes the summary and opens
/// the completion gate; anything after that is accepted and ignored.
pub struct ExecutionSink {
    cancel: CancelPredicate,
    reporter: Box<dyn FailureReporter>,
    state: AtomicU8,
    errors: AtomicU32,
    summary: OnceCell<ExecutionSummary>,
    finished: Gate,
}

impl Default for ExecutionSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionSink {
    pub fn new() -> Self {
        Self {
            cancel: Box::new(|| false),
            reporter: Box::new(LogReporter),
            state: AtomicU8::new(IDLE),
            errors: AtomicU32::new(0),
            summary: OnceCell::new(),
            finished: Gate::new(),
        }
    }

    /// Request cancellation whenever `cancel` returns true.
    pub fn with_cancel<F>(mut self, cancel: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.cancel = Box::new(cancel);
        self
    }

    pub fn with_reporter<R>(mut self, reporter: R) -> Self
    where
        R: FailureReporter + 'static,
    {
        self.reporter = Box::new(reporter);
        self
    }

    pub fn state(&self) -> SinkState {
        match self.state.load(Ordering::SeqCst) {
            IDLE => SinkState::Idle,
            RECEIVING => SinkState::Receiving,
            _ => SinkState::Finished,
        }
    }

    /// Errors counted so far.
    pub fn errors(&self) -> u32 {
        self.errors.load(Ordering::SeqCst)
    }

    /// The published summary, once execution has finished.
    pub fn summary(&self) -> Option<&ExecutionSummary> {
        self.summary.get()
    }

    /// Signaled once execution is finished.
    pub fn finished(&self) -> &Gate {
        &self.finished
    }

    /// Block until the summary is published.
    pub fn wait(&self) -> ExecutionSummary {
        self.finished.wait();
        self.summary.get().copied().unwrap_or_default()
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<ExecutionSummary> {
        if self.finished.wait_timeout(timeout) {
            self.summary.get().copied()
        } else {
            None
        }
    }

    fn handle_assembly_finished(
        &self,
        tests_run: u32,
        tests_failed: u32,
        tests_skipped: u32,
        execution_time: f64,
    ) {
        let time = Duration::try_from_secs_f64(execution_time).unwrap_or_else(|_| {
            log::warn!(
                "protocol violation: execution time {} is not a valid duration",
                execution_time
            );
            Duration::ZERO
        });
        let summary = ExecutionSummary {
            total: tests_run,
            failed: tests_failed,
            skipped: tests_skipped,
            errors: self.errors.load(Ordering::SeqCst),
            time,
        };
        if !summary.is_consistent() {
            log::warn!(
                "protocol violation: {} failed + {} skipped exceeds {} run",
                tests_failed,
                tests_skipped,
                tests_run
            );
        }

        if self.summary.set(summary).is_err() {
            log::warn!("protocol violation: repeated assembly-finished message ignored");
            return;
        }
        self.state.store(FINISHED, Ordering::SeqCst);
        self.finished.open();
    }
}

impl MessageSink for ExecutionSink {
    fn on_message(&self, message: &Message) -> bool {
        let _ = self.state.compare_exchange(
            IDLE,
            RECEIVING,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );

        if self.state.load(Ordering::SeqCst) == FINISHED {
            if message.category() == Category::Terminal {
                log::warn!(
                    "protocol violation: repeated assembly-finished message ignored"
                );
            } else {
                log::debug!("{} message after completion ignored", message.kind());
            }
            return !(self.cancel)();
        }

        match message.category() {
            Category::FailureBearing => {
                self.errors.fetch_add(1, Ordering::SeqCst);
            }
            Category::Unrecognized => {
                log::warn!("protocol violation: unrecognized message ignored");
            }
            Category::Informational | Category::Terminal => {}
        }

        if let Some(failure) = message.failure() {
            self.reporter.report(message, failure);
        }

        if let Message::AssemblyFinished {
            tests_run,
            tests_failed,
            tests_skipped,
            execution_time,
        } = message
        {
            self.handle_assembly_finished(
                *tests_run,
                *tests_failed,
                *tests_skipped,
                *execution_time,
            );
        }

        !(self.cancel)()
    }
}
