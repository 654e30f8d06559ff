//! Sinks receive the stream of messages a framework produces during
//! discovery and execution.
//!
//! A sink may be called from any number of threads at once: the framework
//! decides where its messages come from.

mod discovery;
mod execution;
mod filter;
mod gate;

pub use discovery::DiscoverySink;
pub use execution::{ExecutionSink, SinkState};
pub use filter::ExecutionPhase;
pub use gate::Gate;

use crate::message::{FailureInfo, Message};

/// A callback endpoint for framework messages.
pub trait MessageSink: Send + Sync {
    /// Handle one message. Returning `false` asks the producer to stop.
    fn on_message(&self, message: &Message) -> bool;
}

impl<F> MessageSink for F
where
    F: Fn(&Message) -> bool + Send + Sync,
{
    fn on_message(&self, message: &Message) -> bool {
        self(message)
    }
}

/// Accepts and drops everything.
pub struct NullSink;

impl MessageSink for NullSink {
    fn on_message(&self, _: &Message) -> bool {
        true
    }
}

/// Side channel for structured failure details.
pub trait FailureReporter: Send + Sync {
    fn report(&self, message: &Message, failure: &FailureInfo);
}

/// Reports failures through the `log` facade.
pub struct LogReporter;

impl FailureReporter for LogReporter {
    fn report(&self, message: &Message, failure: &FailureInfo) {
        match failure.top_frame() {
            Some(frame) => log::error!("failure ({}) at {}", message.kind(), frame),
            None => log::error!("failure ({})", message.kind()),
        }
        for exception_type in &failure.exception_types {
            log::error!("  {}", exception_type);
        }
        for text in &failure.messages {
            log::error!("  {}", text);
        }
        for trace in &failure.stack_traces {
            log::error!("{}", trace);
        }
    }
}

/// Predicate consulted on every message; `true` requests cancellation.
pub type CancelPredicate = Box<dyn Fn() -> bool + Send + Sync>;
