use super::MessageSink;
use crate::message::Message;

/// Forwards only execution messages; discovery messages are dropped.
///
/// Running all tests through this filter yields the same stream as the
/// execution phase of a full run.
pub struct ExecutionPhase<'a> {
    inner: &'a dyn MessageSink,
}

impl<'a> ExecutionPhase<'a> {
    pub fn new(inner: &'a dyn MessageSink) -> Self {
        Self { inner }
    }
}

impl MessageSink for ExecutionPhase<'_> {
    fn on_message(&self, message: &Message) -> bool {
        if message.is_discovery() {
            return true;
        }
        self.inner.on_message(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn drops_discovery_messages() {
        let seen = Mutex::new(Vec::new());
        let record = |msg: &Message| {
            seen.lock().unwrap().push(msg.kind());
            false
        };
        let filter = ExecutionPhase::new(&record);
        assert!(filter.on_message(&Message::DiscoveryComplete {
            test_cases_to_run: 0
        }));
        assert!(!filter.on_message(&Message::Diagnostic {
            message: "x".to_string()
        }));
        assert_eq!(*seen.lock().unwrap(), vec!["diagnostic"]);
    }
}
