//! A scripted framework used by the integration tests.
#![allow(dead_code)]

use runt_host::{
    codec::{TestCaseCodec, VersionedCodec},
    errors::HostError,
    framework::{
        AssemblyInfo, AssemblyName, FrameworkInfo, Options, TestFramework,
        TestFrameworkDiscoverer, TestFrameworkExecutor,
    },
    host::Registry,
    message::{FailureInfo, Message, Scope},
    sink::MessageSink,
    test_case::TestCase,
};
use serde_json::json;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

pub const MODULE: &str = "demo";
pub const VERSION: &str = "3.0.2";
/// Seconds each executed test takes.
pub const TEST_TIME: f64 = 0.25;

/// Every test the demo assembly contains, in discovery order.
pub fn catalog() -> Vec<TestCase> {
    vec![
        TestCase::new("Math.add", "Math.add")
            .with_method("Math", "add")
            .with_trait("speed", "fast")
            .with_state(json!({"args": [1, 2]})),
        TestCase::new("Math.div", "Math.div").with_method("Math", "div"),
        TestCase::new("Math.slow", "Math.slow")
            .with_method("Math", "slow")
            .with_skip_reason("too slow"),
        TestCase::new("Strings.concat", "Strings.concat").with_method("Strings", "concat"),
    ]
}

/// A test whose reported time is infinite.
pub fn overflow() -> TestCase {
    TestCase::new("Math.overflow", "Math.overflow").with_method("Math", "overflow")
}

/// The catalog as seen through discovery options. A `class` option limits
/// discovery to that class.
pub fn discoverable(options: &Options) -> Vec<TestCase> {
    match options.get("class").and_then(|class| class.as_str()) {
        Some(class) => catalog()
            .into_iter()
            .filter(|test_case| test_case.class_name() == Some(class))
            .collect(),
        None => catalog(),
    }
}

/// Counts hosted objects as they are dropped.
pub struct Tracked(Arc<AtomicUsize>);

impl Drop for Tracked {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct Demo {
    assembly: String,
    drops: Arc<AtomicUsize>,
    _tracked: Tracked,
}

impl TestFramework for Demo {
    fn info(&self) -> FrameworkInfo {
        FrameworkInfo {
            name: "demo".to_string(),
            version: VERSION.to_string(),
        }
    }

    fn discoverer(
        &self,
        assembly: &AssemblyInfo,
    ) -> Result<Arc<dyn TestFrameworkDiscoverer>, HostError> {
        if assembly.path != self.assembly {
            return Err(HostError::Configuration(format!(
                "framework was loaded for {}",
                self.assembly
            )));
        }
        Ok(Arc::new(DemoDiscoverer {
            assembly: assembly.name.clone(),
            codec: VersionedCodec::new(VERSION),
            _tracked: Tracked(Arc::clone(&self.drops)),
        }))
    }

    fn executor(
        &self,
        assembly: &AssemblyName,
    ) -> Result<Arc<dyn TestFrameworkExecutor>, HostError> {
        if assembly.version.as_deref() != Some(VERSION) {
            return Err(HostError::Configuration(format!(
                "no executor for version {:?}",
                assembly.version
            )));
        }
        Ok(Arc::new(DemoExecutor {
            discoverer: DemoDiscoverer {
                assembly: assembly.name.clone(),
                codec: VersionedCodec::new(VERSION),
                _tracked: Tracked(Arc::new(AtomicUsize::new(0))),
            },
            _tracked: Tracked(Arc::clone(&self.drops)),
        }))
    }
}

struct DemoDiscoverer {
    assembly: String,
    codec: VersionedCodec,
    _tracked: Tracked,
}

impl DemoDiscoverer {
    fn announce(
        &self,
        cases: Vec<TestCase>,
        include_source_info: bool,
        sink: &dyn MessageSink,
    ) {
        if !sink.on_message(&Message::DiscoveryStarting {
            assembly: self.assembly.clone(),
        }) {
            return;
        }
        let count = cases.len();
        for (line, test_case) in cases.into_iter().enumerate() {
            let test_case = if include_source_info {
                test_case.with_source("tests/demo.rs", Some(10 * (line as u32 + 1)))
            } else {
                test_case
            };
            if !sink.on_message(&Message::TestCaseDiscovered { test_case }) {
                return;
            }
        }
        sink.on_message(&Message::DiscoveryComplete {
            test_cases_to_run: count,
        });
    }
}

impl TestFrameworkDiscoverer for DemoDiscoverer {
    fn target_framework(&self) -> Result<String, HostError> {
        Ok("demo-3.0".to_string())
    }

    fn display_name(&self) -> Result<String, HostError> {
        Ok(format!("Demo Framework v{}", VERSION))
    }

    fn find(
        &self,
        include_source_info: bool,
        sink: &dyn MessageSink,
        options: &Options,
    ) -> Result<(), HostError> {
        self.announce(discoverable(options), include_source_info, sink);
        Ok(())
    }

    fn find_in_type(
        &self,
        type_name: &str,
        include_source_info: bool,
        sink: &dyn MessageSink,
        _: &Options,
    ) -> Result<(), HostError> {
        let cases: Vec<_> = catalog()
            .into_iter()
            .filter(|test_case| test_case.class_name() == Some(type_name))
            .collect();
        if !cases.is_empty() {
            self.announce(cases, include_source_info, sink);
        }
        Ok(())
    }

    fn serialize(&self, test_case: &TestCase) -> Result<String, HostError> {
        self.codec.serialize(test_case)
    }
}

struct DemoExecutor {
    discoverer: DemoDiscoverer,
    _tracked: Tracked,
}

impl TestFrameworkExecutor for DemoExecutor {
    fn run_all(
        &self,
        sink: &dyn MessageSink,
        discovery_options: &Options,
        execution_options: &Options,
    ) -> Result<(), HostError> {
        self.discoverer.find(false, sink, discovery_options)?;
        self.run_tests(&discoverable(discovery_options), sink, execution_options)
    }

    fn run_tests(
        &self,
        test_cases: &[TestCase],
        sink: &dyn MessageSink,
        _: &Options,
    ) -> Result<(), HostError> {
        let (mut run, mut failed, mut skipped) = (0, 0, 0);
        let mut time = 0.0;
        let mut keep_going = sink.on_message(&Message::ScopeStarting {
            scope: Scope::Assembly,
            name: self.discoverer.assembly.clone(),
        });

        let mut classes: Vec<&str> = Vec::new();
        for class in test_cases.iter().filter_map(TestCase::class_name) {
            if !classes.contains(&class) {
                classes.push(class);
            }
        }

        'classes: for class in classes {
            sink.on_message(&Message::ScopeStarting {
                scope: Scope::Class,
                name: class.to_string(),
            });
            for test_case in test_cases
                .iter()
                .filter(|test_case| test_case.class_name() == Some(class))
            {
                if !keep_going {
                    break 'classes;
                }
                let test = test_case.display_name().to_string();
                run += 1;
                let message = match (test_case.skip_reason(), test_case.method_name()) {
                    (Some(reason), _) => {
                        skipped += 1;
                        Message::TestSkipped {
                            test,
                            reason: reason.to_string(),
                        }
                    }
                    (None, Some("div")) => {
                        failed += 1;
                        Message::TestFailed {
                            test,
                            execution_time: TEST_TIME,
                            output: String::new(),
                            failure: FailureInfo::new("DivideByZero", "attempt to divide by zero")
                                .with_stack_trace("at Math.div (tests/demo.rs:20)"),
                        }
                    }
                    // Reports a time that has no JSON representation.
                    (None, Some("overflow")) => {
                        time = f64::INFINITY;
                        Message::TestPassed {
                            test,
                            execution_time: f64::INFINITY,
                            output: String::new(),
                        }
                    }
                    (None, _) => Message::TestPassed {
                        test,
                        execution_time: TEST_TIME,
                        output: String::new(),
                    },
                };
                if test_case.skip_reason().is_none() {
                    time += TEST_TIME;
                }
                keep_going = sink.on_message(&message);
            }
            sink.on_message(&Message::ScopeFinished {
                scope: Scope::Class,
                name: class.to_string(),
            });
            if class == "Strings" {
                sink.on_message(&Message::CleanupFailure {
                    scope: Scope::Class,
                    name: class.to_string(),
                    failure: FailureInfo::new("IOException", "temp file still open"),
                });
            }
        }

        sink.on_message(&Message::ScopeFinished {
            scope: Scope::Assembly,
            name: self.discoverer.assembly.clone(),
        });
        sink.on_message(&Message::AssemblyFinished {
            tests_run: run,
            tests_failed: failed,
            tests_skipped: skipped,
            execution_time: time,
        });
        Ok(())
    }

    fn deserialize(&self, value: &str) -> Result<TestCase, HostError> {
        let test_case = self.discoverer.codec.deserialize(value)?;
        if !catalog().contains(&test_case) {
            return Err(HostError::serialization(format!(
                "no test named {}",
                test_case.unique_id()
            )));
        }
        Ok(test_case)
    }
}

/// A registry hosting the demo framework. Every framework, discoverer and
/// executor it creates bumps `drops` when dropped.
pub fn registry(drops: &Arc<AtomicUsize>) -> Arc<Registry> {
    let drops = Arc::clone(drops);
    let mut registry = Registry::new();
    registry.register_framework(MODULE, "TestFramework", move |args| {
        Ok(Arc::new(Demo {
            assembly: args.str(0)?.to_string(),
            drops: Arc::clone(&drops),
            _tracked: Tracked(Arc::clone(&drops)),
        }) as Arc<dyn TestFramework>)
    });
    Arc::new(registry)
}

/// Records every message it sees and answers with `answer`.
pub struct Recorder {
    pub messages: Mutex<Vec<Message>>,
    answer: Box<dyn Fn(&[Message]) -> bool + Send + Sync>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::answering(|_| true)
    }

    /// `answer` sees every message recorded so far, the latest last.
    pub fn answering<F>(answer: F) -> Self
    where
        F: Fn(&[Message]) -> bool + Send + Sync + 'static,
    {
        Self {
            messages: Mutex::new(Vec::new()),
            answer: Box::new(answer),
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.messages().iter().map(Message::kind).collect()
    }
}

impl MessageSink for Recorder {
    fn on_message(&self, message: &Message) -> bool {
        let mut messages = self.messages.lock().unwrap();
        messages.push(message.clone());
        (self.answer)(&messages)
    }
}
