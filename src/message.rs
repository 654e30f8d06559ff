//! The closed set of messages a framework streams back to a sink.
use crate::test_case::TestCase;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Durations in seconds. JSON has no NaN or infinity, so a non-finite time
/// arrives as `null`; it is read back as NaN and rejected by the sink.
fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// The level of the test hierarchy a lifecycle message is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Assembly,
    Collection,
    Class,
    Method,
    TestCase,
    Test,
}

/// Structured failure details: one entry per exception in a chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub exception_types: Vec<String>,
    pub messages: Vec<String>,
    pub stack_traces: Vec<String>,
}

impl FailureInfo {
    pub fn new(
        exception_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            exception_types: vec![exception_type.into()],
            messages: vec![message.into()],
            stack_traces: Vec::new(),
        }
    }

    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_traces.push(trace.into());
        self
    }

    /// The first frame with a source location in the outermost stack
    /// trace that has one.
    pub fn top_frame(&self) -> Option<StackFrame> {
        self.stack_traces
            .iter()
            .flat_map(|trace| trace.lines())
            .find_map(StackFrame::parse)
    }
}

/// Frames look like `at f() in src/a.cs:line 12` or `at f (src/a.rs:12:5)`.
static FRAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r" in (?P<file>\S.*?):line (?P<line>\d+)|\((?P<pfile>[^()]+?):(?P<pline>\d+)(?::\d+)?\)")
        .expect("valid stack frame regex")
});

/// Source location of one stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub file: String,
    pub line: u32,
}

impl StackFrame {
    fn parse(text: &str) -> Option<Self> {
        let caps = FRAME_RE.captures(text)?;
        let file = caps.name("file").or_else(|| caps.name("pfile"))?;
        let line = caps.name("line").or_else(|| caps.name("pline"))?;
        Some(Self {
            file: file.as_str().to_string(),
            line: line.as_str().parse().ok()?,
        })
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A message produced by the framework side of the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    DiscoveryStarting {
        assembly: String,
    },
    TestCaseDiscovered {
        test_case: TestCase,
    },
    DiscoveryComplete {
        test_cases_to_run: usize,
    },
    ScopeStarting {
        scope: Scope,
        name: String,
    },
    ScopeFinished {
        scope: Scope,
        name: String,
    },
    TestPassed {
        test: String,
        #[serde(deserialize_with = "seconds")]
        execution_time: f64,
        #[serde(default)]
        output: String,
    },
    TestFailed {
        test: String,
        #[serde(deserialize_with = "seconds")]
        execution_time: f64,
        #[serde(default)]
        output: String,
        failure: FailureInfo,
    },
    TestSkipped {
        test: String,
        reason: String,
    },
    TestOutput {
        test: String,
        output: String,
    },
    Diagnostic {
        message: String,
    },
    Error {
        failure: FailureInfo,
    },
    CleanupFailure {
        scope: Scope,
        name: String,
        failure: FailureInfo,
    },
    /// Marks the end of a run and carries its totals.
    AssemblyFinished {
        tests_run: u32,
        tests_failed: u32,
        tests_skipped: u32,
        #[serde(deserialize_with = "seconds")]
        execution_time: f64,
    },
    /// Any message kind this host does not know about.
    #[serde(other)]
    Unknown,
}

/// How a sink should treat a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Informational,
    /// Counted as an error in the execution summary.
    FailureBearing,
    Terminal,
    Unrecognized,
}

impl Message {
    pub fn category(&self) -> Category {
        match self {
            Message::Error { .. } | Message::CleanupFailure { .. } => {
                Category::FailureBearing
            }
            Message::AssemblyFinished { .. } => Category::Terminal,
            Message::Unknown => Category::Unrecognized,
            Message::DiscoveryStarting { .. }
            | Message::TestCaseDiscovered { .. }
            | Message::DiscoveryComplete { .. }
            | Message::ScopeStarting { .. }
            | Message::ScopeFinished { .. }
            | Message::TestPassed { .. }
            | Message::TestFailed { .. }
            | Message::TestSkipped { .. }
            | Message::TestOutput { .. }
            | Message::Diagnostic { .. } => Category::Informational,
        }
    }

    pub fn is_discovery(&self) -> bool {
        matches!(
            self,
            Message::DiscoveryStarting { .. }
                | Message::TestCaseDiscovered { .. }
                | Message::DiscoveryComplete { .. }
        )
    }

    /// Structured failure details carried by the message, if any.
    pub fn failure(&self) -> Option<&FailureInfo> {
        match self {
            Message::TestFailed { failure, .. }
            | Message::Error { failure }
            | Message::CleanupFailure { failure, .. } => Some(failure),
            _ => None,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::DiscoveryStarting { .. } => "discovery-starting",
            Message::TestCaseDiscovered { .. } => "test-case-discovered",
            Message::DiscoveryComplete { .. } => "discovery-complete",
            Message::ScopeStarting { .. } => "scope-starting",
            Message::ScopeFinished { .. } => "scope-finished",
            Message::TestPassed { .. } => "test-passed",
            Message::TestFailed { .. } => "test-failed",
            Message::TestSkipped { .. } => "test-skipped",
            Message::TestOutput { .. } => "test-output",
            Message::Diagnostic { .. } => "diagnostic",
            Message::Error { .. } => "error",
            Message::CleanupFailure { .. } => "cleanup-failure",
            Message::AssemblyFinished { .. } => "assembly-finished",
            Message::Unknown => "unknown",
        }
    }
}
