//! The capabilities a test framework provides, and their remote proxies.
//!
//! A framework implementation lives on the far side of a boundary and
//! implements [TestFramework], [TestFrameworkDiscoverer] and
//! [TestFrameworkExecutor]. The host talks to it through [RemoteFramework],
//! [RemoteDiscoverer] and [RemoteExecutor], which forward every call across
//! the boundary.

mod remote;

pub use remote::{RemoteDiscoverer, RemoteExecutor, RemoteFramework};

use crate::{errors::HostError, sink::MessageSink, test_case::TestCase};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Interface names checked when an object is instantiated by name.
pub mod interfaces {
    pub const FRAMEWORK: &str = "TestFramework";
    pub const DISCOVERER: &str = "TestFrameworkDiscoverer";
    pub const EXECUTOR: &str = "TestFrameworkExecutor";
}

/// Name and version of a loaded framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkInfo {
    pub name: String,
    pub version: String,
}

/// The test assembly a discoverer enumerates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyInfo {
    pub name: String,
    pub path: String,
}

/// Identity used to pick an executor: assembly name plus the resolved
/// framework version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyName {
    pub name: String,
    pub version: Option<String>,
}

/// An opaque option bag, passed through to the framework unmodified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(BTreeMap<String, serde_json::Value>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Entry point of a loaded framework.
pub trait TestFramework: Send + Sync {
    fn info(&self) -> FrameworkInfo;

    fn discoverer(
        &self,
        assembly: &AssemblyInfo,
    ) -> Result<std::sync::Arc<dyn TestFrameworkDiscoverer>, HostError>;

    fn executor(
        &self,
        assembly: &AssemblyName,
    ) -> Result<std::sync::Arc<dyn TestFrameworkExecutor>, HostError>;
}

/// Enumerates the tests of one assembly.
pub trait TestFrameworkDiscoverer: Send + Sync {
    fn target_framework(&self) -> Result<String, HostError>;

    fn display_name(&self) -> Result<String, HostError>;

    /// Stream discovery messages for every test in the assembly. Returns
    /// once enumeration is complete.
    fn find(
        &self,
        include_source_info: bool,
        sink: &dyn MessageSink,
        options: &Options,
    ) -> Result<(), HostError>;

    /// Like [find](TestFrameworkDiscoverer::find), scoped to one fully
    /// qualified type. A type without tests yields no messages.
    fn find_in_type(
        &self,
        type_name: &str,
        include_source_info: bool,
        sink: &dyn MessageSink,
        options: &Options,
    ) -> Result<(), HostError>;

    fn serialize(&self, test_case: &TestCase) -> Result<String, HostError>;
}

/// Runs the tests of one assembly.
pub trait TestFrameworkExecutor: Send + Sync {
    /// Discover, then execute, every test in the assembly.
    fn run_all(
        &self,
        sink: &dyn MessageSink,
        discovery_options: &Options,
        execution_options: &Options,
    ) -> Result<(), HostError>;

    /// Execute exactly `test_cases`. Ordering and parallelism are up to the
    /// framework.
    fn run_tests(
        &self,
        test_cases: &[TestCase],
        sink: &dyn MessageSink,
        execution_options: &Options,
    ) -> Result<(), HostError>;

    fn deserialize(&self, value: &str) -> Result<TestCase, HostError>;
}
