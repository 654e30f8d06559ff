//! A single discovery and execution surface for a framework loaded behind a
//! boundary.
//!
//! [FrameworkProxy] owns its [Boundary] and every object created through
//! it. Callers are indifferent to whether isolation is actually in effect.

mod descriptors;

pub use descriptors::DescriptorProvider;

use crate::{
    boundary::{Arg, Boundary, Isolation},
    codec::TestCaseCodec,
    errors::HostError,
    framework::{
        AssemblyInfo, AssemblyName, FrameworkInfo, Options, RemoteDiscoverer, RemoteExecutor,
        RemoteFramework, TestFrameworkDiscoverer, TestFrameworkExecutor,
    },
    host::Registry,
    project::ProjectAssembly,
    sink::{ExecutionPhase, MessageSink},
    test_case::{TestCase, TestCaseDescriptor},
};
use once_cell::sync::OnceCell;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// True when every dot-separated component of `declared` equals the
/// matching component of `actual`: `"3"` and `"3.0"` match `"3.0.2"`.
pub fn version_matches(declared: &str, actual: &str) -> bool {
    let declared: Vec<&str> = declared.trim().split('.').collect();
    let actual: Vec<&str> = actual.trim().split('.').collect();
    declared.len() <= actual.len() && declared.iter().zip(&actual).all(|(d, a)| d == a)
}

/// Discoverer and executor for one test assembly.
pub struct FrameworkProxy {
    assembly: AssemblyInfo,
    info: FrameworkInfo,
    framework: RemoteFramework,
    discoverer: RemoteDiscoverer,
    executor: RemoteExecutor,
    /// Configured discovery options, used when `run_tests` runs everything.
    discovery_options: Options,
    descriptors: OnceCell<DescriptorProvider>,
    disposed: AtomicBool,
    boundary: Boundary,
}

impl FrameworkProxy {
    /// Create a boundary for `project` and load its framework inside it.
    /// `registry` is used when the framework ends up loaded in-process.
    pub fn new(project: &ProjectAssembly, registry: Arc<Registry>) -> Result<Self, HostError> {
        let options = project.boundary_options()?;
        let boundary = Boundary::create(&options, registry)?;
        Self::with_boundary(project, boundary)
    }

    /// Load the framework of `project` inside an existing boundary, which
    /// the proxy takes ownership of.
    pub fn with_boundary(project: &ProjectAssembly, boundary: Boundary) -> Result<Self, HostError> {
        let config = project.configuration()?;
        let module = project.module()?;
        let assembly = project.assembly_info();

        let framework: RemoteFramework = boundary.create_object(
            &module,
            &config.framework.type_name,
            vec![Arg::from(assembly.path.as_str())],
        )?;
        let info = framework.info()?;
        if let Some(declared) = &config.framework.version {
            if !version_matches(declared, &info.version) {
                return Err(HostError::Configuration(format!(
                    "{} requires {} {}, but {} was loaded",
                    assembly.name, info.name, declared, info.version
                )));
            }
        }
        log::debug!(
            "{}: loaded {} {} ({:?})",
            assembly.name,
            info.name,
            info.version,
            boundary.isolation()
        );

        let discoverer = framework.discoverer(&assembly)?;
        let executor = framework.executor(&AssemblyName {
            name: assembly.name.clone(),
            version: Some(info.version.clone()),
        })?;

        Ok(Self {
            assembly,
            info,
            framework,
            discoverer,
            executor,
            discovery_options: config.discovery.clone(),
            descriptors: OnceCell::new(),
            disposed: AtomicBool::new(false),
            boundary,
        })
    }

    fn ensure_live(&self) -> Result<(), HostError> {
        if self.disposed.load(Ordering::SeqCst) {
            Err(HostError::Disposed)
        } else {
            Ok(())
        }
    }

    pub fn assembly(&self) -> &AssemblyInfo {
        &self.assembly
    }

    pub fn framework_info(&self) -> &FrameworkInfo {
        &self.info
    }

    pub fn isolation(&self) -> Isolation {
        self.boundary.isolation()
    }

    pub fn target_framework(&self) -> Result<String, HostError> {
        self.ensure_live()?;
        self.discoverer.target_framework()
    }

    pub fn display_name(&self) -> Result<String, HostError> {
        self.ensure_live()?;
        self.discoverer.display_name()
    }

    /// Enumerate every test in the assembly. Blocks until enumeration is
    /// complete.
    pub fn find(
        &self,
        include_source_info: bool,
        sink: &dyn MessageSink,
        discovery_options: &Options,
    ) -> Result<(), HostError> {
        self.ensure_live()?;
        self.discoverer
            .find(include_source_info, sink, discovery_options)
    }

    /// Enumerate the tests of one type. A type without tests yields no
    /// messages.
    pub fn find_in_type(
        &self,
        type_name: &str,
        include_source_info: bool,
        sink: &dyn MessageSink,
        discovery_options: &Options,
    ) -> Result<(), HostError> {
        self.ensure_live()?;
        self.discoverer
            .find_in_type(type_name, include_source_info, sink, discovery_options)
    }

    /// Discover, then run, every test. Both phases are streamed to `sink`.
    pub fn run_all(
        &self,
        sink: &dyn MessageSink,
        discovery_options: &Options,
        execution_options: &Options,
    ) -> Result<(), HostError> {
        self.ensure_live()?;
        self.executor
            .run_all(sink, discovery_options, execution_options)
    }

    /// Run exactly `test_cases`. An empty set runs everything the
    /// configured discovery options select, streaming only the execution
    /// phase.
    pub fn run_tests(
        &self,
        test_cases: &[TestCase],
        sink: &dyn MessageSink,
        execution_options: &Options,
    ) -> Result<(), HostError> {
        self.ensure_live()?;
        if test_cases.is_empty() {
            let phase = ExecutionPhase::new(sink);
            return self
                .executor
                .run_all(&phase, &self.discovery_options, execution_options);
        }
        self.executor.run_tests(test_cases, sink, execution_options)
    }

    pub fn get_test_case_descriptors(
        &self,
        test_cases: &[TestCase],
        include_serialization: bool,
    ) -> Result<Vec<TestCaseDescriptor>, HostError> {
        self.ensure_live()?;
        self.descriptors
            .get_or_init(|| DescriptorProvider::new(self.discoverer.clone()))
            .descriptors(test_cases, include_serialization)
    }

    /// Release the executor, the discoverer, the framework and finally the
    /// boundary. Teardown is best-effort; later calls do nothing.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let released = [
            ("executor", self.executor.release()),
            ("discoverer", self.discoverer.release()),
            ("framework", self.framework.release()),
        ];
        for (what, result) in released {
            if let Err(err) = result {
                log::warn!("{}: failed to release {}: {}", self.assembly.name, what, err);
            }
        }
        self.boundary.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl TestCaseCodec for FrameworkProxy {
    fn serialize(&self, test_case: &TestCase) -> Result<String, HostError> {
        self.ensure_live()?;
        self.discoverer.serialize(test_case)
    }

    fn deserialize(&self, value: &str) -> Result<TestCase, HostError> {
        self.ensure_live()?;
        self.executor.deserialize(value)
    }

    fn bulk_deserialize(
        &self,
        values: Vec<String>,
    ) -> Result<Vec<(String, TestCase)>, HostError> {
        self.ensure_live()?;
        self.executor.bulk_deserialize(values)
    }
}

impl Drop for FrameworkProxy {
    fn drop(&mut self) {
        self.dispose();
    }
}
