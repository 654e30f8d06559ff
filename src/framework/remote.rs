use super::{
    interfaces, AssemblyInfo, AssemblyName, FrameworkInfo, Options, TestFrameworkDiscoverer,
    TestFrameworkExecutor,
};
use crate::{
    boundary::{protocol::Call, Capability, RemoteObject},
    errors::HostError,
    sink::MessageSink,
    test_case::TestCase,
};

/// Proxy for a framework instantiated inside a boundary.
#[derive(Debug, Clone)]
pub struct RemoteFramework {
    object: RemoteObject,
}

impl Capability for RemoteFramework {
    const INTERFACE: &'static str = interfaces::FRAMEWORK;

    fn bind(object: RemoteObject) -> Self {
        Self { object }
    }

    fn object(&self) -> &RemoteObject {
        &self.object
    }
}

impl RemoteFramework {
    pub fn info(&self) -> Result<FrameworkInfo, HostError> {
        self.object
            .call(
                Call::Describe {
                    framework: self.object.handle(),
                },
                None,
            )?
            .into_framework()
    }

    pub fn discoverer(&self, assembly: &AssemblyInfo) -> Result<RemoteDiscoverer, HostError> {
        let reply = self.object.call(
            Call::GetDiscoverer {
                framework: self.object.handle(),
                assembly: assembly.clone(),
            },
            None,
        )?;
        self.object.adopt(reply)
    }

    pub fn executor(&self, assembly: &AssemblyName) -> Result<RemoteExecutor, HostError> {
        let reply = self.object.call(
            Call::GetExecutor {
                framework: self.object.handle(),
                assembly: assembly.clone(),
            },
            None,
        )?;
        self.object.adopt(reply)
    }

    pub fn release(&self) -> Result<(), HostError> {
        self.object.release()
    }
}

/// Proxy for a discoverer living inside a boundary.
#[derive(Debug, Clone)]
pub struct RemoteDiscoverer {
    object: RemoteObject,
}

impl Capability for RemoteDiscoverer {
    const INTERFACE: &'static str = interfaces::DISCOVERER;

    fn bind(object: RemoteObject) -> Self {
        Self { object }
    }

    fn object(&self) -> &RemoteObject {
        &self.object
    }
}

impl RemoteDiscoverer {
    fn find_scoped(
        &self,
        type_name: Option<&str>,
        include_source_info: bool,
        sink: &dyn MessageSink,
        options: &Options,
    ) -> Result<(), HostError> {
        self.object
            .call(
                Call::Find {
                    discoverer: self.object.handle(),
                    type_name: type_name.map(str::to_string),
                    include_source_info,
                    options: options.clone(),
                },
                Some(sink),
            )?
            .into_unit()
    }

    pub fn release(&self) -> Result<(), HostError> {
        self.object.release()
    }
}

impl TestFrameworkDiscoverer for RemoteDiscoverer {
    fn target_framework(&self) -> Result<String, HostError> {
        self.object
            .call(
                Call::TargetFramework {
                    discoverer: self.object.handle(),
                },
                None,
            )?
            .into_text()
    }

    fn display_name(&self) -> Result<String, HostError> {
        self.object
            .call(
                Call::DisplayName {
                    discoverer: self.object.handle(),
                },
                None,
            )?
            .into_text()
    }

    fn find(
        &self,
        include_source_info: bool,
        sink: &dyn MessageSink,
        options: &Options,
    ) -> Result<(), HostError> {
        self.find_scoped(None, include_source_info, sink, options)
    }

    fn find_in_type(
        &self,
        type_name: &str,
        include_source_info: bool,
        sink: &dyn MessageSink,
        options: &Options,
    ) -> Result<(), HostError> {
        self.find_scoped(Some(type_name), include_source_info, sink, options)
    }

    fn serialize(&self, test_case: &TestCase) -> Result<String, HostError> {
        self.object
            .call(
                Call::Serialize {
                    discoverer: self.object.handle(),
                    test_case: test_case.clone(),
                },
                None,
            )?
            .into_text()
    }
}

/// Proxy for an executor living inside a boundary.
#[derive(Debug, Clone)]
pub struct RemoteExecutor {
    object: RemoteObject,
}

impl Capability for RemoteExecutor {
    const INTERFACE: &'static str = interfaces::EXECUTOR;

    fn bind(object: RemoteObject) -> Self {
        Self { object }
    }

    fn object(&self) -> &RemoteObject {
        &self.object
    }
}

impl RemoteExecutor {
    /// Decode a batch in a single round trip. The reply must pair every
    /// input with its test case, in input order.
    pub fn bulk_deserialize(
        &self,
        values: Vec<String>,
    ) -> Result<Vec<(String, TestCase)>, HostError> {
        let pairs = self
            .object
            .call(
                Call::BulkDeserialize {
                    executor: self.object.handle(),
                    values: values.clone(),
                },
                None,
            )?
            .into_test_cases()?;

        if pairs.len() != values.len() {
            return Err(HostError::Protocol(format!(
                "bulk deserialize of {} values returned {} test cases",
                values.len(),
                pairs.len()
            )));
        }
        if let Some(idx) = pairs
            .iter()
            .zip(&values)
            .position(|((echoed, _), sent)| echoed != sent)
        {
            return Err(HostError::Protocol(format!(
                "bulk deserialize reordered its input at entry {}",
                idx
            )));
        }
        Ok(pairs)
    }

    pub fn release(&self) -> Result<(), HostError> {
        self.object.release()
    }
}

impl TestFrameworkExecutor for RemoteExecutor {
    fn run_all(
        &self,
        sink: &dyn MessageSink,
        discovery_options: &Options,
        execution_options: &Options,
    ) -> Result<(), HostError> {
        self.object
            .call(
                Call::RunAll {
                    executor: self.object.handle(),
                    discovery_options: discovery_options.clone(),
                    execution_options: execution_options.clone(),
                },
                Some(sink),
            )?
            .into_unit()
    }

    fn run_tests(
        &self,
        test_cases: &[TestCase],
        sink: &dyn MessageSink,
        execution_options: &Options,
    ) -> Result<(), HostError> {
        self.object
            .call(
                Call::RunTests {
                    executor: self.object.handle(),
                    test_cases: test_cases.to_vec(),
                    execution_options: execution_options.clone(),
                },
                Some(sink),
            )?
            .into_unit()
    }

    fn deserialize(&self, value: &str) -> Result<TestCase, HostError> {
        self.object
            .call(
                Call::Deserialize {
                    executor: self.object.handle(),
                    value: value.to_string(),
                },
                None,
            )?
            .into_test_case()
    }
}
