use crate::{
    errors::HostError,
    framework::{RemoteDiscoverer, TestFrameworkDiscoverer},
    test_case::{TestCase, TestCaseDescriptor},
};

/// Turns test cases into host-side descriptors, asking the discoverer for
/// serialized forms when they are wanted.
#[derive(Debug)]
pub struct DescriptorProvider {
    discoverer: RemoteDiscoverer,
}

impl DescriptorProvider {
    pub fn new(discoverer: RemoteDiscoverer) -> Self {
        Self { discoverer }
    }

    pub fn descriptors(
        &self,
        test_cases: &[TestCase],
        include_serialization: bool,
    ) -> Result<Vec<TestCaseDescriptor>, HostError> {
        test_cases
            .iter()
            .map(|test_case| {
                let serialization = if include_serialization {
                    Some(self.discoverer.serialize(test_case)?)
                } else {
                    None
                };
                Ok(TestCaseDescriptor::describe(test_case, serialization))
            })
            .collect()
    }
}
