//! Converting test cases to and from their transportable string form.
//!
//! The string form belongs to the framework that produced the case: it is
//! only stable within one framework version and one boundary session.
use crate::{errors::HostError, test_case::TestCase};

/// Single and bulk conversion of test cases to opaque strings.
pub trait TestCaseCodec {
    fn serialize(&self, test_case: &TestCase) -> Result<String, HostError>;

    fn deserialize(&self, value: &str) -> Result<TestCase, HostError>;

    /// Decode a batch, pairing each input string with its test case.
    /// Order is preserved. A single bad entry fails the whole batch.
    fn bulk_deserialize(
        &self,
        values: Vec<String>,
    ) -> Result<Vec<(String, TestCase)>, HostError> {
        bulk_deserialize_with(values, |value| self.deserialize(value))
    }
}

/// Shared bulk loop: used by the default trait method and by the framework
/// host when it answers a bulk request in one round trip.
pub fn bulk_deserialize_with<F>(
    values: Vec<String>,
    mut decode: F,
) -> Result<Vec<(String, TestCase)>, HostError>
where
    F: FnMut(&str) -> Result<TestCase, HostError>,
{
    let mut out = Vec::with_capacity(values.len());
    for (idx, value) in values.into_iter().enumerate() {
        let test_case = decode(&value).map_err(|err| err.at_index(idx))?;
        out.push((value, test_case));
    }
    Ok(out)
}

/// A ready-made codec for framework authors: `<version>:<json>`.
///
/// Strings produced by one framework version are rejected by another.
#[derive(Debug, Clone)]
pub struct VersionedCodec {
    version: String,
}

impl VersionedCodec {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl TestCaseCodec for VersionedCodec {
    fn serialize(&self, test_case: &TestCase) -> Result<String, HostError> {
        let body = serde_json::to_string(test_case)
            .map_err(|err| HostError::serialization(err.to_string()))?;
        Ok(format!("{}:{}", self.version, body))
    }

    fn deserialize(&self, value: &str) -> Result<TestCase, HostError> {
        let (version, body) = value.split_once(':').ok_or_else(|| {
            HostError::serialization("missing framework version prefix")
        })?;
        if version != self.version {
            return Err(HostError::serialization(format!(
                "serialized by framework version {}, this framework is {}",
                version, self.version
            )));
        }
        serde_json::from_str(body)
            .map_err(|err| HostError::serialization(err.to_string()))
    }
}
