//! Test case identities as they travel between the host and a framework.
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    hash::{Hash, Hasher},
};

/// Location of a test in its source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub file: String,
    pub line: Option<u32>,
}

/// An opaque, framework-owned identity for one executable test.
///
/// The host only carries test cases around. Two test cases are the same
/// test when their unique ids match; everything else is descriptive or
/// belongs to the framework that produced the case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    unique_id: String,
    display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<SourceInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    skip_reason: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    traits: BTreeMap<String, Vec<String>>,
    /// Framework-private payload.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    state: serde_json::Value,
}

impl TestCase {
    pub fn new(
        unique_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            unique_id: unique_id.into(),
            display_name: display_name.into(),
            class_name: None,
            method_name: None,
            source: None,
            skip_reason: None,
            traits: BTreeMap::new(),
            state: serde_json::Value::Null,
        }
    }

    pub fn with_method(
        mut self,
        class_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Self {
        self.class_name = Some(class_name.into());
        self.method_name = Some(method_name.into());
        self
    }

    pub fn with_source(mut self, file: impl Into<String>, line: Option<u32>) -> Self {
        self.source = Some(SourceInfo {
            file: file.into(),
            line,
        });
        self
    }

    pub fn with_skip_reason(mut self, reason: impl Into<String>) -> Self {
        self.skip_reason = Some(reason.into());
        self
    }

    pub fn with_trait(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.traits.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn with_state(mut self, state: serde_json::Value) -> Self {
        self.state = state;
        self
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn method_name(&self) -> Option<&str> {
        self.method_name.as_deref()
    }

    pub fn source(&self) -> Option<&SourceInfo> {
        self.source.as_ref()
    }

    pub fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }

    pub fn traits(&self) -> &BTreeMap<String, Vec<String>> {
        &self.traits
    }

    pub fn state(&self) -> &serde_json::Value {
        &self.state
    }
}

impl PartialEq for TestCase {
    fn eq(&self, other: &Self) -> bool {
        self.unique_id == other.unique_id
    }
}

impl Eq for TestCase {}

impl Hash for TestCase {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.unique_id.hash(state)
    }
}

/// A flattened, host-side description of a test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseDescriptor {
    pub unique_id: String,
    pub display_name: String,
    pub class_name: Option<String>,
    pub method_name: Option<String>,
    pub source_file: Option<String>,
    pub source_line: Option<u32>,
    pub skip_reason: Option<String>,
    pub traits: BTreeMap<String, Vec<String>>,
    /// Serialized form of the case, when requested.
    pub serialization: Option<String>,
}

impl TestCaseDescriptor {
    pub fn describe(test_case: &TestCase, serialization: Option<String>) -> Self {
        Self {
            unique_id: test_case.unique_id.clone(),
            display_name: test_case.display_name.clone(),
            class_name: test_case.class_name.clone(),
            method_name: test_case.method_name.clone(),
            source_file: test_case.source.as_ref().map(|s| s.file.clone()),
            source_line: test_case.source.as_ref().and_then(|s| s.line),
            skip_reason: test_case.skip_reason.clone(),
            traits: test_case.traits.clone(),
            serialization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_the_unique_id() {
        let a = TestCase::new("Math.add", "add").with_trait("speed", "fast");
        let b = TestCase::new("Math.add", "Math.add (renamed)");
        assert_eq!(a, b);
        assert_ne!(a, TestCase::new("Math.sub", "add"));
    }

    #[test]
    fn descriptors_flatten_source_info() {
        let case = TestCase::new("Math.add", "add")
            .with_method("Math", "add")
            .with_source("tests/math.rs", Some(12));
        let desc = TestCaseDescriptor::describe(&case, None);
        assert_eq!(desc.class_name.as_deref(), Some("Math"));
        assert_eq!(desc.source_file.as_deref(), Some("tests/math.rs"));
        assert_eq!(desc.source_line, Some(12));
        assert!(desc.serialization.is_none());
    }
}
