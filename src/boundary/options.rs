use crate::errors::HostError;
use serde::Deserialize;
use std::{path::PathBuf, str::FromStr};

/// Whether a framework must, may, or must not be isolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationPolicy {
    /// Fail when no boundary can be established.
    Required,
    /// Isolate when possible, otherwise load in-process.
    IfAvailable,
    /// Always load in-process.
    Denied,
}

impl Default for IsolationPolicy {
    fn default() -> Self {
        IsolationPolicy::IfAvailable
    }
}

impl FromStr for IsolationPolicy {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "required" => Ok(IsolationPolicy::Required),
            "ifavailable" => Ok(IsolationPolicy::IfAvailable),
            "denied" => Ok(IsolationPolicy::Denied),
            _ => Err(HostError::Configuration(
                "Must be one of required, ifavailable, denied.".to_string(),
            )),
        }
    }
}

/// Inputs for creating a boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundaryOptions {
    /// Run the framework behind a boundary.
    pub use_boundary: bool,
    /// Fail instead of falling back to in-process instantiation.
    pub require_boundary: bool,
    /// Executable hosting the framework.
    pub target_module: Option<PathBuf>,
    /// Configuration file handed to the framework host.
    pub config_path: Option<PathBuf>,
    /// Copy the target module before starting it so the original is never
    /// held open.
    pub shadow_copy: bool,
    /// Where shadow copies go. Defaults to the system temp directory.
    pub shadow_copy_folder: Option<PathBuf>,
}

impl BoundaryOptions {
    pub fn isolated(target_module: impl Into<PathBuf>) -> Self {
        Self {
            use_boundary: true,
            target_module: Some(target_module.into()),
            ..Self::default()
        }
    }

    pub fn in_process() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: IsolationPolicy) -> Self {
        self.use_boundary = policy != IsolationPolicy::Denied;
        self.require_boundary = policy == IsolationPolicy::Required;
        self
    }
}
