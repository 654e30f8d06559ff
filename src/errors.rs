use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// An error from the runt host.
#[derive(Error, Debug)]
pub enum HostError {
    /// The requested framework version cannot be resolved or loaded.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The boundary could not be created or an object could not be
    /// instantiated inside it.
    #[error("boundary error: {0}")]
    Boundary(String),

    /// An argument that cannot be carried across the boundary.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A serialized test case failed to decode.
    #[error("serialization error{}: {reason}", entry_suffix(.index))]
    Serialization {
        /// Position of the offending entry in a bulk operation.
        index: Option<usize>,
        reason: String,
    },

    /// The other side of the boundary broke the wire contract.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The boundary session or proxy has already been torn down.
    #[error("the boundary session has been disposed")]
    Disposed,

    /// The framework reported a failure while servicing a call.
    #[error("framework error: {0}")]
    Remote(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn entry_suffix(index: &Option<usize>) -> String {
    index
        .map(|idx| format!(" at entry {}", idx))
        .unwrap_or_default()
}

impl HostError {
    pub fn serialization(reason: impl Into<String>) -> Self {
        HostError::Serialization {
            index: None,
            reason: reason.into(),
        }
    }

    /// Attach the position of a failing entry to a serialization error.
    /// Other errors are returned unchanged.
    pub fn at_index(self, index: usize) -> Self {
        match self {
            HostError::Serialization { reason, .. } => HostError::Serialization {
                index: Some(index),
                reason,
            },
            other => other,
        }
    }

    /// True for failures of the channel itself, as opposed to failures the
    /// framework reported for a single call.
    pub(crate) fn breaks_session(&self) -> bool {
        matches!(
            self,
            HostError::Boundary(_) | HostError::Protocol(_) | HostError::Io(_)
        )
    }
}

/// Kinds of errors that survive a trip across the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Boundary,
    InvalidArgument,
    Serialization,
    Protocol,
    Disposed,
    Remote,
}

/// Serialized form of a [HostError] sent back by the framework host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl From<&HostError> for WireError {
    fn from(err: &HostError) -> Self {
        let (kind, message, index) = match err {
            HostError::Configuration(msg) => {
                (ErrorKind::Configuration, msg.clone(), None)
            }
            HostError::Boundary(msg) => (ErrorKind::Boundary, msg.clone(), None),
            HostError::InvalidArgument(msg) => {
                (ErrorKind::InvalidArgument, msg.clone(), None)
            }
            HostError::Serialization { index, reason } => {
                (ErrorKind::Serialization, reason.clone(), *index)
            }
            HostError::Protocol(msg) => (ErrorKind::Protocol, msg.clone(), None),
            HostError::Disposed => {
                (ErrorKind::Disposed, err.to_string(), None)
            }
            HostError::Remote(msg) => (ErrorKind::Remote, msg.clone(), None),
            HostError::Io(io_err) => {
                (ErrorKind::Remote, io_err.to_string(), None)
            }
        };
        WireError {
            kind,
            message,
            index,
        }
    }
}

impl From<WireError> for HostError {
    fn from(err: WireError) -> Self {
        let WireError {
            kind,
            message,
            index,
        } = err;
        match kind {
            ErrorKind::Configuration => HostError::Configuration(message),
            ErrorKind::Boundary => HostError::Boundary(message),
            ErrorKind::InvalidArgument => HostError::InvalidArgument(message),
            ErrorKind::Serialization => HostError::Serialization {
                index,
                reason: message,
            },
            ErrorKind::Protocol => HostError::Protocol(message),
            ErrorKind::Disposed => HostError::Disposed,
            ErrorKind::Remote => HostError::Remote(message),
        }
    }
}

// Helper method to collapse nested Results
pub trait RichResult<T, E> {
    fn collapse(self) -> Result<T, E>;
}

impl<T, E> RichResult<T, E> for Result<Result<T, E>, E> {
    fn collapse(self) -> Result<T, E> {
        match self {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_errors_name_the_failing_entry() {
        let err = HostError::serialization("bad prefix").at_index(3);
        assert_eq!(
            err.to_string(),
            "serialization error at entry 3: bad prefix"
        );
    }

    #[test]
    fn at_index_leaves_other_errors_alone() {
        let err = HostError::Disposed.at_index(1);
        assert!(matches!(err, HostError::Disposed));
    }

    #[test]
    fn wire_errors_keep_their_kind() {
        let original = HostError::Serialization {
            index: Some(2),
            reason: "unknown test".to_string(),
        };
        let back = HostError::from(WireError::from(&original));
        match back {
            HostError::Serialization { index, reason } => {
                assert_eq!(index, Some(2));
                assert_eq!(reason, "unknown test");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
