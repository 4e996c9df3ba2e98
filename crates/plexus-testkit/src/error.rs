//! Failures reported by the instrumentation
//!
//! Connectivity failures are transient while a network converges and are
//! retried by the polling helpers. Composition and lookup failures point at a
//! broken test setup and are returned immediately.

use plexus_stack::{StackError, TransportVariant};
use std::fmt;

/// One attribute whose observed value differs from the expectation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMismatch {
    /// Attribute name
    pub field: &'static str,
    /// Value the state demanded
    pub expected: Option<bool>,
    /// Value the remote reports
    pub actual: Option<bool>,
}

impl fmt::Display for FieldMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {:?}, found {:?}",
            self.field, self.expected, self.actual
        )
    }
}

/// Instrumentation error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TestkitError {
    /// No registry node is connected
    #[error("{stack} is not connected to any node; missing: {}", .missing.join(", "))]
    NotConnectedToAny {
        /// Stack under test
        stack: String,
        /// Registry nodes without a connected remote
        missing: Vec<String>,
    },

    /// Some, but not all, registry nodes are connected
    #[error(
        "{stack} is not fully connected; connected: [{}], missing: [{}]",
        .connected.join(", "),
        .missing.join(", ")
    )]
    NotFullyConnected {
        /// Stack under test
        stack: String,
        /// Registry nodes with a connected remote
        connected: Vec<String>,
        /// Registry nodes without one
        missing: Vec<String>,
    },

    /// Observed connectivity differs from what the check demanded
    #[error("{subject}: {detail}")]
    ConnectivityMismatch {
        /// Stack or remote the check ran against
        subject: String,
        /// Human-readable summary
        detail: String,
        /// Differing attributes, empty for count mismatches
        fields: Vec<FieldMismatch>,
    },

    /// Expected state and remote belong to different transports
    #[error("{subject}: expected a {expected} state, remote reports {observed}")]
    ShapeMismatch {
        /// Remote the check ran against
        subject: String,
        /// Transport of the expected state
        expected: TransportVariant,
        /// Transport of the remote
        observed: TransportVariant,
    },

    /// Base layer missing or repeated in a stack blueprint
    #[error("cannot compose {stack}: base layer appears {occurrences} times, expected exactly once")]
    AmbiguousComposition {
        /// Blueprint name
        stack: String,
        /// Number of base layers found
        occurrences: usize,
    },

    /// A blueprint lists layers beneath its base transport
    #[error("cannot assemble {stack}: layer {layer} is listed below the base")]
    LayerBelowBase {
        /// Blueprint name
        stack: String,
        /// First layer found below the base
        layer: String,
    },

    /// No remote with the requested name
    #[error("{stack} has no remote named {remote}")]
    UnknownRemote {
        /// Stack that was searched
        stack: String,
        /// Requested remote name
        remote: String,
    },

    /// Invalid instrumentation configuration
    #[error("invalid configuration: {message}")]
    Config {
        /// What is wrong
        message: String,
    },

    /// Failure inside the stack under test
    #[error(transparent)]
    Stack(#[from] StackError),
}

impl TestkitError {
    /// Whether a polling loop should try again after this failure
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TestkitError::NotConnectedToAny { .. }
                | TestkitError::NotFullyConnected { .. }
                | TestkitError::ConnectivityMismatch { .. }
        )
    }

    /// Configuration error with `message`
    pub fn config(message: impl Into<String>) -> Self {
        TestkitError::Config {
            message: message.into(),
        }
    }
}

/// Result alias for instrumentation operations
pub type TestkitResult<T> = Result<T, TestkitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        let transient = TestkitError::NotConnectedToAny {
            stack: "Alpha".into(),
            missing: vec!["Beta".into()],
        };
        assert!(transient.is_retryable());

        let setup = TestkitError::UnknownRemote {
            stack: "Alpha".into(),
            remote: "Omega".into(),
        };
        assert!(!setup.is_retryable());
    }

    #[test]
    fn test_partial_connectivity_message_lists_peers() {
        let err = TestkitError::NotFullyConnected {
            stack: "Alpha".into(),
            connected: vec!["Beta".into()],
            missing: vec!["Gamma".into(), "Delta".into()],
        };
        assert_eq!(
            err.to_string(),
            "Alpha is not fully connected; connected: [Beta], missing: [Gamma, Delta]"
        );
    }
}
