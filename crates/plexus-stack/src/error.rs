//! Stack errors

/// Errors raised by stack implementations while servicing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StackError {
    /// The inbound wire has no remaining senders
    #[error("stack {stack} is closed")]
    Closed {
        /// Name of the closed stack
        stack: String,
    },

    /// A host address could not be parsed
    #[error("invalid host address: {input}")]
    InvalidAddress {
        /// The rejected input
        input: String,
    },

    /// The remote's transport does not expose the attribute
    #[error("remote {remote} has no {field} attribute")]
    UnknownAttribute {
        /// Remote name
        remote: String,
        /// Requested attribute
        field: &'static str,
    },
}

/// Result alias for stack operations
pub type StackResult<T> = Result<T, StackError>;
