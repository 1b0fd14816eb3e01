//! Error types for management dispatch and open-type conversion

/// Result type for management calls
pub type MgmtResult<T> = Result<T, MgmtError>;

/// How bad a failure escaping a native accessor is.
///
/// `Fatal` covers failures the VM cannot recover from on its own (a panic
/// inside an accessor, a corrupted native structure). `Recoverable` covers
/// transient failures where retrying later may succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// The native side is in an unknown state
    Fatal,
    /// The call failed but the native side is consistent
    Recoverable,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Fatal => write!(f, "fatal"),
            Severity::Recoverable => write!(f, "recoverable"),
        }
    }
}

/// Management error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MgmtError {
    /// No readable (or writable) attribute with this name
    #[error("Attribute not found: {attribute} on {interface}")]
    AttributeNotFound {
        /// Bean interface name
        interface: String,
        /// Requested attribute name
        attribute: String,
    },

    /// No operation with this name and signature
    #[error("Operation not found: {operation}({signature}) on {interface}")]
    OperationNotFound {
        /// Bean interface name
        interface: String,
        /// Requested operation name
        operation: String,
        /// Comma-separated signature that was requested
        signature: String,
    },

    /// The value given to a setter does not match the declared type
    #[error("Invalid value for attribute {attribute}: {reason}")]
    InvalidAttributeValue {
        /// Attribute name
        attribute: String,
        /// What was wrong with the value
        reason: String,
    },

    /// An operation argument does not match its parameter type
    #[error("Invalid argument {index} for operation {operation}: {reason}")]
    InvalidArgument {
        /// Operation name
        operation: String,
        /// Zero-based argument position
        index: usize,
        /// What was wrong with the argument
        reason: String,
    },

    /// A composite or tabular value does not match the expected schema
    #[error("Malformed {type_name} record: {reason}")]
    MalformedRecord {
        /// Name of the record kind being reconstructed
        type_name: String,
        /// Missing, extra or mistyped field
        reason: String,
    },

    /// The listener has no matching registration
    #[error("Listener not found")]
    ListenerNotFound,

    /// The VM does not implement the requested capability
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// An unexpected failure escaped a native accessor call
    #[error("Native invocation failed ({severity}): {message}")]
    NativeInvocationFailure {
        /// Fatal or recoverable
        severity: Severity,
        /// Failure description
        message: String,
    },
}

impl MgmtError {
    /// Shorthand for a `MalformedRecord` error
    pub fn malformed(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        MgmtError::MalformedRecord {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an `InvalidAttributeValue` error
    pub fn invalid_value(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        MgmtError::InvalidAttributeValue {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a fatal `NativeInvocationFailure`
    pub fn fatal(message: impl Into<String>) -> Self {
        MgmtError::NativeInvocationFailure {
            severity: Severity::Fatal,
            message: message.into(),
        }
    }

    /// True for failures that should stop a caller from retrying
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MgmtError::NativeInvocationFailure {
                severity: Severity::Fatal,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MgmtError::AttributeNotFound {
            interface: "java.lang.management.MemoryMXBean".to_string(),
            attribute: "Bogus".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Attribute not found: Bogus on java.lang.management.MemoryMXBean"
        );

        let err = MgmtError::malformed("MemoryUsage", "missing field `max`");
        assert_eq!(err.to_string(), "Malformed MemoryUsage record: missing field `max`");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(MgmtError::fatal("boom").is_fatal());
        let recoverable = MgmtError::NativeInvocationFailure {
            severity: Severity::Recoverable,
            message: "busy".to_string(),
        };
        assert!(!recoverable.is_fatal());
        assert!(!MgmtError::ListenerNotFound.is_fatal());
    }
}
