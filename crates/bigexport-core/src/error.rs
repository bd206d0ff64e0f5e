//! Error types shared by every exporter

use crate::Format;
use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Option missing, invalid or unknown
    E001InvalidConfig,
    /// E002: Encoding library for the format is not available
    E002CapabilityUnavailable,
    /// E003: Value cannot be converted to the target type
    E003Encoding,
    /// E004: Writer, file or catalog call failed
    E004BackendWrite,
    /// E005: Operation called in the wrong lifecycle state
    E005Lifecycle,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001InvalidConfig => "E001",
            Self::E002CapabilityUnavailable => "E002",
            Self::E003Encoding => "E003",
            Self::E004BackendWrite => "E004",
            Self::E005Lifecycle => "E005",
        }
    }
}

/// Errors that can occur while exporting items
///
/// Every variant is fatal to the current run. Nothing is retried internally.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Invalid configuration provided
    #[error("[{code}] Invalid configuration: {message}")]
    Configuration { code: &'static str, message: String },

    /// Encoding library not compiled in
    #[error("[{code}] Cannot export to {format}: {dependency} is not available. Rebuild with the '{feature}' feature enabled")]
    CapabilityUnavailable {
        code: &'static str,
        format: Format,
        dependency: &'static str,
        feature: &'static str,
    },

    /// A value does not fit the target schema
    #[error("[{code}] Cannot encode field '{field}': {reason}")]
    Encoding {
        code: &'static str,
        field: String,
        reason: String,
    },

    /// Underlying writer/catalog call failed
    #[error("[{code}] {format} write failed: {message}")]
    BackendWrite {
        code: &'static str,
        format: Format,
        message: String,
    },

    /// Operation not allowed in the current state
    #[error("[{code}] Cannot {operation} while exporter is {state}")]
    Lifecycle {
        code: &'static str,
        operation: &'static str,
        state: String,
    },
}

impl ExportError {
    /// Create an invalid config error with error code
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            code: ErrorCode::E001InvalidConfig.as_str(),
            message: message.into(),
        }
    }

    /// Create a capability error naming the missing dependency
    pub fn capability_unavailable(
        format: Format,
        dependency: &'static str,
        feature: &'static str,
    ) -> Self {
        Self::CapabilityUnavailable {
            code: ErrorCode::E002CapabilityUnavailable.as_str(),
            format,
            dependency,
            feature,
        }
    }

    /// Create an encoding error for a field
    pub fn encoding(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Encoding {
            code: ErrorCode::E003Encoding.as_str(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a backend write error with error code
    pub fn backend_write(format: Format, message: impl Into<String>) -> Self {
        Self::BackendWrite {
            code: ErrorCode::E004BackendWrite.as_str(),
            format,
            message: message.into(),
        }
    }

    /// Create a lifecycle error
    pub fn lifecycle(operation: &'static str, state: impl std::fmt::Display) -> Self {
        Self::Lifecycle {
            code: ErrorCode::E005Lifecycle.as_str(),
            operation,
            state: state.to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Configuration { .. } => ErrorCode::E001InvalidConfig,
            Self::CapabilityUnavailable { .. } => ErrorCode::E002CapabilityUnavailable,
            Self::Encoding { .. } => ErrorCode::E003Encoding,
            Self::BackendWrite { .. } => ErrorCode::E004BackendWrite,
            Self::Lifecycle { .. } => ErrorCode::E005Lifecycle,
        }
    }
}

/// Result type alias for ExportError
pub type Result<T> = std::result::Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_code() {
        let err = ExportError::configuration("No avro schema defined");
        assert_eq!(err.code(), ErrorCode::E001InvalidConfig);
        assert_eq!(
            err.to_string(),
            "[E001] Invalid configuration: No avro schema defined"
        );

        let err = ExportError::capability_unavailable(Format::Orc, "orc-rust", "orc");
        assert!(err.to_string().contains("orc-rust"));
        assert!(err.to_string().starts_with("[E002]"));
    }
}
