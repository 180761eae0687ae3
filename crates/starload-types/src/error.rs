//! Connector error taxonomy.

use crate::run::SourceName;

/// Failure raised by a source connector.
///
/// Connector failures are scoped to one source: the orchestrator marks
/// that source's flow `FAILED` and lets the siblings proceed. Retry is the
/// external scheduler's job, not the pipeline's.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// The source could not be reached or the fetch failed mid-flight.
    #[error("source '{source_name}' unavailable: {reason}")]
    Unavailable {
        source_name: SourceName,
        reason: String,
    },

    /// Incremental mode was requested but the source exposes no
    /// monotonically increasing modification timestamp.
    #[error("source '{source_name}' does not support incremental extraction")]
    UnsupportedMode { source_name: SourceName },

    /// The extraction exceeded the configured hard timeout.
    #[error("extraction from '{source_name}' timed out after {timeout_secs}s")]
    Timeout {
        source_name: SourceName,
        timeout_secs: u64,
    },
}

impl ConnectorError {
    /// Construct an `Unavailable` error from any displayable cause.
    #[must_use]
    pub fn unavailable(source_name: SourceName, cause: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            source_name,
            reason: cause.to_string(),
        }
    }

    /// Which source failed.
    #[must_use]
    pub fn source(&self) -> SourceName {
        match self {
            Self::Unavailable { source_name, .. }
            | Self::UnsupportedMode { source_name }
            | Self::Timeout { source_name, .. } => *source_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_names_the_source() {
        let err = ConnectorError::unavailable(SourceName::Customers, "connection refused");
        assert_eq!(err.source(), SourceName::Customers);
        let msg = err.to_string();
        assert!(msg.contains("customers"), "got: {msg}");
        assert!(msg.contains("connection refused"), "got: {msg}");
    }

    #[test]
    fn unsupported_mode_display() {
        let err = ConnectorError::UnsupportedMode {
            source_name: SourceName::Reviews,
        };
        assert!(err.to_string().contains("incremental"));
        assert_eq!(err.source(), SourceName::Reviews);
    }

    #[test]
    fn timeout_display() {
        let err = ConnectorError::Timeout {
            source_name: SourceName::Orders,
            timeout_secs: 300,
        };
        assert!(err.to_string().contains("300"));
    }
}
