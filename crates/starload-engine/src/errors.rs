//! Pipeline error model.

use starload_types::ConnectorError;
use starload_warehouse::WarehouseError;

/// Categorized pipeline error.
///
/// `Connector` wraps a typed [`ConnectorError`]: the failure is scoped to
/// one source and retry is left to the external scheduler.
///
/// `Fatal` wraps an unexpected host-side failure (warehouse storage,
/// task join, config) that aborts the owning source's flow. Loads are
/// additive and idempotent, so an aborted flow is safely re-runnable.
#[derive(Debug)]
pub enum PipelineError {
    /// Typed source failure, scoped to one source.
    Connector(ConnectorError),
    /// Unexpected failure during transform or load.
    Fatal(anyhow::Error),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connector(e) => write!(f, "{e}"),
            Self::Fatal(e) => write!(f, "{e:#}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<ConnectorError> for PipelineError {
    fn from(e: ConnectorError) -> Self {
        Self::Connector(e)
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(e: anyhow::Error) -> Self {
        Self::Fatal(e)
    }
}

impl From<WarehouseError> for PipelineError {
    fn from(e: WarehouseError) -> Self {
        Self::Fatal(anyhow::Error::new(e))
    }
}

impl PipelineError {
    /// Returns the typed connector error if this is a `Connector` variant.
    #[must_use]
    pub fn as_connector_error(&self) -> Option<&ConnectorError> {
        match self {
            Self::Connector(e) => Some(e),
            Self::Fatal(_) => None,
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, PipelineError>;
