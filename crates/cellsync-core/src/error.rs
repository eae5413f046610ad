//! Error types for graph synchronization.

use thiserror::Error;

/// Errors raised by the mapping and graph layers.
///
/// These are programming errors: a duplicated id or a missing cell means the
/// scene graph and the external records no longer describe the same diagram,
/// so callers are expected to fail fast rather than recover.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Duplicate cell id: {0}")]
    DuplicateCellId(String),
    #[error("Duplicate port id `{port}` on cell `{cell}`")]
    DuplicatePortId { cell: String, port: String },
    #[error("Cell not found: {0}")]
    MissingCell(String),
    #[error("Port `{port}` on cell `{cell}` has no port group `{group}`")]
    MissingPortGroupContext {
        cell: String,
        port: String,
        group: String,
    },
    #[error("Field `{field}` of {entity} records has no classification")]
    UnclassifiedField { entity: &'static str, field: String },
    #[error("Field `{field}` is built into {entity} records and cannot be reclassified")]
    ReservedField { entity: &'static str, field: String },
    #[error("Graph is borrowed elsewhere")]
    GraphBusy,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("CRDT error: {0}")]
    Crdt(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<loro::LoroError> for SyncError {
    fn from(err: loro::LoroError) -> Self {
        SyncError::Crdt(err.to_string())
    }
}

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;
