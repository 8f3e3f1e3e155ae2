// error.rs — Error taxonomy for graph construction, transformation, and compute
//
// Every error here signals a programmer or model-author mistake. Nothing in
// this crate retries or recovers; errors propagate to the caller with `?`.

use crate::port::PortType;

/// Errors raised by the model layer.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Bad index, unknown name, or malformed PortElements.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A typed compute call or a port connection used the wrong value type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: PortType, found: PortType },

    /// The graph or map is not in a state that permits the operation.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A construct that is deliberately unsupported.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// An archive entity carries a version outside the accepted range.
    #[error("unsupported {entity} archive version {version}")]
    UnsupportedVersion { entity: String, version: u32 },

    /// The archive JSON could not be produced or parsed.
    #[error("archive error: {0}")]
    Archive(#[from] serde_json::Error),
}

impl ModelError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ModelError::InvalidArgument(msg.into())
    }

    pub fn illegal(msg: impl Into<String>) -> Self {
        ModelError::IllegalState(msg.into())
    }

    pub fn mismatch(expected: PortType, found: PortType) -> Self {
        ModelError::TypeMismatch { expected, found }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
