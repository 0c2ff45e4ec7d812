use crate::fault::ServerFault;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    /// The request never produced an HTTP response.
    #[error("Transport error: {0}")]
    Transport(ServerFault),

    /// The server answered with an error status; the nested error chain is flattened.
    #[error("{0}")]
    ServerFault(ServerFault),

    #[error("Metadata query failed for: {url}; {reason}")]
    MetadataShape { url: String, reason: String },

    #[error("Metadata query failed for {url}; Unable to process returned metadata: {reason}")]
    MetadataImport { url: String, reason: String },

    #[error("Batch fault: {0}")]
    BatchFault(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl AdapterError {
    /// Returns the normalized fault for transport and server failures.
    pub fn fault(&self) -> Option<&ServerFault> {
        match self {
            Self::Transport(fault) | Self::ServerFault(fault) => Some(fault),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AdapterError>;

impl From<ServerFault> for AdapterError {
    fn from(fault: ServerFault) -> Self {
        if fault.status.is_none() {
            Self::Transport(fault)
        } else {
            Self::ServerFault(fault)
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for AdapterError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
