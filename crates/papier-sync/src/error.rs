use thiserror::Error;

use papier_shared::CodecError;
use papier_store::StoreError;

use crate::gateway::GatewayError;

/// Errors surfaced by the sync engine.  None of these are retried
/// internally; the caller decides.
#[derive(Error, Debug)]
pub enum SyncError {
    /// No credential configured, or the remote rejected the one we hold.
    /// Callers should force re-authentication rather than retry.
    #[error("Not authorized")]
    Unauthorized,

    /// The remote path does not exist.
    #[error("Remote path not found")]
    NotFound,

    /// The remote write quota is exhausted.  Callers should back off
    /// until the quota resets.
    #[error("Remote rate limit exhausted")]
    RateLimited,

    /// The held version token no longer matches remote state.  The caller
    /// must refetch before retrying; nothing is merged automatically.
    #[error("Version token mismatch: remote content changed")]
    Conflict,

    /// A remote file failed to decode as a message document.
    #[error("Malformed remote content: {0}")]
    MalformedRemoteContent(#[from] CodecError),

    /// The outgoing message could not be encoded; the sender or a tag
    /// violates the filename or header grammar.  Nothing was written.
    #[error("Unencodable message: {0}")]
    InvalidMessage(CodecError),

    /// Network / transport error, surfaced as-is.
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// Update or delete attempted on a message whose version token has
    /// never been obtained.
    #[error("Missing version token")]
    MissingVersionToken,

    /// Local store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<GatewayError> for SyncError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Unauthorized => SyncError::Unauthorized,
            GatewayError::NotFound => SyncError::NotFound,
            GatewayError::RateLimited => SyncError::RateLimited,
            GatewayError::Conflict => SyncError::Conflict,
            GatewayError::Transport(msg) => SyncError::TransportFailure(msg),
        }
    }
}
