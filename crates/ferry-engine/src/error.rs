use ferry_storage::SourceError;
use ferry_transport::TransportError;
use thiserror::Error;

/// Engine failure surface.
///
/// `AuthenticationRejected` is never produced by a retry exhaustion: the
/// destination refusing credentials is surfaced on first sight, since the
/// session-issued material may have just lapsed and repeating the handshake
/// cannot help.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Source object unreadable: {0}")]
    SourceUnreadable(String),

    #[error("Destination unreachable: {0}")]
    DestinationUnreachable(String),

    #[error("Destination rejected credentials: {0}")]
    AuthenticationRejected(String),

    #[error("Checksum unavailable: {0}")]
    ChecksumUnavailable(String),
}

impl EngineError {
    /// Whether a whole-phase retry by the orchestrator is worthwhile.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::DestinationUnreachable(_))
    }
}

pub(crate) fn from_source(err: SourceError) -> EngineError {
    EngineError::SourceUnreadable(err.to_string())
}

pub(crate) fn from_transport(err: TransportError) -> EngineError {
    match err {
        TransportError::AuthRejected(msg) => EngineError::AuthenticationRejected(msg),
        other => EngineError::DestinationUnreachable(other.to_string()),
    }
}
