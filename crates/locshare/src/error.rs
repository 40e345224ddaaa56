use thiserror::Error;

use crate::net::{EndpointError, ProtocolError, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("invalid server endpoint: {0}")]
    InvalidEndpoint(#[from] EndpointError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("dropped inbound frame: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("gave up reconnecting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
    #[error("session is not connected")]
    NotConnected,
}

impl SessionError {
    /// Whether the session stopped for good because of this error.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. } | Self::InvalidEndpoint(_))
    }
}
