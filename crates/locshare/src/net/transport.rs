use thiserror::Error;

use super::connection::CloseCode;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("failed to open connection: {0}")]
    Open(String),
    #[error("failed to send frame: {0}")]
    Send(String),
    #[error("connection error: {0}")]
    Connection(String),
}

/// Duplex text-frame connection.
///
/// `open` only starts the connection attempt. The driver reports the outcome
/// back through `LocationSession::handle_open` / `handle_close`, and every
/// received text frame through `handle_frame`.
pub trait Transport {
    fn open(&mut self, url: &str) -> Result<(), TransportError>;

    fn send(&mut self, frame: String) -> Result<(), TransportError>;

    fn close(&mut self, code: CloseCode);
}
