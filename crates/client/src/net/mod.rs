pub mod config;
pub mod ws;

pub use config::{ClientConfig, Route};
pub use ws::WsTransport;
