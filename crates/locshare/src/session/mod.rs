mod client;
mod config;
mod events;
mod registry;
mod state;
mod tracking;

pub use client::LocationSession;
pub use config::{
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_MIN_MOVEMENT_M, DEFAULT_SERVER_URL, SessionConfig,
};
pub use events::{DisconnectReason, SessionEvent, SessionHandler};
pub use registry::SessionRegistry;
pub use state::{Identity, Role, SessionKey};
