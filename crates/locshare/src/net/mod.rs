mod connection;
mod endpoint;
mod protocol;
mod transport;

pub use connection::{
    CloseCode, ConnectionState, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_BASE_DELAY,
    ReconnectPolicy,
};
pub use endpoint::{EndpointError, LOCATION_PATH, location_url};
pub use protocol::{
    Coordinates, Envelope, Inbound, Message, MessageType, PAYLOAD_SCHEMA_VERSION, ProtocolError,
    TRACKING_STATUS, WorkerLocation, decode, format_timestamp, normalize_location_payload,
};
pub use transport::{Transport, TransportError};
