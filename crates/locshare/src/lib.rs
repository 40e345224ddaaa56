pub mod error;
pub mod geo;
pub mod net;
pub mod session;
pub mod time;

pub use error::SessionError;
pub use geo::{
    DistanceGate, GeolocationError, GeolocationProvider, LocationSample, PositionOptions,
    RequestId, WatchId, haversine_m,
};
pub use net::{
    CloseCode, ConnectionState, Coordinates, Inbound, Message, MessageType, ProtocolError,
    ReconnectPolicy, Transport, TransportError, WorkerLocation, normalize_location_payload,
};
pub use session::{
    DisconnectReason, Identity, LocationSession, Role, SessionConfig, SessionEvent,
    SessionHandler, SessionKey, SessionRegistry,
};
pub use time::{Clock, ManualClock, SystemClock};
