use std::time::Duration;

use serde_json::Value;

use crate::error::SessionError;
use crate::net::WorkerLocation;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected,
    Disconnected {
        reason: DisconnectReason,
    },
    Reconnecting {
        attempt: u32,
        delay: Duration,
    },
    LocationUpdate(WorkerLocation),
    /// Fired for every inbound location update alongside
    /// `WorkerLocationUpdate`; the receiver decides which one it cares about.
    MyLocationUpdate(WorkerLocation),
    WorkerLocationUpdate(WorkerLocation),
    TrackingStatus(Value),
    WorkerLeave {
        user_id: Option<u64>,
    },
    Message(Value),
    Error(SessionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Requested,
    ServerClosed,
    RetriesExhausted,
    InvalidEndpoint,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Requested => "disconnected",
            DisconnectReason::ServerClosed => "closed by server",
            DisconnectReason::RetriesExhausted => "gave up reconnecting",
            DisconnectReason::InvalidEndpoint => "invalid endpoint",
        }
    }
}

/// Callback set for session events. Every method defaults to doing nothing.
pub trait SessionHandler {
    fn on_connected(&mut self) {}

    fn on_disconnected(&mut self, _reason: DisconnectReason) {}

    fn on_reconnecting(&mut self, _attempt: u32, _delay: Duration) {}

    fn on_location_update(&mut self, _location: &WorkerLocation) {}

    fn on_my_location_update(&mut self, _location: &WorkerLocation) {}

    fn on_worker_location_update(&mut self, _location: &WorkerLocation) {}

    fn on_tracking_status(&mut self, _payload: &Value) {}

    fn on_worker_leave(&mut self, _user_id: Option<u64>) {}

    fn on_message(&mut self, _payload: &Value) {}

    fn on_error(&mut self, _error: &SessionError) {}
}

impl SessionEvent {
    pub fn dispatch<H: SessionHandler + ?Sized>(&self, handler: &mut H) {
        match self {
            SessionEvent::Connected => handler.on_connected(),
            SessionEvent::Disconnected { reason } => handler.on_disconnected(*reason),
            SessionEvent::Reconnecting { attempt, delay } => {
                handler.on_reconnecting(*attempt, *delay)
            }
            SessionEvent::LocationUpdate(location) => handler.on_location_update(location),
            SessionEvent::MyLocationUpdate(location) => handler.on_my_location_update(location),
            SessionEvent::WorkerLocationUpdate(location) => {
                handler.on_worker_location_update(location)
            }
            SessionEvent::TrackingStatus(payload) => handler.on_tracking_status(payload),
            SessionEvent::WorkerLeave { user_id } => handler.on_worker_leave(*user_id),
            SessionEvent::Message(payload) => handler.on_message(payload),
            SessionEvent::Error(error) => handler.on_error(error),
        }
    }
}
