//! JSON wire protocol for the location socket.
//!
//! Every frame is one JSON object with a common envelope
//! `{type, room_id, user_id, timestamp}` plus type-specific fields.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::geo::LocationSample;

/// Version of the inbound location payload layout understood by
/// [`normalize_location_payload`].
pub const PAYLOAD_SCHEMA_VERSION: u32 = 1;

/// `status` field carried by outbound location updates.
pub const TRACKING_STATUS: &str = "tracking";

const MAX_PAYLOAD_NESTING: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Join,
    Leave,
    WorkerJoin,
    StartTracking,
    StopTracking,
    LocationUpdate,
    TrackingStatus,
    ChatMessage,
    Ping,
    Pong,
}

impl MessageType {
    pub const ALL: [MessageType; 10] = [
        Self::Join,
        Self::Leave,
        Self::WorkerJoin,
        Self::StartTracking,
        Self::StopTracking,
        Self::LocationUpdate,
        Self::TrackingStatus,
        Self::ChatMessage,
        Self::Ping,
        Self::Pong,
    ];

    /// Wire value of the `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Leave => "leave",
            Self::WorkerJoin => "worker_join",
            Self::StartTracking => "start_tracking",
            Self::StopTracking => "stop_tracking",
            Self::LocationUpdate => "location_update",
            Self::TrackingStatus => "tracking_status",
            Self::ChatMessage => "message",
            Self::Ping => "ping",
            Self::Pong => "pong",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
}

impl From<LocationSample> for Coordinates {
    fn from(sample: LocationSample) -> Self {
        Self {
            latitude: sample.latitude,
            longitude: sample.longitude,
            accuracy: sample.accuracy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub room_id: u64,
    pub user_id: u64,
    pub timestamp: String,
}

/// Messages this client sends.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Join,
    Leave,
    WorkerJoin {
        position: Coordinates,
    },
    StartTracking {
        assignment_id: u64,
        position: Coordinates,
    },
    StopTracking {
        assignment_id: u64,
        position: Coordinates,
    },
    LocationUpdate {
        assignment_id: u64,
        position: Coordinates,
        status: String,
    },
    ChatMessage {
        text: String,
    },
    Ping,
}

#[derive(Serialize)]
struct WireFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    room_id: u64,
    user_id: u64,
    timestamp: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignment_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

impl<'a> WireFrame<'a> {
    fn new(kind: MessageType, envelope: &'a Envelope) -> Self {
        Self {
            kind: kind.as_str(),
            room_id: envelope.room_id,
            user_id: envelope.user_id,
            timestamp: &envelope.timestamp,
            assignment_id: None,
            latitude: None,
            longitude: None,
            accuracy: None,
            status: None,
            message: None,
        }
    }

    fn with_position(mut self, position: &Coordinates) -> Self {
        self.latitude = Some(position.latitude);
        self.longitude = Some(position.longitude);
        self.accuracy = Some(position.accuracy);
        self
    }
}

impl Message {
    pub fn kind(&self) -> MessageType {
        match self {
            Self::Join => MessageType::Join,
            Self::Leave => MessageType::Leave,
            Self::WorkerJoin { .. } => MessageType::WorkerJoin,
            Self::StartTracking { .. } => MessageType::StartTracking,
            Self::StopTracking { .. } => MessageType::StopTracking,
            Self::LocationUpdate { .. } => MessageType::LocationUpdate,
            Self::ChatMessage { .. } => MessageType::ChatMessage,
            Self::Ping => MessageType::Ping,
        }
    }

    pub fn encode(&self, envelope: &Envelope) -> Result<String, ProtocolError> {
        let frame = WireFrame::new(self.kind(), envelope);
        let frame = match self {
            Self::Join | Self::Leave | Self::Ping => frame,
            Self::WorkerJoin { position } => frame.with_position(position),
            Self::StartTracking {
                assignment_id,
                position,
            }
            | Self::StopTracking {
                assignment_id,
                position,
            } => WireFrame {
                assignment_id: Some(*assignment_id),
                ..frame.with_position(position)
            },
            Self::LocationUpdate {
                assignment_id,
                position,
                status,
            } => WireFrame {
                assignment_id: Some(*assignment_id),
                status: Some(status.as_str()),
                ..frame.with_position(position)
            },
            Self::ChatMessage { text } => WireFrame {
                message: Some(text.as_str()),
                ..frame
            },
        };

        serde_json::to_string(&frame).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

/// Location of a worker as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerLocation {
    pub worker_id: Option<u64>,
    pub assignment_id: Option<u64>,
    pub booking_id: Option<u64>,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub status: Option<String>,
    pub last_updated: Option<String>,
}

/// Messages this client receives, already classified by tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// `None` when the payload carried no usable coordinates.
    LocationUpdate(Option<WorkerLocation>),
    TrackingStatus(Value),
    WorkerJoin(Option<WorkerLocation>),
    Leave { user_id: Option<u64> },
    ChatMessage(Value),
    Join,
    Pong,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("failed to encode frame: {0}")]
    Encode(String),
}

pub fn decode(text: &str) -> Result<Inbound, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    let object = value.as_object().ok_or(ProtocolError::NotAnObject)?;
    let tag = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?;

    let inbound = match MessageType::from_tag(tag) {
        Some(MessageType::LocationUpdate) => Inbound::LocationUpdate(worker_location(&value)),
        Some(MessageType::WorkerJoin) => Inbound::WorkerJoin(worker_location(&value)),
        Some(MessageType::TrackingStatus) => Inbound::TrackingStatus(value),
        Some(MessageType::ChatMessage) => Inbound::ChatMessage(value),
        Some(MessageType::Leave) => Inbound::Leave {
            user_id: leave_user_id(&value),
        },
        Some(MessageType::Join) => Inbound::Join,
        Some(MessageType::Pong) => Inbound::Pong,
        _ => Inbound::Unknown(tag.to_string()),
    };

    Ok(inbound)
}

/// Locates the object carrying the location fields of an inbound message.
///
/// Schema version 1 ([`PAYLOAD_SCHEMA_VERSION`]): the fields may sit on the
/// message itself, under `data`, or under `data.data`. The deepest level that
/// has a `latitude` or `longitude` key wins; if none has one, the deepest
/// object is returned so callers still see the server's ids and status.
pub fn normalize_location_payload(message: &Value) -> &Value {
    let mut levels = vec![message];
    let mut current = message;
    for _ in 0..MAX_PAYLOAD_NESTING {
        match current.get("data") {
            Some(inner) if inner.is_object() => {
                levels.push(inner);
                current = inner;
            }
            _ => break,
        }
    }

    levels
        .iter()
        .rev()
        .find(|level| level.get("latitude").is_some() || level.get("longitude").is_some())
        .copied()
        .unwrap_or(current)
}

fn worker_location(message: &Value) -> Option<WorkerLocation> {
    let payload = normalize_location_payload(message);

    let latitude = finite_number(payload.get("latitude"))?;
    let longitude = finite_number(payload.get("longitude"))?;

    let worker_id = id_field(payload.get("worker_id"))
        .or_else(|| id_field(payload.get("user_id")))
        .or_else(|| id_field(message.get("user_id")));

    let last_updated = payload
        .get("last_updated")
        .or_else(|| payload.get("timestamp"))
        .or_else(|| message.get("timestamp"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(WorkerLocation {
        worker_id,
        assignment_id: id_field(payload.get("assignment_id")),
        booking_id: id_field(payload.get("booking_id")),
        latitude,
        longitude,
        accuracy: finite_number(payload.get("accuracy")),
        status: payload
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string),
        last_updated,
    })
}

fn leave_user_id(message: &Value) -> Option<u64> {
    id_field(message.get("user_id"))
        .or_else(|| id_field(normalize_location_payload(message).get("user_id")))
}

fn finite_number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64).filter(|v| v.is_finite())
}

/// Ids arrive as numbers from most endpoints and as strings from some.
fn id_field(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn format_timestamp(ms: u64) -> String {
    let millis = i64::try_from(ms).unwrap_or(i64::MAX);
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
