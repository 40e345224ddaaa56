use thiserror::Error;
use url::{ParseError, Url};

use crate::session::Identity;

pub const LOCATION_PATH: &str = "/ws/location";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("server address has no scheme: {0:?}")]
    MissingScheme(String),
    #[error("unsupported scheme {0:?} (expected http, https, ws or wss)")]
    UnsupportedScheme(String),
    #[error("server address has no host: {0:?}")]
    MissingHost(String),
    #[error("invalid server address {address:?}: {reason}")]
    Invalid { address: String, reason: String },
}

/// Builds the location socket URL for `identity` from the configured base
/// address. `wss` is used exactly when the base is `https` or `wss`; the base
/// path, query and fragment are discarded, the port is kept.
pub fn location_url(base: &str, identity: &Identity) -> Result<String, EndpointError> {
    let base = base.trim();
    let parsed = Url::parse(base).map_err(|e| match e {
        ParseError::RelativeUrlWithoutBase => EndpointError::MissingScheme(base.to_string()),
        ParseError::EmptyHost => EndpointError::MissingHost(base.to_string()),
        other => EndpointError::Invalid {
            address: base.to_string(),
            reason: other.to_string(),
        },
    })?;

    let socket_scheme = match parsed.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
    };

    let host = parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| EndpointError::MissingHost(base.to_string()))?;

    let authority = match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    Ok(format!(
        "{}://{}{}?user_id={}&room_id={}&user_type={}",
        socket_scheme,
        authority,
        LOCATION_PATH,
        identity.user_id,
        identity.room_id,
        identity.role.as_str()
    ))
}
