use std::time::Duration;

use serde_json::Value;

use locshare::net::WorkerLocation;
use locshare::session::{DisconnectReason, SessionHandler, SessionKey};
use locshare::SessionError;

/// Writes every session event to the log.
pub struct LogHandler {
    key: SessionKey,
}

impl LogHandler {
    pub fn new(key: SessionKey) -> Self {
        Self { key }
    }
}

fn describe(location: &WorkerLocation) -> String {
    let worker = location
        .worker_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "?".to_string());
    format!(
        "worker {} at ({:.6}, {:.6}) status {}",
        worker,
        location.latitude,
        location.longitude,
        location.status.as_deref().unwrap_or("-")
    )
}

impl SessionHandler for LogHandler {
    fn on_connected(&mut self) {
        log::info!("[{}] connected", self.key);
    }

    fn on_disconnected(&mut self, reason: DisconnectReason) {
        log::info!("[{}] {}", self.key, reason.as_str());
    }

    fn on_reconnecting(&mut self, attempt: u32, delay: Duration) {
        log::warn!(
            "[{}] connection lost, retry {} in {:?}",
            self.key,
            attempt,
            delay
        );
    }

    fn on_location_update(&mut self, location: &WorkerLocation) {
        log::info!("[{}] {}", self.key, describe(location));
    }

    fn on_tracking_status(&mut self, payload: &Value) {
        log::info!("[{}] tracking status {}", self.key, payload);
    }

    fn on_worker_leave(&mut self, user_id: Option<u64>) {
        match user_id {
            Some(id) => log::info!("[{}] user {} left", self.key, id),
            None => log::info!("[{}] a user left", self.key),
        }
    }

    fn on_message(&mut self, payload: &Value) {
        let text = payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        log::info!("[{}] message: {}", self.key, text);
    }

    fn on_error(&mut self, error: &SessionError) {
        if error.is_terminal() {
            log::error!("[{}] {}", self.key, error);
        } else {
            log::warn!("[{}] {}", self.key, error);
        }
    }
}
