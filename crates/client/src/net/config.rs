use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use locshare::session::{Role, SessionConfig};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub session: SessionConfig,
    pub user_id: u64,
    pub rooms: Vec<u64>,
    pub role: Role,
    pub assignment_id: Option<u64>,
    pub route: Route,
    pub watch_enabled: bool,
    pub watch_interval: Duration,
    pub fix_latency: Duration,
    /// Chat message sent every time a session connects.
    pub greeting: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            user_id: 1,
            rooms: vec![1],
            role: Role::Worker,
            assignment_id: None,
            route: Route::default(),
            watch_enabled: true,
            watch_interval: Duration::from_secs(2),
            fix_latency: Duration::from_millis(300),
            greeting: None,
        }
    }
}

/// Path walked by the simulated position source.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Route {
    #[serde(default = "default_speed")]
    pub speed_mps: f64,
    #[serde(default = "default_accuracy")]
    pub accuracy_m: f64,
    pub waypoints: Vec<[f64; 2]>,
}

fn default_speed() -> f64 {
    8.0
}

fn default_accuracy() -> f64 {
    12.0
}

impl Default for Route {
    fn default() -> Self {
        Self {
            speed_mps: default_speed(),
            accuracy_m: default_accuracy(),
            waypoints: vec![
                [12.9716, 77.5946],
                [12.9730, 77.5972],
                [12.9755, 77.5990],
                [12.9781, 77.6021],
            ],
        }
    }
}

impl Route {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading route {}", path.display()))?;
        let route: Route = serde_json::from_str(&text)
            .with_context(|| format!("parsing route {}", path.display()))?;

        if route.waypoints.is_empty() {
            anyhow::bail!("route {} has no waypoints", path.display());
        }
        if !(route.speed_mps.is_finite() && route.speed_mps >= 0.0) {
            anyhow::bail!("route {} has an invalid speed", path.display());
        }

        Ok(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_defaults_fill_in() {
        let route: Route = serde_json::from_str(r#"{"waypoints": [[1.0, 2.0]]}"#).unwrap();
        assert_eq!(route.speed_mps, 8.0);
        assert_eq!(route.accuracy_m, 12.0);
        assert_eq!(route.waypoints, vec![[1.0, 2.0]]);
    }

    #[test]
    fn test_default_config_is_worker() {
        let config = ClientConfig::default();
        assert_eq!(config.role, Role::Worker);
        assert_eq!(config.rooms, vec![1]);
        assert!(config.watch_enabled);
    }
}
