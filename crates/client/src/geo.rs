use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use locshare::geo::{
    GeolocationError, GeolocationProvider, LocationSample, PositionOptions, RequestId, WatchId,
    haversine_m,
};
use locshare::session::SessionKey;
use locshare::time::{Clock, SystemClock};

use crate::driver::DriverEvent;
use crate::net::Route;

/// Moves along a [`Route`] at constant speed, stopping at the last waypoint.
#[derive(Debug)]
pub struct RouteWalker {
    route: Route,
    segment_lengths: Vec<f64>,
    started: Instant,
}

impl RouteWalker {
    pub fn new(route: Route) -> Self {
        let segment_lengths = route
            .waypoints
            .windows(2)
            .map(|pair| haversine_m((pair[0][0], pair[0][1]), (pair[1][0], pair[1][1])))
            .collect();

        Self {
            route,
            segment_lengths,
            started: Instant::now(),
        }
    }

    pub fn position_at(&self, travelled_m: f64) -> (f64, f64) {
        let Some(first) = self.route.waypoints.first() else {
            return (0.0, 0.0);
        };

        let mut remaining = travelled_m.max(0.0);
        for (i, length) in self.segment_lengths.iter().enumerate() {
            if remaining <= *length {
                let from = self.route.waypoints[i];
                let to = self.route.waypoints[i + 1];
                let t = if *length > 0.0 { remaining / length } else { 0.0 };
                return (
                    from[0] + (to[0] - from[0]) * t,
                    from[1] + (to[1] - from[1]) * t,
                );
            }
            remaining -= length;
        }

        let last = self.route.waypoints.last().unwrap_or(first);
        (last[0], last[1])
    }

    pub fn sample_now(&self) -> LocationSample {
        let travelled = self.started.elapsed().as_secs_f64() * self.route.speed_mps;
        let (latitude, longitude) = self.position_at(travelled);
        LocationSample::new(
            latitude,
            longitude,
            self.route.accuracy_m,
            SystemClock.now_ms(),
        )
    }
}

/// Position source for the demo client, fed by a [`RouteWalker`].
pub struct SimulatedGeolocation {
    key: SessionKey,
    events: mpsc::UnboundedSender<DriverEvent>,
    walker: Arc<RouteWalker>,
    fix_latency: Duration,
    watch_interval: Duration,
    watch_enabled: bool,
    next_watch: u64,
    watches: HashMap<WatchId, JoinHandle<()>>,
}

impl SimulatedGeolocation {
    pub fn new(
        key: SessionKey,
        events: mpsc::UnboundedSender<DriverEvent>,
        walker: Arc<RouteWalker>,
        fix_latency: Duration,
        watch_interval: Duration,
        watch_enabled: bool,
    ) -> Self {
        Self {
            key,
            events,
            walker,
            fix_latency,
            watch_interval,
            watch_enabled,
            next_watch: 1,
            watches: HashMap::new(),
        }
    }
}

impl GeolocationProvider for SimulatedGeolocation {
    fn request_position(&mut self, request: RequestId, options: PositionOptions) {
        let key = self.key;
        let events = self.events.clone();
        let walker = self.walker.clone();
        let latency = if options.maximum_age.is_zero() {
            self.fix_latency.min(options.timeout)
        } else {
            Duration::ZERO
        };

        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            let _ = events.send(DriverEvent::Position {
                key,
                request,
                result: Ok(walker.sample_now()),
            });
        });
    }

    fn watch_position(&mut self, _options: PositionOptions) -> Result<WatchId, GeolocationError> {
        if !self.watch_enabled {
            return Err(GeolocationError::PermissionDenied);
        }

        let watch = WatchId(self.next_watch);
        self.next_watch += 1;

        let key = self.key;
        let events = self.events.clone();
        let walker = self.walker.clone();
        let period = self.watch_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let sent = events.send(DriverEvent::WatchSample {
                    key,
                    watch,
                    result: Ok(walker.sample_now()),
                });
                if sent.is_err() {
                    break;
                }
            }
        });

        log::debug!("[{}] watch {} started every {:?}", self.key, watch, period);
        self.watches.insert(watch, handle);
        Ok(watch)
    }

    fn clear_watch(&mut self, watch: WatchId) {
        if let Some(handle) = self.watches.remove(&watch) {
            handle.abort();
            log::debug!("[{}] watch {} cleared", self.key, watch);
        }
    }
}

impl Drop for SimulatedGeolocation {
    fn drop(&mut self) {
        for (_, handle) in self.watches.drain() {
            handle.abort();
        }
    }
}
