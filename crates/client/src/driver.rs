use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use locshare::geo::{GeolocationError, LocationSample, RequestId, WatchId};
use locshare::net::{CloseCode, TransportError};
use locshare::session::{Identity, LocationSession, SessionEvent, SessionKey, SessionRegistry};
use locshare::time::{Clock, SystemClock};

use crate::geo::{RouteWalker, SimulatedGeolocation};
use crate::handler::LogHandler;
use crate::net::{ClientConfig, WsTransport};

const CLOSE_GRACE: Duration = Duration::from_millis(250);

/// Everything the async side reports back to the sessions.
#[derive(Debug)]
pub enum DriverEvent {
    Opened {
        key: SessionKey,
        generation: u64,
    },
    Frame {
        key: SessionKey,
        generation: u64,
        text: String,
    },
    Closed {
        key: SessionKey,
        generation: u64,
        code: CloseCode,
    },
    Failed {
        key: SessionKey,
        generation: u64,
        error: TransportError,
    },
    Position {
        key: SessionKey,
        request: RequestId,
        result: Result<LocationSample, GeolocationError>,
    },
    WatchSample {
        key: SessionKey,
        watch: WatchId,
        result: Result<LocationSample, GeolocationError>,
    },
}

type ClientSession = LocationSession<WsTransport, SimulatedGeolocation>;

pub struct Driver {
    config: ClientConfig,
    registry: SessionRegistry<WsTransport, SimulatedGeolocation>,
    events: mpsc::UnboundedSender<DriverEvent>,
    walker: Arc<RouteWalker>,
}

impl Driver {
    pub fn new(config: ClientConfig, events: mpsc::UnboundedSender<DriverEvent>) -> Self {
        Self {
            walker: Arc::new(RouteWalker::new(config.route.clone())),
            registry: SessionRegistry::new(),
            events,
            config,
        }
    }

    fn start(&mut self) {
        for &room_id in &self.config.rooms {
            let identity = Identity::new(self.config.user_id, room_id, self.config.role);
            let key = identity.key();

            let transport = WsTransport::new(key, self.events.clone());
            let geolocation = SimulatedGeolocation::new(
                key,
                self.events.clone(),
                self.walker.clone(),
                self.config.fix_latency,
                self.config.watch_interval,
                self.config.watch_enabled,
            );
            let session_config = self.config.session.clone();

            let session = self.registry.get_or_insert_with(key, || {
                LocationSession::new(session_config, transport, geolocation, SystemClock)
            });
            session.connect(identity);
        }
    }

    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<DriverEvent>) -> anyhow::Result<()> {
        self.start();
        self.process_events();

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            if self.registry.is_empty() {
                log::info!("No sessions left, exiting");
                break;
            }

            let wait = self
                .registry
                .next_deadline()
                .map(|deadline| Duration::from_millis(deadline.saturating_sub(SystemClock.now_ms())));

            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    self.handle(event);
                }
                _ = sleep_for(wait) => {
                    self.registry.update_all();
                }
                result = &mut shutdown => {
                    result?;
                    log::info!("Shutting down");
                    self.registry.disconnect_all();
                    self.process_events();
                    tokio::time::sleep(CLOSE_GRACE).await;
                    break;
                }
            }

            self.process_events();
        }

        Ok(())
    }

    fn handle(&mut self, event: DriverEvent) {
        match event {
            DriverEvent::Opened { key, generation } => {
                if let Some(session) = self.current(key, generation) {
                    session.handle_open();
                }
            }
            DriverEvent::Frame {
                key,
                generation,
                text,
            } => {
                if let Some(session) = self.current(key, generation) {
                    session.handle_frame(&text);
                }
            }
            DriverEvent::Closed {
                key,
                generation,
                code,
            } => {
                if let Some(session) = self.current(key, generation) {
                    session.handle_close(code);
                }
            }
            DriverEvent::Failed {
                key,
                generation,
                error,
            } => {
                if let Some(session) = self.current(key, generation) {
                    session.handle_transport_error(error);
                }
            }
            DriverEvent::Position {
                key,
                request,
                result,
            } => {
                if let Some(session) = self.registry.get_mut(&key) {
                    session.handle_position(request, result);
                }
            }
            DriverEvent::WatchSample { key, watch, result } => {
                if let Some(session) = self.registry.get_mut(&key) {
                    session.handle_watch_position(watch, result);
                }
            }
        }
    }

    /// The session for `key`, if `generation` is its current connection.
    fn current(&mut self, key: SessionKey, generation: u64) -> Option<&mut ClientSession> {
        let session = self.registry.get_mut(&key)?;
        if session.transport().generation() != generation {
            log::trace!("[{}] dropping event from connection {}", key, generation);
            return None;
        }
        Some(session)
    }

    fn process_events(&mut self) {
        loop {
            let events = self.registry.drain_events();
            if events.is_empty() {
                break;
            }

            for (key, event) in events {
                event.dispatch(&mut LogHandler::new(key));
                if event == SessionEvent::Connected {
                    self.on_connected(key);
                }
            }
        }

        for key in self.registry.prune_finished() {
            log::debug!("[{}] session removed", key);
        }
    }

    fn on_connected(&mut self, key: SessionKey) {
        let Some(session) = self.registry.get_mut(&key) else {
            return;
        };

        if let Some(text) = &self.config.greeting {
            session.send_chat(text.clone());
        }

        if let Some(assignment_id) = self.config.assignment_id
            && let Err(e) = session.start_location_tracking(assignment_id)
        {
            log::warn!("[{}] could not start tracking: {}", key, e);
        }
    }
}

async fn sleep_for(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending().await,
    }
}
