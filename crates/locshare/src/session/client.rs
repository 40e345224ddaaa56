use std::collections::VecDeque;
use std::time::Duration;

use crate::error::SessionError;
use crate::geo::{
    DistanceGate, GeolocationProvider, LocationSample, PositionOptions, RequestPurpose, Sampler,
};
use crate::net::{
    CloseCode, ConnectionState, Coordinates, Envelope, Inbound, Message, ReconnectPolicy,
    Transport, decode, format_timestamp, location_url,
};
use crate::time::{Clock, SystemClock, TimerKind, TimerQueue};

use super::config::SessionConfig;
use super::events::{DisconnectReason, SessionEvent, SessionHandler};
use super::state::{Identity, Role};

/// Location-sharing session for one (room, user) pair.
///
/// The session never performs I/O itself. The driver forwards transport
/// events (`handle_open`, `handle_frame`, `handle_close`), geolocation
/// results (`handle_position`, `handle_watch_position`) and calls `update`
/// when `next_deadline` passes. Everything the session wants to tell the
/// caller is queued as a [`SessionEvent`].
pub struct LocationSession<T, G, C = SystemClock> {
    pub(super) config: SessionConfig,
    pub(super) transport: T,
    pub(super) geolocation: G,
    pub(super) clock: C,
    pub(super) identity: Option<Identity>,
    pub(super) state: ConnectionState,
    pub(super) disconnect_reason: Option<DisconnectReason>,
    pub(super) reconnect_policy: ReconnectPolicy,
    pub(super) reconnect_attempts: u32,
    pub(super) timers: TimerQueue,
    pub(super) gate: DistanceGate,
    pub(super) sampler: Sampler,
    pub(super) last_sample: Option<LocationSample>,
    pending_events: VecDeque<SessionEvent>,
}

impl<T, G, C> LocationSession<T, G, C>
where
    T: Transport,
    G: GeolocationProvider,
    C: Clock,
{
    pub fn new(config: SessionConfig, transport: T, geolocation: G, clock: C) -> Self {
        Self {
            reconnect_policy: config.reconnect_policy(),
            gate: DistanceGate::new(config.min_movement_m),
            sampler: Sampler::new(config.fix_backoff_base, config.fix_backoff_cap),
            transport,
            geolocation,
            clock,
            identity: None,
            state: ConnectionState::Disconnected,
            disconnect_reason: None,
            reconnect_attempts: 0,
            timers: TimerQueue::new(),
            last_sample: None,
            pending_events: VecDeque::new(),
            config,
        }
    }

    pub fn connect(&mut self, identity: Identity) {
        if self.state.is_live() {
            log::debug!(
                "Ignoring connect for user {} in room {}: already {:?}",
                identity.user_id,
                identity.room_id,
                self.state
            );
            return;
        }

        log::info!(
            "Connecting user {} to room {} as {}",
            identity.user_id,
            identity.room_id,
            identity.role
        );

        self.identity = Some(identity);
        self.disconnect_reason = None;
        self.reconnect_attempts = 0;
        self.open_transport();
    }

    fn open_transport(&mut self) {
        let Some(identity) = self.identity else {
            return;
        };

        let url = match location_url(&self.config.server_url, &identity) {
            Ok(url) => url,
            Err(e) => {
                log::error!("Cannot build location endpoint: {}", e);
                self.finish(DisconnectReason::InvalidEndpoint, Some(e.into()));
                return;
            }
        };

        self.state = ConnectionState::Connecting;

        if let Err(e) = self.transport.open(&url) {
            log::warn!("Failed to open {}: {}", url, e);
            self.push_event(SessionEvent::Error(e.into()));
            self.handle_close(CloseCode::ABNORMAL);
        }
    }

    pub fn disconnect(&mut self) {
        if !self.state.is_live() && self.identity.is_none() {
            return;
        }

        self.stop_location_tracking();

        if self.state == ConnectionState::Connected {
            self.send(Message::Leave);
        }
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            self.transport.close(CloseCode::NORMAL);
        }

        log::info!("Location session disconnected");
        self.reset(DisconnectReason::Requested);
        self.push_event(SessionEvent::Disconnected {
            reason: DisconnectReason::Requested,
        });
    }

    /// Ends the session without sending anything.
    fn finish(&mut self, reason: DisconnectReason, error: Option<SessionError>) {
        self.reset(reason);

        if let Some(error) = error {
            self.push_event(SessionEvent::Error(error));
        }
        self.push_event(SessionEvent::Disconnected { reason });
    }

    fn reset(&mut self, reason: DisconnectReason) {
        self.halt_tracking();
        self.sampler.clear();
        self.timers.clear();
        self.gate.reset();
        self.identity = None;
        self.reconnect_attempts = 0;
        self.state = ConnectionState::Disconnected;
        self.disconnect_reason = Some(reason);
    }

    pub fn handle_open(&mut self) {
        if self.state != ConnectionState::Connecting {
            log::debug!("Ignoring open while {:?}", self.state);
            return;
        }
        let Some(identity) = self.identity else {
            return;
        };

        log::info!(
            "Location socket open for user {} in room {}",
            identity.user_id,
            identity.room_id
        );

        self.state = ConnectionState::Connected;
        self.reconnect_attempts = 0;
        self.push_event(SessionEvent::Connected);

        match identity.role {
            Role::Worker => {
                let request = self.sampler.register(RequestPurpose::WorkerJoin);
                let options =
                    PositionOptions::cached(self.config.fix_timeout, self.config.cached_fix_max_age);
                self.geolocation.request_position(request, options);
            }
            Role::Normal | Role::Admin => {
                self.send(Message::Join);
            }
        }

        if let Some(token) = self.sampler.token() {
            log::info!(
                "Resuming tracking for assignment {} after reconnect",
                token.assignment_id
            );
            self.gate.reset();
            self.send(Message::StartTracking {
                assignment_id: token.assignment_id,
                position: Coordinates::default(),
            });
        }

        self.schedule_keepalive();
    }

    pub fn handle_frame(&mut self, text: &str) {
        if self.state != ConnectionState::Connected {
            log::debug!("Ignoring frame while {:?}", self.state);
            return;
        }

        match decode(text) {
            Ok(inbound) => self.dispatch_inbound(inbound),
            Err(e) => {
                log::warn!("Dropping inbound frame: {}", e);
                self.push_event(SessionEvent::Error(e.into()));
            }
        }
    }

    fn dispatch_inbound(&mut self, inbound: Inbound) {
        let role = self.identity.map(|i| i.role);

        match inbound {
            Inbound::LocationUpdate(Some(location)) => {
                self.push_event(SessionEvent::LocationUpdate(location.clone()));
                self.push_event(SessionEvent::MyLocationUpdate(location.clone()));
                self.push_event(SessionEvent::WorkerLocationUpdate(location));
            }
            Inbound::LocationUpdate(None) => {
                log::debug!("location_update without usable coordinates");
            }
            Inbound::WorkerJoin(Some(location)) => {
                if role == Some(Role::Normal) {
                    self.push_event(SessionEvent::WorkerLocationUpdate(location));
                }
            }
            Inbound::WorkerJoin(None) => {
                log::debug!("worker_join without usable coordinates");
            }
            Inbound::TrackingStatus(payload) => {
                self.push_event(SessionEvent::TrackingStatus(payload));
            }
            Inbound::Leave { user_id } => {
                self.push_event(SessionEvent::WorkerLeave { user_id });
            }
            Inbound::ChatMessage(payload) => {
                self.push_event(SessionEvent::Message(payload));
            }
            Inbound::Join | Inbound::Pong => {}
            Inbound::Unknown(tag) => {
                log::debug!("Ignoring unknown message type {:?}", tag);
            }
        }
    }

    pub fn handle_close(&mut self, code: CloseCode) {
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Reconnecting => {
                log::debug!("Ignoring close {} while {:?}", code, self.state);
                return;
            }
            ConnectionState::Connecting | ConnectionState::Connected => {}
        }

        self.timers
            .cancel_where(|kind| matches!(kind, TimerKind::KeepAlive));
        let dropped = self.sampler.drop_connection_requests();
        if dropped > 0 {
            log::debug!("Dropped {} pending worker_join position request(s)", dropped);
        }

        if code.is_normal() {
            log::info!("Location socket closed normally");
            self.finish(DisconnectReason::ServerClosed, None);
            return;
        }

        if self.reconnect_policy.allows(self.reconnect_attempts) {
            self.reconnect_attempts += 1;
            let attempt = self.reconnect_attempts;
            let delay = self.reconnect_policy.delay_for(attempt);

            log::warn!(
                "Location socket closed with code {}, reconnect {}/{} in {:?}",
                code,
                attempt,
                self.reconnect_policy.max_attempts,
                delay
            );

            self.state = ConnectionState::Reconnecting;
            self.schedule_after(delay, TimerKind::Reconnect { attempt });
            self.push_event(SessionEvent::Reconnecting { attempt, delay });
        } else {
            let attempts = self.reconnect_attempts;
            log::error!("Giving up on location socket after {} reconnect attempts", attempts);
            self.finish(
                DisconnectReason::RetriesExhausted,
                Some(SessionError::RetriesExhausted { attempts }),
            );
        }
    }

    pub fn handle_transport_error(&mut self, error: crate::net::TransportError) {
        if !self.state.is_live() {
            return;
        }
        log::warn!("Transport error: {}", error);
        self.push_event(SessionEvent::Error(error.into()));
    }

    /// Fires every timer that is due on the session clock.
    pub fn update(&mut self) {
        let now = self.clock.now_ms();
        for timer in self.timers.pop_due(now) {
            self.handle_timer(timer);
        }
    }

    fn handle_timer(&mut self, timer: TimerKind) {
        match timer {
            TimerKind::Reconnect { attempt } => {
                if self.state != ConnectionState::Reconnecting || self.identity.is_none() {
                    log::debug!("Dropping stale reconnect timer (attempt {})", attempt);
                    return;
                }
                log::info!("Reconnecting location socket (attempt {})", attempt);
                self.open_transport();
            }
            TimerKind::KeepAlive => {
                if self.state == ConnectionState::Connected {
                    self.send(Message::Ping);
                    self.schedule_keepalive();
                }
            }
            TimerKind::FixRetry { token, attempt } => self.on_fix_retry(token, attempt),
            TimerKind::Heartbeat { token } => self.on_heartbeat(token),
            TimerKind::FallbackPoll { token } => self.on_fallback_poll(token),
        }
    }

    fn schedule_keepalive(&mut self) {
        let Some(interval) = self.config.keepalive_interval else {
            return;
        };
        self.timers
            .cancel_where(|kind| matches!(kind, TimerKind::KeepAlive));
        self.schedule_after(interval, TimerKind::KeepAlive);
    }

    pub(super) fn schedule_after(&mut self, delay: Duration, kind: TimerKind) {
        let deadline = self
            .clock
            .now_ms()
            .saturating_add(delay.as_millis() as u64);
        self.timers.schedule(deadline, kind);
    }

    /// Encodes and sends `message`. Messages are dropped, not queued, while
    /// the socket is not open.
    pub(super) fn send(&mut self, message: Message) -> bool {
        let Some(identity) = self.identity else {
            return false;
        };
        if self.state != ConnectionState::Connected {
            log::debug!(
                "Dropping {} while {:?}",
                message.kind().as_str(),
                self.state
            );
            return false;
        }

        let envelope = Envelope {
            room_id: identity.room_id,
            user_id: identity.user_id,
            timestamp: format_timestamp(self.clock.now_ms()),
        };

        let frame = match message.encode(&envelope) {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Failed to encode {}: {}", message.kind().as_str(), e);
                self.push_event(SessionEvent::Error(e.into()));
                return false;
            }
        };

        match self.transport.send(frame) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to send {}: {}", message.kind().as_str(), e);
                self.push_event(SessionEvent::Error(e.into()));
                false
            }
        }
    }

    pub fn send_chat(&mut self, text: impl Into<String>) -> bool {
        self.send(Message::ChatMessage { text: text.into() })
    }

    pub(super) fn push_event(&mut self, event: SessionEvent) {
        self.pending_events.push_back(event);
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = SessionEvent> + '_ {
        self.pending_events.drain(..)
    }

    pub fn dispatch_events<H: SessionHandler + ?Sized>(&mut self, handler: &mut H) {
        while let Some(event) = self.pending_events.pop_front() {
            event.dispatch(handler);
        }
    }

    pub fn pending_event_count(&self) -> usize {
        self.pending_events.len()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity
    }

    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        self.disconnect_reason
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn is_tracking(&self) -> bool {
        self.sampler.is_active()
    }

    pub fn current_assignment(&self) -> Option<u64> {
        self.sampler.assignment_id()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn gate(&self) -> &DistanceGate {
        &self.gate
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn geolocation(&self) -> &G {
        &self.geolocation
    }

    pub fn geolocation_mut(&mut self) -> &mut G {
        &mut self.geolocation
    }
}
