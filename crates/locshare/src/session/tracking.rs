use crate::error::SessionError;
use crate::geo::{
    GeolocationError, GeolocationProvider, LocationSample, PositionOptions, RequestId,
    RequestPurpose, TrackingToken, WatchId,
};
use crate::net::{ConnectionState, Coordinates, Message, TRACKING_STATUS, Transport};
use crate::time::{Clock, TimerKind};

use super::client::LocationSession;

impl<T, G, C> LocationSession<T, G, C>
where
    T: Transport,
    G: GeolocationProvider,
    C: Clock,
{
    /// Starts sharing this device's position for `assignment_id`.
    ///
    /// Starting the assignment that is already tracked does nothing; starting
    /// a different one stops the current run first.
    pub fn start_location_tracking(&mut self, assignment_id: u64) -> Result<(), SessionError> {
        if self.state != ConnectionState::Connected {
            log::warn!(
                "Cannot start tracking assignment {} while {:?}",
                assignment_id,
                self.state
            );
            return Err(SessionError::NotConnected);
        }

        if self.sampler.assignment_id() == Some(assignment_id) {
            log::debug!("Already tracking assignment {}", assignment_id);
            return Ok(());
        }
        if self.sampler.is_active() {
            self.stop_location_tracking();
        }

        let token = self.sampler.start(assignment_id);
        self.gate.reset();

        log::info!("Starting location tracking for assignment {}", assignment_id);
        self.send(Message::StartTracking {
            assignment_id,
            position: Coordinates::default(),
        });

        self.request_initial_fix(token, 1);

        match self
            .geolocation
            .watch_position(PositionOptions::fresh(self.config.fix_timeout))
        {
            Ok(watch) => self.sampler.set_watch(watch),
            Err(e) => {
                log::warn!("Position watch unavailable ({}), polling instead", e);
                self.enter_polling(token);
            }
        }

        self.schedule_after(
            self.config.heartbeat_interval,
            TimerKind::Heartbeat { token },
        );

        Ok(())
    }

    pub fn stop_location_tracking(&mut self) {
        let Some(token) = self.sampler.token() else {
            return;
        };

        let position = self.last_sample.map(Coordinates::from).unwrap_or_default();
        self.send(Message::StopTracking {
            assignment_id: token.assignment_id,
            position,
        });
        self.halt_tracking();

        log::info!(
            "Stopped location tracking for assignment {}",
            token.assignment_id
        );
    }

    /// Tears down the current run without telling the server.
    pub(super) fn halt_tracking(&mut self) {
        let Some(stopped) = self.sampler.stop() else {
            return;
        };

        if let Some(watch) = stopped.watch {
            self.geolocation.clear_watch(watch);
        }
        self.timers
            .cancel_where(|kind| kind.tracking_token() == Some(stopped.token));
        self.last_sample = None;
    }

    /// Result of a one-shot request made through
    /// [`GeolocationProvider::request_position`].
    pub fn handle_position(
        &mut self,
        request: RequestId,
        result: Result<LocationSample, GeolocationError>,
    ) {
        let Some(purpose) = self.sampler.take(request) else {
            log::debug!("Ignoring position for request {} (no longer pending)", request);
            return;
        };

        if let Some(token) = purpose.tracking_token()
            && !self.sampler.is_current(token)
        {
            return;
        }

        match purpose {
            RequestPurpose::WorkerJoin => self.send_worker_join(result),
            RequestPurpose::InitialFix { token, attempt } => {
                self.on_initial_fix(token, attempt, result)
            }
            RequestPurpose::CachedFix { token } => match result {
                Ok(sample) => {
                    self.gate.reset();
                    self.emit_gated(sample);
                }
                Err(e) => log::warn!(
                    "No cached position for assignment {} ({}), waiting for the next sample",
                    token.assignment_id,
                    e
                ),
            },
            RequestPurpose::Heartbeat { .. } => match result {
                Ok(sample) => self.emit_forced(sample),
                Err(e) => log::debug!("Heartbeat fix failed: {}", e),
            },
            RequestPurpose::FallbackPoll { .. } => match result {
                Ok(sample) => self.emit_gated(sample),
                Err(e) => log::debug!("Fallback poll failed: {}", e),
            },
        }
    }

    /// Sample or failure delivered by a watch registered with
    /// [`GeolocationProvider::watch_position`].
    pub fn handle_watch_position(
        &mut self,
        watch: WatchId,
        result: Result<LocationSample, GeolocationError>,
    ) {
        if self.sampler.watch() != Some(watch) {
            log::debug!("Ignoring sample from stale watch {}", watch);
            return;
        }
        let Some(token) = self.sampler.token() else {
            return;
        };

        match result {
            Ok(sample) => self.emit_gated(sample),
            Err(e) => {
                log::warn!("Position watch {} failed ({}), polling instead", watch, e);
                self.geolocation.clear_watch(watch);
                self.enter_polling(token);
            }
        }
    }

    fn send_worker_join(&mut self, result: Result<LocationSample, GeolocationError>) {
        let position = match result {
            Ok(sample) => Coordinates::from(sample),
            Err(e) => {
                log::debug!("No cached position for worker_join: {}", e);
                Coordinates::default()
            }
        };
        self.send(Message::WorkerJoin { position });
    }

    fn request_initial_fix(&mut self, token: TrackingToken, attempt: u32) {
        let request = self
            .sampler
            .register(RequestPurpose::InitialFix { token, attempt });
        self.geolocation
            .request_position(request, PositionOptions::fresh(self.config.fix_timeout));
    }

    fn on_initial_fix(
        &mut self,
        token: TrackingToken,
        attempt: u32,
        result: Result<LocationSample, GeolocationError>,
    ) {
        match result {
            Ok(sample) => {
                self.gate.reset();
                self.emit_gated(sample);
            }
            Err(e) if attempt < self.config.initial_fix_attempts => {
                let delay = self.sampler.fix_retry_delay(attempt);
                log::debug!(
                    "Initial fix attempt {} failed ({}), retrying in {:?}",
                    attempt,
                    e,
                    delay
                );
                self.schedule_after(
                    delay,
                    TimerKind::FixRetry {
                        token,
                        attempt: attempt + 1,
                    },
                );
            }
            Err(e) => {
                log::warn!(
                    "No accurate fix after {} attempts ({}), asking for a cached position",
                    attempt,
                    e
                );
                let request = self.sampler.register(RequestPurpose::CachedFix { token });
                let options =
                    PositionOptions::cached(self.config.fix_timeout, self.config.cached_fix_max_age);
                self.geolocation.request_position(request, options);
            }
        }
    }

    pub(super) fn on_fix_retry(&mut self, token: TrackingToken, attempt: u32) {
        if self.sampler.is_current(token) {
            self.request_initial_fix(token, attempt);
        }
    }

    pub(super) fn on_heartbeat(&mut self, token: TrackingToken) {
        if !self.sampler.is_current(token) {
            return;
        }

        let request = self.sampler.register(RequestPurpose::Heartbeat { token });
        self.geolocation
            .request_position(request, PositionOptions::fresh(self.config.fix_timeout));
        self.schedule_after(
            self.config.heartbeat_interval,
            TimerKind::Heartbeat { token },
        );
    }

    pub(super) fn on_fallback_poll(&mut self, token: TrackingToken) {
        if !self.sampler.is_current(token) {
            return;
        }

        let request = self.sampler.register(RequestPurpose::FallbackPoll { token });
        self.geolocation
            .request_position(request, PositionOptions::fresh(self.config.fix_timeout));
        self.schedule_after(
            self.config.fallback_poll_interval,
            TimerKind::FallbackPoll { token },
        );
    }

    fn enter_polling(&mut self, token: TrackingToken) {
        self.sampler.set_polling();

        let poll = TimerKind::FallbackPoll { token };
        if !self.timers.contains(&poll) {
            self.schedule_after(self.config.fallback_poll_interval, poll);
        }
    }

    fn emit_gated(&mut self, sample: LocationSample) {
        if !self.sampler.is_active() {
            return;
        }

        if self.gate.should_emit(sample.latitude, sample.longitude) {
            self.send_location_update(sample);
        } else {
            log::trace!(
                "Skipping sample ({:.6}, {:.6}), moved less than {} m",
                sample.latitude,
                sample.longitude,
                self.gate.min_movement_m()
            );
        }
    }

    /// Heartbeat path: bypasses the gate and leaves its reference point as
    /// it was.
    fn emit_forced(&mut self, sample: LocationSample) {
        self.send_location_update(sample);
    }

    fn send_location_update(&mut self, sample: LocationSample) {
        let Some(token) = self.sampler.token() else {
            return;
        };

        self.last_sample = Some(sample);
        self.send(Message::LocationUpdate {
            assignment_id: token.assignment_id,
            position: Coordinates::from(sample),
            status: TRACKING_STATUS.to_string(),
        });
    }
}
