//! Bookkeeping for an active tracking run: which assignment is tracked,
//! how samples are being collected, and which provider requests are still
//! outstanding.
//!
//! Every deferred piece of work (position request, retry timer, heartbeat)
//! carries the [`TrackingToken`] it was started under. A result whose token
//! is no longer current is dropped by the session, which is what makes a
//! stop racing an in-flight callback a no-op.

use std::collections::HashMap;
use std::time::Duration;

use super::provider::{RequestId, WatchId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackingToken {
    pub assignment_id: u64,
    /// Incremented on every start, so restarting the same assignment still
    /// invalidates work from the previous run.
    pub epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPurpose {
    WorkerJoin,
    InitialFix { token: TrackingToken, attempt: u32 },
    CachedFix { token: TrackingToken },
    Heartbeat { token: TrackingToken },
    FallbackPoll { token: TrackingToken },
}

impl RequestPurpose {
    pub fn tracking_token(&self) -> Option<TrackingToken> {
        match self {
            Self::WorkerJoin => None,
            Self::InitialFix { token, .. }
            | Self::CachedFix { token }
            | Self::Heartbeat { token }
            | Self::FallbackPoll { token } => Some(*token),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    /// Tracking started, watch not registered yet.
    Pending,
    Watching(WatchId),
    /// Watch failed; samples come from the fallback poll timer only.
    Polling,
}

#[derive(Debug, Clone, Copy)]
struct ActiveTracking {
    token: TrackingToken,
    mode: SamplingMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoppedTracking {
    pub token: TrackingToken,
    pub watch: Option<WatchId>,
}

#[derive(Debug)]
pub struct Sampler {
    active: Option<ActiveTracking>,
    epoch: u64,
    next_request: u64,
    pending: HashMap<RequestId, RequestPurpose>,
    fix_backoff_base: Duration,
    fix_backoff_cap: Duration,
}

impl Sampler {
    pub fn new(fix_backoff_base: Duration, fix_backoff_cap: Duration) -> Self {
        Self {
            active: None,
            epoch: 0,
            next_request: 1,
            pending: HashMap::new(),
            fix_backoff_base,
            fix_backoff_cap,
        }
    }

    pub fn start(&mut self, assignment_id: u64) -> TrackingToken {
        self.epoch = self.epoch.wrapping_add(1);
        let token = TrackingToken {
            assignment_id,
            epoch: self.epoch,
        };

        self.active = Some(ActiveTracking {
            token,
            mode: SamplingMode::Pending,
        });

        token
    }

    pub fn stop(&mut self) -> Option<StoppedTracking> {
        let active = self.active.take()?;

        self.pending
            .retain(|_, purpose| purpose.tracking_token() != Some(active.token));

        let watch = match active.mode {
            SamplingMode::Watching(watch) => Some(watch),
            SamplingMode::Pending | SamplingMode::Polling => None,
        };

        Some(StoppedTracking {
            token: active.token,
            watch,
        })
    }

    /// Stops tracking and forgets every outstanding request, including ones
    /// not tied to tracking.
    pub fn clear(&mut self) -> Option<StoppedTracking> {
        let stopped = self.stop();
        self.pending.clear();
        stopped
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn token(&self) -> Option<TrackingToken> {
        self.active.map(|a| a.token)
    }

    pub fn assignment_id(&self) -> Option<u64> {
        self.active.map(|a| a.token.assignment_id)
    }

    pub fn is_current(&self, token: TrackingToken) -> bool {
        self.token() == Some(token)
    }

    pub fn mode(&self) -> Option<SamplingMode> {
        self.active.map(|a| a.mode)
    }

    pub fn watch(&self) -> Option<WatchId> {
        match self.mode() {
            Some(SamplingMode::Watching(watch)) => Some(watch),
            _ => None,
        }
    }

    pub fn set_watch(&mut self, watch: WatchId) {
        if let Some(active) = &mut self.active {
            active.mode = SamplingMode::Watching(watch);
        }
    }

    pub fn set_polling(&mut self) {
        if let Some(active) = &mut self.active {
            active.mode = SamplingMode::Polling;
        }
    }

    pub fn register(&mut self, purpose: RequestPurpose) -> RequestId {
        let id = RequestId(self.next_request);
        self.next_request = self.next_request.wrapping_add(1);
        self.pending.insert(id, purpose);
        id
    }

    pub fn take(&mut self, request: RequestId) -> Option<RequestPurpose> {
        self.pending.remove(&request)
    }

    /// Forgets requests whose result only makes sense on the connection
    /// that issued them.
    pub fn drop_connection_requests(&mut self) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|_, purpose| *purpose != RequestPurpose::WorkerJoin);
        before - self.pending.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Delay before the next initial-fix attempt after `failed_attempt`
    /// (1-based) failed.
    pub fn fix_retry_delay(&self, failed_attempt: u32) -> Duration {
        let exp = failed_attempt.saturating_sub(1).min(16);
        self.fix_backoff_base
            .saturating_mul(1u32 << exp)
            .min(self.fix_backoff_cap)
    }
}
