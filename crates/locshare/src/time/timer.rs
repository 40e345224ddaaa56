use crate::geo::TrackingToken;

pub type TimerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Reconnect { attempt: u32 },
    KeepAlive,
    FixRetry { token: TrackingToken, attempt: u32 },
    Heartbeat { token: TrackingToken },
    FallbackPoll { token: TrackingToken },
}

impl TimerKind {
    pub fn tracking_token(&self) -> Option<TrackingToken> {
        match self {
            Self::FixRetry { token, .. } | Self::Heartbeat { token } | Self::FallbackPoll { token } => {
                Some(*token)
            }
            Self::Reconnect { .. } | Self::KeepAlive => None,
        }
    }
}

#[derive(Debug, Clone)]
struct ScheduledTimer {
    id: TimerId,
    deadline_ms: u64,
    kind: TimerKind,
}

/// Pending deadlines, fired in deadline order (ties in scheduling order).
#[derive(Debug, Default)]
pub struct TimerQueue {
    timers: Vec<ScheduledTimer>,
    next_id: TimerId,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, deadline_ms: u64, kind: TimerKind) -> TimerId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        self.timers.push(ScheduledTimer {
            id,
            deadline_ms,
            kind,
        });

        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    pub fn cancel_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&TimerKind) -> bool,
    {
        let before = self.timers.len();
        self.timers.retain(|t| !predicate(&t.kind));
        before - self.timers.len()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.iter().map(|t| t.deadline_ms).min()
    }

    /// Removes and returns every timer whose deadline is at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Vec<TimerKind> {
        let mut due: Vec<ScheduledTimer> = Vec::new();
        let mut i = 0;
        while i < self.timers.len() {
            if self.timers[i].deadline_ms <= now_ms {
                due.push(self.timers.swap_remove(i));
            } else {
                i += 1;
            }
        }

        due.sort_by_key(|t| (t.deadline_ms, t.id));
        due.into_iter().map(|t| t.kind).collect()
    }

    pub fn contains(&self, kind: &TimerKind) -> bool {
        self.timers.iter().any(|t| &t.kind == kind)
    }

    pub fn deadline_of(&self, kind: &TimerKind) -> Option<u64> {
        self.timers
            .iter()
            .find(|t| &t.kind == kind)
            .map(|t| t.deadline_ms)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(assignment_id: u64) -> TrackingToken {
        TrackingToken {
            assignment_id,
            epoch: 1,
        }
    }

    #[test]
    fn test_pop_due_in_deadline_order() {
        let mut timers = TimerQueue::new();
        timers.schedule(300, TimerKind::KeepAlive);
        timers.schedule(100, TimerKind::Reconnect { attempt: 1 });
        timers.schedule(200, TimerKind::Heartbeat { token: token(1) });
        timers.schedule(900, TimerKind::FallbackPoll { token: token(1) });

        let due = timers.pop_due(300);
        assert_eq!(
            due,
            vec![
                TimerKind::Reconnect { attempt: 1 },
                TimerKind::Heartbeat { token: token(1) },
                TimerKind::KeepAlive,
            ]
        );
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.next_deadline(), Some(900));
    }

    #[test]
    fn test_cancel_by_id() {
        let mut timers = TimerQueue::new();
        let id = timers.schedule(100, TimerKind::KeepAlive);

        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));
        assert!(timers.pop_due(1_000).is_empty());
    }

    #[test]
    fn test_cancel_where_tracking_token() {
        let mut timers = TimerQueue::new();
        timers.schedule(100, TimerKind::Heartbeat { token: token(1) });
        timers.schedule(100, TimerKind::FixRetry { token: token(1), attempt: 2 });
        timers.schedule(100, TimerKind::Heartbeat { token: token(2) });
        timers.schedule(100, TimerKind::KeepAlive);

        let removed = timers.cancel_where(|k| k.tracking_token() == Some(token(1)));
        assert_eq!(removed, 2);
        assert!(timers.contains(&TimerKind::Heartbeat { token: token(2) }));
        assert!(timers.contains(&TimerKind::KeepAlive));
    }

    #[test]
    fn test_empty_queue_has_no_deadline() {
        let timers = TimerQueue::new();
        assert!(timers.is_empty());
        assert_eq!(timers.next_deadline(), None);
    }
}
