use std::collections::HashMap;

use crate::geo::GeolocationProvider;
use crate::net::{ConnectionState, Transport};
use crate::time::{Clock, SystemClock};

use super::client::LocationSession;
use super::events::SessionEvent;
use super::state::SessionKey;

/// Sessions keyed by (room, user), for callers that watch several rooms.
pub struct SessionRegistry<T, G, C = SystemClock> {
    sessions: HashMap<SessionKey, LocationSession<T, G, C>>,
}

impl<T, G, C> Default for SessionRegistry<T, G, C> {
    fn default() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }
}

impl<T, G, C> SessionRegistry<T, G, C>
where
    T: Transport,
    G: GeolocationProvider,
    C: Clock,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert_with<F>(&mut self, key: SessionKey, make: F) -> &mut LocationSession<T, G, C>
    where
        F: FnOnce() -> LocationSession<T, G, C>,
    {
        self.sessions.entry(key).or_insert_with(|| {
            log::debug!("Registering session {}", key);
            make()
        })
    }

    pub fn get(&self, key: &SessionKey) -> Option<&LocationSession<T, G, C>> {
        self.sessions.get(key)
    }

    pub fn get_mut(&mut self, key: &SessionKey) -> Option<&mut LocationSession<T, G, C>> {
        self.sessions.get_mut(key)
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.contains_key(key)
    }

    /// Disconnects and removes the session for `key`. Its final events stay
    /// in the returned session's queue.
    pub fn remove(&mut self, key: &SessionKey) -> Option<LocationSession<T, G, C>> {
        let mut session = self.sessions.remove(key)?;
        session.disconnect();
        Some(session)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SessionKey> {
        self.sessions.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SessionKey, &LocationSession<T, G, C>)> {
        self.sessions.iter()
    }

    pub fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (&SessionKey, &mut LocationSession<T, G, C>)> {
        self.sessions.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn connected_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.state() == ConnectionState::Connected)
            .count()
    }

    pub fn update_all(&mut self) {
        for session in self.sessions.values_mut() {
            session.update();
        }
    }

    /// Earliest timer deadline across every session.
    pub fn next_deadline(&self) -> Option<u64> {
        self.sessions
            .values()
            .filter_map(|s| s.next_deadline())
            .min()
    }

    pub fn drain_events(&mut self) -> Vec<(SessionKey, SessionEvent)> {
        let mut events = Vec::new();
        for (key, session) in &mut self.sessions {
            events.extend(session.drain_events().map(|event| (*key, event)));
        }
        events
    }

    /// Drops sessions that have ended and have nothing left to report.
    pub fn prune_finished(&mut self) -> Vec<SessionKey> {
        let finished: Vec<SessionKey> = self
            .sessions
            .iter()
            .filter(|(_, s)| {
                s.state() == ConnectionState::Disconnected
                    && s.identity().is_none()
                    && s.pending_event_count() == 0
            })
            .map(|(key, _)| *key)
            .collect();

        for key in &finished {
            log::debug!("Pruning finished session {}", key);
            self.sessions.remove(key);
        }

        finished
    }

    pub fn disconnect_all(&mut self) {
        for session in self.sessions.values_mut() {
            session.disconnect();
        }
    }
}
