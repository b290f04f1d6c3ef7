//! Session registry.
//!
//! Authoritative `SessionId -> Session` map. Only the tick loop holds it, so
//! it needs no lock.

use std::collections::HashMap;

use anyhow::Context;
use arena_shared::{error::NetError, net::SessionId};
use bytes::Bytes;
use tracing::debug;

use crate::{session::Session, simulation::Inputs};

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    last_id: u32,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out the next id. Ids increase monotonically and are never reused,
    /// so the id space running out is an error rather than a wrap.
    pub fn allocate_id(&mut self) -> anyhow::Result<SessionId> {
        let next = self
            .last_id
            .checked_add(1)
            .context("session id space exhausted")?;
        self.last_id = next;
        Ok(SessionId(next))
    }

    pub fn insert(&mut self, session: Session) {
        self.sessions.insert(session.id(), session);
    }

    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        self.sessions.remove(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions in ascending id order.
    pub fn sorted(&self) -> Vec<&Session> {
        let mut out: Vec<&Session> = self.sessions.values().collect();
        out.sort_by_key(|s| s.id());
        out
    }

    /// Flags a session for removal at the next reap.
    pub fn mark_disconnected(&self, id: SessionId) -> bool {
        match self.sessions.get(&id) {
            Some(session) => {
                session.mark_disconnected();
                true
            }
            None => false,
        }
    }

    /// Latest command of every live session.
    pub fn collect_inputs(&self) -> Inputs {
        self.sessions
            .values()
            .filter(|s| !s.is_disconnected())
            .map(|s| (s.id(), s.latest_command()))
            .collect()
    }

    /// Offers `frame` to every live session except `skip`.
    ///
    /// Never blocks. Returns the sessions that are now flagged, either
    /// because the offer failed or because they already were.
    pub fn broadcast_except(&self, skip: Option<SessionId>, frame: &Bytes) -> Vec<SessionId> {
        let mut flagged = Vec::new();
        for session in self.sessions.values() {
            if Some(session.id()) == skip {
                continue;
            }
            match session.try_send(frame.clone()) {
                Ok(()) => {}
                Err(NetError::QueueSaturated) => {
                    debug!(session_id = %session.id(), "outbound queue saturated");
                    flagged.push(session.id());
                }
                Err(_) => flagged.push(session.id()),
            }
        }
        flagged
    }

    pub fn broadcast(&self, frame: &Bytes) -> Vec<SessionId> {
        self.broadcast_except(None, frame)
    }

    /// Removes every flagged session. The only removal path besides `drain`.
    pub fn reap(&mut self) -> Vec<Session> {
        let dead: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| s.is_disconnected())
            .map(Session::id)
            .collect();
        let mut removed: Vec<Session> = dead.into_iter().filter_map(|id| self.remove(id)).collect();
        removed.sort_by_key(Session::id);
        removed
    }

    /// Removes every session.
    pub fn drain(&mut self) -> Vec<Session> {
        self.sessions.drain().map(|(_, s)| s).collect()
    }
}
