// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session registry - maps session ids to live bridge sessions.
//!
//! Entries are inserted fully constructed and removed on transport close or
//! process shutdown. The registry never closes session resources itself; a
//! caller that displaces an entry owns its teardown.

use crate::session::Session;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory store of active sessions, keyed by session id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its id. Returns the displaced session when
    /// the id was already taken; the caller decides its fate.
    pub fn register(&self, session: Arc<Session>) -> Option<Arc<Session>> {
        self.sessions.insert(session.id().to_string(), session)
    }

    /// Look up a session by id.
    pub fn lookup(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Remove a session by id. Removing an absent id is a no-op.
    pub fn remove(&self, id: &str) {
        self.sessions.remove(id);
    }

    /// Remove a session only if the registered entry is this exact session.
    ///
    /// After an id collision the displaced session's cleanup must not
    /// un-register its replacement.
    pub fn remove_session(&self, session: &Arc<Session>) {
        self.sessions
            .remove_if(session.id(), |_, current| Arc::ptr_eq(current, session));
    }

    /// Visit every registered session. Used by the shutdown sequence.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<Session>)) {
        for entry in self.sessions.iter() {
            f(entry.value());
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
