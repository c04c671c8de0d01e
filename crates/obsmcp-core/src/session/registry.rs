//! Live session map

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::error::{SessionError, SessionResult};
use super::transport::SessionTransport;
use crate::logging::Logger;
use crate::mcp::ProtocolEngine;

/// A transport and the protocol engine bound to it
pub struct Session {
    id: String,
    transport: Arc<SessionTransport>,
    engine: Arc<ProtocolEngine>,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(transport: Arc<SessionTransport>, engine: Arc<ProtocolEngine>) -> Self {
        Self {
            id: transport.session_id().to_string(),
            transport,
            engine,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transport(&self) -> &Arc<SessionTransport> {
        &self.transport
    }

    pub fn engine(&self) -> &Arc<ProtocolEngine> {
        &self.engine
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("transport", &self.transport)
            .finish()
    }
}

/// The only owner of the session map
///
/// Every close path ends in `remove`, which is idempotent. Release of the
/// transport and engine happens after the map lock is dropped.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    max_sessions: Option<usize>,
    logger: Arc<dyn Logger>,
}

impl SessionRegistry {
    pub fn new(logger: Arc<dyn Logger>) -> Arc<Self> {
        Self::with_limit(None, logger)
    }

    /// Registry refusing new sessions beyond `max_sessions`
    pub fn with_limit(max_sessions: Option<usize>, logger: Arc<dyn Logger>) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
            logger,
        })
    }

    pub fn max_sessions(&self) -> Option<usize> {
        self.max_sessions
    }

    /// Whether one more session would fit
    pub fn has_capacity(&self) -> bool {
        match self.max_sessions {
            Some(max) => self.sessions.read().len() < max,
            None => true,
        }
    }

    /// Insert a session and wire its transport's close hook to `remove`
    ///
    /// A session whose transport already closed is refused, so a close that
    /// raced with creation cannot leave a dead entry behind.
    pub fn create(self: &Arc<Self>, session: Session) -> SessionResult<Arc<Session>> {
        let session = Arc::new(session);
        {
            let mut sessions = self.sessions.write();
            if session.transport.is_closed() {
                return Err(SessionError::Closed);
            }
            if let Some(max) = self.max_sessions {
                if sessions.len() >= max {
                    return Err(SessionError::CapacityReached(max));
                }
            }
            if sessions.contains_key(session.id()) {
                return Err(SessionError::Internal(format!(
                    "duplicate session id {}",
                    session.id()
                )));
            }
            sessions.insert(session.id().to_string(), Arc::clone(&session));
        }

        let registry: Weak<Self> = Arc::downgrade(self);
        session.transport.set_on_close(move |id| {
            if let Some(registry) = registry.upgrade() {
                registry.remove(id);
            }
        });

        self.logger.info(&format!(
            "[SessionRegistry] Session {} created ({} active)",
            session.id(),
            self.len()
        ));
        Ok(session)
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Remove a session and release its transport and engine
    ///
    /// Returns `false` when the id was not (or no longer) registered.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().remove(id);
        let Some(session) = removed else {
            return false;
        };

        session.transport.close();
        session.engine.shutdown();
        self.logger.info(&format!(
            "[SessionRegistry] Session {} closed ({} active)",
            id,
            self.len()
        ));
        true
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .field("max_sessions", &self.max_sessions)
            .finish()
    }
}
