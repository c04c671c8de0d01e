//! Per-session transport handle

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::error::{SessionError, SessionResult};

type CloseHook = Box<dyn FnOnce(&str) + Send>;

/// The server side of one session's connection state
///
/// Owns the optional standalone event stream (opened by GET) and the close
/// hook that removes the session from its registry. `close` is idempotent
/// and the hook runs at most once.
pub struct SessionTransport {
    session_id: String,
    json_response: bool,
    closed: AtomicBool,
    stream: Mutex<Option<UnboundedSender<Value>>>,
    on_close: Mutex<Option<CloseHook>>,
}

impl SessionTransport {
    pub fn new(session_id: impl Into<String>, json_response: bool) -> Self {
        Self {
            session_id: session_id.into(),
            json_response,
            closed: AtomicBool::new(false),
            stream: Mutex::new(None),
            on_close: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Whether POST responses are plain JSON rather than an event stream
    pub fn json_response(&self) -> bool {
        self.json_response
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Install the hook run on close
    ///
    /// On an already closed transport the hook runs immediately.
    pub fn set_on_close(&self, hook: impl FnOnce(&str) + Send + 'static) {
        if self.is_closed() {
            hook(&self.session_id);
            return;
        }
        *self.on_close.lock() = Some(Box::new(hook));
        // close() may have run between the check and the store
        if self.is_closed() {
            if let Some(hook) = self.on_close.lock().take() {
                hook(&self.session_id);
            }
        }
    }

    /// Open the standalone server-to-client stream
    ///
    /// Only one may be open; a stream whose receiver was dropped frees the
    /// slot.
    pub fn open_stream(&self) -> SessionResult<UnboundedReceiver<Value>> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let mut slot = self.stream.lock();
        if slot.as_ref().map(|tx| !tx.is_closed()).unwrap_or(false) {
            return Err(SessionError::StreamConflict);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *slot = Some(tx);
        Ok(rx)
    }

    /// Sender of the open standalone stream, if any
    pub fn stream_sender(&self) -> Option<UnboundedSender<Value>> {
        self.stream
            .lock()
            .as_ref()
            .filter(|tx| !tx.is_closed())
            .cloned()
    }

    pub fn has_open_stream(&self) -> bool {
        self.stream_sender().is_some()
    }

    /// Close the transport
    ///
    /// Ends the standalone stream and runs the close hook. Returns `true`
    /// only for the call that performed the close.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.stream.lock().take();
        let hook = self.on_close.lock().take();
        if let Some(hook) = hook {
            hook(&self.session_id);
        }
        true
    }
}

impl std::fmt::Debug for SessionTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTransport")
            .field("session_id", &self.session_id)
            .field("json_response", &self.json_response)
            .field("closed", &self.is_closed())
            .finish()
    }
}
