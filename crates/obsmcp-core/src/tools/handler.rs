//! Tool handler trait and per-call context

use async_trait::async_trait;
use rmcp::model::{
    CallToolResult, ErrorData, JsonObject, ProgressNotification, ProgressNotificationParam,
    ProgressToken, ServerNotification, Tool,
};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::mcp::jsonrpc;
use crate::types::CancellationToken;

/// Outbound channel for server-to-client notifications
///
/// Empty when the client has no stream open to receive them; sends are then
/// dropped.
#[derive(Clone, Default)]
pub struct Notifier {
    tx: Option<UnboundedSender<Value>>,
}

impl Notifier {
    pub fn new(tx: UnboundedSender<Value>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.tx.as_ref().map(|tx| !tx.is_closed()).unwrap_or(false)
    }

    /// Send a notification; returns whether it was queued
    pub fn notify(&self, notification: impl Into<ServerNotification>) -> bool {
        match &self.tx {
            Some(tx) => tx.send(jsonrpc::notification(notification)).is_ok(),
            None => false,
        }
    }
}

impl From<Option<UnboundedSender<Value>>> for Notifier {
    fn from(tx: Option<UnboundedSender<Value>>) -> Self {
        Self { tx }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// What a tool can reach while it runs
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub notifier: Notifier,
    /// `_meta.progressToken` of the call, when the client asked for progress
    pub progress_token: Option<ProgressToken>,
    pub cancel: CancellationToken,
}

impl ToolContext {
    /// Emit `notifications/progress` if the caller supplied a token
    pub fn progress(&self, progress: u64, message: impl Into<String>) {
        if let Some(token) = &self.progress_token {
            self.notifier.notify(ProgressNotification::new(ProgressNotificationParam {
                progress_token: token.clone(),
                progress: progress as f64,
                total: None,
                message: Some(message.into()),
            }));
        }
    }
}

/// A callable tool
///
/// Argument problems are returned as `Err` (JSON-RPC invalid params);
/// failures while doing the work belong in a `CallToolResult` with
/// `is_error` set.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Descriptor advertised by `tools/list`
    fn definition(&self) -> Tool;

    async fn call(
        &self,
        arguments: Option<JsonObject>,
        ctx: ToolContext,
    ) -> Result<CallToolResult, ErrorData>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::{CustomNotification, NumberOrString};
    use tokio::sync::mpsc;

    #[test]
    fn test_progress_requires_token() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut ctx = ToolContext {
            notifier: Notifier::new(tx),
            ..Default::default()
        };

        ctx.progress(1, "first");
        assert!(rx.try_recv().is_err());

        ctx.progress_token = Some(ProgressToken(NumberOrString::String("tok-1".into())));
        ctx.progress(2, "second");
        let sent = rx.try_recv().unwrap();
        assert_eq!(sent["method"], "notifications/progress");
        assert_eq!(sent["params"]["progressToken"], "tok-1");
        assert_eq!(sent["params"]["progress"], 2.0);
        assert_eq!(sent["params"]["message"], "second");
    }

    #[test]
    fn test_disconnected_notifier() {
        let ping = || CustomNotification::new("x", None);
        assert!(!Notifier::none().notify(ping()));
        assert!(!Notifier::none().is_connected());

        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = Notifier::new(tx);
        assert!(notifier.is_connected());
        drop(rx);
        assert!(!notifier.is_connected());
        assert!(!notifier.notify(ping()));
    }
}
