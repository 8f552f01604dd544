//! Notification dispatcher seam
//!
//! Fire-and-forget: the engine emits typed payloads and never waits on or
//! fails because of delivery. Implementations must swallow their own errors.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use ql_core::types::UserId;

/// Outbound notification dispatcher
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Dispatch a notification. Infallible by contract; implementations log
    /// and drop delivery failures.
    async fn notify(&self, user_id: &UserId, kind: &str, payload: serde_json::Value);
}

/// Discards every notification
#[derive(Clone, Copy, Debug, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, user_id: &UserId, kind: &str, _payload: serde_json::Value) {
        tracing::debug!(user_id = %user_id, kind, "notification dropped (null notifier)");
    }
}

/// Records notifications for assertions in tests
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(UserId, String, serde_json::Value)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn sent(&self) -> Vec<(UserId, String, serde_json::Value)> {
        self.sent.lock().await.clone()
    }

    pub async fn kinds_for(&self, user_id: &UserId) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(u, _, _)| u == user_id)
            .map(|(_, kind, _)| kind.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: &UserId, kind: &str, payload: serde_json::Value) {
        self.sent
            .lock()
            .await
            .push((user_id.clone(), kind.to_string(), payload));
    }
}
