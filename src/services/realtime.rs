//! Targeted realtime events for connected clients.
//!
//! The web and mobile frontends subscribe to per-user subjects through the
//! NATS websocket bridge; emitting here reaches whichever devices are
//! currently connected. Delivery is fire-and-forget — realtime events are an
//! enhancement on top of the stored in-app notifications, never the record.

use anyhow::Result;
use async_nats::Client;
use async_trait::async_trait;

#[async_trait]
pub trait RealtimeNotifier: Send + Sync {
    /// Emit `event` with `payload` to everyone in `room`
    /// (e.g. room `"cleaner.<id>"`, event `"job:urgent"`).
    async fn emit(&self, room: &str, event: &str, payload: serde_json::Value) -> Result<()>;
}

/// Room name for a cleaner's devices
pub fn cleaner_room(cleaner_id: uuid::Uuid) -> String {
    format!("cleaner.{}", cleaner_id)
}

// =============================================================================
// NatsRealtimeNotifier — publishes to brightnest.rt.<room>.<event>
// =============================================================================

pub struct NatsRealtimeNotifier {
    client: Client,
}

impl NatsRealtimeNotifier {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RealtimeNotifier for NatsRealtimeNotifier {
    async fn emit(&self, room: &str, event: &str, payload: serde_json::Value) -> Result<()> {
        // ':' is legal in NATS subject tokens; '.' in the event would split
        // the subject, so events use ':' separators by convention.
        let subject = format!("brightnest.rt.{}.{}", room, event);
        let bytes = serde_json::to_vec(&payload)?;
        self.client.publish(subject, bytes.into()).await?;
        Ok(())
    }
}

// =============================================================================
// FakeRealtimeNotifier — captures emitted events (tests)
// =============================================================================

#[derive(Default)]
pub struct FakeRealtimeNotifier {
    pub events: std::sync::Mutex<Vec<(String, String, serde_json::Value)>>,
}

impl FakeRealtimeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emitted(&self) -> Vec<(String, String, serde_json::Value)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl RealtimeNotifier for FakeRealtimeNotifier {
    async fn emit(&self, room: &str, event: &str, payload: serde_json::Value) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push((room.to_string(), event.to_string(), payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn fake_notifier_captures_events() {
        let rt = FakeRealtimeNotifier::new();
        let room = cleaner_room(uuid::Uuid::nil());
        rt.emit(&room, "job:urgent", json!({"priceCents": 12000}))
            .await
            .unwrap();

        let events = rt.emitted();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "cleaner.00000000-0000-0000-0000-000000000000");
        assert_eq!(events[0].1, "job:urgent");
    }
}
