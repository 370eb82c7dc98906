use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::BotError;
use crate::model::Message;
use crate::sync::SyncEngine;

/// Decrypts opaque push-channel payloads. `None` means the payload was not
/// decryptable, which the listener treats as channel noise rather than an
/// error (the channel also carries non-message control traffic).
pub trait Decrypter: Send + Sync {
    fn decrypt(&self, payload: &[u8]) -> Option<Vec<u8>>;
}

/// Events surfaced by the push-channel transport.
#[derive(Debug)]
pub enum PushEvent {
    /// An opaque, encrypted payload.
    Payload(Vec<u8>),
    Connected,
    Reconnected,
    Acknowledgment,
    /// Any other transport status. Always fatal: the listener relies on the
    /// transport's own reconnection and does not add retry logic on top.
    Status { category: String, detail: String },
}

/// Envelope shape of a decrypted channel event.
#[derive(Debug, Deserialize)]
struct PushEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Alternate ingestion path: decrypts and decodes realtime channel events
/// and feeds single messages into the shared [`SyncEngine`], bypassing
/// polling for those messages.
pub struct PushListener {
    engine: Arc<SyncEngine>,
    decrypter: Arc<dyn Decrypter>,
}

impl PushListener {
    pub fn new(engine: Arc<SyncEngine>, decrypter: Arc<dyn Decrypter>) -> Self {
        Self { engine, decrypter }
    }

    /// Consume transport events until the channel closes or a fatal status
    /// arrives. Connection-level events are informational only.
    pub async fn run(&self, mut events: mpsc::Receiver<PushEvent>) -> Result<(), BotError> {
        while let Some(event) = events.recv().await {
            match event {
                PushEvent::Connected => info!("Push channel connected"),
                PushEvent::Reconnected => info!("Push channel reconnected"),
                PushEvent::Acknowledgment => debug!("Push channel acknowledgment"),
                PushEvent::Status { category, detail } => {
                    return Err(BotError::Channel(format!("{}: {}", category, detail)));
                }
                PushEvent::Payload(payload) => self.handle_payload(&payload).await,
            }
        }
        info!("Push channel closed");
        Ok(())
    }

    async fn handle_payload(&self, payload: &[u8]) {
        let Some(plaintext) = self.decrypter.decrypt(payload) else {
            debug!("Dropping undecryptable push payload ({} bytes)", payload.len());
            return;
        };

        let envelope: PushEnvelope = match serde_json::from_slice(&plaintext) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("Dropping malformed push payload: {}", e);
                return;
            }
        };
        if envelope.kind != "message" {
            debug!("Ignoring push event of type '{}'", envelope.kind);
            return;
        }

        let message: Message = match serde_json::from_value(envelope.data) {
            Ok(message) => message,
            Err(e) => {
                debug!("Dropping push message with malformed data: {}", e);
                return;
            }
        };

        match self.engine.deliver(message).await {
            Ok(true) => debug!("Push message dispatched"),
            Ok(false) => {}
            // The message was not committed, so the poll path retries it.
            Err(e) => warn!("Push dispatch failed, poll path will retry: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChatApi;
    use crate::bot::{BotHandle, Callback};
    use crate::model::Conversation;
    use async_trait::async_trait;
    use chrono::NaiveDateTime;
    use std::sync::Mutex;

    /// Passthrough decrypter that refuses payloads starting with 0xFF.
    struct StubDecrypter;

    impl Decrypter for StubDecrypter {
        fn decrypt(&self, payload: &[u8]) -> Option<Vec<u8>> {
            if payload.first() == Some(&0xFF) {
                None
            } else {
                Some(payload.to_vec())
            }
        }
    }

    struct NullApi;

    #[async_trait]
    impl ChatApi for NullApi {
        async fn list_conversations(&self) -> Result<Vec<Conversation>, BotError> {
            Ok(Vec::new())
        }

        async fn fetch_messages(
            &self,
            _conversation_id: i64,
            _since: Option<NaiveDateTime>,
            _limit: Option<u32>,
        ) -> Result<Vec<Message>, BotError> {
            Ok(Vec::new())
        }

        async fn mark_read(&self, _conversation_id: i64) -> Result<(), BotError> {
            Ok(())
        }

        async fn send_message(
            &self,
            _conversation_id: i64,
            _text: &str,
            _message_type: &str,
        ) -> Result<Message, BotError> {
            Err(BotError::Transport("not implemented".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingCallback {
        seen: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl Callback for RecordingCallback {
        async fn on_message(&self, _bot: &BotHandle, message: &Message) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(message.id);
            Ok(())
        }
    }

    async fn listener_with_recorder() -> (PushListener, Arc<RecordingCallback>) {
        let engine = Arc::new(SyncEngine::new(Arc::new(NullApi)));
        let recorder = Arc::new(RecordingCallback::default());
        engine.register_callback(recorder.clone()).await;
        (PushListener::new(engine, Arc::new(StubDecrypter)), recorder)
    }

    fn message_payload(id: i64) -> Vec<u8> {
        serde_json::json!({
            "type": "message",
            "data": {
                "id": id,
                "uuid": format!("uuid-{}", id),
                "profile": "colleague",
                "created": "2026-08-01T12:00:10",
                "text": "hello",
                "message_type": "regular",
                "conversation_id": 1,
                "sent_by_user": false,
            }
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn test_message_payload_is_dispatched() {
        let (listener, recorder) = listener_with_recorder().await;
        let (tx, rx) = mpsc::channel(8);

        tx.send(PushEvent::Connected).await.unwrap();
        tx.send(PushEvent::Payload(message_payload(40))).await.unwrap();
        drop(tx);

        listener.run(rx).await.unwrap();
        assert_eq!(*recorder.seen.lock().unwrap(), vec![40]);
    }

    #[tokio::test]
    async fn test_duplicate_payload_is_dropped() {
        let (listener, recorder) = listener_with_recorder().await;
        let (tx, rx) = mpsc::channel(8);

        tx.send(PushEvent::Payload(message_payload(40))).await.unwrap();
        tx.send(PushEvent::Payload(message_payload(40))).await.unwrap();
        drop(tx);

        listener.run(rx).await.unwrap();
        assert_eq!(*recorder.seen.lock().unwrap(), vec![40]);
    }

    #[tokio::test]
    async fn test_noise_is_dropped_silently() {
        let (listener, recorder) = listener_with_recorder().await;
        let (tx, rx) = mpsc::channel(8);

        // Undecryptable, non-JSON, and non-message payloads are all noise.
        tx.send(PushEvent::Payload(vec![0xFF, 0x01, 0x02])).await.unwrap();
        tx.send(PushEvent::Payload(b"not json".to_vec())).await.unwrap();
        tx.send(PushEvent::Payload(
            br#"{"type": "typing_indicator", "data": {}}"#.to_vec(),
        ))
        .await
        .unwrap();
        drop(tx);

        listener.run(rx).await.unwrap();
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_error_is_fatal() {
        let (listener, recorder) = listener_with_recorder().await;
        let (tx, rx) = mpsc::channel(8);

        tx.send(PushEvent::Status {
            category: "access_denied".to_string(),
            detail: "channel key rejected".to_string(),
        })
        .await
        .unwrap();
        // Queued after the fatal status; must never be processed.
        tx.send(PushEvent::Payload(message_payload(41))).await.unwrap();
        drop(tx);

        let err = listener.run(rx).await.unwrap_err();
        assert!(matches!(err, BotError::Channel(_)));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_message_data_is_dropped() {
        let (listener, recorder) = listener_with_recorder().await;
        let (tx, rx) = mpsc::channel(8);

        tx.send(PushEvent::Payload(
            br#"{"type": "message", "data": {"id": "not a number"}}"#.to_vec(),
        ))
        .await
        .unwrap();
        drop(tx);

        listener.run(rx).await.unwrap();
        assert!(recorder.seen.lock().unwrap().is_empty());
    }
}
