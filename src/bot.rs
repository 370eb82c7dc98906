use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::ChatApi;
use crate::error::BotError;
use crate::model::Message;
use crate::sync::SyncEngine;

/// Application handler for newly observed messages.
///
/// Callbacks run sequentially, in registration order, one message at a time.
/// A failed callback blocks the commit of its whole batch, and the batch is
/// retried on the next poll tick — so a callback may see the same message
/// again and must be written idempotently.
#[async_trait]
pub trait Callback: Send + Sync {
    async fn on_message(&self, bot: &BotHandle, message: &Message) -> anyhow::Result<()>;
}

/// Outbound surface handed to callbacks, so a handler can reply into the
/// conversation it was invoked for.
#[derive(Clone)]
pub struct BotHandle {
    api: Arc<dyn ChatApi>,
}

impl BotHandle {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self { api }
    }

    pub async fn send_message(
        &self,
        conversation_id: i64,
        text: &str,
        message_type: &str,
    ) -> Result<Message, BotError> {
        self.api.send_message(conversation_id, text, message_type).await
    }

    pub async fn mark_read(&self, conversation_id: i64) -> Result<(), BotError> {
        self.api.mark_read(conversation_id).await
    }
}

/// Poll scheduler: bootstraps every conversation once, then ticks on a fixed
/// interval, syncing all conversations concurrently per tick.
pub struct Bot {
    api: Arc<dyn ChatApi>,
    engine: Arc<SyncEngine>,
    poll_interval: Duration,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl Bot {
    pub fn new(api: Arc<dyn ChatApi>, poll_interval: Duration) -> Self {
        let engine = Arc::new(SyncEngine::new(api.clone()));
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            api,
            engine,
            poll_interval,
            stop_tx,
            stop_rx,
        }
    }

    /// The shared dedup/dispatch engine, for wiring up the push listener.
    pub fn engine(&self) -> Arc<SyncEngine> {
        self.engine.clone()
    }

    pub async fn register_callback(&self, callback: Arc<dyn Callback>) {
        self.engine.register_callback(callback).await;
    }

    /// Signal the scheduler to stop. Idempotent; an in-flight tick is
    /// allowed to drain so no batch is cancelled mid-commit.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Run the scheduler until [`Bot::stop`] is called or a fatal error
    /// (auth rejection) occurs. Non-fatal failures are logged and retried
    /// implicitly on the next tick.
    pub async fn run(&self) -> Result<(), BotError> {
        let mut stop_rx = self.stop_rx.clone();

        info!("Bootstrapping conversation baselines");
        let conversations = self.api.list_conversations().await?;
        for conversation in &conversations {
            if let Err(e) = self.engine.sync_conversation(conversation).await {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!("Bootstrap failed for conversation {}: {}", conversation.id, e);
            }
        }
        info!(
            "Bootstrap complete, tracking {} conversation(s)",
            conversations.len()
        );

        loop {
            if *stop_rx.borrow() {
                break;
            }
            tokio::select! {
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    self.tick().await?;
                }
            }
        }

        info!("Poll scheduler stopped");
        Ok(())
    }

    /// One poll cycle: list conversations, sync them all concurrently, join.
    /// A single conversation's failure neither blocks nor cancels the rest.
    async fn tick(&self) -> Result<(), BotError> {
        let conversations = match self.api.list_conversations().await {
            Ok(conversations) => conversations,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Conversation listing failed, retrying next tick: {}", e);
                return Ok(());
            }
        };

        let results = join_all(conversations.iter().map(|conversation| async move {
            (
                conversation.id,
                self.engine.sync_conversation(conversation).await,
            )
        }))
        .await;

        for (id, result) in results {
            match result {
                Ok(0) => {}
                Ok(count) => debug!("Conversation {}: dispatched {} message(s)", id, count),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Conversation {} failed this tick: {}", id, e),
            }
        }
        Ok(())
    }
}
