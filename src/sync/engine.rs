use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::delta;
use super::state::StateTracker;
use crate::api::ChatApi;
use crate::bot::{BotHandle, Callback};
use crate::error::BotError;
use crate::model::{Conversation, Message};

/// Dedup & dispatch engine shared by the poll scheduler and the push
/// listener. Both ingestion paths feed it, so a message id that either path
/// has committed is suppressed when the other delivers it again.
pub struct SyncEngine {
    api: Arc<dyn ChatApi>,
    tracker: StateTracker,
    callbacks: RwLock<Vec<Arc<dyn Callback>>>,
    handle: BotHandle,
}

impl SyncEngine {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self {
            handle: BotHandle::new(api.clone()),
            api,
            tracker: StateTracker::new(),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Append a callback. Callbacks are invoked in registration order,
    /// sequentially, for every dispatched message.
    pub async fn register_callback(&self, callback: Arc<dyn Callback>) {
        self.callbacks.write().await.push(callback);
    }

    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    /// Poll-path entry point: decide whether the conversation changed,
    /// delta-fetch the new window and dispatch what survives dedup. Returns
    /// the number of messages handed to callbacks.
    pub async fn sync_conversation(&self, conversation: &Conversation) -> Result<usize, BotError> {
        let Some(state) = self.tracker.get(conversation.id).await else {
            return self.bootstrap(conversation).await;
        };

        if !delta::should_fetch(&state, conversation) {
            return Ok(0);
        }

        let since = delta::fetch_window(&state);
        let messages = self
            .api
            .fetch_messages(conversation.id, Some(since), None)
            .await?;
        self.process(conversation, messages).await
    }

    /// First observation of a conversation: record the single most recent
    /// message as seen without dispatching, so historical traffic is never
    /// delivered on a fresh run.
    async fn bootstrap(&self, conversation: &Conversation) -> Result<usize, BotError> {
        let messages = self
            .api
            .fetch_messages(conversation.id, None, Some(1))
            .await?;
        self.tracker
            .initialize(conversation.id, conversation.modified)
            .await;
        let baseline = messages.into_iter().max_by_key(|m| m.created).map(|m| m.id);
        self.tracker
            .commit(conversation.id, conversation.modified, baseline)
            .await;
        debug!(
            "Bootstrapped conversation {} ({})",
            conversation.id, conversation.name
        );
        Ok(0)
    }

    async fn process(
        &self,
        conversation: &Conversation,
        messages: Vec<Message>,
    ) -> Result<usize, BotError> {
        if messages.is_empty() {
            // `modified` can change for reasons other than new messages
            // (e.g. a mute-state change). Advance the cursor so the
            // conversation is not re-fetched every tick.
            info!(
                "Conversation {} modified without new messages, advancing cursor",
                conversation.id
            );
            self.tracker
                .commit(conversation.id, conversation.modified, Vec::<i64>::new())
                .await;
            return Ok(0);
        }

        // Re-read the dedup set after the fetch: the push path may have
        // committed one of these ids while the fetch was in flight.
        let dispatched_ids = self
            .tracker
            .get(conversation.id)
            .await
            .map(|s| s.dispatched_ids)
            .unwrap_or_default();

        let mut seen_ids = Vec::new();
        let mut to_dispatch = Vec::new();
        for message in messages {
            if message.sent_by_self {
                // Recorded as seen so the slack window doesn't thrash, but
                // never handed to callbacks.
                seen_ids.push(message.id);
            } else if !dispatched_ids.contains(&message.id) {
                to_dispatch.push(message);
            }
        }
        to_dispatch.sort_by_key(|m| m.created);

        let dispatched = self.dispatch_all(&to_dispatch).await?;
        seen_ids.extend(to_dispatch.iter().map(|m| m.id));
        self.tracker
            .commit(conversation.id, conversation.modified, seen_ids)
            .await;

        if dispatched > 0 {
            // Fire-and-forget acknowledgment; failure is not worth a retry.
            if let Err(e) = self.api.mark_read(conversation.id).await {
                warn!("mark_read failed for conversation {}: {}", conversation.id, e);
            }
        }
        Ok(dispatched)
    }

    /// Push-path entry point: a batch of exactly one message, same dedup and
    /// commit rules as a polled batch. Returns whether a dispatch happened.
    pub async fn deliver(&self, message: Message) -> Result<bool, BotError> {
        let conversation_id = message.conversation_id;
        match self.tracker.get(conversation_id).await {
            Some(state) if state.dispatched_ids.contains(&message.id) => {
                debug!(
                    "Message {} in conversation {} already dispatched, dropping",
                    message.id, conversation_id
                );
                return Ok(false);
            }
            Some(_) => {}
            None => {
                // Live push traffic for a conversation polling has not seen
                // yet; unlike the poll bootstrap this message is not history.
                self.tracker
                    .initialize(conversation_id, message.created)
                    .await;
            }
        }

        if message.sent_by_self {
            self.tracker
                .commit(conversation_id, message.created, [message.id])
                .await;
            return Ok(false);
        }

        self.dispatch_all(std::slice::from_ref(&message)).await?;
        self.tracker
            .commit(conversation_id, message.created, [message.id])
            .await;
        Ok(true)
    }

    /// Dispatch messages in order, awaiting every callback before moving to
    /// the next message so conversational ordering survives side effects
    /// (such as a callback replying). Any callback error aborts the batch
    /// before commit; the caller retries the whole batch later, so callbacks
    /// must tolerate re-invocation.
    async fn dispatch_all(&self, messages: &[Message]) -> Result<usize, BotError> {
        let callbacks = self.callbacks.read().await.clone();
        let mut dispatched = 0;
        for message in messages {
            for callback in &callbacks {
                callback
                    .on_message(&self.handle, message)
                    .await
                    .map_err(BotError::Callback)?;
            }
            dispatched += 1;
        }
        Ok(dispatched)
    }
}
