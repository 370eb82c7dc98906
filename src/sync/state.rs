use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use tokio::sync::Mutex;

/// Per-conversation sync cursor: the last committed `modified` value and the
/// ids already handed to callbacks (or recorded as seen).
///
/// `dispatched_ids` only grows and `last_modified` only moves forward; both
/// are updated together by [`StateTracker::commit`] once a dispatch batch has
/// fully succeeded.
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub last_modified: NaiveDateTime,
    pub dispatched_ids: HashSet<i64>,
}

/// Owner of the conversation-id -> state mapping.
///
/// The map lives behind an async mutex so the concurrent per-tick tasks and
/// the push listener see each other's commits: a commit from one path
/// happens-before the next dedup read from the other.
#[derive(Default)]
pub struct StateTracker {
    states: Mutex<HashMap<i64, ConversationState>>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cloned snapshot of a conversation's state, if it was ever observed.
    pub async fn get(&self, conversation_id: i64) -> Option<ConversationState> {
        self.states.lock().await.get(&conversation_id).cloned()
    }

    /// Create state with an empty dispatched set. No-op if the conversation
    /// is already tracked.
    pub async fn initialize(&self, conversation_id: i64, last_modified: NaiveDateTime) {
        self.states
            .lock()
            .await
            .entry(conversation_id)
            .or_insert_with(|| ConversationState {
                last_modified,
                dispatched_ids: HashSet::new(),
            });
    }

    /// Merge a completed batch into the conversation's state. The sole
    /// mutator: ids are added and the cursor advances in one step, so a
    /// batch is either committed whole or not at all. `last_modified` is
    /// clamped to never move backward (a push commit must not rewind the
    /// poll cursor).
    pub async fn commit(
        &self,
        conversation_id: i64,
        new_last_modified: NaiveDateTime,
        ids: impl IntoIterator<Item = i64>,
    ) {
        let mut states = self.states.lock().await;
        let state = states
            .entry(conversation_id)
            .or_insert_with(|| ConversationState {
                last_modified: new_last_modified,
                dispatched_ids: HashSet::new(),
            });
        state.dispatched_ids.extend(ids);
        if new_last_modified > state.last_modified {
            state.last_modified = new_last_modified;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(secs: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 1)
            .unwrap()
            .and_hms_opt(12, 0, secs)
            .unwrap()
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let tracker = StateTracker::new();
        tracker.initialize(1, ts(10)).await;
        tracker.commit(1, ts(10), [7]).await;

        // A second initialize must not wipe the dispatched set.
        tracker.initialize(1, ts(20)).await;

        let state = tracker.get(1).await.unwrap();
        assert_eq!(state.last_modified, ts(10));
        assert!(state.dispatched_ids.contains(&7));
    }

    #[tokio::test]
    async fn test_commit_merges_and_advances() {
        let tracker = StateTracker::new();
        tracker.initialize(1, ts(0)).await;
        tracker.commit(1, ts(5), [1, 2]).await;
        tracker.commit(1, ts(9), [2, 3]).await;

        let state = tracker.get(1).await.unwrap();
        assert_eq!(state.last_modified, ts(9));
        assert_eq!(state.dispatched_ids.len(), 3);
    }

    #[tokio::test]
    async fn test_commit_never_moves_cursor_backward() {
        let tracker = StateTracker::new();
        tracker.initialize(1, ts(30)).await;
        tracker.commit(1, ts(10), [4]).await;

        let state = tracker.get(1).await.unwrap();
        assert_eq!(state.last_modified, ts(30));
        assert!(state.dispatched_ids.contains(&4));
    }

    #[tokio::test]
    async fn test_states_are_scoped_per_conversation() {
        let tracker = StateTracker::new();
        tracker.initialize(1, ts(0)).await;
        tracker.initialize(2, ts(0)).await;
        tracker.commit(1, ts(1), [7]).await;

        // Same message id in another conversation is a different message.
        let other = tracker.get(2).await.unwrap();
        assert!(!other.dispatched_ids.contains(&7));
    }

    #[tokio::test]
    async fn test_get_unknown_conversation() {
        let tracker = StateTracker::new();
        assert!(tracker.get(99).await.is_none());
    }
}
