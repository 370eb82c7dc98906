use chrono::{Duration, NaiveDateTime};

use super::state::ConversationState;
use crate::model::Conversation;

/// Slack subtracted from the committed cursor when building the fetch
/// window, tolerating skew between the conversation-level `modified` value
/// and individual message timestamps.
pub const FETCH_SLACK_SECS: i64 = 1;

/// A conversation warrants a fetch iff its `modified` differs from the
/// committed cursor. Inequality is the whole test: no assumption is made
/// about direction or magnitude.
pub fn should_fetch(state: &ConversationState, conversation: &Conversation) -> bool {
    conversation.modified != state.last_modified
}

/// Lower bound for a delta fetch. Duplicates let in by the slack are removed
/// by the dedup set, not here.
pub fn fetch_window(state: &ConversationState) -> NaiveDateTime {
    state.last_modified - Duration::seconds(FETCH_SLACK_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn ts(secs: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 1)
            .unwrap()
            .and_hms_opt(12, 0, secs)
            .unwrap()
    }

    fn conv(modified: NaiveDateTime) -> Conversation {
        Conversation {
            id: 1,
            name: "test".to_string(),
            modified,
            is_unread: false,
            snippet: String::new(),
            profile: String::new(),
            conversation_type: String::new(),
            user_id: String::new(),
        }
    }

    fn state(last_modified: NaiveDateTime) -> ConversationState {
        ConversationState {
            last_modified,
            dispatched_ids: HashSet::new(),
        }
    }

    #[test]
    fn test_unchanged_modified_skips_fetch() {
        assert!(!should_fetch(&state(ts(10)), &conv(ts(10))));
    }

    #[test]
    fn test_any_difference_triggers_fetch() {
        assert!(should_fetch(&state(ts(10)), &conv(ts(11))));
        // Even a backwards-looking value counts as "different".
        assert!(should_fetch(&state(ts(10)), &conv(ts(9))));
    }

    #[test]
    fn test_fetch_window_applies_slack() {
        assert_eq!(fetch_window(&state(ts(10))), ts(9));
    }
}
