use chrono::NaiveDateTime;
use serde::Deserialize;

/// Serde adapter for the API's zone-less timestamp format,
/// e.g. `2019-10-12T15:43:37`.
pub mod wire_time {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// A conversation as returned by `GET /conversations`.
///
/// `modified` is server-assigned and monotonic per conversation; a change in
/// it is the only signal the sync engine trusts for new activity.
#[derive(Debug, Clone, Deserialize)]
pub struct Conversation {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(with = "wire_time")]
    pub modified: NaiveDateTime,
    #[serde(default)]
    pub is_unread: bool,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub conversation_type: String,
    #[serde(default)]
    pub user_id: String,
}

/// A single chat message.
///
/// `id` is only unique within its conversation, so any dedup bookkeeping has
/// to be scoped by `conversation_id`. `sent_by_self` (wire name
/// `sent_by_user`) marks messages authored by the bot's own account.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(with = "wire_time")]
    pub created: NaiveDateTime,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    pub conversation_id: i64,
    #[serde(rename = "sent_by_user", default)]
    pub sent_by_self: bool,
}

fn default_message_type() -> String {
    "regular".to_string()
}
