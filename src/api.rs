use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::error::BotError;
use crate::model::{wire_time, Conversation, Message};

/// REST surface the sync core consumes. Implemented by [`BeekeeperApi`] in
/// production and by in-memory mocks in tests.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, BotError>;

    /// Fetch messages for one conversation, optionally bounded below by
    /// `since` and capped at `limit`. Result order is unspecified; the sync
    /// engine re-sorts before dispatch.
    async fn fetch_messages(
        &self,
        conversation_id: i64,
        since: Option<NaiveDateTime>,
        limit: Option<u32>,
    ) -> Result<Vec<Message>, BotError>;

    async fn mark_read(&self, conversation_id: i64) -> Result<(), BotError>;

    async fn send_message(
        &self,
        conversation_id: i64,
        text: &str,
        message_type: &str,
    ) -> Result<Message, BotError>;
}

/// Authenticated client for the Beekeeper conversations/messages API.
pub struct BeekeeperApi {
    client: reqwest::Client,
    config: ApiConfig,
}

/// Map a non-success HTTP status to the error taxonomy: credential
/// rejections are fatal, everything else is retryable transport trouble.
fn status_error(status: StatusCode, body: &str) -> BotError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            BotError::Auth(format!("{}: {}", status, body))
        }
        _ => BotError::Transport(format!("{}: {}", status, body)),
    }
}

impl BeekeeperApi {
    pub fn new(config: ApiConfig) -> Result<Self, BotError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "https://{}.beekeeper.io/api/{}{}",
            self.config.subdomain, self.config.api_version, endpoint
        )
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.config.access_token)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BotError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| BotError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, BotError> {
        let url = self.url(endpoint);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .query(params)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, BotError> {
        let url = self.url(endpoint);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Fail-fast credential check against `/status` before the scheduler starts.
    pub async fn verify(&self) -> Result<(), BotError> {
        let status: serde_json::Value = self.get("/status", &[]).await?;
        if status.get("settings").is_none() {
            return Err(BotError::Transport(
                "unexpected /status response shape".to_string(),
            ));
        }
        info!("API credentials verified against /status");
        Ok(())
    }
}

#[async_trait]
impl ChatApi for BeekeeperApi {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, BotError> {
        self.get("/conversations", &[]).await
    }

    async fn fetch_messages(
        &self,
        conversation_id: i64,
        since: Option<NaiveDateTime>,
        limit: Option<u32>,
    ) -> Result<Vec<Message>, BotError> {
        let mut params = Vec::new();
        if let Some(since) = since {
            params.push(("after", since.format(wire_time::FORMAT).to_string()));
        }
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        self.get(&format!("/conversations/{}/messages", conversation_id), &params)
            .await
    }

    async fn mark_read(&self, conversation_id: i64) -> Result<(), BotError> {
        // The endpoint echoes the conversation back; the content is not needed.
        let _: serde_json::Value = self
            .post(
                &format!("/conversations/{}/read", conversation_id),
                &serde_json::json!({}),
            )
            .await?;
        Ok(())
    }

    async fn send_message(
        &self,
        conversation_id: i64,
        text: &str,
        message_type: &str,
    ) -> Result<Message, BotError> {
        let body = serde_json::json!({
            "uuid": Uuid::new_v4().to_string(),
            "text": text,
            "message_type": message_type,
        });
        self.post(&format!("/conversations/{}/messages", conversation_id), &body)
            .await
    }
}
