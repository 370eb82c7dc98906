use thiserror::Error;

/// Failure taxonomy for the sync/delivery core.
///
/// Transport and callback failures are retryable (the poll scheduler retries
/// the conversation on its next tick); auth rejections and push-channel
/// status errors are fatal and terminate the run.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("malformed payload: {0}")]
    Decode(String),

    #[error("callback failed: {0}")]
    Callback(anyhow::Error),

    #[error("push channel status error: {0}")]
    Channel(String),
}

impl BotError {
    /// Fatal errors stop the scheduler instead of being retried next tick.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::Auth(_) | BotError::Channel(_))
    }
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BotError::Decode(err.to_string())
        } else {
            BotError::Transport(err.to_string())
        }
    }
}
