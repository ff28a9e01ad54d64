use async_trait::async_trait;
use thiserror::Error;

pub mod log;
pub mod webhook;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send OTP: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Templating error: {0}")]
    TemplatingError(String),
}

/// What gets delivered to a voter's phone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpMessage {
    pub phone_number: String,
    pub otp: String,
    pub ttl_minutes: i64,
}

/// Delivers one-time codes to a phone number.
/// Concrete senders (log, webhook gateway) implement this trait.
#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send(&self, message: &OtpMessage) -> Result<(), SenderError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}
