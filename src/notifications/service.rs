use std::sync::Arc;

use chrono::Duration;
use tracing::{error, info};

use super::senders::{
    OtpMessage, OtpSender, SenderError, log::LogSender, webhook::WebhookSender,
};
use crate::server::config::{OtpDelivery, ServerConfig};
use crate::services::phone::mask_phone_number;

/// Routes issued codes to the configured sender.
#[derive(Clone)]
pub struct OtpDispatcher {
    sender: Arc<dyn OtpSender>,
}

impl OtpDispatcher {
    pub fn new(sender: Arc<dyn OtpSender>) -> Self {
        Self { sender }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, SenderError> {
        let sender: Arc<dyn OtpSender> = match config.otp_delivery {
            OtpDelivery::Log => Arc::new(LogSender),
            OtpDelivery::Webhook => {
                let url = config.otp_webhook_url.clone().ok_or_else(|| {
                    SenderError::InvalidConfiguration("OTP_WEBHOOK_URL is not set".to_string())
                })?;
                Arc::new(WebhookSender::new(
                    url,
                    config.otp_webhook_token.clone(),
                    config.otp_webhook_template.clone(),
                )?)
            }
        };
        info!(sender = sender.name(), "OTP delivery configured.");
        Ok(Self::new(sender))
    }

    pub async fn dispatch(&self, phone_number: &str, otp: &str, ttl: Duration) -> Result<(), SenderError> {
        let message = OtpMessage {
            phone_number: phone_number.to_string(),
            otp: otp.to_string(),
            // Round up so a 90s code reads as "2 minutes".
            ttl_minutes: (ttl.num_seconds() + 59) / 60,
        };

        self.sender.send(&message).await.map_err(|e| {
            error!(
                sender = self.sender.name(),
                phone = %mask_phone_number(phone_number),
                error = %e,
                "Failed to deliver OTP."
            );
            e
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::RecordingSender;
    use super::*;

    #[tokio::test]
    async fn test_dispatch_rounds_ttl_up_to_minutes() {
        let recorder = Arc::new(RecordingSender::default());
        let dispatcher = OtpDispatcher::new(recorder.clone());

        dispatcher
            .dispatch("+33612345678", "123456", Duration::seconds(90))
            .await
            .unwrap();

        let messages = recorder.messages.lock().await;
        assert_eq!(
            messages[0],
            OtpMessage {
                phone_number: "+33612345678".to_string(),
                otp: "123456".to_string(),
                ttl_minutes: 2,
            }
        );
    }

    #[test]
    fn test_from_config_picks_sender() {
        let mut config = ServerConfig::for_tests();
        assert!(OtpDispatcher::from_config(&config).is_ok());

        config.otp_delivery = OtpDelivery::Webhook;
        assert!(matches!(
            OtpDispatcher::from_config(&config),
            Err(SenderError::InvalidConfiguration(_))
        ));

        config.otp_webhook_url = Some("https://gateway.example/send".to_string());
        assert!(OtpDispatcher::from_config(&config).is_ok());
    }
}
