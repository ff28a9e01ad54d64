use async_trait::async_trait;
use tracing::info;

use super::{OtpMessage, OtpSender, SenderError};
use crate::services::phone::mask_phone_number;

/// Writes codes to the application log instead of delivering them.
#[derive(Debug, Default)]
pub struct LogSender;

#[async_trait]
impl OtpSender for LogSender {
    async fn send(&self, message: &OtpMessage) -> Result<(), SenderError> {
        info!(
            phone = %mask_phone_number(&message.phone_number),
            otp = %message.otp,
            ttl_minutes = message.ttl_minutes,
            "OTP issued (log delivery)."
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
