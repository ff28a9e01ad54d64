use async_trait::async_trait;
use reqwest::{Client, header};
use tera::{Context, Tera};

use super::{OtpMessage, OtpSender, SenderError};

/// Pushes codes to an SMS/WhatsApp gateway through a JSON webhook.
pub struct WebhookSender {
    client: Client,
    url: String,
    bearer_token: Option<String>,
    body_template: String,
}

impl WebhookSender {
    pub fn new(url: String, bearer_token: Option<String>, body_template: String) -> Result<Self, SenderError> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SenderError::InvalidConfiguration(format!(
                "Webhook URL must be http(s): {url}"
            )));
        }
        // Fail at start-up rather than on the first vote.
        Tera::one_off(&body_template, &Self::context(&OtpMessage {
            phone_number: "+10000000000".to_string(),
            otp: "000000".to_string(),
            ttl_minutes: 5,
        }), false)
        .map_err(|e| SenderError::TemplatingError(e.to_string()))?;

        Ok(Self {
            client: Client::new(),
            url,
            bearer_token,
            body_template,
        })
    }

    fn context(message: &OtpMessage) -> Context {
        let mut context = Context::new();
        context.insert("phone", &message.phone_number);
        context.insert("otp", &message.otp);
        context.insert("ttl_minutes", &message.ttl_minutes);
        context
    }

    fn render(&self, message: &OtpMessage) -> Result<String, SenderError> {
        Tera::one_off(&self.body_template, &Self::context(message), false)
            .map_err(|e| SenderError::TemplatingError(e.to_string()))
    }
}

#[async_trait]
impl OtpSender for WebhookSender {
    async fn send(&self, message: &OtpMessage) -> Result<(), SenderError> {
        let body = self.render(message)?;

        let mut request_builder = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body);

        if let Some(token) = &self.bearer_token {
            request_builder = request_builder.bearer_auth(token);
        }

        let response = request_builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Webhook returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::HeaderMap, http::StatusCode, routing::post};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    type Captured = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    async fn spawn_gateway(status: StatusCode) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let sink = captured.clone();
        let app = Router::new().route(
            "/send",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let sink = sink.clone();
                async move {
                    let auth = headers
                        .get(header::AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    sink.lock().await.push((auth, body));
                    status
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/send"), captured)
    }

    fn message() -> OtpMessage {
        OtpMessage {
            phone_number: "+33612345678".to_string(),
            otp: "042133".to_string(),
            ttl_minutes: 5,
        }
    }

    #[tokio::test]
    async fn test_webhook_posts_rendered_template() {
        let (url, captured) = spawn_gateway(StatusCode::OK).await;
        let sender = WebhookSender::new(
            url,
            Some("gateway-token".to_string()),
            r#"{"to":"{{ phone }}","code":"{{ otp }}","ttl":{{ ttl_minutes }}}"#.to_string(),
        )
        .unwrap();

        sender.send(&message()).await.unwrap();

        let calls = captured.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.as_deref(), Some("Bearer gateway-token"));
        assert_eq!(
            calls[0].1,
            serde_json::json!({"to": "+33612345678", "code": "042133", "ttl": 5})
        );
    }

    #[tokio::test]
    async fn test_webhook_non_success_status_is_an_error() {
        let (url, _captured) = spawn_gateway(StatusCode::BAD_GATEWAY).await;
        let sender = WebhookSender::new(url, None, r#"{"otp":"{{ otp }}"}"#.to_string()).unwrap();

        let err = sender.send(&message()).await.unwrap_err();
        assert!(matches!(err, SenderError::SendFailed(_)));
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            WebhookSender::new("ftp://gateway".to_string(), None, "{}".to_string()),
            Err(SenderError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            WebhookSender::new("https://gateway".to_string(), None, "{{ otp".to_string()),
            Err(SenderError::TemplatingError(_))
        ));
    }
}
