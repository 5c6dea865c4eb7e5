// Email sending handler
//
// Delivery is behind the `EmailTransport` port. The default transport only
// logs the message; deployments plug in their own.

use async_trait::async_trait;
use jobqueue_core::domain::JobPayload;
use jobqueue_core::port::time_provider::to_rfc3339;
use jobqueue_core::port::{HandlerError, JobHandler, TimeProvider};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// A fully resolved outgoing message
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: Option<String>,
    pub text: Option<String>,
}

/// Email delivery port
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), HandlerError>;
}

/// Transport that writes the message to the log instead of sending it
pub struct TracingTransport;

#[async_trait]
impl EmailTransport for TracingTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), HandlerError> {
        info!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            has_html = message.html.is_some(),
            has_text = message.text.is_some(),
            "Email delivered (log transport)"
        );
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct EmailRequest {
    to: String,
    subject: String,
    html: Option<String>,
    text: Option<String>,
    from: Option<String>,
}

pub struct EmailSendingHandler {
    transport: Arc<dyn EmailTransport>,
    default_from: String,
    time_provider: Arc<dyn TimeProvider>,
}

impl EmailSendingHandler {
    pub fn new(
        transport: Arc<dyn EmailTransport>,
        default_from: impl Into<String>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            transport,
            default_from: default_from.into(),
            time_provider,
        }
    }
}

#[async_trait]
impl JobHandler for EmailSendingHandler {
    async fn handle(&self, payload: &JobPayload) -> Result<Value, HandlerError> {
        let req: EmailRequest = serde_json::from_value(payload.as_value().clone())?;

        if req.to.trim().is_empty() {
            return Err(HandlerError::missing_field("to"));
        }
        if !req.to.contains('@') {
            return Err(HandlerError::InvalidPayload(format!(
                "invalid recipient address '{}'",
                req.to
            )));
        }
        if req.subject.trim().is_empty() {
            return Err(HandlerError::missing_field("subject"));
        }
        let html = req.html.filter(|s| !s.is_empty());
        let text = req.text.filter(|s| !s.is_empty());
        if html.is_none() && text.is_none() {
            return Err(HandlerError::InvalidPayload(
                "one of 'html' or 'text' is required".to_string(),
            ));
        }

        let message = EmailMessage {
            from: req.from.unwrap_or_else(|| self.default_from.clone()),
            to: req.to,
            subject: req.subject,
            html,
            text,
        };
        self.transport.send(&message).await?;

        Ok(json!({
            "success": true,
            "sentAt": to_rfc3339(self.time_provider.now_millis()),
            "recipient": message.to,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobqueue_core::port::time_provider::mocks::MockTimeProvider;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl EmailTransport for RecordingTransport {
        async fn send(&self, message: &EmailMessage) -> Result<(), HandlerError> {
            if self.fail {
                return Err(HandlerError::Failed("smtp connection refused".into()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn handler(transport: Arc<RecordingTransport>) -> EmailSendingHandler {
        EmailSendingHandler::new(transport, "noreply@localhost", Arc::new(MockTimeProvider::new(0)))
    }

    #[tokio::test]
    async fn test_sends_with_default_sender() {
        let transport = Arc::new(RecordingTransport::default());
        let out = handler(transport.clone())
            .handle(&JobPayload::new(json!({
                "to": "ops@example.com",
                "subject": "Nightly report",
                "text": "All green"
            })))
            .await
            .unwrap();

        assert_eq!(out["success"], true);
        assert_eq!(out["recipient"], "ops@example.com");
        assert_eq!(out["sentAt"], "1970-01-01T00:00:00+00:00");

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "noreply@localhost");
        assert!(sent[0].html.is_none());
    }

    #[tokio::test]
    async fn test_requires_body() {
        let transport = Arc::new(RecordingTransport::default());
        let err = handler(transport.clone())
            .handle(&JobPayload::new(json!({"to": "a@b.c", "subject": "s"})))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::InvalidPayload(_)));
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_recipient() {
        let err = handler(Arc::new(RecordingTransport::default()))
            .handle(&JobPayload::new(json!({"subject": "s", "html": "<p>x</p>"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("to"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_handler_failure() {
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..Default::default()
        });
        let err = handler(transport)
            .handle(&JobPayload::new(json!({"to": "a@b.c", "subject": "s", "text": "t"})))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Failed(_)));
    }
}
