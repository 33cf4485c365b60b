use crate::error::Result;
use async_trait::async_trait;

/// Reply received from the recipient through the inbound webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundReply {
    /// Provider address of the sender, e.g. `whatsapp:+15550001111`.
    pub sender: String,
    pub text: String,
}

/// Outbound messaging contract. The bot only ever messages its one
/// configured recipient, so `send` takes just the body.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Stable sender identifier (e.g. `twilio-whatsapp`).
    fn id(&self) -> &'static str;

    /// Deliver `body` to the recipient, returning the provider message id.
    async fn send(&self, body: &str) -> Result<String>;

    /// Whether the provider accepts the configured credentials. Sends
    /// nothing.
    async fn health_check(&self) -> Result<bool>;
}
