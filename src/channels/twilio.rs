use crate::channels::traits::{InboundReply, MessageSender};
use crate::config::ProviderConfig;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use std::time::Duration;

const WHATSAPP_SCHEME: &str = "whatsapp:";

/// Twilio Programmable Messaging adapter for WhatsApp.
///
/// Outbound messages go through the Messages REST resource. Inbound replies
/// arrive as form-encoded webhook posts; the gateway owns that route and
/// uses [`TwilioInboundForm`] and [`twiml_message`] from here.
#[derive(Clone)]
pub struct TwilioWhatsApp {
    account_sid: String,
    auth_token: String,
    from: String,
    to: String,
    api_base: String,
    client: reqwest::Client,
}

/// Response body of a successful message create.
#[derive(serde::Deserialize)]
struct CreatedMessage {
    sid: String,
}

/// Form fields of an inbound webhook post. Twilio sends many more; only
/// these are read.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct TwilioInboundForm {
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "From", default)]
    pub from: String,
}

impl From<TwilioInboundForm> for InboundReply {
    fn from(form: TwilioInboundForm) -> Self {
        Self {
            sender: form.from,
            text: form.body,
        }
    }
}

impl TwilioWhatsApp {
    /// Build the adapter and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Config`] when credentials or addresses are missing
    /// or the HTTP client cannot be built.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        for (name, value) in [
            ("account_sid", &config.account_sid),
            ("auth_token", &config.auth_token),
            ("from", &config.from),
            ("to", &config.to),
        ] {
            if value.trim().is_empty() {
                return Err(BotError::Config(format!("provider.{name} is empty")));
            }
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| BotError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            account_sid: config.account_sid.trim().to_owned(),
            auth_token: config.auth_token.trim().to_owned(),
            from: whatsapp_address(&config.from),
            to: whatsapp_address(&config.to),
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            client,
        })
    }

    fn account_url(&self) -> String {
        format!("{}/2010-04-01/Accounts/{}.json", self.api_base, self.account_sid)
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

#[async_trait]
impl MessageSender for TwilioWhatsApp {
    fn id(&self) -> &'static str {
        "twilio-whatsapp"
    }

    async fn send(&self, body: &str) -> Result<String> {
        let form = [
            ("From", self.from.as_str()),
            ("To", self.to.as_str()),
            ("Body", body),
        ];
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| BotError::SendFailed(format!("twilio request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::SendFailed(format!(
                "twilio responded {status}: {body}"
            )));
        }

        let created: CreatedMessage = response
            .json()
            .await
            .map_err(|e| BotError::SendFailed(format!("unreadable twilio response: {e}")))?;
        tracing::debug!("twilio accepted message {}", created.sid);
        Ok(created.sid)
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.account_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .map_err(|e| BotError::SendFailed(format!("twilio request failed: {e}")))?;
        Ok(response.status().is_success())
    }
}

/// Prefix a phone number with the `whatsapp:` channel scheme unless it
/// already carries one.
#[must_use]
pub fn whatsapp_address(number: &str) -> String {
    let number = number.trim();
    if number.starts_with(WHATSAPP_SCHEME) {
        number.to_owned()
    } else {
        format!("{WHATSAPP_SCHEME}{number}")
    }
}

/// TwiML document that replies with a single message.
#[must_use]
pub fn twiml_message(text: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        xml_escape(text)
    )
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
