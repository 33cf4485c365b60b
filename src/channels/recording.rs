use crate::channels::traits::MessageSender;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Sender that keeps messages in memory instead of delivering them.
///
/// Backs `--dry-run` and the test suite. Clones share the same outbox.
#[derive(Debug, Clone, Default)]
pub struct RecordingSender {
    outbox: Arc<Mutex<Vec<String>>>,
    failing: Arc<AtomicBool>,
    echo: bool,
}

impl RecordingSender {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also log each message body at `info`.
    #[must_use]
    pub fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    /// Make subsequent sends fail with [`BotError::SendFailed`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Bodies sent so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    fn id(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, body: &str) -> Result<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BotError::SendFailed("recording sender set to fail".to_owned()));
        }
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|_| BotError::SendFailed("outbox lock poisoned".to_owned()))?;
        outbox.push(body.to_owned());
        if self.echo {
            tracing::info!("dry run, not sent:\n{body}");
        }
        Ok(format!("SM-local-{}", outbox.len()))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.failing.load(Ordering::SeqCst))
    }
}
