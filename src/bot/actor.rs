//! Single-writer request channel in front of [`Bot`].
//!
//! The webhook, the scheduler and the on-demand dispatch endpoint all hold a
//! cloned [`BotHandle`]; the one [`BotServer`] applies their requests in
//! arrival order, so a reply landing while the daily send fires is applied
//! strictly before or after it.

use super::{Bot, DispatchOutcome, ReplyReport, StatusSnapshot};
use crate::error::{BotError, Result};
use tokio::sync::{mpsc, oneshot};

enum BotRequest {
    Reply {
        text: String,
        response_tx: oneshot::Sender<Result<ReplyReport>>,
    },
    Dispatch {
        force: bool,
        response_tx: oneshot::Sender<Result<DispatchOutcome>>,
    },
    Status {
        response_tx: oneshot::Sender<Result<StatusSnapshot>>,
    },
}

/// Cloneable client side of the bot channel.
#[derive(Clone)]
pub struct BotHandle {
    request_tx: mpsc::Sender<BotRequest>,
}

impl BotHandle {
    /// Classify and apply an inbound reply.
    pub async fn reply(&self, text: impl Into<String>) -> Result<ReplyReport> {
        let text = text.into();
        self.request(|response_tx| BotRequest::Reply { text, response_tx })
            .await
    }

    /// Run the daily dispatch.
    pub async fn dispatch(&self, force: bool) -> Result<DispatchOutcome> {
        self.request(|response_tx| BotRequest::Dispatch { force, response_tx })
            .await
    }

    pub async fn status(&self) -> Result<StatusSnapshot> {
        self.request(|response_tx| BotRequest::Status { response_tx })
            .await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> BotRequest,
    ) -> Result<T> {
        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(build(response_tx))
            .await
            .map_err(|_| BotError::Shutdown)?;
        response_rx.await.map_err(|_| BotError::Shutdown)?
    }
}

/// Owner of the [`Bot`]. Runs until every [`BotHandle`] is dropped.
pub struct BotServer {
    request_rx: mpsc::Receiver<BotRequest>,
    bot: Bot,
}

/// Create a connected handle/server pair.
#[must_use]
pub fn bot_channel(bot: Bot, request_capacity: usize) -> (BotHandle, BotServer) {
    let (request_tx, request_rx) = mpsc::channel(request_capacity.max(1));
    (BotHandle { request_tx }, BotServer { request_rx, bot })
}

impl BotServer {
    pub async fn run(mut self) {
        while let Some(request) = self.request_rx.recv().await {
            match request {
                BotRequest::Reply { text, response_tx } => {
                    let _ = response_tx.send(self.bot.handle_reply(&text).await);
                }
                BotRequest::Dispatch { force, response_tx } => {
                    let _ = response_tx.send(self.bot.dispatch(force).await);
                }
                BotRequest::Status { response_tx } => {
                    let _ = response_tx.send(self.bot.status());
                }
            }
        }
        tracing::debug!("bot channel closed");
    }

    /// Spawn [`BotServer::run`] on the current runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
