//! Scheduler background loop.
//!
//! Sleeps until the next fire time of the [`DailyTrigger`], asks the bot to
//! dispatch, and repeats. The per-day guard lives in the state record, so a
//! restart of the process around the fire time cannot double-send.

use crate::bot::{BotHandle, DispatchOutcome};
use crate::error::BotError;
use crate::scheduler::tasks::DailyTrigger;
use chrono::Utc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Wait used when no fire time can be computed, then try again.
const RETRY_DELAY: Duration = Duration::from_secs(3600);

/// Background scheduler that runs the daily dispatch.
pub struct Scheduler {
    trigger: DailyTrigger,
    bot: BotHandle,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(trigger: DailyTrigger, bot: BotHandle, cancel: CancellationToken) -> Self {
        Self {
            trigger,
            bot,
            cancel,
        }
    }

    /// Start the scheduler background loop.
    pub fn run(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("scheduler started: {}", self.trigger);
            loop {
                let now = Utc::now();
                let Some(next) = self.trigger.next_after(now) else {
                    warn!("no upcoming fire time for {}, retrying later", self.trigger);
                    tokio::select! {
                        () = self.cancel.cancelled() => break,
                        () = tokio::time::sleep(RETRY_DELAY) => continue,
                    }
                };
                info!("next dispatch at {next}");
                let delay = (next - now).to_std().unwrap_or_default();

                tokio::select! {
                    () = self.cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
                self.tick().await;
            }
            info!("scheduler stopped");
        })
    }

    /// Run one dispatch. Never forced.
    pub async fn tick(&self) -> Option<DispatchOutcome> {
        match self.bot.dispatch(false).await {
            Ok(outcome) => {
                info!("scheduled dispatch: {outcome}");
                Some(outcome)
            }
            Err(BotError::Shutdown) => {
                warn!("bot is shut down, stopping scheduler");
                self.cancel.cancel();
                None
            }
            Err(e) => {
                error!("scheduled dispatch failed: {e}");
                None
            }
        }
    }
}
