//! Bot context: ties the progress state machine to the store, the clock and
//! the outbound sender.
//!
//! Every method here is a full read-modify-write against the store. Callers
//! that can run concurrently go through [`actor::BotHandle`] so requests are
//! applied one at a time.

pub mod actor;

use crate::channels::recording::RecordingSender;
use crate::channels::traits::MessageSender;
use crate::channels::twilio::TwilioWhatsApp;
use crate::clock::{DayClock, ZonedClock};
use crate::command::{ReplyCommand, classify};
use crate::config::BotConfig;
use crate::error::Result;
use crate::messages::MessageTemplates;
use crate::plan::{DispatchPlan, DoneOutcome, ProgressState};
use crate::store::{JsonFileStore, MemoryStore, StateStore};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub use actor::{BotHandle, BotServer, bot_channel};

/// Where a one-shot command's messages go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Send through the configured provider and persist the record.
    Provider,
    /// Log messages instead of sending them and leave the state file
    /// untouched.
    DryRun,
}

/// Outcome of one dispatch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// A message already went out on `date`; nothing sent.
    AlreadySent { date: NaiveDate },
    /// The task for `day` was sent.
    Sent {
        day: u32,
        message_id: String,
        date: NaiveDate,
    },
    /// The plan is used up; the completion notice was sent.
    Exhausted { message_id: String, date: NaiveDate },
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadySent { date } => write!(f, "already sent on {date}, nothing to do"),
            Self::Sent {
                day,
                message_id,
                date,
            } => write!(f, "sent day {day} on {date} (message {message_id})"),
            Self::Exhausted { message_id, date } => {
                write!(f, "all tasks completed, notice sent on {date} (message {message_id})")
            }
        }
    }
}

/// Read-only view of the progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub current_day: u32,
    pub total_days: u32,
    pub streak: u32,
    pub last_sent_on: Option<NaiveDate>,
    pub today: NaiveDate,
    pub sent_today: bool,
    pub current_task: Option<String>,
    pub revision: u64,
}

impl StatusSnapshot {
    #[must_use]
    pub fn new(state: &ProgressState, today: NaiveDate) -> Self {
        Self {
            current_day: state.current_day,
            total_days: state.plan.max_day(),
            streak: state.streak,
            last_sent_on: state.last_sent_on,
            today,
            sent_today: state.sent_on(today),
            current_task: state.current_task().map(str::to_owned),
            revision: state.revision,
        }
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "day:       {} of {}", self.current_day, self.total_days)?;
        writeln!(f, "streak:    {}", self.streak)?;
        match self.last_sent_on {
            Some(date) => writeln!(f, "last sent: {date}")?,
            None => writeln!(f, "last sent: never")?,
        }
        writeln!(
            f,
            "today:     {} ({})",
            self.today,
            if self.sent_today { "sent" } else { "not sent" }
        )?;
        match &self.current_task {
            Some(task) => write!(f, "task:      {task}"),
            None => write!(f, "task:      (all tasks completed)"),
        }
    }
}

/// Result of a state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionReport {
    pub command: ReplyCommand,
    /// Acknowledgment text sent to the recipient.
    pub acknowledgment: String,
    /// Whether the acknowledgment was delivered. The new state is persisted
    /// either way.
    pub acknowledged: bool,
    pub message_id: Option<String>,
    pub status: StatusSnapshot,
}

/// Result of handling one inbound reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyReport {
    pub command: ReplyCommand,
    /// Short text for the webhook response envelope.
    pub confirmation: String,
    /// `None` when the reply was not recognized.
    pub transition: Option<TransitionReport>,
}

/// The bot context.
pub struct Bot {
    store: Box<dyn StateStore>,
    sender: Arc<dyn MessageSender>,
    clock: Arc<dyn DayClock>,
    messages: MessageTemplates,
}

impl Bot {
    pub fn new(
        store: Box<dyn StateStore>,
        sender: Arc<dyn MessageSender>,
        clock: Arc<dyn DayClock>,
        messages: MessageTemplates,
    ) -> Self {
        Self {
            store,
            sender,
            clock,
            messages,
        }
    }

    /// Build the production context: JSON file store, zoned wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::BotError::Config`] if the configured timezone
    /// is unknown.
    pub fn from_config(config: &BotConfig, sender: Arc<dyn MessageSender>) -> Result<Self> {
        Self::with_store(
            config,
            Box::new(JsonFileStore::new(config.state.path.clone())),
            sender,
        )
    }

    /// Build the context for a one-shot command.
    ///
    /// With [`Delivery::DryRun`] the record is copied into memory first, so
    /// transitions and the per-day guard play out without reaching the
    /// state file.
    ///
    /// # Errors
    ///
    /// [`crate::error::BotError::Config`] for an unknown timezone or
    /// incomplete provider settings; store failures when the dry-run copy
    /// cannot be read.
    pub fn for_delivery(config: &BotConfig, delivery: Delivery) -> Result<Self> {
        match delivery {
            Delivery::Provider => {
                Self::from_config(config, Arc::new(TwilioWhatsApp::new(&config.provider)?))
            }
            Delivery::DryRun => {
                let snapshot = JsonFileStore::new(config.state.path.clone()).load()?;
                Self::with_store(
                    config,
                    Box::new(MemoryStore::with_state(snapshot)),
                    Arc::new(RecordingSender::echoing()),
                )
            }
        }
    }

    fn with_store(
        config: &BotConfig,
        store: Box<dyn StateStore>,
        sender: Arc<dyn MessageSender>,
    ) -> Result<Self> {
        let tz = config.timezone()?;
        let messages = MessageTemplates::zoned(
            config.messages.recipient_name.as_str(),
            config.schedule.daily_hour,
            tz,
        );
        Ok(Self::new(store, sender, Arc::new(ZonedClock::new(tz)), messages))
    }

    #[must_use]
    pub fn messages(&self) -> &MessageTemplates {
        &self.messages
    }

    /// Complete the active day.
    ///
    /// # Errors
    ///
    /// Store failures only; a failed acknowledgment is reported in the
    /// returned [`TransitionReport`].
    pub async fn mark_done(&self) -> Result<TransitionReport> {
        self.transition(ReplyCommand::Done, |state| match state.mark_done() {
            DoneOutcome::Advanced { streak, .. } => self.messages.done_advanced(streak),
            DoneOutcome::Finished { streak } => self.messages.finished(streak),
        })
        .await
    }

    /// Let tomorrow's run re-send the active task.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn postpone(&self) -> Result<TransitionReport> {
        self.transition(ReplyCommand::Postpone, |state| {
            state.postpone();
            self.messages.postponed()
        })
        .await
    }

    /// Back to day 1.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn restart(&self) -> Result<TransitionReport> {
        self.transition(ReplyCommand::Restart, |state| {
            state.restart();
            self.messages.restarted().to_owned()
        })
        .await
    }

    async fn transition(
        &self,
        command: ReplyCommand,
        apply: impl FnOnce(&mut ProgressState) -> String,
    ) -> Result<TransitionReport> {
        let mut state = self.store.load()?;
        let acknowledgment = apply(&mut state);
        self.store.save(&mut state)?;
        info!(
            "{command:?}: day {} streak {} (revision {})",
            state.current_day, state.streak, state.revision
        );

        let (acknowledged, message_id) = match self.sender.send(&acknowledgment).await {
            Ok(id) => (true, Some(id)),
            Err(e) => {
                error!("{command:?} was saved but its acknowledgment was not delivered: {e}");
                (false, None)
            }
        };

        Ok(TransitionReport {
            command,
            acknowledgment,
            acknowledged,
            message_id,
            status: StatusSnapshot::new(&state, self.clock.today()),
        })
    }

    /// Classify `text` and apply the matching transition.
    ///
    /// # Errors
    ///
    /// Store failures from the transition. Unrecognized replies never fail.
    pub async fn handle_reply(&self, text: &str) -> Result<ReplyReport> {
        let command = classify(text);
        let transition = match command {
            ReplyCommand::Done => Some(self.mark_done().await?),
            ReplyCommand::Postpone => Some(self.postpone().await?),
            ReplyCommand::Restart => Some(self.restart().await?),
            ReplyCommand::Unknown => {
                debug!("unrecognized reply, answering with help");
                None
            }
        };
        Ok(ReplyReport {
            command,
            confirmation: self.messages.reply_confirmation(command).to_owned(),
            transition,
        })
    }

    /// Send today's message unless one already went out today.
    ///
    /// `force` skips the per-day guard. The guard is only recorded after the
    /// provider accepted the message.
    ///
    /// # Errors
    ///
    /// [`crate::error::BotError::SendFailed`] leaves the record untouched.
    /// Store failures after a successful send are returned as-is; the message
    /// has gone out by then.
    pub async fn dispatch(&self, force: bool) -> Result<DispatchOutcome> {
        let today = self.clock.today();
        let mut state = self.store.load()?;

        let (body, day) = match state.dispatch_plan(today, force) {
            DispatchPlan::AlreadySent => {
                info!("already sent on {today}, skipping");
                return Ok(DispatchOutcome::AlreadySent { date: today });
            }
            DispatchPlan::Exhausted => (self.messages.exhausted().to_owned(), None),
            DispatchPlan::Task { day, text } => (self.messages.task_body(text), Some(day)),
        };
        if force {
            debug!("force flag set, per-day guard bypassed");
        }

        let message_id = self.sender.send(&body).await?;
        state.record_sent(today);
        if let Err(e) = self.store.save(&mut state) {
            error!("message {message_id} was sent but the send date was not saved: {e}");
            return Err(e);
        }

        let outcome = match day {
            Some(day) => DispatchOutcome::Sent {
                day,
                message_id,
                date: today,
            },
            None => DispatchOutcome::Exhausted {
                message_id,
                date: today,
            },
        };
        info!("dispatch: {outcome}");
        Ok(outcome)
    }

    /// Snapshot of the current record.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub fn status(&self) -> Result<StatusSnapshot> {
        let state = self.store.load()?;
        Ok(StatusSnapshot::new(&state, self.clock.today()))
    }

    /// Send the connectivity test message. State is not touched.
    ///
    /// # Errors
    ///
    /// [`crate::error::BotError::SendFailed`] from the provider.
    pub async fn ping(&self) -> Result<String> {
        let message_id = self.sender.send(&self.messages.ping()).await?;
        info!("ping delivered via {} (message {message_id})", self.sender.id());
        Ok(message_id)
    }

    /// Ask the sender whether it can deliver, without sending a message.
    ///
    /// # Errors
    ///
    /// [`crate::error::BotError::SendFailed`] when the provider cannot be
    /// reached at all.
    pub async fn check_sender(&self) -> Result<bool> {
        let healthy = self.sender.health_check().await?;
        if healthy {
            info!("sender {} is ready", self.sender.id());
        } else {
            warn!("sender {} rejected the health check", self.sender.id());
        }
        Ok(healthy)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::channels::recording::RecordingSender;
    use crate::clock::ManualClock;
    use crate::error::BotError;
    use crate::plan::TaskPlan;
    use crate::store::MemoryStore;

    struct Fixture {
        bot: Bot,
        store: MemoryStore,
        sender: RecordingSender,
        clock: Arc<ManualClock>,
    }

    fn fixture(days: u32) -> Fixture {
        let plan = TaskPlan::new(
            (1..=days)
                .map(|d| (d, format!("Read chapter {d}")))
                .collect(),
        )
        .expect("plan");
        let store = MemoryStore::with_state(ProgressState::fresh(plan));
        let sender = RecordingSender::new();
        let clock = Arc::new(ManualClock::new(
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        ));
        let bot = Bot::new(
            Box::new(store.clone()),
            Arc::new(sender.clone()),
            clock.clone(),
            MessageTemplates::new("Sam", 17, "IST"),
        );
        Fixture {
            bot,
            store,
            sender,
            clock,
        }
    }

    #[tokio::test]
    async fn dispatch_sends_once_per_day() {
        let fx = fixture(3);

        let first = fx.bot.dispatch(false).await.expect("dispatch");
        assert!(matches!(first, DispatchOutcome::Sent { day: 1, .. }));

        let second = fx.bot.dispatch(false).await.expect("dispatch");
        assert!(matches!(second, DispatchOutcome::AlreadySent { .. }));

        assert_eq!(fx.sender.sent().len(), 1);
        assert!(fx.sender.sent()[0].contains("📚 Read chapter 1"));
    }

    #[tokio::test]
    async fn forced_dispatch_resends() {
        let fx = fixture(3);
        fx.bot.dispatch(false).await.expect("dispatch");
        let forced = fx.bot.dispatch(true).await.expect("forced");
        assert!(matches!(forced, DispatchOutcome::Sent { day: 1, .. }));
        assert_eq!(fx.sender.sent().len(), 2);
    }

    #[tokio::test]
    async fn send_failure_leaves_guard_unset() {
        let fx = fixture(3);
        fx.sender.set_failing(true);

        let err = fx.bot.dispatch(false).await.expect_err("send fails");
        assert!(matches!(err, BotError::SendFailed(_)));

        let state = fx.store.snapshot().expect("state");
        assert_eq!(state.last_sent_on, None);
        assert_eq!(state.revision, 0);

        fx.sender.set_failing(false);
        let retry = fx.bot.dispatch(false).await.expect("retry");
        assert!(matches!(retry, DispatchOutcome::Sent { day: 1, .. }));
    }

    #[tokio::test]
    async fn exhausted_plan_sends_notice_once_per_day() {
        let fx = fixture(1);
        fx.bot.mark_done().await.expect("done");
        {
            let mut state = fx.store.snapshot().expect("state");
            state.current_day = 2;
            fx.store.save(&mut state).expect("save");
        }

        let outcome = fx.bot.dispatch(false).await.expect("dispatch");
        assert!(matches!(outcome, DispatchOutcome::Exhausted { .. }));
        assert!(matches!(
            fx.bot.dispatch(false).await.expect("dispatch"),
            DispatchOutcome::AlreadySent { .. }
        ));
        assert_eq!(
            fx.sender.sent().last().map(String::as_str),
            Some(fx.bot.messages().exhausted())
        );
    }

    #[tokio::test]
    async fn unknown_reply_leaves_state_alone() {
        let fx = fixture(2);
        let before = fx.store.snapshot().expect("state");

        let report = fx.bot.handle_reply("hello").await.expect("reply");

        assert_eq!(report.command, ReplyCommand::Unknown);
        assert!(report.transition.is_none());
        assert_eq!(report.confirmation, fx.bot.messages().help());
        assert_eq!(fx.store.snapshot().expect("state"), before);
        assert!(fx.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn done_on_last_day_reports_finished() {
        let fx = fixture(1);
        let report = fx.bot.handle_reply("I'll do it").await.expect("reply");
        let transition = report.transition.expect("transition");
        assert!(transition.acknowledgment.contains("Final streak: 1"));
        assert_eq!(transition.status.current_day, 1);
        assert_eq!(transition.status.streak, 1);
    }

    #[tokio::test]
    async fn failed_acknowledgment_keeps_transition() {
        let fx = fixture(3);
        fx.sender.set_failing(true);

        let report = fx.bot.mark_done().await.expect("transition persists");

        assert!(!report.acknowledged);
        assert_eq!(report.message_id, None);
        assert_eq!(fx.store.snapshot().expect("state").current_day, 2);
    }

    #[tokio::test]
    async fn postponed_task_is_resent_next_day() {
        let fx = fixture(3);
        fx.bot.dispatch(false).await.expect("dispatch");
        fx.bot.handle_reply("we'll do it tomorrow").await.expect("postpone");

        fx.clock.advance_days(1);
        let outcome = fx.bot.dispatch(false).await.expect("dispatch");

        assert!(matches!(outcome, DispatchOutcome::Sent { day: 1, .. }));
        let status = fx.bot.status().expect("status");
        assert!(status.sent_today);
        assert_eq!(status.current_task.as_deref(), Some("Read chapter 1"));
    }

    #[tokio::test]
    async fn sender_check_sends_nothing() {
        let fx = fixture(2);
        assert!(fx.bot.check_sender().await.expect("check"));

        fx.sender.set_failing(true);
        assert!(!fx.bot.check_sender().await.expect("check"));
        assert!(fx.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn ping_does_not_touch_state() {
        let fx = fixture(2);
        let id = fx.bot.ping().await.expect("ping");
        assert_eq!(id, "SM-local-1");
        assert_eq!(fx.store.snapshot().expect("state").revision, 0);
    }
}
