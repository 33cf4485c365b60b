//! Cadence: a single-user daily study reminder bot.
//!
//! Walks a fixed, ordered task plan one day at a time, sending each day's
//! task over WhatsApp and reacting to the recipient's replies.
//!
//! # Architecture
//!
//! - **Plan / progress**: the pure state machine (`plan`) and the reply
//!   classifier (`command`)
//! - **Store**: one JSON record, rewritten in full, guarded by a revision
//!   counter (`store`)
//! - **Bot**: load, transition, save, acknowledge; requests are serialized
//!   through a single owner task (`bot`)
//! - **Channels**: Twilio sender and the axum webhook gateway (`channels`)
//! - **Scheduler**: fires the daily dispatch at a fixed local hour
//!   (`scheduler`)

pub mod bot;
pub mod channels;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod logging;
pub mod messages;
pub mod plan;
pub mod scheduler;
pub mod store;

pub use bot::{
    Bot, BotHandle, Delivery, DispatchOutcome, ReplyReport, StatusSnapshot, TransitionReport,
};
pub use command::{ReplyCommand, classify};
pub use config::BotConfig;
pub use error::{BotError, Result};
pub use plan::{ProgressState, TaskPlan};
