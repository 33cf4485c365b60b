//! Daily dispatch scheduler.
//!
//! Fires the bot's dispatch once a day at a fixed local hour.

pub mod runner;
pub mod tasks;

pub use runner::Scheduler;
pub use tasks::DailyTrigger;
