//! Outbound message texts.

use crate::clock::timezone_label;
use crate::command::ReplyCommand;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

const EXHAUSTED: &str = "🎉 All tasks completed! Reply 'restart' to begin again.";

const RESTARTED: &str = "🔄 Restarted from Day 1! Let’s begin again strong 💪";

const HELP: &str = "Commands:\n\
• \"I'll do it\" → mark done\n\
• \"We'll do it tomorrow\" → postpone\n\
• \"restart\" → start from Day 1";

const LEGEND: &str = "Reply with:\n\
• \"I'll do it\" ✅ to mark done\n\
• \"We'll do it tomorrow\" 🔁 to postpone (shifts plan)\n\
• \"restart\" 🔄 to start from Day 1";

/// Zone suffix after the send hour.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ZoneLabel {
    Fixed(String),
    /// Abbreviation looked up at render time, so it follows DST changes.
    Zone(Tz),
}

/// Message templates with the recipient and schedule baked in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplates {
    recipient_name: String,
    hour: String,
    zone: ZoneLabel,
}

impl MessageTemplates {
    /// `daily_hour` is rendered on a 12-hour clock followed by `tz_label`,
    /// e.g. `5 PM IST`.
    #[must_use]
    pub fn new(recipient_name: impl Into<String>, daily_hour: u8, tz_label: &str) -> Self {
        Self {
            recipient_name: recipient_name.into().trim().to_owned(),
            hour: format_hour(daily_hour),
            zone: ZoneLabel::Fixed(tz_label.trim().to_owned()),
        }
    }

    /// Like [`MessageTemplates::new`], with the abbreviation of `tz` in
    /// effect when each message is rendered.
    #[must_use]
    pub fn zoned(recipient_name: impl Into<String>, daily_hour: u8, tz: Tz) -> Self {
        Self {
            recipient_name: recipient_name.into().trim().to_owned(),
            hour: format_hour(daily_hour),
            zone: ZoneLabel::Zone(tz),
        }
    }

    fn send_time_at(&self, now: DateTime<Utc>) -> String {
        let label = match &self.zone {
            ZoneLabel::Fixed(label) => label.clone(),
            ZoneLabel::Zone(tz) => timezone_label(*tz, now),
        };
        if label.is_empty() {
            self.hour.clone()
        } else {
            format!("{} {label}", self.hour)
        }
    }

    fn greeting(&self) -> String {
        if self.recipient_name.is_empty() {
            "👋 Hey!".to_owned()
        } else {
            format!("👋 Hey {}!", self.recipient_name)
        }
    }

    /// Daily task message with the reply legend.
    #[must_use]
    pub fn task_body(&self, task: &str) -> String {
        format!("{}\n📚 {task}\n\n{LEGEND}", self.greeting())
    }

    /// Sent instead of a task once the plan runs out.
    #[must_use]
    pub fn exhausted(&self) -> &'static str {
        EXHAUSTED
    }

    #[must_use]
    pub fn done_advanced(&self, streak: u32) -> String {
        format!(
            "✅ Nice job! Streak: {streak}🔥\nNext task will come tomorrow at {}.",
            self.send_time_at(Utc::now())
        )
    }

    #[must_use]
    pub fn finished(&self, streak: u32) -> String {
        format!("🏁 You’ve finished all tasks! Final streak: {streak}.")
    }

    #[must_use]
    pub fn postponed(&self) -> String {
        format!(
            "🔁 Got it! Task postponed — I’ll resend it tomorrow at {} 🌙",
            self.send_time_at(Utc::now())
        )
    }

    #[must_use]
    pub fn restarted(&self) -> &'static str {
        RESTARTED
    }

    /// Static help for replies nothing matched.
    #[must_use]
    pub fn help(&self) -> &'static str {
        HELP
    }

    /// Short text returned in the webhook reply envelope.
    #[must_use]
    pub fn reply_confirmation(&self, command: ReplyCommand) -> &'static str {
        match command {
            ReplyCommand::Done => "Marked as done. 💪",
            ReplyCommand::Postpone => "Okay—postponed to tomorrow 🌙",
            ReplyCommand::Restart => "Restarted. 🚀",
            ReplyCommand::Unknown => HELP,
        }
    }

    /// Connectivity check message.
    #[must_use]
    pub fn ping(&self) -> String {
        format!(
            "{} This is a cadence test message. Everything’s working! 🚀",
            self.greeting()
        )
    }
}

/// `17` → `5 PM`, `0` → `12 AM`.
fn format_hour(hour: u8) -> String {
    let suffix = if hour < 12 { "AM" } else { "PM" };
    let twelve = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{twelve} {suffix}")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::TimeZone;

    #[test]
    fn task_body_has_greeting_task_and_legend() {
        let templates = MessageTemplates::new("Sibi", 17, "IST");
        let body = templates.task_body("Read chapter 1");
        assert!(body.starts_with("👋 Hey Sibi!\n📚 Read chapter 1\n\nReply with:"));
        assert!(body.contains("\"I'll do it\""));
        assert!(body.contains("\"restart\""));
    }

    #[test]
    fn acknowledgments_mention_send_time() {
        let templates = MessageTemplates::new("", 17, "IST");
        assert!(templates.done_advanced(3).contains("Streak: 3"));
        assert!(templates.done_advanced(3).contains("tomorrow at 5 PM IST"));
        assert!(templates.postponed().contains("5 PM IST"));
        assert!(templates.finished(9).contains("Final streak: 9"));
        assert!(templates.ping().starts_with("👋 Hey! This is a cadence test message."));
    }

    #[test]
    fn zoned_label_follows_daylight_saving() {
        let tz: Tz = "America/New_York".parse().expect("tz");
        let templates = MessageTemplates::zoned("Sam", 17, tz);

        let winter = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let summer = Utc.with_ymd_and_hms(2026, 7, 15, 12, 0, 0).unwrap();
        assert_eq!(templates.send_time_at(winter), "5 PM EST");
        assert_eq!(templates.send_time_at(summer), "5 PM EDT");
    }

    #[test]
    fn hours_render_on_twelve_hour_clock() {
        assert_eq!(format_hour(0), "12 AM");
        assert_eq!(format_hour(9), "9 AM");
        assert_eq!(format_hour(12), "12 PM");
        assert_eq!(format_hour(23), "11 PM");
    }

    #[test]
    fn unknown_replies_get_help() {
        let templates = MessageTemplates::new("x", 8, "");
        assert_eq!(
            templates.reply_confirmation(ReplyCommand::Unknown),
            templates.help()
        );
        assert!(templates.postponed().contains("8 AM 🌙"));
    }
}
