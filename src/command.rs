//! Classifier for free-text replies.
//!
//! Replies are matched against an ordered rule list; the first rule that
//! matches wins, so "done" beats "postpone" beats "restart".

use serde::Serialize;

/// Command recognized in an inbound reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyCommand {
    /// Complete today's task.
    Done,
    /// Re-send today's task tomorrow.
    Postpone,
    /// Back to day 1.
    Restart,
    /// Nothing recognized.
    Unknown,
}

enum Matcher {
    /// Reply contains any of the phrases.
    Contains(&'static [&'static str]),
    /// Whole reply equals the phrase.
    Exact(&'static str),
}

impl Matcher {
    fn matches(&self, normalized: &str) -> bool {
        match self {
            Self::Contains(phrases) => phrases.iter().any(|p| normalized.contains(p)),
            Self::Exact(phrase) => normalized == *phrase,
        }
    }
}

const RULES: &[(ReplyCommand, Matcher)] = &[
    (
        ReplyCommand::Done,
        Matcher::Contains(&["i'll do it", "ill do it", "i ll do it"]),
    ),
    (
        ReplyCommand::Postpone,
        Matcher::Contains(&[
            "we'll do it tomorrow",
            "well do it tomorrow",
            "we ll do it tomorrow",
        ]),
    ),
    (ReplyCommand::Restart, Matcher::Exact("restart")),
];

/// Trim, lowercase and straighten typographic quotes.
#[must_use]
pub fn normalize_reply(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(&['\u{2018}', '\u{2019}'][..], "'")
        .replace(&['\u{201C}', '\u{201D}'][..], "\"")
}

/// Classify a raw reply.
#[must_use]
pub fn classify(raw: &str) -> ReplyCommand {
    let normalized = normalize_reply(raw);
    RULES
        .iter()
        .find(|(_, matcher)| matcher.matches(&normalized))
        .map_or(ReplyCommand::Unknown, |(command, _)| *command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_variants() {
        for reply in [
            "I'll do it!",
            "ill do it",
            "I LL DO IT",
            "I\u{2019}ll do it",
            "ok i'll do it today",
        ] {
            assert_eq!(classify(reply), ReplyCommand::Done, "reply: {reply}");
        }
    }

    #[test]
    fn postpone_variants() {
        for reply in [
            "we'll do it tomorrow please",
            "Well do it tomorrow",
            "WE LL DO IT TOMORROW",
            "We\u{2019}ll do it tomorrow \u{1F319}",
        ] {
            assert_eq!(classify(reply), ReplyCommand::Postpone, "reply: {reply}");
        }
    }

    #[test]
    fn restart_requires_the_whole_reply() {
        assert_eq!(classify("restart"), ReplyCommand::Restart);
        assert_eq!(classify("  RESTART \n"), ReplyCommand::Restart);
        assert_eq!(classify("please restart"), ReplyCommand::Unknown);
    }

    #[test]
    fn done_wins_over_later_rules() {
        assert_eq!(
            classify("i'll do it, we'll do it tomorrow"),
            ReplyCommand::Done
        );
    }

    #[test]
    fn unrelated_text_is_unknown() {
        assert_eq!(classify("hello"), ReplyCommand::Unknown);
        assert_eq!(classify(""), ReplyCommand::Unknown);
    }

    #[test]
    fn normalize_straightens_curly_quotes() {
        assert_eq!(
            normalize_reply(" \u{201C}I\u{2018}ll\u{201D} "),
            "\"i'll\""
        );
    }
}
