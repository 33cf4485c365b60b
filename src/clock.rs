//! Calendar-day clock anchored to a fixed timezone.

use crate::error::{BotError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Mutex;

/// Source of the current calendar day.
pub trait DayClock: Send + Sync {
    /// Today's date in the bot's timezone.
    fn today(&self) -> NaiveDate;
}

/// Wall clock in a fixed IANA timezone.
#[derive(Debug, Clone, Copy)]
pub struct ZonedClock {
    tz: Tz,
}

impl ZonedClock {
    #[must_use]
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

impl DayClock for ZonedClock {
    fn today(&self) -> NaiveDate {
        day_key(Utc::now(), self.tz)
    }
}

/// Clock that only moves when told to. Used by tests.
#[derive(Debug)]
pub struct ManualClock {
    today: Mutex<NaiveDate>,
}

impl ManualClock {
    #[must_use]
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: Mutex::new(today),
        }
    }

    pub fn set(&self, today: NaiveDate) {
        if let Ok(mut guard) = self.today.lock() {
            *guard = today;
        }
    }

    /// Move forward by `days` calendar days.
    pub fn advance_days(&self, days: u64) {
        if let Ok(mut guard) = self.today.lock()
            && let Some(next) = guard.checked_add_days(chrono::Days::new(days))
        {
            *guard = next;
        }
    }
}

impl DayClock for ManualClock {
    fn today(&self) -> NaiveDate {
        match self.today.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Calendar date of `now` in `tz`.
#[must_use]
pub fn day_key(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Parse an IANA timezone name such as `Asia/Kolkata`.
///
/// # Errors
///
/// Returns [`BotError::Config`] for unknown names.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| BotError::Config(format!("unknown timezone `{name}`: {e}")))
}

/// Abbreviation for `tz` at `now`, e.g. `IST`.
#[must_use]
pub fn timezone_label(tz: Tz, now: DateTime<Utc>) -> String {
    now.with_timezone(&tz).format("%Z").to_string()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::TimeZone;

    #[test]
    fn day_key_follows_the_fixed_timezone() {
        let tz = parse_timezone("Asia/Kolkata").expect("tz");
        // 18:45 UTC is 00:15 the next day in IST.
        let late = Utc.with_ymd_and_hms(2026, 10, 18, 18, 45, 0).unwrap();
        assert_eq!(day_key(late, tz), NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());

        let early = Utc.with_ymd_and_hms(2026, 10, 18, 18, 15, 0).unwrap();
        assert_eq!(day_key(early, tz), NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
    }

    #[test]
    fn unknown_timezone_is_a_config_error() {
        assert!(matches!(
            parse_timezone("Mars/Olympus"),
            Err(BotError::Config(_))
        ));
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(NaiveDate::from_ymd_opt(2026, 12, 31).unwrap());
        clock.advance_days(1);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
    }

    #[test]
    fn label_for_kolkata_is_ist() {
        let tz = parse_timezone("Asia/Kolkata").expect("tz");
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(timezone_label(tz, now), "IST");
    }
}
