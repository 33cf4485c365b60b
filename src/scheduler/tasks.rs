//! Daily trigger definition.
//!
//! Fire times are computed in the bot's fixed timezone, not UTC, so the
//! message goes out at the same local hour year round.

use crate::error::{BotError, Result};
use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Fires once per day at `hour:00:00` local time in `tz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTrigger {
    hour: u8,
    tz: Tz,
}

impl DailyTrigger {
    /// # Errors
    ///
    /// Returns [`BotError::Config`] if `hour` is not in `0..=23`.
    pub fn new(hour: u8, tz: Tz) -> Result<Self> {
        if hour > 23 {
            return Err(BotError::Config(format!(
                "daily hour must be 0-23, got {hour}"
            )));
        }
        Ok(Self { hour, tz })
    }

    #[must_use]
    pub fn hour(&self) -> u8 {
        self.hour
    }

    /// First fire time strictly after `now`.
    ///
    /// A local time skipped by a DST jump moves to the next day that has it.
    #[must_use]
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let fire_time = NaiveTime::from_hms_opt(u32::from(self.hour), 0, 0)?;
        let local_today = now.with_timezone(&self.tz).date_naive();

        (0..=2u64).find_map(|offset| {
            let date = local_today.checked_add_days(Days::new(offset))?;
            let fire = self
                .tz
                .from_local_datetime(&date.and_time(fire_time))
                .earliest()?
                .with_timezone(&Utc);
            (fire > now).then_some(fire)
        })
    }
}

impl std::fmt::Display for DailyTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "daily at {:02}:00 {}", self.hour, self.tz.name())
    }
}
