//! Task plan and the progress state machine.
//!
//! [`ProgressState`] is the single record the bot persists. The transitions
//! here are pure: they mutate the record in memory and report what happened,
//! leaving persistence and messaging to [`crate::bot::Bot`].

use crate::error::{BotError, Result};
use chrono::NaiveDate;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;

/// Ordered, 1-indexed mapping from day number to task text.
///
/// Always contiguous: days `1..=N` with `N >= 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPlan {
    items: BTreeMap<u32, String>,
}

impl TaskPlan {
    /// Build a plan from numeric day keys.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::InvalidPlan`] when the plan is empty, contains day
    /// `0`, or skips a day.
    pub fn new(items: BTreeMap<u32, String>) -> Result<Self> {
        if items.is_empty() {
            return Err(BotError::InvalidPlan("plan has no days".to_owned()));
        }
        for (expected, day) in (1u32..).zip(items.keys()) {
            if *day != expected {
                return Err(BotError::InvalidPlan(format!(
                    "days must be contiguous from 1; expected day {expected}, found day {day}"
                )));
            }
        }
        Ok(Self { items })
    }

    /// Build a plan from the string-keyed map used in the state file.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::InvalidPlan`] for non-numeric or duplicate keys,
    /// and for anything [`TaskPlan::new`] rejects.
    pub fn from_raw(raw: BTreeMap<String, String>) -> Result<Self> {
        let mut items = BTreeMap::new();
        for (key, task) in raw {
            let day: u32 = key.trim().parse().map_err(|_| {
                BotError::InvalidPlan(format!("day key `{key}` is not a positive integer"))
            })?;
            if day == 0 {
                return Err(BotError::InvalidPlan("day keys start at 1".to_owned()));
            }
            if items.insert(day, task).is_some() {
                return Err(BotError::InvalidPlan(format!("day {day} is defined twice")));
            }
        }
        Self::new(items)
    }

    /// Parse a plan from a JSON object such as `{"1": "Read chapter 1"}`.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::InvalidPlan`] if the JSON is malformed or the plan
    /// fails validation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, String> = serde_json::from_str(json)
            .map_err(|e| BotError::InvalidPlan(format!("cannot parse plan: {e}")))?;
        Self::from_raw(raw)
    }

    /// Last day of the plan.
    #[must_use]
    pub fn max_day(&self) -> u32 {
        self.items.keys().next_back().copied().unwrap_or(0)
    }

    /// Task text for `day`, if the plan defines one.
    #[must_use]
    pub fn task(&self, day: u32) -> Option<&str> {
        self.items.get(&day).map(String::as_str)
    }

    /// Number of days in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always `false` for a validated plan.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate days in order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.items.iter().map(|(day, task)| (*day, task.as_str()))
    }
}

// Written with string keys in numeric order so the state file stays readable
// past day 9.
impl Serialize for TaskPlan {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.items.len()))?;
        for (day, task) in &self.items {
            map.serialize_entry(&day.to_string(), task)?;
        }
        map.end()
    }
}

/// The single persisted progress record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressState {
    /// Day whose task is active (`>= 1`).
    pub current_day: u32,
    /// Completed days since the last restart.
    pub streak: u32,
    /// Calendar day (fixed timezone) a message was last dispatched.
    pub last_sent_on: Option<NaiveDate>,
    /// The task plan.
    pub plan: TaskPlan,
    /// Persisted revision, bumped by the store on every save.
    pub revision: u64,
}

/// Result of the day-completion transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneOutcome {
    /// Moved on to `next_day`.
    Advanced { next_day: u32, streak: u32 },
    /// Already on the last day; only the streak moved.
    Finished { streak: u32 },
}

/// What a dispatch run should do for a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPlan<'a> {
    /// A message already went out today.
    AlreadySent,
    /// No task is defined for the current day.
    Exhausted,
    /// Send this day's task.
    Task { day: u32, text: &'a str },
}

impl ProgressState {
    /// Fresh record at day 1 that has never sent anything.
    #[must_use]
    pub fn fresh(plan: TaskPlan) -> Self {
        Self {
            current_day: 1,
            streak: 0,
            last_sent_on: None,
            plan,
            revision: 0,
        }
    }

    /// Complete the active day.
    pub fn mark_done(&mut self) -> DoneOutcome {
        self.streak = self.streak.saturating_add(1);
        if self.current_day < self.plan.max_day() {
            self.current_day += 1;
            self.last_sent_on = None;
            DoneOutcome::Advanced {
                next_day: self.current_day,
                streak: self.streak,
            }
        } else {
            DoneOutcome::Finished {
                streak: self.streak,
            }
        }
    }

    /// Let the next scheduled run re-send the active task.
    ///
    /// The day pointer does not move, so the whole plan shifts by one day.
    pub fn postpone(&mut self) {
        self.last_sent_on = None;
    }

    /// Back to day 1 with a zero streak.
    pub fn restart(&mut self) {
        self.current_day = 1;
        self.streak = 0;
        self.last_sent_on = None;
    }

    /// Decide what dispatching on `today` should do.
    #[must_use]
    pub fn dispatch_plan(&self, today: NaiveDate, force: bool) -> DispatchPlan<'_> {
        if !force && self.sent_on(today) {
            return DispatchPlan::AlreadySent;
        }
        match self.plan.task(self.current_day) {
            Some(text) => DispatchPlan::Task {
                day: self.current_day,
                text,
            },
            None => DispatchPlan::Exhausted,
        }
    }

    /// Record that a message went out on `today`.
    pub fn record_sent(&mut self, today: NaiveDate) {
        self.last_sent_on = Some(today);
    }

    /// Whether the guard already covers `today`.
    #[must_use]
    pub fn sent_on(&self, today: NaiveDate) -> bool {
        self.last_sent_on == Some(today)
    }

    /// Task text for the active day.
    #[must_use]
    pub fn current_task(&self) -> Option<&str> {
        self.plan.task(self.current_day)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn plan(days: u32) -> TaskPlan {
        TaskPlan::new(
            (1..=days)
                .map(|d| (d, format!("Read chapter {d}")))
                .collect(),
        )
        .expect("valid plan")
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).expect("valid date")
    }

    #[test]
    fn mark_done_below_last_day_advances_and_clears_guard() {
        for day in 1..5 {
            let mut state = ProgressState::fresh(plan(5));
            state.current_day = day;
            state.streak = 3;
            state.last_sent_on = Some(date(1));

            let outcome = state.mark_done();

            assert_eq!(
                outcome,
                DoneOutcome::Advanced {
                    next_day: day + 1,
                    streak: 4
                }
            );
            assert_eq!(state.current_day, day + 1);
            assert_eq!(state.streak, 4);
            assert_eq!(state.last_sent_on, None);
        }
    }

    #[test]
    fn mark_done_on_last_day_only_bumps_streak() {
        let mut state = ProgressState::fresh(plan(3));
        state.current_day = 3;
        state.streak = 2;
        state.last_sent_on = Some(date(4));

        let outcome = state.mark_done();

        assert_eq!(outcome, DoneOutcome::Finished { streak: 3 });
        assert_eq!(state.current_day, 3);
        assert_eq!(state.last_sent_on, Some(date(4)));
    }

    #[test]
    fn postpone_only_clears_guard() {
        let mut state = ProgressState::fresh(plan(3));
        state.current_day = 2;
        state.streak = 1;
        state.last_sent_on = Some(date(5));

        state.postpone();

        assert_eq!(state.current_day, 2);
        assert_eq!(state.streak, 1);
        assert_eq!(state.last_sent_on, None);
    }

    #[test]
    fn restart_resets_from_any_state() {
        let mut state = ProgressState::fresh(plan(4));
        state.current_day = 4;
        state.streak = 17;
        state.last_sent_on = Some(date(9));

        state.restart();

        assert_eq!(state.current_day, 1);
        assert_eq!(state.streak, 0);
        assert_eq!(state.last_sent_on, None);
    }

    #[test]
    fn dispatch_plan_respects_guard_unless_forced() {
        let mut state = ProgressState::fresh(plan(2));
        state.record_sent(date(10));

        assert_eq!(state.dispatch_plan(date(10), false), DispatchPlan::AlreadySent);
        assert_eq!(
            state.dispatch_plan(date(10), true),
            DispatchPlan::Task {
                day: 1,
                text: "Read chapter 1"
            }
        );
        assert!(matches!(
            state.dispatch_plan(date(11), false),
            DispatchPlan::Task { day: 1, .. }
        ));
    }

    #[test]
    fn dispatch_plan_reports_exhausted_plan() {
        let mut state = ProgressState::fresh(plan(2));
        state.current_day = 3;
        assert_eq!(state.dispatch_plan(date(1), false), DispatchPlan::Exhausted);
    }

    #[test]
    fn plan_rejects_gaps_and_bad_keys() {
        let gap: BTreeMap<u32, String> = [(1, "a".to_owned()), (3, "c".to_owned())].into();
        assert!(matches!(TaskPlan::new(gap), Err(BotError::InvalidPlan(_))));

        assert!(matches!(
            TaskPlan::new(BTreeMap::new()),
            Err(BotError::InvalidPlan(_))
        ));
        assert!(matches!(
            TaskPlan::from_json_str(r#"{"0": "zero", "1": "one"}"#),
            Err(BotError::InvalidPlan(_))
        ));
        assert!(matches!(
            TaskPlan::from_json_str(r#"{"one": "a"}"#),
            Err(BotError::InvalidPlan(_))
        ));
        assert!(matches!(
            TaskPlan::from_json_str(r#"{"1": "a", "01": "b"}"#),
            Err(BotError::InvalidPlan(_))
        ));
    }

    #[test]
    fn plan_parses_string_keys_numerically() {
        let raw: BTreeMap<String, String> = (1..=11)
            .map(|d| (d.to_string(), format!("task {d}")))
            .collect();
        let plan = TaskPlan::from_raw(raw).expect("valid");
        assert_eq!(plan.max_day(), 11);
        assert_eq!(plan.task(10), Some("task 10"));

        let json = serde_json::to_string(&plan).expect("serialize");
        assert!(json.starts_with(r#"{"1":"task 1","2":"task 2""#), "json was {json}");
    }
}
