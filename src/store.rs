//! Persistence for the progress record.
//!
//! The record is read in full and rewritten in full. Every save bumps a
//! `revision` counter and refuses to overwrite a record whose on-disk
//! revision moved since it was loaded, so two processes sharing one state
//! file cannot silently lose each other's updates.

use crate::error::{BotError, Result};
use crate::plan::{ProgressState, TaskPlan};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Storage backend for the progress record.
pub trait StateStore: Send + Sync {
    /// Read the whole record.
    fn load(&self) -> Result<ProgressState>;

    /// Replace the whole record, bumping `state.revision` on success.
    fn save(&self, state: &mut ProgressState) -> Result<()>;
}

/// Record layout on disk.
#[derive(Debug, Deserialize)]
struct StoredState {
    current_day: u32,
    #[serde(default)]
    streak: u32,
    #[serde(default)]
    last_sent_on: Option<String>,
    items: BTreeMap<String, String>,
    #[serde(default)]
    revision: u64,
}

#[derive(Serialize)]
struct StoredStateRef<'a> {
    current_day: u32,
    streak: u32,
    last_sent_on: String,
    items: &'a TaskPlan,
    revision: u64,
}

impl StoredState {
    fn into_state(self) -> Result<ProgressState> {
        if self.current_day == 0 {
            return Err(BotError::StateUnavailable(
                "current_day must be at least 1".to_owned(),
            ));
        }
        let last_sent_on = match self.last_sent_on.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| {
                BotError::StateUnavailable(format!("last_sent_on `{raw}` is not a date: {e}"))
            })?),
        };
        Ok(ProgressState {
            current_day: self.current_day,
            streak: self.streak,
            last_sent_on,
            plan: TaskPlan::from_raw(self.items)?,
            revision: self.revision,
        })
    }
}

fn encode(state: &ProgressState, revision: u64) -> Result<String> {
    let stored = StoredStateRef {
        current_day: state.current_day,
        streak: state.streak,
        last_sent_on: state
            .last_sent_on
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default(),
        items: &state.plan,
        revision,
    };
    serde_json::to_string_pretty(&stored)
        .map_err(|e| BotError::StateUnavailable(format!("cannot serialize state: {e}")))
}

fn decode(bytes: &[u8]) -> Result<ProgressState> {
    let stored: StoredState = serde_json::from_slice(bytes)
        .map_err(|e| BotError::StateUnavailable(format!("cannot parse state: {e}")))?;
    stored.into_state()
}

/// JSON file store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a fresh record for `plan`.
    ///
    /// # Errors
    ///
    /// Fails with [`BotError::StateUnavailable`] if a state file already
    /// exists and `overwrite` is `false`, or if the write fails.
    pub fn create(&self, plan: TaskPlan, overwrite: bool) -> Result<ProgressState> {
        if self.path.exists() && !overwrite {
            return Err(BotError::StateUnavailable(format!(
                "state file {} already exists",
                self.path.display()
            )));
        }
        let state = ProgressState::fresh(plan);
        self.write(&state, state.revision)?;
        Ok(state)
    }

    fn read_revision(&self) -> Result<u64> {
        #[derive(Deserialize)]
        struct RevisionOnly {
            #[serde(default)]
            revision: u64,
        }

        match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice::<RevisionOnly>(&bytes)
                .map(|r| r.revision)
                .map_err(|e| BotError::StateUnavailable(format!("cannot parse state: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(BotError::StateUnavailable(format!(
                "cannot read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn write(&self, state: &ProgressState, revision: u64) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                BotError::StateUnavailable(format!(
                    "cannot create state directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let json = encode(state, revision)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| {
            BotError::StateUnavailable(format!("cannot write {}: {e}", tmp.display()))
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            BotError::StateUnavailable(format!(
                "cannot replace {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(())
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<ProgressState> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BotError::StateUnavailable(format!(
                    "no state file at {}; seed one with `cadence init`",
                    self.path.display()
                ))
            } else {
                BotError::StateUnavailable(format!("cannot read {}: {e}", self.path.display()))
            }
        })?;
        let state = decode(&bytes)?;
        debug!(
            "loaded state from {} (day {}, revision {})",
            self.path.display(),
            state.current_day,
            state.revision
        );
        Ok(state)
    }

    fn save(&self, state: &mut ProgressState) -> Result<()> {
        let found = self.read_revision()?;
        if found != state.revision {
            return Err(BotError::StateConflict {
                expected: state.revision,
                found,
            });
        }
        let next = state.revision.saturating_add(1);
        self.write(state, next)?;
        state.revision = next;
        Ok(())
    }
}

/// In-memory store with the same revision semantics as [`JsonFileStore`].
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Option<ProgressState>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn with_state(state: ProgressState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(state))),
        }
    }

    /// Current record, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<ProgressState> {
        self.inner.lock().ok().and_then(|guard| guard.clone())
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<ProgressState> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| BotError::StateUnavailable("state lock poisoned".to_owned()))?;
        guard
            .clone()
            .ok_or_else(|| BotError::StateUnavailable("no state seeded".to_owned()))
    }

    fn save(&self, state: &mut ProgressState) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| BotError::StateUnavailable("state lock poisoned".to_owned()))?;
        let found = guard.as_ref().map_or(0, |s| s.revision);
        if found != state.revision {
            return Err(BotError::StateConflict {
                expected: state.revision,
                found,
            });
        }
        state.revision = state.revision.saturating_add(1);
        *guard = Some(state.clone());
        Ok(())
    }
}
