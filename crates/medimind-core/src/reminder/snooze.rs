//! Snooze ledger: per-turn suppression deadlines.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::medication::MealSlot;

/// One dose-taking opportunity: a medication's meal slot on a given day.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TurnKey {
    pub medication_id: String,
    pub meal_slot: MealSlot,
    pub date: NaiveDate,
}

impl TurnKey {
    pub fn new(medication_id: impl Into<String>, meal_slot: MealSlot, date: NaiveDate) -> Self {
        Self {
            medication_id: medication_id.into(),
            meal_slot,
            date,
        }
    }
}

impl fmt::Display for TurnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.medication_id, self.meal_slot, self.date)
    }
}

/// Serialized form of one ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnoozeEntry {
    #[serde(flatten)]
    pub key: TurnKey,
    pub until: NaiveDateTime,
}

/// Turn key -> instant until which that turn must not alarm.
///
/// Only the reminder engine writes to it. Entries from earlier days are
/// pruned on tick; an entry whose deadline has passed stops suppressing
/// and instead marks the turn as pending re-presentation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<SnoozeEntry>", into = "Vec<SnoozeEntry>")]
pub struct SnoozeLedger {
    entries: BTreeMap<TurnKey, NaiveDateTime>,
}

impl SnoozeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppress `key` until `until`, replacing any earlier deadline.
    pub fn snooze(&mut self, key: TurnKey, until: NaiveDateTime) {
        self.entries.insert(key, until);
    }

    pub fn until(&self, key: &TurnKey) -> Option<NaiveDateTime> {
        self.entries.get(key).copied()
    }

    /// Still inside the snooze window.
    pub fn is_suppressed(&self, key: &TurnKey, now: NaiveDateTime) -> bool {
        self.until(key).is_some_and(|until| now < until)
    }

    /// Snoozed earlier and the window has elapsed.
    pub fn has_elapsed(&self, key: &TurnKey, now: NaiveDateTime) -> bool {
        self.until(key).is_some_and(|until| now >= until)
    }

    /// Drop the entry once its turn has been presented again.
    pub fn consume(&mut self, key: &TurnKey) -> Option<NaiveDateTime> {
        self.entries.remove(key)
    }

    /// Forget entries whose turn belongs to a day before `today`.
    pub fn prune_before(&mut self, today: NaiveDate) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.date >= today);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<SnoozeEntry>> for SnoozeLedger {
    fn from(entries: Vec<SnoozeEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.key, e.until)).collect(),
        }
    }
}

impl From<SnoozeLedger> for Vec<SnoozeEntry> {
    fn from(ledger: SnoozeLedger) -> Self {
        ledger
            .entries
            .into_iter()
            .map(|(key, until)| SnoozeEntry { key, until })
            .collect()
    }
}
