//! Due-slot detection.
//!
//! A slot is due when the medication is active today, the dose has not been
//! taken, and either:
//! - the current hour:minute equals the slot's scheduled time and no snooze
//!   window is open for the turn, or
//! - the turn was snoozed earlier today and the snooze window has elapsed.
//!
//! Iteration order is medication list order, then each medication's meal
//! declaration order. The first match wins; the rest stay due and are picked
//! up on later ticks.

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use super::snooze::{SnoozeLedger, TurnKey};
use crate::medication::{MealSlot, Medication};

/// Why a slot is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueReason {
    /// The scheduled minute is now.
    Scheduled,
    /// A snooze on this turn has run out.
    SnoozeElapsed,
}

/// A due (medication, meal slot) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueSlot {
    /// Position of the medication in the list that was scanned.
    pub index: usize,
    pub medication_id: String,
    pub meal_slot: MealSlot,
    pub scheduled: NaiveTime,
    pub reason: DueReason,
}

impl DueSlot {
    pub fn turn_key(&self, now: NaiveDateTime) -> TurnKey {
        TurnKey::new(self.medication_id.clone(), self.meal_slot, now.date())
    }
}

/// The single slot to present at `now`, if any.
pub fn find_due(
    now: NaiveDateTime,
    medications: &[Medication],
    snoozes: &SnoozeLedger,
) -> Option<DueSlot> {
    due_slots(now, medications, snoozes).next()
}

/// Every slot due at `now`, in presentation order.
pub fn due_slots<'a>(
    now: NaiveDateTime,
    medications: &'a [Medication],
    snoozes: &'a SnoozeLedger,
) -> impl Iterator<Item = DueSlot> + 'a {
    let today = now.date();
    medications
        .iter()
        .enumerate()
        .filter(move |(_, med)| med.is_active_on(today))
        .flat_map(move |(index, med)| {
            med.meals.iter().filter_map(move |&slot| {
                let reason = slot_due_reason(med, slot, now, snoozes)?;
                Some(DueSlot {
                    index,
                    medication_id: med.id.clone(),
                    meal_slot: slot,
                    scheduled: med.scheduled_time(slot)?,
                    reason,
                })
            })
        })
}

/// Due-ness of one slot, ignoring whether the medication is active today.
pub fn slot_due_reason(
    med: &Medication,
    slot: MealSlot,
    now: NaiveDateTime,
    snoozes: &SnoozeLedger,
) -> Option<DueReason> {
    let scheduled = med.scheduled_time(slot)?;
    if med.is_taken(now.date(), slot) {
        return None;
    }
    let key = TurnKey::new(med.id.clone(), slot, now.date());
    if snoozes.is_suppressed(&key, now) {
        return None;
    }
    if same_minute(now.time(), scheduled) {
        return Some(DueReason::Scheduled);
    }
    if snoozes.has_elapsed(&key, now) {
        return Some(DueReason::SnoozeElapsed);
    }
    None
}

fn same_minute(now: NaiveTime, scheduled: NaiveTime) -> bool {
    now.hour() == scheduled.hour() && now.minute() == scheduled.minute()
}
