use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::care::CaregiverProfile;
use crate::medication::{MealSlot, Medication};
use crate::reminder::{AlarmSession, CaregiverCall, ReminderState};

/// Every state change of the reminder engine produces an Event.
/// Front ends render from them; storage persists the ones that carry
/// record mutations. Timestamps are local wall-clock time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A due dose is now being presented. The front end should show the
    /// alarm overlay and, when `haptic` is set, vibrate with that pattern
    /// (milliseconds, alternating on/off).
    AlarmRaised {
        medication_id: String,
        medication_name: String,
        meal_slot: MealSlot,
        scheduled_time: String,
        /// Raised again after a snooze window elapsed.
        resurfaced: bool,
        haptic: Option<Vec<u32>>,
        at: NaiveDateTime,
    },
    /// The active dose was acknowledged. `medication` is the updated record
    /// the front end must persist.
    DoseTaken {
        medication: Medication,
        meal_slot: MealSlot,
        date: NaiveDate,
        at: NaiveDateTime,
    },
    AlarmSnoozed {
        medication_id: String,
        meal_slot: MealSlot,
        until: NaiveDateTime,
        at: NaiveDateTime,
    },
    /// The alarm went unanswered past the escalation delay and was replaced
    /// by a simulated call from the caregiver.
    CallEscalated {
        caller: CaregiverProfile,
        medication_id: String,
        meal_slot: MealSlot,
        alarm_started_at: NaiveDateTime,
        at: NaiveDateTime,
    },
    CallAnswered {
        medication_id: String,
        meal_slot: MealSlot,
        at: NaiveDateTime,
    },
    CallDeclined {
        medication_id: String,
        meal_slot: MealSlot,
        at: NaiveDateTime,
    },
    StateSnapshot {
        state: ReminderState,
        alarm: Option<AlarmSession>,
        call: Option<CaregiverCall>,
        snoozed_turns: usize,
        escalation_delay_minutes: i64,
        at: NaiveDateTime,
    },
}

impl Event {
    /// Short label used in the dose history table.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::AlarmRaised { .. } => "raised",
            Event::DoseTaken { .. } => "taken",
            Event::AlarmSnoozed { .. } => "snoozed",
            Event::CallEscalated { .. } => "escalated",
            Event::CallAnswered { .. } => "answered",
            Event::CallDeclined { .. } => "declined",
            Event::StateSnapshot { .. } => "snapshot",
        }
    }

    /// The (medication, slot) pair the event is about, if any.
    pub fn turn(&self) -> Option<(&str, MealSlot)> {
        match self {
            Event::AlarmRaised {
                medication_id,
                meal_slot,
                ..
            }
            | Event::AlarmSnoozed {
                medication_id,
                meal_slot,
                ..
            }
            | Event::CallEscalated {
                medication_id,
                meal_slot,
                ..
            }
            | Event::CallAnswered {
                medication_id,
                meal_slot,
                ..
            }
            | Event::CallDeclined {
                medication_id,
                meal_slot,
                ..
            } => Some((medication_id.as_str(), *meal_slot)),
            Event::DoseTaken {
                medication,
                meal_slot,
                ..
            } => Some((medication.id.as_str(), *meal_slot)),
            Event::StateSnapshot { .. } => None,
        }
    }

    pub fn at(&self) -> NaiveDateTime {
        match self {
            Event::AlarmRaised { at, .. }
            | Event::DoseTaken { at, .. }
            | Event::AlarmSnoozed { at, .. }
            | Event::CallEscalated { at, .. }
            | Event::CallAnswered { at, .. }
            | Event::CallDeclined { at, .. }
            | Event::StateSnapshot { at, .. } => *at,
        }
    }
}
