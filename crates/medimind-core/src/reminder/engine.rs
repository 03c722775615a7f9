//! Reminder engine implementation.
//!
//! The reminder engine is a wall-clock-based state machine. It does not use
//! internal threads or timers - the caller is responsible for calling
//! `tick()` periodically and for delivering user actions.
//!
//! ## State Transitions
//!
//! ```text
//!                   ┌──── mark_taken ───► (TAKEN) ─────┐
//!                   │                                  │
//! Idle ──tick──► AlarmActive ── snooze ──► (SNOOZED) ──┤──► Idle
//!                   │                                  │
//!                   └──tick, delay elapsed──► Escalated ┤
//!                                    answer / decline ──┘
//! ```
//!
//! At most one alarm or call is presented at a time; the live presentation
//! is a single enum so both can never be set together.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::detector::{self, DueReason};
use super::snooze::{SnoozeLedger, TurnKey};
use crate::care::CaregiverProfile;
use crate::events::Event;
use crate::medication::{MealSlot, Medication, MEAL_TIME_FORMAT};

/// Fixed deferral applied by a snooze.
pub const SNOOZE_MINUTES: i64 = 5;

/// Default delay before an unanswered alarm escalates into a call.
pub const DEFAULT_ESCALATION_DELAY_MINUTES: i64 = 30;

/// Vibration pattern requested when an alarm is raised (ms on/off/on).
pub const ALARM_VIBRATION_PATTERN: [u32; 3] = [500, 200, 500];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderState {
    Idle,
    AlarmActive,
    Escalated,
}

/// The alarm currently presented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmSession {
    /// Snapshot of the record when the alarm was raised, for rendering.
    pub medication: Medication,
    pub meal_slot: MealSlot,
    pub started_at: NaiveDateTime,
}

impl AlarmSession {
    pub fn turn_key(&self) -> TurnKey {
        TurnKey::new(
            self.medication.id.clone(),
            self.meal_slot,
            self.started_at.date(),
        )
    }

    fn matches(&self, medication_id: &str, meal_slot: MealSlot) -> bool {
        self.medication.id == medication_id && self.meal_slot == meal_slot
    }
}

/// The simulated incoming call an unanswered alarm escalated into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaregiverCall {
    pub caller: CaregiverProfile,
    pub medication_id: String,
    pub meal_slot: MealSlot,
    pub alarm_started_at: NaiveDateTime,
    pub escalated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Presentation {
    #[default]
    Idle,
    Alarm(AlarmSession),
    Call(CaregiverCall),
}

/// Core reminder engine.
///
/// Owns the live alarm or call and the snooze ledger. Medication records are
/// passed in on every call; the engine only mutates them in `mark_taken`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderEngine {
    #[serde(default)]
    presentation: Presentation,
    #[serde(default)]
    snoozes: SnoozeLedger,
    #[serde(default = "default_escalation_delay")]
    escalation_delay_minutes: i64,
    #[serde(default = "default_true")]
    vibration: bool,
    /// `now` of the last processed tick; a repeated tick is a no-op.
    #[serde(default)]
    last_tick: Option<NaiveDateTime>,
}

fn default_escalation_delay() -> i64 {
    DEFAULT_ESCALATION_DELAY_MINUTES
}

fn default_true() -> bool {
    true
}

impl Default for ReminderEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ESCALATION_DELAY_MINUTES)
    }
}

impl ReminderEngine {
    /// Create an idle engine. A delay of zero or less escalates on the tick
    /// after the alarm is raised.
    pub fn new(escalation_delay_minutes: i64) -> Self {
        Self {
            presentation: Presentation::Idle,
            snoozes: SnoozeLedger::new(),
            escalation_delay_minutes,
            vibration: true,
            last_tick: None,
        }
    }

    pub fn with_vibration(mut self, enabled: bool) -> Self {
        self.vibration = enabled;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> ReminderState {
        match self.presentation {
            Presentation::Idle => ReminderState::Idle,
            Presentation::Alarm(_) => ReminderState::AlarmActive,
            Presentation::Call(_) => ReminderState::Escalated,
        }
    }

    pub fn active_alarm(&self) -> Option<&AlarmSession> {
        match &self.presentation {
            Presentation::Alarm(session) => Some(session),
            _ => None,
        }
    }

    pub fn active_call(&self) -> Option<&CaregiverCall> {
        match &self.presentation {
            Presentation::Call(call) => Some(call),
            _ => None,
        }
    }

    pub fn snoozes(&self) -> &SnoozeLedger {
        &self.snoozes
    }

    pub fn escalation_delay_minutes(&self) -> i64 {
        self.escalation_delay_minutes
    }

    pub fn set_escalation_delay_minutes(&mut self, minutes: i64) {
        self.escalation_delay_minutes = minutes;
    }

    pub fn set_vibration(&mut self, enabled: bool) {
        self.vibration = enabled;
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self, now: NaiveDateTime) -> Event {
        Event::StateSnapshot {
            state: self.state(),
            alarm: self.active_alarm().cloned(),
            call: self.active_call().cloned(),
            snoozed_turns: self.snoozes.len(),
            escalation_delay_minutes: self.escalation_delay_minutes,
            at: now,
        }
    }

    // ── Tick ─────────────────────────────────────────────────────────

    /// Call periodically.
    ///
    /// Escalates an alarm whose delay has elapsed; otherwise, when nothing
    /// is presented, raises the first due slot. Returns the transition
    /// event, if any.
    pub fn tick(
        &mut self,
        now: NaiveDateTime,
        medications: &[Medication],
        caregiver: &CaregiverProfile,
    ) -> Option<Event> {
        if self.last_tick == Some(now) {
            return None;
        }
        self.last_tick = Some(now);

        let pruned = self.snoozes.prune_before(now.date());
        if pruned > 0 {
            debug!(pruned, "dropped snooze entries from previous days");
        }

        match &self.presentation {
            Presentation::Alarm(session) => {
                if self.escalation_due(session, now) {
                    self.escalate(now, caregiver)
                } else {
                    None
                }
            }
            Presentation::Call(_) => None,
            Presentation::Idle => {
                let due = detector::find_due(now, medications, &self.snoozes)?;
                let medication = medications.get(due.index)?.clone();
                let key = due.turn_key(now);
                if due.reason == DueReason::SnoozeElapsed {
                    self.snoozes.consume(&key);
                }
                Some(self.raise(medication, due.meal_slot, due.reason, now))
            }
        }
    }

    fn escalation_due(&self, session: &AlarmSession, now: NaiveDateTime) -> bool {
        let elapsed = (now - session.started_at).max(Duration::zero());
        // A delay too large to represent never elapses.
        Duration::try_minutes(self.escalation_delay_minutes.max(0))
            .is_some_and(|delay| elapsed >= delay)
    }

    fn raise(
        &mut self,
        medication: Medication,
        meal_slot: MealSlot,
        reason: DueReason,
        now: NaiveDateTime,
    ) -> Event {
        info!(
            medication_id = %medication.id,
            meal_slot = %meal_slot,
            ?reason,
            "alarm raised"
        );
        let event = Event::AlarmRaised {
            medication_id: medication.id.clone(),
            medication_name: medication.name.clone(),
            meal_slot,
            scheduled_time: medication
                .scheduled_time(meal_slot)
                .map(|t| t.format(MEAL_TIME_FORMAT).to_string())
                .unwrap_or_default(),
            resurfaced: reason == DueReason::SnoozeElapsed,
            haptic: self.vibration.then(|| ALARM_VIBRATION_PATTERN.to_vec()),
            at: now,
        };
        self.presentation = Presentation::Alarm(AlarmSession {
            medication,
            meal_slot,
            started_at: now,
        });
        event
    }

    fn escalate(&mut self, now: NaiveDateTime, caregiver: &CaregiverProfile) -> Option<Event> {
        let session = match std::mem::take(&mut self.presentation) {
            Presentation::Alarm(session) => session,
            other => {
                self.presentation = other;
                return None;
            }
        };
        info!(
            medication_id = %session.medication.id,
            meal_slot = %session.meal_slot,
            caller = %caregiver.name,
            "alarm unanswered, escalating to caregiver call"
        );
        let call = CaregiverCall {
            caller: caregiver.clone(),
            medication_id: session.medication.id.clone(),
            meal_slot: session.meal_slot,
            alarm_started_at: session.started_at,
            escalated_at: now,
        };
        let event = Event::CallEscalated {
            caller: call.caller.clone(),
            medication_id: call.medication_id.clone(),
            meal_slot: call.meal_slot,
            alarm_started_at: call.alarm_started_at,
            at: now,
        };
        self.presentation = Presentation::Call(call);
        Some(event)
    }

    // ── User actions ─────────────────────────────────────────────────

    /// Acknowledge the active alarm as taken.
    ///
    /// Only the exact active (medication, slot) pair is accepted; anything
    /// else is a stale view and returns `None`. The matching record in
    /// `medications` is updated in place and returned in the event.
    pub fn mark_taken(
        &mut self,
        medications: &mut [Medication],
        medication_id: &str,
        meal_slot: MealSlot,
        now: NaiveDateTime,
    ) -> Option<Event> {
        let session = self.take_matching_alarm(medication_id, meal_slot)?;
        let date = session.started_at.date();
        let medication = match medications.iter_mut().find(|m| m.id == medication_id) {
            Some(record) => {
                record.record_dose(date, meal_slot);
                record.clone()
            }
            None => {
                warn!(medication_id, "taken medication no longer in the list");
                let mut snapshot = session.medication;
                snapshot.record_dose(date, meal_slot);
                snapshot
            }
        };
        info!(medication_id, meal_slot = %meal_slot, "dose taken");
        Some(Event::DoseTaken {
            medication,
            meal_slot,
            date,
            at: now,
        })
    }

    /// Defer the active alarm by [`SNOOZE_MINUTES`].
    pub fn snooze(
        &mut self,
        medication_id: &str,
        meal_slot: MealSlot,
        now: NaiveDateTime,
    ) -> Option<Event> {
        let session = self.take_matching_alarm(medication_id, meal_slot)?;
        let until = now + Duration::minutes(SNOOZE_MINUTES);
        self.snoozes.snooze(session.turn_key(), until);
        info!(medication_id, meal_slot = %meal_slot, %until, "alarm snoozed");
        Some(Event::AlarmSnoozed {
            medication_id: medication_id.to_string(),
            meal_slot,
            until,
            at: now,
        })
    }

    /// The user picked up the caregiver call. The dose stays untaken.
    pub fn answer_call(&mut self, now: NaiveDateTime) -> Option<Event> {
        let call = self.take_call()?;
        info!(medication_id = %call.medication_id, "caregiver call answered");
        Some(Event::CallAnswered {
            medication_id: call.medication_id,
            meal_slot: call.meal_slot,
            at: now,
        })
    }

    /// The user declined the caregiver call. The dose stays untaken and no
    /// further reminder is armed for the turn.
    pub fn decline_call(&mut self, now: NaiveDateTime) -> Option<Event> {
        let call = self.take_call()?;
        info!(medication_id = %call.medication_id, "caregiver call declined");
        Some(Event::CallDeclined {
            medication_id: call.medication_id,
            meal_slot: call.meal_slot,
            at: now,
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn take_matching_alarm(
        &mut self,
        medication_id: &str,
        meal_slot: MealSlot,
    ) -> Option<AlarmSession> {
        match &self.presentation {
            Presentation::Alarm(session) if session.matches(medication_id, meal_slot) => {}
            _ => {
                debug!(medication_id, meal_slot = %meal_slot, "ignoring action for inactive alarm");
                return None;
            }
        }
        match std::mem::take(&mut self.presentation) {
            Presentation::Alarm(session) => Some(session),
            _ => None,
        }
    }

    fn take_call(&mut self) -> Option<CaregiverCall> {
        if !matches!(self.presentation, Presentation::Call(_)) {
            return None;
        }
        match std::mem::take(&mut self.presentation) {
            Presentation::Call(call) => Some(call),
            _ => None,
        }
    }
}
