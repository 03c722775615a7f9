//! Medication reminders: due-slot detection, the alarm escalation engine
//! and the polling driver that connects them to storage and rendering.

mod detector;
mod driver;
mod engine;
mod snooze;

pub use detector::{due_slots, find_due, slot_due_reason, DueReason, DueSlot};
pub use driver::{
    local_now, EventSink, PollingDriver, ReminderStore, UserAction, DEFAULT_TICK_INTERVAL_SECS,
};
pub use engine::{
    AlarmSession, CaregiverCall, ReminderEngine, ReminderState, ALARM_VIBRATION_PATTERN,
    DEFAULT_ESCALATION_DELAY_MINUTES, SNOOZE_MINUTES,
};
pub use snooze::{SnoozeEntry, SnoozeLedger, TurnKey};
