//! # MediMind Core Library
//!
//! Core logic for the MediMind medication reminder. All behavior lives here;
//! the `medimind` CLI is a thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Medication**: records plus the recurrence evaluator that decides
//!   whether a schedule is active on a given calendar day
//! - **Reminder**: due-slot detection, the alarm state machine with snooze
//!   and caregiver escalation, and the polling driver that ticks it
//! - **Storage**: SQLite-based record and dose history storage, TOML-based
//!   configuration
//!
//! ## Key Components
//!
//! - [`ReminderEngine`]: Alarm state machine, driven by `tick()`
//! - [`PollingDriver`]: Periodic evaluation loop over a [`ReminderStore`]
//! - [`Database`]: Record and dose history persistence
//! - [`Config`]: Application configuration management

pub mod care;
pub mod error;
pub mod events;
pub mod medication;
pub mod reminder;
pub mod storage;

pub use care::{Appointment, CaregiverProfile};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::Event;
pub use medication::{Frequency, MealSlot, Medication};
pub use reminder::{
    local_now, EventSink, PollingDriver, ReminderEngine, ReminderState, ReminderStore, UserAction,
};
pub use storage::{AdherenceStats, Config, Database, DoseRecord};
