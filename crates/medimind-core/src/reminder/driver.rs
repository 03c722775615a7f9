//! Polling driver.
//!
//! Wraps a [`ReminderEngine`] with its collaborators: a [`ReminderStore`]
//! medications are re-read from on every tick and mutations are written
//! back to, and an [`EventSink`] that renders alarms and calls. Precision is
//! bounded by the tick interval (default 10 s); there are no per-medication
//! timers to cancel.

use std::time::Duration as StdDuration;

use chrono::{Local, NaiveDateTime};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::engine::ReminderEngine;
use crate::care::CaregiverProfile;
use crate::error::Result;
use crate::events::Event;
use crate::medication::{MealSlot, Medication};

/// Default tick cadence.
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 10;

/// Persistent state the driver reads from and writes to.
pub trait ReminderStore {
    /// Current medication list, in insertion order.
    fn medications(&self) -> Result<Vec<Medication>>;

    /// Replace the medication list.
    fn save_medications(&self, medications: &[Medication]) -> Result<()>;

    /// Persist the engine after a state change.
    fn save_engine(&self, _engine: &ReminderEngine) -> Result<()> {
        Ok(()) // default no-op
    }

    /// Append a resolved outcome to the dose history.
    fn record_outcome(&self, _event: &Event) -> Result<()> {
        Ok(()) // default no-op
    }
}

impl<T: ReminderStore + ?Sized> ReminderStore for &T {
    fn medications(&self) -> Result<Vec<Medication>> {
        (**self).medications()
    }

    fn save_medications(&self, medications: &[Medication]) -> Result<()> {
        (**self).save_medications(medications)
    }

    fn save_engine(&self, engine: &ReminderEngine) -> Result<()> {
        (**self).save_engine(engine)
    }

    fn record_outcome(&self, event: &Event) -> Result<()> {
        (**self).record_outcome(event)
    }
}

/// Receives every event the engine produces (overlay rendering, vibration).
pub trait EventSink {
    fn emit(&mut self, event: &Event);
}

impl<F: FnMut(&Event)> EventSink for F {
    fn emit(&mut self, event: &Event) {
        self(event)
    }
}

/// A user action delivered into the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    MarkTaken {
        medication_id: String,
        meal_slot: MealSlot,
    },
    Snooze {
        medication_id: String,
        meal_slot: MealSlot,
    },
    /// Mark whatever alarm is currently presented as taken.
    TakeActive,
    /// Snooze whatever alarm is currently presented.
    SnoozeActive,
    AnswerCall,
    DeclineCall,
}

pub struct PollingDriver<S, K> {
    engine: ReminderEngine,
    store: S,
    sink: K,
    caregiver: CaregiverProfile,
    tick_interval: StdDuration,
}

impl<S: ReminderStore, K: EventSink> PollingDriver<S, K> {
    pub fn new(engine: ReminderEngine, store: S, sink: K, caregiver: CaregiverProfile) -> Self {
        Self {
            engine,
            store,
            sink,
            caregiver,
            tick_interval: StdDuration::from_secs(DEFAULT_TICK_INTERVAL_SECS),
        }
    }

    pub fn with_tick_interval(mut self, interval: StdDuration) -> Self {
        // tokio::time::interval panics on a zero period.
        self.tick_interval = interval.max(StdDuration::from_millis(1));
        self
    }

    pub fn engine(&self) -> &ReminderEngine {
        &self.engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_parts(self) -> (ReminderEngine, S, K) {
        (self.engine, self.store, self.sink)
    }

    /// Run one tick at `now`.
    pub fn tick_at(&mut self, now: NaiveDateTime) -> Result<Option<Event>> {
        let medications = self.store.medications()?;
        let event = self.engine.tick(now, &medications, &self.caregiver);
        self.publish(event)
    }

    /// Deliver a user action at `now`. Actions that do not match the live
    /// alarm or call are no-ops and return `Ok(None)`.
    pub fn apply(&mut self, action: UserAction, now: NaiveDateTime) -> Result<Option<Event>> {
        let active = self
            .engine
            .active_alarm()
            .map(|s| (s.medication.id.clone(), s.meal_slot));

        let event = match action {
            UserAction::MarkTaken {
                medication_id,
                meal_slot,
            } => self.mark_taken(&medication_id, meal_slot, now)?,
            UserAction::TakeActive => match active {
                Some((id, slot)) => self.mark_taken(&id, slot, now)?,
                None => None,
            },
            UserAction::Snooze {
                medication_id,
                meal_slot,
            } => self.engine.snooze(&medication_id, meal_slot, now),
            UserAction::SnoozeActive => match active {
                Some((id, slot)) => self.engine.snooze(&id, slot, now),
                None => None,
            },
            UserAction::AnswerCall => self.engine.answer_call(now),
            UserAction::DeclineCall => self.engine.decline_call(now),
        };
        self.publish(event)
    }

    fn mark_taken(
        &mut self,
        medication_id: &str,
        meal_slot: MealSlot,
        now: NaiveDateTime,
    ) -> Result<Option<Event>> {
        let mut medications = self.store.medications()?;
        let event = self
            .engine
            .mark_taken(&mut medications, medication_id, meal_slot, now);
        if event.is_some() {
            self.store.save_medications(&medications)?;
        }
        Ok(event)
    }

    fn publish(&mut self, event: Option<Event>) -> Result<Option<Event>> {
        if let Some(event) = &event {
            self.store.save_engine(&self.engine)?;
            self.store.record_outcome(event)?;
            self.sink.emit(event);
        }
        Ok(event)
    }

    /// Tick on the configured interval until `shutdown` flips to `true` or
    /// its sender is dropped. User actions arriving on `actions` are applied
    /// between ticks. A failed tick is logged and the loop keeps going.
    pub async fn run(
        &mut self,
        mut actions: mpsc::Receiver<UserAction>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut actions_open = true;
        info!(interval_ms = self.tick_interval.as_millis() as u64, "reminder polling started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick_at(local_now()) {
                        error!("reminder tick failed: {e}");
                    }
                }
                action = actions.recv(), if actions_open => match action {
                    Some(action) => {
                        debug!(?action, "user action");
                        if let Err(e) = self.apply(action, local_now()) {
                            error!("user action failed: {e}");
                        }
                    }
                    None => actions_open = false,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("reminder polling stopped");
    }
}

/// Local wall-clock time, the clock meal times are expressed in.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use chrono::NaiveDate;

    use crate::reminder::ReminderState;

    #[derive(Default)]
    struct MemoryStore {
        medications: RefCell<Vec<Medication>>,
        engine_saves: RefCell<usize>,
        outcomes: RefCell<Vec<&'static str>>,
    }

    impl ReminderStore for MemoryStore {
        fn medications(&self) -> Result<Vec<Medication>> {
            Ok(self.medications.borrow().clone())
        }

        fn save_medications(&self, medications: &[Medication]) -> Result<()> {
            *self.medications.borrow_mut() = medications.to_vec();
            Ok(())
        }

        fn save_engine(&self, _engine: &ReminderEngine) -> Result<()> {
            *self.engine_saves.borrow_mut() += 1;
            Ok(())
        }

        fn record_outcome(&self, event: &Event) -> Result<()> {
            self.outcomes.borrow_mut().push(event.kind());
            Ok(())
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 3)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[derive(Default)]
    struct Recorder(Vec<Event>);

    impl EventSink for Recorder {
        fn emit(&mut self, event: &Event) {
            self.0.push(event.clone());
        }
    }

    fn driver() -> PollingDriver<MemoryStore, Recorder> {
        let mut med = Medication::new("Levothyroxine", 1.0).with_meal(MealSlot::Breakfast, "07:30");
        med.id = "levo".to_string();
        med.remaining_stock = Some(3.0);
        let store = MemoryStore::default();
        store.medications.borrow_mut().push(med);
        PollingDriver::new(
            ReminderEngine::new(30),
            store,
            Recorder::default(),
            CaregiverProfile::default(),
        )
    }

    #[test]
    fn tick_publishes_and_persists_transitions_only() {
        let mut d = driver();
        assert!(d.tick_at(at(7, 29, 50)).unwrap().is_none());
        assert!(d.tick_at(at(7, 30, 0)).unwrap().is_some());
        assert!(d.tick_at(at(7, 30, 10)).unwrap().is_none());

        assert_eq!(d.sink().0.len(), 1);
        assert_eq!(*d.store().engine_saves.borrow(), 1);
        assert_eq!(*d.store().outcomes.borrow(), vec!["raised"]);
    }

    #[test]
    fn take_active_writes_record_back_to_store() {
        let mut d = driver();
        d.tick_at(at(7, 30, 0)).unwrap();
        let event = d.apply(UserAction::TakeActive, at(7, 30, 5)).unwrap();
        assert!(matches!(event, Some(Event::DoseTaken { .. })));

        let stored = d.store().medications.borrow()[0].clone();
        assert!(stored.is_taken(at(0, 0, 0).date(), MealSlot::Breakfast));
        assert_eq!(stored.remaining_stock, Some(2.0));
        assert_eq!(d.engine().state(), ReminderState::Idle);
        assert_eq!(*d.store().outcomes.borrow(), vec!["raised", "taken"]);
    }

    #[test]
    fn stale_action_is_a_noop() {
        let mut d = driver();
        assert!(d.apply(UserAction::TakeActive, at(7, 0, 0)).unwrap().is_none());
        assert!(d
            .apply(
                UserAction::Snooze {
                    medication_id: "levo".to_string(),
                    meal_slot: MealSlot::Breakfast
                },
                at(7, 0, 0)
            )
            .unwrap()
            .is_none());
        assert!(d.sink().0.is_empty());
        assert_eq!(*d.store().engine_saves.borrow(), 0);
    }

    #[test]
    fn full_escalation_cycle_through_driver() {
        let mut d = driver();
        d.tick_at(at(7, 30, 0)).unwrap();
        d.tick_at(at(8, 0, 0)).unwrap();
        assert_eq!(d.engine().state(), ReminderState::Escalated);
        d.apply(UserAction::DeclineCall, at(8, 0, 5)).unwrap();
        assert_eq!(d.engine().state(), ReminderState::Idle);
        let kinds: Vec<&str> = d.sink().0.iter().map(Event::kind).collect();
        assert_eq!(kinds, vec!["raised", "escalated", "declined"]);
    }

    #[test]
    fn closure_sink_receives_events() {
        let mut seen = Vec::new();
        {
            let (_, store, _) = driver().into_parts();
            let mut d = PollingDriver::new(
                ReminderEngine::new(30),
                store,
                |e: &Event| seen.push(e.kind()),
                CaregiverProfile::default(),
            );
            d.tick_at(at(7, 30, 0)).unwrap();
        }
        assert_eq!(seen, vec!["raised"]);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_shutdown() {
        let mut d = driver().with_tick_interval(StdDuration::from_secs(10));
        let (_action_tx, action_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(StdDuration::from_secs(35)).await;
            shutdown_tx.send(true).unwrap();
        });
        d.run(action_rx, shutdown_rx).await;
        stopper.await.unwrap();
    }
}
