//! End-to-end reminder flow: database-backed store, polling driver and
//! engine ticked minute by minute.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use medimind_core::reminder::UserAction;
use medimind_core::{
    CaregiverProfile, Database, Event, Frequency, MealSlot, Medication, PollingDriver,
    ReminderEngine, ReminderState,
};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 9, d).unwrap()
}

fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
    day(d).and_hms_opt(h, m, 0).unwrap()
}

fn minutes(from: NaiveDateTime, to: NaiveDateTime) -> impl Iterator<Item = NaiveDateTime> {
    let count = (to - from).num_minutes();
    (0..=count).map(move |i| from + Duration::minutes(i))
}

#[test]
fn full_day_with_immediate_acknowledgment() {
    let db = Database::open_memory().unwrap();
    let mut med = Medication::new("Metformin", 1.0)
        .with_meal(MealSlot::Breakfast, "08:00")
        .with_meal(MealSlot::Dinner, "18:00");
    med.remaining_stock = Some(5.0);
    db.save_medication_list(&[med]).unwrap();

    let mut kinds = Vec::new();
    let mut driver = PollingDriver::new(
        ReminderEngine::default(),
        &db,
        |e: &Event| kinds.push(e.kind()),
        CaregiverProfile::default(),
    );

    for now in minutes(at(5, 7, 58), at(5, 18, 2)) {
        if let Some(Event::AlarmRaised { .. }) = driver.tick_at(now).unwrap() {
            driver.apply(UserAction::TakeActive, now).unwrap();
        }
    }
    assert_eq!(driver.engine().state(), ReminderState::Idle);
    drop(driver);

    assert_eq!(kinds, vec!["raised", "taken", "raised", "taken"]);
    let meds = db.load_medications().unwrap();
    assert_eq!(meds[0].remaining_stock, Some(3.0));
    assert!(meds[0].is_taken(day(5), MealSlot::Breakfast));
    assert!(meds[0].is_taken(day(5), MealSlot::Dinner));

    let stats = db.adherence_on(day(5)).unwrap();
    assert_eq!((stats.raised, stats.taken), (2, 2));
}

#[test]
fn cyclic_schedule_skips_rest_days() {
    let db = Database::open_memory().unwrap();
    let mut med = Medication::new("Prednisone", 1.0).with_meal(MealSlot::Breakfast, "08:00");
    med.frequency = Frequency::Cyclic;
    med.start_date = Some(day(1));
    med.cycle_on_days = Some(2);
    med.cycle_off_days = Some(1);
    med.validate().unwrap();
    db.save_medication_list(&[med]).unwrap();

    let mut driver = PollingDriver::new(
        ReminderEngine::default(),
        &db,
        |_: &Event| {},
        CaregiverProfile::default(),
    );

    let mut raised_on = Vec::new();
    for d in 1..=6 {
        let now = at(d, 8, 0);
        if let Some(Event::AlarmRaised { .. }) = driver.tick_at(now).unwrap() {
            raised_on.push(now.date());
            driver.apply(UserAction::TakeActive, now).unwrap();
        }
    }
    assert_eq!(raised_on, vec![day(1), day(2), day(4), day(5)]);
}

#[test]
fn unanswered_alarm_escalates_to_caregiver_call() {
    let db = Database::open_memory().unwrap();
    let med = Medication::new("Amlodipine", 1.0).with_meal(MealSlot::Lunch, "12:00");
    db.save_medication_list(&[med]).unwrap();

    let caregiver = CaregiverProfile {
        name: "Nok".into(),
        photo: None,
    };
    let mut events = Vec::new();
    let mut driver = PollingDriver::new(
        ReminderEngine::new(30),
        &db,
        |e: &Event| events.push(e.clone()),
        caregiver,
    );

    for now in minutes(at(7, 12, 0), at(7, 12, 40)) {
        driver.tick_at(now).unwrap();
    }
    assert_eq!(driver.engine().state(), ReminderState::Escalated);
    driver.apply(UserAction::AnswerCall, at(7, 12, 41)).unwrap();
    assert_eq!(driver.engine().state(), ReminderState::Idle);
    drop(driver);

    let kinds: Vec<&str> = events.iter().map(Event::kind).collect();
    assert_eq!(kinds, vec!["raised", "escalated", "answered"]);
    match &events[1] {
        Event::CallEscalated { caller, at: t, .. } => {
            assert_eq!(caller.name, "Nok");
            assert_eq!(*t, at(7, 12, 30));
        }
        other => panic!("Expected CallEscalated, got {other:?}"),
    }

    let meds = db.load_medications().unwrap();
    assert!(!meds[0].is_taken(day(7), MealSlot::Lunch));
    let stats = db.adherence_on(day(7)).unwrap();
    assert_eq!((stats.raised, stats.escalated, stats.answered), (1, 1, 1));
    assert_eq!(stats.taken_ratio(), Some(0.0));
}

#[test]
fn engine_state_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("medimind.db");
    let med = Medication::new("Levothyroxine", 1.0).with_meal(MealSlot::Bedtime, "22:00");
    let id = med.id.clone();

    {
        let db = Database::open_at(&path).unwrap();
        db.save_medication_list(&[med]).unwrap();
        let mut driver = PollingDriver::new(
            ReminderEngine::default(),
            &db,
            |_: &Event| {},
            CaregiverProfile::default(),
        );
        driver.tick_at(at(8, 22, 0)).unwrap();
        assert_eq!(driver.engine().state(), ReminderState::AlarmActive);
    }

    let db = Database::open_at(&path).unwrap();
    let engine = db.load_engine().unwrap().expect("engine persisted");
    assert_eq!(engine.state(), ReminderState::AlarmActive);

    let mut driver = PollingDriver::new(engine, &db, |_: &Event| {}, CaregiverProfile::default());
    let event = driver
        .apply(
            UserAction::MarkTaken {
                medication_id: id,
                meal_slot: MealSlot::Bedtime,
            },
            at(8, 22, 3),
        )
        .unwrap();
    assert!(matches!(event, Some(Event::DoseTaken { .. })));
    drop(driver);

    assert!(db.load_medications().unwrap()[0].is_taken(day(8), MealSlot::Bedtime));
}

#[test]
fn unreadable_record_does_not_block_other_reminders() {
    let db = Database::open_memory().unwrap();
    let good = Medication::new("Metformin", 1.0).with_meal(MealSlot::Breakfast, "08:00");
    let list = serde_json::json!([
        good,
        {
            "id": "broken",
            "frequency": "INTERVAL",
            "startDate": "",
            "intervalDays": 3,
            "meals": ["BREAKFAST"],
            "mealTimes": {"BREAKFAST": "08:00"}
        }
    ]);
    db.kv_set("medications", &list.to_string()).unwrap();

    let mut driver = PollingDriver::new(
        ReminderEngine::default(),
        &db,
        |_: &Event| {},
        CaregiverProfile::default(),
    );
    let event = driver.tick_at(at(9, 8, 0)).unwrap();
    match event {
        Some(Event::AlarmRaised { medication_id, .. }) => assert_eq!(medication_id, good.id),
        other => panic!("Expected AlarmRaised, got {other:?}"),
    }
    driver.apply(UserAction::TakeActive, at(9, 8, 1)).unwrap();
    drop(driver);

    let stored: serde_json::Value =
        serde_json::from_str(&db.kv_get("medications").unwrap().unwrap()).unwrap();
    assert_eq!(stored[1], list[1]);
    assert!(db.load_medications().unwrap()[0].is_taken(day(9), MealSlot::Breakfast));
}
