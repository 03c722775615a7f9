use chrono::{NaiveDate, Weekday};
use clap::Subcommand;
use medimind_core::medication::{next_active_on, parse_meal_time};
use medimind_core::storage::Database;
use medimind_core::{
    local_now, Config, Event, Frequency, MealSlot, Medication, PollingDriver, UserAction,
};

use super::{load_engine, print_event};

#[derive(Subcommand)]
pub enum MedAction {
    /// Add a medication schedule
    Add {
        /// Medication name
        name: String,
        /// Display label (e.g. "1 tablet")
        #[arg(long, default_value = "")]
        dosage: String,
        /// Quantity consumed per dose
        #[arg(long, default_value = "1")]
        dose: f64,
        /// everyday, specific-days, interval or cyclic
        #[arg(long, default_value = "everyday")]
        frequency: Frequency,
        /// Weekdays for specific-days schedules (e.g. Mon,Wed,Fri)
        #[arg(long, value_delimiter = ',')]
        weekdays: Vec<Weekday>,
        /// Anchor date for interval and cyclic schedules
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Days between doses for interval schedules
        #[arg(long)]
        interval: Option<u32>,
        /// Active days per cycle
        #[arg(long)]
        on_days: Option<u32>,
        /// Rest days per cycle
        #[arg(long)]
        off_days: Option<u32>,
        /// Meal slot and time, repeatable (e.g. BREAKFAST=08:00)
        #[arg(long = "meal", value_parser = parse_meal_entry, required = true)]
        meals: Vec<(MealSlot, String)>,
        /// Units in stock
        #[arg(long)]
        stock: Option<f64>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List medication schedules as JSON
    List,
    /// Remove a medication schedule
    Remove {
        /// Medication ID
        id: String,
    },
    /// Record a dose without an alarm
    Take {
        /// Medication ID
        id: String,
        /// Meal slot
        meal: MealSlot,
        /// Day the dose belongs to (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Next active day of each schedule
    Upcoming {
        /// How many days ahead to look
        #[arg(long, default_value = "30")]
        days: u32,
    },
}

fn parse_meal_entry(s: &str) -> Result<(MealSlot, String), String> {
    let (slot, time) = s
        .split_once('=')
        .ok_or_else(|| format!("expected SLOT=HH:MM, got '{s}'"))?;
    let slot: MealSlot = slot.parse().map_err(|e| format!("{e}"))?;
    let time = time.trim();
    if parse_meal_time(time).is_none() {
        return Err(format!("invalid meal time '{time}', expected HH:MM"));
    }
    Ok((slot, time.to_string()))
}

fn find_mut<'a>(
    meds: &'a mut [Medication],
    id: &str,
) -> Result<&'a mut Medication, Box<dyn std::error::Error>> {
    meds.iter_mut()
        .find(|m| m.id == id)
        .ok_or_else(|| format!("medication not found: {id}").into())
}

pub fn run(action: MedAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        MedAction::Add {
            name,
            dosage,
            dose,
            frequency,
            weekdays,
            start,
            interval,
            on_days,
            off_days,
            meals,
            stock,
            notes,
        } => {
            let mut med = Medication::new(name, dose);
            med.dosage = dosage;
            med.frequency = frequency;
            med.specific_days = (!weekdays.is_empty()).then_some(weekdays);
            med.start_date = start;
            med.interval_days = interval;
            med.cycle_on_days = on_days;
            med.cycle_off_days = off_days;
            med.remaining_stock = stock;
            med.notes = notes;
            for (slot, time) in meals {
                med = med.with_meal(slot, &time);
            }
            med.validate()?;

            let mut list = db.load_medications()?;
            list.push(med.clone());
            db.save_medication_list(&list)?;
            println!("{}", serde_json::to_string_pretty(&med)?);
        }
        MedAction::List => {
            let list = db.load_medications()?;
            println!("{}", serde_json::to_string_pretty(&list)?);
        }
        MedAction::Remove { id } => {
            let mut list = db.load_medications()?;
            let before = list.len();
            list.retain(|m| m.id != id);
            if list.len() == before {
                return Err(format!("medication not found: {id}").into());
            }
            db.save_medication_list(&list)?;
            println!("Medication removed: {id}");
        }
        MedAction::Take { id, meal, date } => {
            let now = local_now();
            let config = Config::load()?;
            let engine = load_engine(&db, &config);
            let resolves_alarm = engine.active_alarm().is_some_and(|s| {
                s.medication.id == id
                    && s.meal_slot == meal
                    && date.map_or(true, |d| d == s.started_at.date())
            });
            if resolves_alarm {
                // Taking the dose by hand also silences the alarm for it.
                let mut driver =
                    PollingDriver::new(engine, &db, print_event, config.caregiver.clone());
                driver.apply(
                    UserAction::MarkTaken {
                        medication_id: id,
                        meal_slot: meal,
                    },
                    now,
                )?;
                return Ok(());
            }

            let date = date.unwrap_or(now.date());
            let mut list = db.load_medications()?;
            let med = find_mut(&mut list, &id)?;
            if !med.meals.contains(&meal) {
                return Err(format!("{} has no {meal} dose", med.name).into());
            }
            if !med.record_dose(date, meal) {
                println!("already taken");
                return Ok(());
            }
            let event = Event::DoseTaken {
                medication: med.clone(),
                meal_slot: meal,
                date,
                at: now,
            };
            db.save_medication_list(&list)?;
            db.record_event(&event)?;
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        MedAction::Upcoming { days } => {
            let today = local_now().date();
            let list = db.load_medications()?;
            let upcoming: Vec<serde_json::Value> = list
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "id": m.id,
                        "name": m.name,
                        "nextActive": next_active_on(m, today, days),
                        "meals": m.meals.iter().map(|slot| {
                            serde_json::json!({
                                "meal": slot,
                                "time": m.meal_times.get(slot),
                            })
                        }).collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&upcoming)?);
        }
    }
    Ok(())
}
