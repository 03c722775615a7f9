//! Medication schedule records.
//!
//! A [`Medication`] is owned by the surrounding application and replaced
//! wholesale on edit. The core reads it to decide whether a dose is due and,
//! on acknowledgment, mutates only `taken_status` and `remaining_stock`.
//!
//! The serialized shape is camelCase JSON so records stored by earlier
//! front ends load unchanged.

mod recurrence;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

pub use recurrence::{is_active_on, next_active_on};

/// How a medication recurs across calendar days.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frequency {
    Everyday,
    SpecificDays,
    Interval,
    Cyclic,
    /// Any frequency string this version does not understand. Such
    /// schedules load but are never active; the raw string is written back
    /// unchanged.
    Unknown(String),
}

impl Frequency {
    pub fn as_str(&self) -> &str {
        match self {
            Frequency::Everyday => "EVERYDAY",
            Frequency::SpecificDays => "SPECIFIC_DAYS",
            Frequency::Interval => "INTERVAL",
            Frequency::Cyclic => "CYCLIC",
            Frequency::Unknown(raw) => raw,
        }
    }

    /// Map a stored frequency string. Exact match only, so a record
    /// round-trips byte for byte.
    fn from_stored(raw: String) -> Self {
        match raw.as_str() {
            "EVERYDAY" => Frequency::Everyday,
            "SPECIFIC_DAYS" => Frequency::SpecificDays,
            "INTERVAL" => Frequency::Interval,
            "CYCLIC" => Frequency::Cyclic,
            _ => Frequency::Unknown(raw),
        }
    }
}

impl Serialize for Frequency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Frequency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Frequency::from_stored)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "EVERYDAY" => Ok(Frequency::Everyday),
            "SPECIFIC_DAYS" => Ok(Frequency::SpecificDays),
            "INTERVAL" => Ok(Frequency::Interval),
            "CYCLIC" => Ok(Frequency::Cyclic),
            other => Err(ValidationError::InvalidValue {
                field: "frequency".to_string(),
                message: format!("unknown frequency '{other}'"),
            }),
        }
    }
}

/// A named time-of-day bucket a dose is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Bedtime,
}

impl MealSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            MealSlot::Breakfast => "BREAKFAST",
            MealSlot::Lunch => "LUNCH",
            MealSlot::Dinner => "DINNER",
            MealSlot::Bedtime => "BEDTIME",
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealSlot {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BREAKFAST" => Ok(MealSlot::Breakfast),
            "LUNCH" => Ok(MealSlot::Lunch),
            "DINNER" => Ok(MealSlot::Dinner),
            "BEDTIME" => Ok(MealSlot::Bedtime),
            other => Err(ValidationError::InvalidValue {
                field: "meal".to_string(),
                message: format!("unknown meal slot '{other}'"),
            }),
        }
    }
}

/// Format used for `mealTimes` values.
pub const MEAL_TIME_FORMAT: &str = "%H:%M";

/// ISO day string used as the `takenStatus` key.
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a `HH:MM` meal time. Seconds are not accepted.
pub fn parse_meal_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), MEAL_TIME_FORMAT).ok()
}

/// Generate a fresh record identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A medication schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Display label, e.g. "1 tablet".
    #[serde(default)]
    pub dosage: String,
    pub frequency: Frequency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific_days: Option<Vec<Weekday>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_on_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_off_days: Option<u32>,
    #[serde(default)]
    pub meals: Vec<MealSlot>,
    /// Meal slot -> `HH:MM`.
    #[serde(default)]
    pub meal_times: BTreeMap<MealSlot, String>,
    #[serde(default)]
    pub dosage_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_stock: Option<f64>,
    /// ISO day -> meal slot -> taken.
    #[serde(default)]
    pub taken_status: BTreeMap<String, BTreeMap<MealSlot, bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Fields this version does not know about, kept so a save does not
    /// drop them.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Medication {
    /// An everyday medication with no meals attached yet.
    pub fn new(name: impl Into<String>, dosage_value: f64) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            dosage: String::new(),
            frequency: Frequency::Everyday,
            specific_days: None,
            start_date: None,
            interval_days: None,
            cycle_on_days: None,
            cycle_off_days: None,
            meals: Vec::new(),
            meal_times: BTreeMap::new(),
            dosage_value,
            remaining_stock: None,
            taken_status: BTreeMap::new(),
            notes: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Attach a meal slot at the given `HH:MM` time, keeping declaration order.
    pub fn with_meal(mut self, slot: MealSlot, time: &str) -> Self {
        if !self.meals.contains(&slot) {
            self.meals.push(slot);
        }
        self.meal_times.insert(slot, time.to_string());
        self
    }

    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        is_active_on(self, date)
    }

    /// Scheduled time of day for a slot, if the slot is declared and its
    /// time parses.
    pub fn scheduled_time(&self, slot: MealSlot) -> Option<NaiveTime> {
        if !self.meals.contains(&slot) {
            return None;
        }
        self.meal_times.get(&slot).and_then(|t| parse_meal_time(t))
    }

    pub fn is_taken(&self, date: NaiveDate, slot: MealSlot) -> bool {
        self.taken_status
            .get(&day_key(date))
            .and_then(|slots| slots.get(&slot))
            .copied()
            .unwrap_or(false)
    }

    /// Mark the dose for `slot` on `date` as taken and consume stock.
    ///
    /// Returns `false` without touching stock when the dose was already
    /// recorded.
    pub fn record_dose(&mut self, date: NaiveDate, slot: MealSlot) -> bool {
        if self.is_taken(date, slot) {
            return false;
        }
        self.taken_status
            .entry(day_key(date))
            .or_default()
            .insert(slot, true);
        if let Some(stock) = self.remaining_stock {
            self.remaining_stock = Some((stock - self.dosage_value).max(0.0));
        }
        true
    }

    /// Check that every field the frequency kind requires is present and
    /// sane. The recurrence evaluator does not depend on this; it fails
    /// closed on its own.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "id".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        match &self.frequency {
            Frequency::Everyday => {}
            Frequency::SpecificDays => match &self.specific_days {
                None => {
                    return Err(ValidationError::MissingField {
                        field: "specificDays",
                        frequency: "SPECIFIC_DAYS",
                    })
                }
                Some(days) if days.is_empty() => {
                    return Err(ValidationError::EmptyCollection("specificDays".to_string()))
                }
                Some(_) => {}
            },
            Frequency::Interval => {
                require_start(self, "INTERVAL")?;
                require_positive(self.interval_days, "intervalDays", "INTERVAL")?;
            }
            Frequency::Cyclic => {
                require_start(self, "CYCLIC")?;
                require_positive(self.cycle_on_days, "cycleOnDays", "CYCLIC")?;
                require_positive(self.cycle_off_days, "cycleOffDays", "CYCLIC")?;
            }
            Frequency::Unknown(raw) => {
                return Err(ValidationError::InvalidValue {
                    field: "frequency".to_string(),
                    message: format!("unknown frequency '{raw}'"),
                })
            }
        }

        if self.meals.is_empty() {
            return Err(ValidationError::EmptyCollection("meals".to_string()));
        }
        for slot in &self.meals {
            match self.meal_times.get(slot) {
                Some(time) if parse_meal_time(time).is_some() => {}
                Some(time) => {
                    return Err(ValidationError::InvalidValue {
                        field: format!("mealTimes.{slot}"),
                        message: format!("'{time}' is not HH:MM"),
                    })
                }
                None => {
                    return Err(ValidationError::InvalidValue {
                        field: format!("mealTimes.{slot}"),
                        message: "no time set".to_string(),
                    })
                }
            }
        }
        if !self.dosage_value.is_finite() || self.dosage_value < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "dosageValue".to_string(),
                message: "must be a non-negative number".to_string(),
            });
        }
        Ok(())
    }
}

fn require_start(med: &Medication, frequency: &'static str) -> Result<(), ValidationError> {
    if med.start_date.is_none() {
        return Err(ValidationError::MissingField {
            field: "startDate",
            frequency,
        });
    }
    Ok(())
}

fn require_positive(
    value: Option<u32>,
    field: &'static str,
    frequency: &'static str,
) -> Result<(), ValidationError> {
    match value {
        None => Err(ValidationError::MissingField { field, frequency }),
        Some(0) => Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: "must be a positive integer".to_string(),
        }),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn record_dose_marks_taken_and_decrements_stock() {
        let mut med = Medication::new("Metformin", 2.0).with_meal(MealSlot::Breakfast, "08:00");
        med.remaining_stock = Some(10.0);

        assert!(med.record_dose(date(2026, 3, 1), MealSlot::Breakfast));
        assert!(med.is_taken(date(2026, 3, 1), MealSlot::Breakfast));
        assert_eq!(med.remaining_stock, Some(8.0));
        assert_eq!(
            med.taken_status["2026-03-01"].get(&MealSlot::Breakfast),
            Some(&true)
        );
    }

    #[test]
    fn record_dose_floors_stock_at_zero() {
        let mut med = Medication::new("Aspirin", 2.0).with_meal(MealSlot::Dinner, "19:00");
        med.remaining_stock = Some(1.0);
        med.record_dose(date(2026, 3, 1), MealSlot::Dinner);
        assert_eq!(med.remaining_stock, Some(0.0));
    }

    #[test]
    fn record_dose_leaves_undefined_stock_undefined() {
        let mut med = Medication::new("Vitamin D", 1.0).with_meal(MealSlot::Lunch, "12:00");
        med.record_dose(date(2026, 3, 1), MealSlot::Lunch);
        assert_eq!(med.remaining_stock, None);
    }

    #[test]
    fn record_dose_twice_consumes_stock_once() {
        let mut med = Medication::new("Aspirin", 1.0).with_meal(MealSlot::Dinner, "19:00");
        med.remaining_stock = Some(5.0);
        assert!(med.record_dose(date(2026, 3, 1), MealSlot::Dinner));
        assert!(!med.record_dose(date(2026, 3, 1), MealSlot::Dinner));
        assert_eq!(med.remaining_stock, Some(4.0));
    }

    #[test]
    fn json_shape_is_camel_case_and_round_trips() {
        let mut med = Medication::new("Warfarin", 1.0)
            .with_meal(MealSlot::Breakfast, "08:00")
            .with_meal(MealSlot::Dinner, "19:30");
        med.frequency = Frequency::Cyclic;
        med.start_date = Some(date(2026, 1, 5));
        med.cycle_on_days = Some(5);
        med.cycle_off_days = Some(2);
        med.remaining_stock = Some(30.0);
        med.record_dose(date(2026, 1, 5), MealSlot::Breakfast);

        let json = serde_json::to_value(&med).unwrap();
        assert_eq!(json["frequency"], "CYCLIC");
        assert_eq!(json["startDate"], "2026-01-05");
        assert_eq!(json["cycleOnDays"], 5);
        assert_eq!(json["mealTimes"]["DINNER"], "19:30");
        assert_eq!(json["takenStatus"]["2026-01-05"]["BREAKFAST"], true);

        let back: Medication = serde_json::from_value(json).unwrap();
        assert_eq!(back, med);
    }

    #[test]
    fn unknown_frequency_still_loads() {
        let json = r#"{"id":"m1","frequency":"FORTNIGHTLY","meals":["LUNCH"],
            "mealTimes":{"LUNCH":"12:00"},"dosageValue":1,"takenStatus":{}}"#;
        let med: Medication = serde_json::from_str(json).unwrap();
        assert_eq!(med.frequency, Frequency::Unknown("FORTNIGHTLY".to_string()));
        assert!(med.validate().is_err());
    }

    #[test]
    fn unknown_frequency_and_fields_survive_a_save() {
        let json = r#"{"id":"m1","frequency":"FORTNIGHTLY","meals":["LUNCH"],
            "mealTimes":{"LUNCH":"12:00"},"dosageValue":1,
            "pillColor":"blue","refill":{"pharmacy":"Main St"}}"#;
        let mut med: Medication = serde_json::from_str(json).unwrap();
        med.record_dose(date(2026, 3, 1), MealSlot::Lunch);

        let back = serde_json::to_value(&med).unwrap();
        assert_eq!(back["frequency"], "FORTNIGHTLY");
        assert_eq!(back["pillColor"], "blue");
        assert_eq!(back["refill"]["pharmacy"], "Main St");
        assert_eq!(back["takenStatus"]["2026-03-01"]["LUNCH"], true);
        assert!(back.get("extra").is_none());
    }

    #[test]
    fn specific_days_parse_weekday_labels() {
        let json = r#"{"id":"m1","frequency":"SPECIFIC_DAYS","specificDays":["Mon","Thu"],
            "meals":["BREAKFAST"],"mealTimes":{"BREAKFAST":"07:45"},"dosageValue":1}"#;
        let med: Medication = serde_json::from_str(json).unwrap();
        assert_eq!(med.specific_days, Some(vec![Weekday::Mon, Weekday::Thu]));
        assert!(med.validate().is_ok());
    }

    #[test]
    fn validate_reports_missing_interval_fields() {
        let mut med = Medication::new("Iron", 1.0).with_meal(MealSlot::Lunch, "12:00");
        med.frequency = Frequency::Interval;
        assert_eq!(
            med.validate(),
            Err(ValidationError::MissingField {
                field: "startDate",
                frequency: "INTERVAL"
            })
        );
        med.start_date = Some(date(2026, 1, 1));
        med.interval_days = Some(0);
        assert!(matches!(
            med.validate(),
            Err(ValidationError::InvalidValue { .. })
        ));
        med.interval_days = Some(2);
        assert!(med.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_meal_time() {
        let med = Medication::new("Iron", 1.0).with_meal(MealSlot::Lunch, "12:00:30");
        assert!(med.validate().is_err());
        assert_eq!(med.scheduled_time(MealSlot::Lunch), None);
    }

    #[test]
    fn scheduled_time_ignores_undeclared_slots() {
        let mut med = Medication::new("Iron", 1.0).with_meal(MealSlot::Lunch, "12:00");
        med.meal_times.insert(MealSlot::Dinner, "18:00".to_string());
        assert_eq!(
            med.scheduled_time(MealSlot::Lunch),
            NaiveTime::from_hms_opt(12, 0, 0)
        );
        assert_eq!(med.scheduled_time(MealSlot::Dinner), None);
    }

    #[test]
    fn meal_slot_and_frequency_parse_from_cli_strings() {
        assert_eq!("breakfast".parse::<MealSlot>().unwrap(), MealSlot::Breakfast);
        assert_eq!("specific-days".parse::<Frequency>().unwrap(), Frequency::SpecificDays);
        assert!("brunch".parse::<MealSlot>().is_err());
    }
}
