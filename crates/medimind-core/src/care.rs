//! Caregiver and appointment records.
//!
//! The caregiver is who the simulated escalation call appears to come from.
//! Appointments are plain records the front ends list and edit; the alarm
//! engine never looks at them.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::medication::new_id;

/// Caller shown on an escalated reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaregiverProfile {
    #[serde(default = "default_caregiver_name")]
    pub name: String,
    /// Photo URL or path for the call overlay.
    #[serde(default)]
    pub photo: Option<String>,
}

fn default_caregiver_name() -> String {
    "Caregiver".into()
}

impl Default for CaregiverProfile {
    fn default() -> Self {
        Self {
            name: default_caregiver_name(),
            photo: None,
        }
    }
}

/// A doctor's appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub title: String,
    /// Local wall-clock time of the appointment.
    pub at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Appointment {
    pub fn new(title: impl Into<String>, at: NaiveDateTime) -> Result<Self, ValidationError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "title".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(Self {
            id: new_id(),
            title,
            at,
            doctor: None,
            location: None,
            notes: None,
        })
    }
}

/// Appointments at or after `now`, soonest first.
pub fn upcoming(appointments: &[Appointment], now: NaiveDateTime) -> Vec<&Appointment> {
    let mut list: Vec<&Appointment> = appointments.iter().filter(|a| a.at >= now).collect();
    list.sort_by_key(|a| a.at);
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 4, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn upcoming_filters_past_and_sorts() {
        let list = vec![
            Appointment::new("Dentist", at(20, 9)).unwrap(),
            Appointment::new("Checkup", at(2, 9)).unwrap(),
            Appointment::new("Cardiology", at(12, 14)).unwrap(),
        ];
        let titles: Vec<&str> = upcoming(&list, at(10, 0))
            .iter()
            .map(|a| a.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Cardiology", "Dentist"]);
    }

    #[test]
    fn empty_title_is_rejected() {
        assert!(Appointment::new("  ", at(1, 8)).is_err());
    }

    #[test]
    fn caregiver_defaults_when_fields_missing() {
        let c: CaregiverProfile = serde_json::from_str("{}").unwrap();
        assert_eq!(c, CaregiverProfile::default());
    }
}
