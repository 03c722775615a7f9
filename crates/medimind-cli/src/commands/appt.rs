use chrono::NaiveDateTime;
use clap::Subcommand;
use medimind_core::care::upcoming;
use medimind_core::storage::Database;
use medimind_core::{local_now, Appointment};

use super::parse_datetime;

#[derive(Subcommand)]
pub enum ApptAction {
    /// Add an appointment
    Add {
        /// Appointment title
        title: String,
        /// Local date and time (e.g. "2026-09-05 14:30")
        #[arg(long, value_parser = parse_datetime)]
        at: NaiveDateTime,
        #[arg(long)]
        doctor: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List appointments as JSON (upcoming only unless --all)
    List {
        #[arg(long)]
        all: bool,
    },
    /// Remove an appointment
    Remove {
        /// Appointment ID
        id: String,
    },
}

pub fn run(action: ApptAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        ApptAction::Add {
            title,
            at,
            doctor,
            location,
            notes,
        } => {
            let mut appt = Appointment::new(title, at)?;
            appt.doctor = doctor;
            appt.location = location;
            appt.notes = notes;

            let mut list = db.load_appointments()?;
            list.push(appt.clone());
            db.save_appointments(&list)?;
            println!("{}", serde_json::to_string_pretty(&appt)?);
        }
        ApptAction::List { all } => {
            let list = db.load_appointments()?;
            if all {
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else {
                let soon = upcoming(&list, local_now());
                println!("{}", serde_json::to_string_pretty(&soon)?);
            }
        }
        ApptAction::Remove { id } => {
            let mut list = db.load_appointments()?;
            let before = list.len();
            list.retain(|a| a.id != id);
            if list.len() == before {
                return Err(format!("appointment not found: {id}").into());
            }
            db.save_appointments(&list)?;
            println!("Appointment removed: {id}");
        }
    }
    Ok(())
}
