pub mod appt;
pub mod config;
pub mod med;
pub mod reminder;
pub mod stats;

use chrono::NaiveDateTime;
use medimind_core::storage::Database;
use medimind_core::{Config, Event, ReminderEngine};

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse a local date-time such as `2026-09-05 08:00`.
pub fn parse_datetime(s: &str) -> Result<NaiveDateTime, String> {
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s.trim(), f).ok())
        .ok_or_else(|| format!("invalid date-time '{s}', expected YYYY-MM-DD HH:MM"))
}

/// The persisted reminder engine with the current config applied.
pub fn load_engine(db: &Database, config: &Config) -> ReminderEngine {
    let mut engine = match db.load_engine() {
        Ok(Some(engine)) => engine,
        Ok(None) => ReminderEngine::new(config.reminders.escalation_delay_minutes),
        Err(e) => {
            tracing::warn!("could not load reminder state: {e}");
            ReminderEngine::new(config.reminders.escalation_delay_minutes)
        }
    };
    engine.set_escalation_delay_minutes(config.reminders.escalation_delay_minutes);
    engine.set_vibration(config.notifications.vibration);
    engine
}

/// Print an event as one JSON line.
pub fn print_event(event: &Event) {
    match serde_json::to_string(event) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("could not serialize event: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_datetime_accepts_space_and_t_separators() {
        let a = parse_datetime("2026-09-05 08:00").unwrap();
        let b = parse_datetime("2026-09-05T08:00:00").unwrap();
        assert_eq!(a, b);
        assert!(parse_datetime("08:00").is_err());
    }
}
