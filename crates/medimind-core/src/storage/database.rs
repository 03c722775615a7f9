//! SQLite-based record storage and dose history.
//!
//! Provides persistent storage for:
//! - Medication and appointment lists (JSON documents in the kv table)
//! - The reminder engine between CLI invocations
//! - Every alarm outcome, for adherence statistics

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::data_dir;
use crate::care::Appointment;
use crate::error::{DatabaseError, Result};
use crate::events::Event;
use crate::medication::Medication;
use crate::reminder::{ReminderEngine, ReminderStore};

const MEDICATIONS_KEY: &str = "medications";
const APPOINTMENTS_KEY: &str = "appointments";
const ENGINE_KEY: &str = "reminder_engine";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One row of the dose history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoseRecord {
    pub id: i64,
    pub kind: String,
    pub medication_id: String,
    pub meal_slot: String,
    pub turn_date: NaiveDate,
    pub at: NaiveDateTime,
}

/// Outcome counts for one day.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AdherenceStats {
    pub date: Option<NaiveDate>,
    pub raised: u64,
    pub taken: u64,
    pub snoozed: u64,
    pub escalated: u64,
    pub answered: u64,
    pub declined: u64,
}

impl AdherenceStats {
    /// Share of raised alarms that ended in a taken dose.
    pub fn taken_ratio(&self) -> Option<f64> {
        (self.raised > 0).then(|| self.taken as f64 / self.raised as f64)
    }

    fn add(&mut self, kind: &str, count: u64) {
        match kind {
            "raised" => self.raised += count,
            "taken" => self.taken += count,
            "snoozed" => self.snoozed += count,
            "escalated" => self.escalated += count,
            "answered" => self.answered += count,
            "declined" => self.declined += count,
            _ => {}
        }
    }
}

/// SQLite database for MediMind records.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/medimind/medimind.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("medimind.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS dose_log (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                kind          TEXT NOT NULL,
                medication_id TEXT NOT NULL,
                meal_slot     TEXT NOT NULL,
                turn_date     TEXT NOT NULL,
                at            TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_dose_log_turn_date ON dose_log(turn_date);
            CREATE INDEX IF NOT EXISTS idx_dose_log_medication ON dose_log(medication_id, turn_date);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    // ── kv ───────────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.kv_get(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn store_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.kv_set(key, &json)?;
        Ok(())
    }

    // ── Records ──────────────────────────────────────────────────────

    /// Stored medication entries, split into readable records and the raw
    /// JSON of entries that do not parse.
    fn medication_entries(&self) -> Result<(Vec<Medication>, Vec<serde_json::Value>)> {
        let raw: Vec<serde_json::Value> = self.load_json(MEDICATIONS_KEY)?.unwrap_or_default();
        let mut readable = Vec::with_capacity(raw.len());
        let mut unreadable = Vec::new();
        for value in raw {
            match serde_json::from_value::<Medication>(value.clone()) {
                Ok(med) => readable.push(med),
                Err(e) => {
                    let id = value.get("id").and_then(|v| v.as_str()).unwrap_or("?");
                    tracing::warn!(id, "skipping unreadable medication record: {e}");
                    unreadable.push(value);
                }
            }
        }
        Ok((readable, unreadable))
    }

    /// Medication records in insertion order. A record that does not parse
    /// is skipped, never reminded about, and left untouched in storage.
    pub fn load_medications(&self) -> Result<Vec<Medication>> {
        Ok(self.medication_entries()?.0)
    }

    /// Replace the readable records. Unreadable stored entries are kept
    /// verbatim after them.
    pub fn save_medication_list(&self, medications: &[Medication]) -> Result<()> {
        let (_, unreadable) = self.medication_entries()?;
        let mut entries = medications
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        entries.extend(unreadable);
        self.store_json(MEDICATIONS_KEY, &entries)
    }

    pub fn load_appointments(&self) -> Result<Vec<Appointment>> {
        Ok(self.load_json(APPOINTMENTS_KEY)?.unwrap_or_default())
    }

    pub fn save_appointments(&self, appointments: &[Appointment]) -> Result<()> {
        self.store_json(APPOINTMENTS_KEY, appointments)
    }

    /// The persisted engine, if one was saved and still parses.
    pub fn load_engine(&self) -> Result<Option<ReminderEngine>> {
        match self.load_json(ENGINE_KEY) {
            Ok(engine) => Ok(engine),
            Err(crate::CoreError::Json(e)) => {
                tracing::warn!("discarding unreadable reminder engine state: {e}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn store_engine(&self, engine: &ReminderEngine) -> Result<()> {
        self.store_json(ENGINE_KEY, engine)
    }

    // ── Dose history ─────────────────────────────────────────────────

    /// Record an engine event in the dose history. Snapshots are skipped.
    pub fn record_event(&self, event: &Event) -> Result<Option<i64>> {
        let Some((medication_id, meal_slot)) = event.turn() else {
            return Ok(None);
        };
        let turn_date = match event {
            Event::DoseTaken { date, .. } => *date,
            Event::CallEscalated {
                alarm_started_at, ..
            } => alarm_started_at.date(),
            other => other.at().date(),
        };
        self.conn.execute(
            "INSERT INTO dose_log (kind, medication_id, meal_slot, turn_date, at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.kind(),
                medication_id,
                meal_slot.as_str(),
                turn_date.to_string(),
                event.at().format(TIMESTAMP_FORMAT).to_string(),
            ],
        )?;
        Ok(Some(self.conn.last_insert_rowid()))
    }

    /// Most recent history rows, newest first.
    pub fn history(&self, limit: usize) -> Result<Vec<DoseRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, medication_id, meal_slot, turn_date, at
             FROM dose_log
             ORDER BY at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, kind, medication_id, meal_slot, turn_date, at) = row?;
            let (Ok(turn_date), Ok(at)) = (
                turn_date.parse::<NaiveDate>(),
                NaiveDateTime::parse_from_str(&at, TIMESTAMP_FORMAT),
            ) else {
                tracing::warn!(id, "skipping dose_log row with malformed timestamps");
                continue;
            };
            records.push(DoseRecord {
                id,
                kind,
                medication_id,
                meal_slot,
                turn_date,
                at,
            });
        }
        Ok(records)
    }

    /// Outcome counts for turns scheduled on `date`.
    pub fn adherence_on(&self, date: NaiveDate) -> Result<AdherenceStats> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, COUNT(*)
             FROM dose_log
             WHERE turn_date = ?1
             GROUP BY kind",
        )?;
        let rows = stmt.query_map(params![date.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
        })?;

        let mut stats = AdherenceStats {
            date: Some(date),
            ..Default::default()
        };
        for row in rows {
            let (kind, count) = row?;
            stats.add(&kind, count);
        }
        Ok(stats)
    }

    /// Per-day outcome counts for the `days` days ending on `until`, oldest first.
    pub fn adherence_range(&self, until: NaiveDate, days: u32) -> Result<Vec<AdherenceStats>> {
        (0..days)
            .rev()
            .filter_map(|back| until.checked_sub_days(chrono::Days::new(u64::from(back))))
            .map(|date| self.adherence_on(date))
            .collect()
    }
}

impl ReminderStore for Database {
    fn medications(&self) -> Result<Vec<Medication>> {
        self.load_medications()
    }

    fn save_medications(&self, medications: &[Medication]) -> Result<()> {
        self.save_medication_list(medications)
    }

    fn save_engine(&self, engine: &ReminderEngine) -> Result<()> {
        self.store_engine(engine)
    }

    fn record_outcome(&self, event: &Event) -> Result<()> {
        self.record_event(event).map(|_| ())
    }
}
