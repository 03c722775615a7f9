//! Recurrence evaluation: is a medication scheduled on a given calendar day?
//!
//! Pure functions, no state. Day offsets are taken between calendar dates,
//! never between instants, so time of day and DST changes cannot shift a
//! schedule by one day. Anything the evaluator cannot validate is treated
//! as "not active": a reminder is never raised for a malformed schedule.

use chrono::{Datelike, Duration, NaiveDate};

use super::{Frequency, Medication};

/// Whether `med` is scheduled on `date`.
pub fn is_active_on(med: &Medication, date: NaiveDate) -> bool {
    match med.frequency {
        Frequency::Everyday => true,
        Frequency::SpecificDays => med
            .specific_days
            .as_deref()
            .is_some_and(|days| days.contains(&date.weekday())),
        Frequency::Interval => {
            let (Some(diff), Some(interval)) =
                (days_since_start(med, date), positive(med.interval_days))
            else {
                return false;
            };
            diff % interval == 0
        }
        Frequency::Cyclic => {
            let (Some(diff), Some(on), Some(off)) = (
                days_since_start(med, date),
                positive(med.cycle_on_days),
                positive(med.cycle_off_days),
            ) else {
                return false;
            };
            diff % (on + off) < on
        }
        Frequency::Unknown(_) => false,
    }
}

/// First date in `[from, from + horizon_days)` on which `med` is active.
pub fn next_active_on(med: &Medication, from: NaiveDate, horizon_days: u32) -> Option<NaiveDate> {
    (0..i64::from(horizon_days))
        .filter_map(|offset| from.checked_add_signed(Duration::days(offset)))
        .find(|date| is_active_on(med, *date))
}

/// Whole days from the schedule anchor to `date`; `None` before the anchor
/// or when there is no anchor.
fn days_since_start(med: &Medication, date: NaiveDate) -> Option<i64> {
    let start = med.start_date?;
    let diff = date.signed_duration_since(start).num_days();
    (diff >= 0).then_some(diff)
}

fn positive(value: Option<u32>) -> Option<i64> {
    value.filter(|n| *n > 0).map(i64::from)
}
