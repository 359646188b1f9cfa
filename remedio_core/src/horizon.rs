//! Forward-looking occurrence computation for the notification scheduler.
//!
//! Pure: the daemon decides when to recompute and what to do with the
//! result; this module only turns a medication set and a reference instant
//! into the occurrences inside the rolling window.

use crate::schedule::doses_for_date;
use crate::time::parse_hhmm_on_date;
use chrono::{DateTime, Duration, Local};
use uuid::Uuid;

/// One future occurrence a timer should be armed for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedDose {
    pub medication_id: Uuid,
    pub medication_name: String,
    pub at: DateTime<Local>,
}

/// All scheduled occurrences with an absolute instant in `(now, now + horizon]`.
///
/// As-needed medications have no schedule and are never planned. Output is
/// sorted by instant.
pub fn planned_within(
    medications: &[crate::Medication],
    now: DateTime<Local>,
    horizon: Duration,
) -> Vec<PlannedDose> {
    let limit = now + horizon;
    let mut planned = Vec::new();

    let mut day = now.date_naive();
    let last_day = limit.date_naive();
    while day <= last_day {
        for dose in doses_for_date(medications, day) {
            if dose.is_as_needed {
                continue;
            }
            // Generator output is always a valid HH:MM here; skip quietly
            // if it somehow is not.
            let Ok(at) = parse_hhmm_on_date(&dose.scheduled_time, day) else {
                continue;
            };
            if at > now && at <= limit {
                planned.push(PlannedDose {
                    medication_id: dose.medication_id,
                    medication_name: dose.medication_name,
                    at,
                });
            }
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    planned.sort_by_key(|p| (p.at, p.medication_id));
    planned
}
