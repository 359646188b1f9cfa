//! Occurrence generator: dosing rules + a target date → the day's doses.
//!
//! Pure and total: malformed rules (empty time list, zero interval,
//! unparseable first dose time) contribute nothing instead of failing, so
//! callers can run the generator over any stored medication set.

use crate::time::{parse_hhmm_on_date, to_local_hhmm};
use crate::types::{Dose, DosingRule, Medication, FREE_DOSE};
use chrono::{Duration, NaiveDate};
use std::cmp::Ordering;

/// Generate the ordered dose list for `date`, without history attached.
///
/// Scheduled doses sort by their zero-padded `HH:MM` string (chronological,
/// thanks to the padding); every as-needed dose sorts after every scheduled
/// one. The sort is stable, so medication order is preserved among ties and
/// among as-needed entries.
pub fn doses_for_date(medications: &[Medication], date: NaiveDate) -> Vec<Dose> {
    let mut doses = Vec::new();

    for med in medications {
        if !med.active_on(date) {
            continue;
        }

        match &med.rule {
            DosingRule::FixedTimes { times } => {
                // Stored order, not sorted; the final pass orders the day.
                for time in times {
                    doses.push(scheduled_dose(med, time.clone()));
                }
            }
            DosingRule::IntervalHours {
                interval_hours,
                first_dose_time,
            } => {
                if *interval_hours < 1 {
                    tracing::warn!(
                        medication = %med.name,
                        "interval below 1 hour, emitting no occurrences"
                    );
                    continue;
                }
                let mut cursor = match parse_hhmm_on_date(first_dose_time, date) {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::warn!(
                            medication = %med.name,
                            error = %e,
                            "unparseable first dose time, emitting no occurrences"
                        );
                        continue;
                    }
                };
                // Stop as soon as the cursor leaves the target calendar day;
                // doses past midnight belong to the next day's list.
                while cursor.date_naive() == date {
                    doses.push(scheduled_dose(med, to_local_hhmm(&cursor)));
                    cursor += Duration::hours(i64::from(*interval_hours));
                }
            }
            DosingRule::AsNeeded => {
                doses.push(Dose {
                    medication_id: med.id,
                    medication_name: med.name.clone(),
                    scheduled_time: FREE_DOSE.to_string(),
                    is_as_needed: true,
                    taken_entry: None,
                    medication: med.clone(),
                });
            }
        }
    }

    doses.sort_by(day_order);
    doses
}

fn scheduled_dose(med: &Medication, scheduled_time: String) -> Dose {
    Dose {
        medication_id: med.id,
        medication_name: med.name.clone(),
        scheduled_time,
        is_as_needed: false,
        taken_entry: None,
        medication: med.clone(),
    }
}

fn day_order(a: &Dose, b: &Dose) -> Ordering {
    match (a.is_as_needed, b.is_as_needed) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.scheduled_time.cmp(&b.scheduled_time),
    }
}
