//! History reconciler: annotates a day's doses with taken entries.

use crate::schedule::doses_for_date;
use crate::time::local_date_of;
use crate::types::{Dose, HistoryEntry, Medication};
use chrono::NaiveDate;

/// Attach taken-dose history to generated doses for `date`.
///
/// Only history entries whose `taken_at` falls on `date` (local time) are
/// considered. For each scheduled dose the first entry matching
/// `(medication_id, scheduled_time)` is attached; extra same-slot entries
/// stay visible only in the raw log. As-needed doses never carry an entry.
///
/// Pure and idempotent: same inputs, same output, no side effects.
pub fn attach_history(
    mut doses: Vec<Dose>,
    history: &[HistoryEntry],
    date: NaiveDate,
) -> Vec<Dose> {
    let day_entries: Vec<&HistoryEntry> = history
        .iter()
        .filter(|e| local_date_of(&e.taken_at) == date)
        .collect();

    for dose in doses.iter_mut() {
        if dose.is_as_needed {
            continue;
        }
        dose.taken_entry = day_entries
            .iter()
            .find(|e| {
                e.medication_id == dose.medication_id && e.scheduled_time == dose.scheduled_time
            })
            .map(|e| (*e).clone());
    }

    doses
}

/// The UI-facing composition: generate the day's doses, then reconcile
/// them against the history log.
pub fn generate_doses(
    medications: &[Medication],
    history: &[HistoryEntry],
    date: NaiveDate,
) -> Vec<Dose> {
    attach_history(doses_for_date(medications, date), history, date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DosingRule, FREE_DOSE};
    use chrono::{Local, TimeZone, Utc};
    use uuid::Uuid;

    fn fixed_med(name: &str, times: &[&str]) -> Medication {
        Medication {
            id: Uuid::new_v4(),
            name: name.into(),
            rule: DosingRule::FixedTimes {
                times: times.iter().map(|s| s.to_string()).collect(),
            },
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
        }
    }

    fn entry_at(med: &Medication, slot: &str, y: i32, mo: u32, d: u32, h: u32, mi: u32) -> HistoryEntry {
        let local = Local
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .earliest()
            .unwrap();
        HistoryEntry {
            id: Uuid::new_v4(),
            medication_id: med.id,
            medication_name: med.name.clone(),
            taken_at: local.with_timezone(&Utc),
            scheduled_time: slot.into(),
        }
    }

    #[test]
    fn test_end_to_end_scenario() {
        let med = fixed_med("Aspirin", &["08:00", "20:00"]);
        let entry = entry_at(&med, "08:00", 2024, 1, 1, 8, 5);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let doses = generate_doses(&[med], &[entry.clone()], date);

        assert_eq!(doses.len(), 2);
        assert_eq!(doses[0].scheduled_time, "08:00");
        assert_eq!(doses[0].taken_entry, Some(entry));
        assert_eq!(doses[1].scheduled_time, "20:00");
        assert_eq!(doses[1].taken_entry, None);
    }

    #[test]
    fn test_other_day_entries_ignored() {
        let med = fixed_med("Aspirin", &["08:00"]);
        let entry = entry_at(&med, "08:00", 2024, 1, 2, 8, 0);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let doses = generate_doses(&[med], &[entry], date);
        assert_eq!(doses[0].taken_entry, None);
    }

    #[test]
    fn test_first_match_on_duplicates() {
        let med = fixed_med("Aspirin", &["08:00"]);
        let first = entry_at(&med, "08:00", 2024, 1, 1, 8, 1);
        let second = entry_at(&med, "08:00", 2024, 1, 1, 8, 30);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let doses = generate_doses(&[med], &[first.clone(), second], date);
        assert_eq!(doses[0].taken_entry, Some(first));
    }

    #[test]
    fn test_as_needed_never_annotated() {
        let med = Medication {
            id: Uuid::new_v4(),
            name: "Dipirona".into(),
            rule: DosingRule::AsNeeded,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
        };
        let entry = entry_at(&med, FREE_DOSE, 2024, 1, 1, 10, 0);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let doses = generate_doses(&[med], &[entry], date);
        assert_eq!(doses.len(), 1);
        assert!(doses[0].is_as_needed);
        assert_eq!(doses[0].taken_entry, None);
    }

    #[test]
    fn test_idempotent() {
        let med = fixed_med("Aspirin", &["08:00", "20:00"]);
        let history = vec![entry_at(&med, "08:00", 2024, 1, 1, 8, 5)];
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let once = attach_history(doses_for_date(&[med.clone()], date), &history, date);
        let twice = attach_history(once.clone(), &history, date);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_wrong_slot_not_matched() {
        let med = fixed_med("Aspirin", &["08:00", "20:00"]);
        let entry = entry_at(&med, "20:00", 2024, 1, 1, 20, 3);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let doses = generate_doses(&[med], &[entry.clone()], date);
        assert_eq!(doses[0].taken_entry, None);
        assert_eq!(doses[1].taken_entry, Some(entry));
    }
}
