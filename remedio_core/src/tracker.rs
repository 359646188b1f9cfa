//! Single-writer owner of the medication set and history log.
//!
//! All mutations go through the `Tracker`: it updates in-memory state
//! first, then persists the whole value to the durable store. A failed
//! persist is reported to the caller but never rolls back memory, so the
//! current session keeps working and only a restart can lose the update.

use crate::store::{get_json, set_json, KeyValueStore, HISTORY_KEY, MEDICATIONS_KEY};
use crate::time::{parse_hhmm, to_local_hhmm};
use crate::types::{Dose, DosingRule, HistoryEntry, Medication, FREE_DOSE};
use crate::{Error, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use uuid::Uuid;

pub struct Tracker<S: KeyValueStore> {
    store: S,
    medications: Vec<Medication>,
    history: Vec<HistoryEntry>,
}

impl<S: KeyValueStore> Tracker<S> {
    /// Load both logs from the store; absent or corrupt values start empty.
    pub fn load(store: S) -> Result<Self> {
        let medications: Vec<Medication> =
            get_json(&store, MEDICATIONS_KEY)?.unwrap_or_default();
        let history: Vec<HistoryEntry> = get_json(&store, HISTORY_KEY)?.unwrap_or_default();

        tracing::debug!(
            medications = medications.len(),
            history = history.len(),
            "loaded tracker state"
        );

        Ok(Self {
            store,
            medications,
            history,
        })
    }

    pub fn medications(&self) -> &[Medication] {
        &self.medications
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Today's (or any day's) reconciled dose view.
    pub fn doses_for(&self, date: NaiveDate) -> Vec<Dose> {
        crate::reconcile::generate_doses(&self.medications, &self.history, date)
    }

    // ------------------------------------------------------------------
    // Medication set mutations
    // ------------------------------------------------------------------

    pub fn add_medication(
        &mut self,
        name: &str,
        rule: DosingRule,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> Result<Medication> {
        if name.trim().is_empty() {
            return Err(Error::InvalidRule("medication name must not be empty".into()));
        }
        rule.validate()?;

        let med = Medication {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            rule,
            start_date,
            end_date,
        };
        self.medications.push(med.clone());
        tracing::info!(medication = %med.name, id = %med.id, "added medication");

        self.persist_medications()?;
        Ok(med)
    }

    pub fn update_medication(&mut self, updated: Medication) -> Result<()> {
        if updated.name.trim().is_empty() {
            return Err(Error::InvalidRule("medication name must not be empty".into()));
        }
        updated.rule.validate()?;

        let slot = self
            .medications
            .iter_mut()
            .find(|m| m.id == updated.id)
            .ok_or_else(|| Error::medication_not_found(updated.id))?;
        *slot = updated;

        self.persist_medications()
    }

    /// Remove a medication. Its history stays: entries carry their own
    /// name snapshot and are deleted only explicitly.
    pub fn remove_medication(&mut self, id: Uuid) -> Result<Medication> {
        let idx = self
            .medications
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| Error::medication_not_found(id))?;
        let removed = self.medications.remove(idx);
        tracing::info!(medication = %removed.name, id = %removed.id, "removed medication");

        self.persist_medications()?;
        Ok(removed)
    }

    /// Resolve a medication by id, or by case-insensitive name.
    pub fn resolve(&self, selector: &str) -> Result<&Medication> {
        if let Ok(id) = Uuid::parse_str(selector) {
            if let Some(med) = self.medications.iter().find(|m| m.id == id) {
                return Ok(med);
            }
        }
        self.medications
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(selector.trim()))
            .ok_or_else(|| Error::medication_not_found(selector))
    }

    // ------------------------------------------------------------------
    // Dose log mutations
    // ------------------------------------------------------------------

    /// Record a taken dose against a scheduled slot (or [`FREE_DOSE`]).
    ///
    /// Never deduplicates: taking the same slot twice on one day appends
    /// two entries. The reconciler surfaces only the first; the rest stay
    /// visible in the raw history.
    pub fn record_taken(&mut self, medication_id: Uuid, scheduled_time: &str) -> Result<HistoryEntry> {
        let med = self
            .medications
            .iter()
            .find(|m| m.id == medication_id)
            .ok_or_else(|| Error::medication_not_found(medication_id))?;

        if scheduled_time != FREE_DOSE {
            parse_hhmm(scheduled_time)?;
        }

        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            medication_id,
            medication_name: med.name.clone(),
            taken_at: Utc::now(),
            scheduled_time: scheduled_time.to_string(),
        };
        self.history.push(entry.clone());
        tracing::info!(
            medication = %entry.medication_name,
            slot = %entry.scheduled_time,
            "recorded taken dose"
        );

        self.persist_history()?;
        Ok(entry)
    }

    /// Delete a history entry; absent ids are a no-op, not an error.
    pub fn delete_entry(&mut self, id: Uuid) -> Result<()> {
        let before = self.history.len();
        self.history.retain(|e| e.id != id);
        if self.history.len() == before {
            tracing::debug!(%id, "delete_entry: no such entry");
            return Ok(());
        }
        self.persist_history()
    }

    /// Rebase an interval medication's first dose time to the instant a
    /// dose was actually taken. Future occurrences shift; history does not.
    pub fn rebase_first_dose(
        &mut self,
        medication_id: Uuid,
        taken_at: DateTime<Local>,
    ) -> Result<Medication> {
        let med = self
            .medications
            .iter_mut()
            .find(|m| m.id == medication_id)
            .ok_or_else(|| Error::medication_not_found(medication_id))?;

        match &mut med.rule {
            DosingRule::IntervalHours {
                first_dose_time, ..
            } => {
                *first_dose_time = to_local_hhmm(&taken_at);
                let updated = med.clone();
                tracing::info!(
                    medication = %updated.name,
                    first_dose_time = %to_local_hhmm(&taken_at),
                    "rebased interval first dose"
                );
                self.persist_medications()?;
                Ok(updated)
            }
            _ => Err(Error::InvalidRule(
                "only interval medications can be rebased".into(),
            )),
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    fn persist_medications(&self) -> Result<()> {
        set_json(&self.store, MEDICATIONS_KEY, &self.medications)
    }

    fn persist_history(&self) -> Result<()> {
        set_json(&self.store, HISTORY_KEY, &self.history)
    }
}
