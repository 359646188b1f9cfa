//! Core domain types for the Remedio system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Medications and their dosing rules
//! - History entries (taken doses)
//! - Derived per-day doses

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Sentinel `scheduled_time` used for as-needed ("free") dose logging.
pub const FREE_DOSE: &str = "Livre";

// ============================================================================
// Dosing Rules
// ============================================================================

/// How a medication is dosed over a day.
///
/// Exactly one payload per kind; the variant carries everything the
/// occurrence generator needs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DosingRule {
    /// Explicit clock times, one dose per listed time per day.
    FixedTimes { times: Vec<String> },

    /// First dose at `first_dose_time`, then every `interval_hours` hours
    /// until the day ends.
    IntervalHours {
        interval_hours: u32,
        first_dose_time: String,
    },

    /// No schedule; doses are logged ad hoc under [`FREE_DOSE`].
    AsNeeded,
}

impl DosingRule {
    /// Validate a rule at the mutation boundary.
    ///
    /// The occurrence generator itself stays total and silently emits
    /// nothing for malformed rules; this is the place where bad input is
    /// rejected with an error instead.
    pub fn validate(&self) -> crate::Result<()> {
        match self {
            DosingRule::FixedTimes { times } => {
                if times.is_empty() {
                    return Err(crate::Error::InvalidRule(
                        "fixed-times rule needs at least one time".into(),
                    ));
                }
                for t in times {
                    crate::time::parse_hhmm(t)?;
                }
                Ok(())
            }
            DosingRule::IntervalHours {
                interval_hours,
                first_dose_time,
            } => {
                if *interval_hours < 1 {
                    return Err(crate::Error::InvalidRule(
                        "interval must be at least 1 hour".into(),
                    ));
                }
                crate::time::parse_hhmm(first_dose_time)?;
                Ok(())
            }
            DosingRule::AsNeeded => Ok(()),
        }
    }
}

impl fmt::Display for DosingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DosingRule::FixedTimes { times } => write!(f, "at {}", times.join(", ")),
            DosingRule::IntervalHours {
                interval_hours,
                first_dose_time,
            } => write!(f, "every {}h from {}", interval_hours, first_dose_time),
            DosingRule::AsNeeded => write!(f, "as needed"),
        }
    }
}

// ============================================================================
// Medication & History
// ============================================================================

/// A medication in the user's set.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Medication {
    pub id: Uuid,
    pub name: String,
    pub rule: DosingRule,
    /// First day (inclusive) the medication is active.
    pub start_date: NaiveDate,
    /// Last day (inclusive), open-ended when absent. `end_date >=
    /// start_date` is assumed, not validated here.
    pub end_date: Option<NaiveDate>,
}

impl Medication {
    /// Whole-day range check: is the medication active on `date`?
    pub fn active_on(&self, date: NaiveDate) -> bool {
        date >= self.start_date && self.end_date.map_or(true, |end| date <= end)
    }
}

/// One taken dose, appended to the history log.
///
/// `medication_name` is a snapshot taken at logging time; renaming or
/// removing the medication never touches history. The back-reference via
/// `medication_id` is weak for the same reason.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub medication_id: Uuid,
    pub medication_name: String,
    pub taken_at: DateTime<Utc>,
    /// The `HH:MM` slot this entry satisfies, or [`FREE_DOSE`].
    pub scheduled_time: String,
}

// ============================================================================
// Derived Doses
// ============================================================================

/// One expected dose on a specific day, derived from a rule.
///
/// Never persisted; recomputed on demand by the occurrence generator and
/// annotated by the reconciler.
#[derive(Clone, Debug, PartialEq)]
pub struct Dose {
    pub medication_id: Uuid,
    pub medication_name: String,
    /// `HH:MM` for scheduled doses, [`FREE_DOSE`] for as-needed ones.
    pub scheduled_time: String,
    pub is_as_needed: bool,
    /// The history entry satisfying this dose, if one was found.
    pub taken_entry: Option<HistoryEntry>,
    /// Read-only reference to the source medication, for downstream
    /// recalculation decisions.
    pub medication: Medication,
}

impl Dose {
    pub fn is_taken(&self) -> bool {
        self.taken_entry.is_some()
    }
}
