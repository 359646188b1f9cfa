#![forbid(unsafe_code)]

//! Core domain model and scheduling engine for the Remedio system.
//!
//! This crate provides:
//! - Domain types (medications, dosing rules, history entries, doses)
//! - The pure occurrence generator and history reconciler
//! - The dose log mutation API (tracker)
//! - Durable key/value persistence
//! - Horizon computation for the notification scheduler

pub mod config;
pub mod error;
pub mod horizon;
pub mod logging;
pub mod reconcile;
pub mod schedule;
pub mod store;
pub mod time;
pub mod tracker;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use horizon::{planned_within, PlannedDose};
pub use reconcile::{attach_history, generate_doses};
pub use schedule::doses_for_date;
pub use store::{FileStore, KeyValueStore, HISTORY_KEY, MEDICATIONS_KEY, NOTIFY_MIRROR_KEY};
pub use tracker::Tracker;
pub use types::{Dose, DosingRule, HistoryEntry, Medication, FREE_DOSE};
