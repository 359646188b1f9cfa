//! The notification scheduler: owns the armed timer set and snooze chains.
//!
//! One instance per process, constructed by the daemon's main loop and
//! driven explicitly: `recompute` rebuilds the armed set wholesale,
//! `fire_due` delivers everything whose deadline has passed, and snooze
//! requests arm bounded follow-up reminders. Nothing here sleeps; the
//! host decides when to call in.

use crate::sink::{DoseReminder, NotifySink, Permission, ShowOutcome};
use chrono::{DateTime, Duration, Local, Utc};
use remedio_core::config::NotifyConfig;
use remedio_core::store::{get_json, set_json, NOTIFY_MIRROR_KEY};
use remedio_core::{planned_within, KeyValueStore, Medication};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Armed timers keyed by deadline, then medication, then tag. The BTreeMap
/// order makes the earliest deadline the first key.
type ArmedKey = (DateTime<Utc>, Uuid, String);

/// Derived lifecycle state: `Scheduled` while any timer is armed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scheduled,
}

pub struct Scheduler<S: KeyValueStore, N: NotifySink> {
    store: S,
    sink: N,
    cfg: NotifyConfig,
    medications: Vec<Medication>,
    armed: BTreeMap<ArmedKey, DoseReminder>,
    /// Snoozes used per fired tag; cleared on every recompute.
    chains: HashMap<String, u8>,
    /// Permission is asked once and cached for the process lifetime.
    permission: Option<Permission>,
}

impl<S: KeyValueStore, N: NotifySink> Scheduler<S, N> {
    pub fn new(store: S, sink: N, cfg: NotifyConfig) -> Self {
        Self {
            store,
            sink,
            cfg,
            medications: Vec::new(),
            armed: BTreeMap::new(),
            chains: HashMap::new(),
            permission: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.armed.is_empty() {
            SchedulerState::Idle
        } else {
            SchedulerState::Scheduled
        }
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    pub fn medications(&self) -> &[Medication] {
        &self.medications
    }

    /// Earliest armed deadline, if any.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.armed.keys().next().map(|(at, _, _)| *at)
    }

    /// Restart path: reload the medication-set mirror from the durable
    /// store and rebuild the armed set from it.
    pub async fn activate(&mut self, now: DateTime<Local>) {
        match get_json::<Vec<Medication>, _>(&self.store, NOTIFY_MIRROR_KEY) {
            Ok(Some(meds)) => {
                tracing::info!(medications = meds.len(), "restored medication mirror");
                self.medications = meds;
            }
            Ok(None) => tracing::info!("no medication mirror yet"),
            Err(e) => tracing::warn!(error = %e, "failed to read medication mirror"),
        }
        self.recompute(now).await;
    }

    /// The one-way "medication set updated" message.
    ///
    /// Persists the mirror before arming so a restart can rebuild without
    /// the foreground re-sending the set. A persist failure is logged and
    /// arming proceeds from memory; a restart before the next successful
    /// persist loses the update.
    pub async fn update_medications(&mut self, medications: Vec<Medication>, now: DateTime<Local>) {
        if let Err(e) = set_json(&self.store, NOTIFY_MIRROR_KEY, &medications) {
            tracing::warn!(error = %e, "failed to persist medication mirror, arming from memory");
        }
        self.medications = medications;
        self.recompute(now).await;
    }

    /// Rebuild the armed set from scratch.
    ///
    /// All previously armed timers and snooze chains are dropped first: a
    /// recompute always supersedes the entire armed set, so no firing can
    /// leak from a previous medication set.
    pub async fn recompute(&mut self, now: DateTime<Local>) {
        self.armed.clear();
        self.chains.clear();

        let permission = match self.permission {
            Some(p) => p,
            None => {
                let p = self.sink.request_permission().await;
                tracing::info!(
                    sink = self.sink.name(),
                    granted = (p == Permission::Granted),
                    "notification permission checked"
                );
                self.permission = Some(p);
                p
            }
        };
        if permission == Permission::Denied {
            tracing::debug!("notification permission denied, scheduler stays idle");
            return;
        }

        let horizon = Duration::hours(self.cfg.horizon_hours);
        for planned in planned_within(&self.medications, now, horizon) {
            let reminder = DoseReminder {
                medication_id: planned.medication_id,
                medication_name: planned.medication_name,
                at: planned.at,
                tag: format!("{}@{}", planned.medication_id, planned.at.timestamp_millis()),
                snooze_count: 0,
            };
            self.arm(reminder);
        }

        tracing::info!(armed = self.armed.len(), "schedule recomputed");
    }

    fn arm(&mut self, reminder: DoseReminder) {
        let key = (
            reminder.at.with_timezone(&Utc),
            reminder.medication_id,
            reminder.tag.clone(),
        );
        self.armed.insert(key, reminder);
    }

    /// Deliver every reminder whose deadline has passed.
    pub async fn fire_due(&mut self, now: DateTime<Local>) {
        let now_utc = now.with_timezone(&Utc);
        let due_keys: Vec<ArmedKey> = self
            .armed
            .keys()
            .take_while(|(at, _, _)| *at <= now_utc)
            .cloned()
            .collect();

        for key in due_keys {
            let Some(reminder) = self.armed.remove(&key) else {
                continue;
            };
            self.chains
                .insert(reminder.tag.clone(), reminder.snooze_count);

            tracing::info!(
                medication = %reminder.medication_name,
                tag = %reminder.tag,
                "firing reminder"
            );
            match self.sink.show(&reminder).await {
                Ok(ShowOutcome::Snoozed) => {
                    self.snooze(&reminder.tag, now);
                }
                Ok(ShowOutcome::Dismissed) => {}
                Err(e) => {
                    tracing::warn!(
                        medication = %reminder.medication_name,
                        error = %e,
                        "failed to deliver reminder"
                    );
                }
            }
        }
    }

    /// Arm one follow-up reminder 15 minutes out for a fired tag.
    ///
    /// Bounded per original firing: once `max_snoozes` have been used the
    /// chain expires silently and the request is ignored. Returns whether
    /// a timer was armed.
    pub fn snooze(&mut self, tag: &str, now: DateTime<Local>) -> bool {
        let Some(&used) = self.chains.get(tag) else {
            tracing::debug!(tag, "snooze for unknown tag ignored");
            return false;
        };
        if used >= self.cfg.max_snoozes {
            tracing::debug!(tag, used, "snooze chain exhausted");
            return false;
        }

        // The original reminder is gone from the armed set; reconstruct
        // enough of it from the tag's firing record.
        let Some((medication_id, medication_name)) = self.tag_medication(tag) else {
            tracing::debug!(tag, "snooze for medication no longer in set ignored");
            return false;
        };

        let at = now + Duration::minutes(self.cfg.snooze_minutes);
        tracing::info!(tag, snooze = used + 1, "snoozing reminder");
        self.arm(DoseReminder {
            medication_id,
            medication_name,
            at,
            tag: tag.to_string(),
            snooze_count: used + 1,
        });
        true
    }

    fn tag_medication(&self, tag: &str) -> Option<(Uuid, String)> {
        let id_part = tag.split('@').next()?;
        let id = Uuid::parse_str(id_part).ok()?;
        self.medications
            .iter()
            .find(|m| m.id == id)
            .map(|m| (m.id, m.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SinkError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use remedio_core::time::to_local_hhmm;
    use remedio_core::{DosingRule, FileStore};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Sink double: scripted permission and outcomes, records deliveries.
    struct ScriptedSink {
        permission: Permission,
        outcomes: Mutex<VecDeque<ShowOutcome>>,
        shown: Mutex<Vec<DoseReminder>>,
    }

    impl ScriptedSink {
        fn granted() -> Self {
            Self {
                permission: Permission::Granted,
                outcomes: Mutex::new(VecDeque::new()),
                shown: Mutex::new(Vec::new()),
            }
        }

        fn denied() -> Self {
            Self {
                permission: Permission::Denied,
                ..Self::granted()
            }
        }

        fn script(self, outcomes: &[ShowOutcome]) -> Self {
            *self.outcomes.lock().unwrap() = outcomes.iter().copied().collect();
            self
        }
    }

    #[async_trait]
    impl NotifySink for &ScriptedSink {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn request_permission(&self) -> Permission {
            self.permission
        }

        async fn show(&self, reminder: &DoseReminder) -> Result<ShowOutcome, SinkError> {
            self.shown.lock().unwrap().push(reminder.clone());
            let outcome = self
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ShowOutcome::Dismissed);
            Ok(outcome)
        }
    }

    fn cfg() -> NotifyConfig {
        NotifyConfig::default()
    }

    /// Stable reference instant away from midnight and DST edges.
    fn reference_now() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 6, 10, 8, 0, 0)
            .earliest()
            .unwrap()
    }

    fn med_due_at(name: &str, at: DateTime<Local>) -> Medication {
        Medication {
            id: Uuid::new_v4(),
            name: name.into(),
            rule: DosingRule::FixedTimes {
                times: vec![to_local_hhmm(&at)],
            },
            start_date: at.date_naive(),
            end_date: Some(at.date_naive()),
        }
    }

    fn store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn test_horizon_cut() {
        let (_dir, store) = store();
        let sink = ScriptedSink::granted();
        let mut scheduler = Scheduler::new(store, &sink, cfg());
        let now = reference_now();

        let soon = med_due_at("Soon", now + Duration::minutes(10));
        let mut far = med_due_at("Far", now + Duration::hours(50));
        far.end_date = None;

        scheduler
            .update_medications(vec![soon, far], now)
            .await;

        assert_eq!(scheduler.armed_count(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Scheduled);
        assert_eq!(
            scheduler.next_deadline(),
            Some((now + Duration::minutes(10)).with_timezone(&Utc))
        );
    }

    #[tokio::test]
    async fn test_permission_denied_arms_nothing() {
        let (_dir, store) = store();
        let sink = ScriptedSink::denied();
        let mut scheduler = Scheduler::new(store, &sink, cfg());
        let now = reference_now();

        let med = med_due_at("Soon", now + Duration::minutes(10));
        scheduler.update_medications(vec![med], now).await;

        assert_eq!(scheduler.armed_count(), 0);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_recompute_cancels_wholesale() {
        let (_dir, store) = store();
        let sink = ScriptedSink::granted();
        let mut scheduler = Scheduler::new(store, &sink, cfg());
        let now = reference_now();

        let med = med_due_at("Soon", now + Duration::minutes(10));
        scheduler.update_medications(vec![med], now).await;
        assert_eq!(scheduler.armed_count(), 1);

        scheduler.update_medications(vec![], now).await;
        assert_eq!(scheduler.armed_count(), 0);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_fire_due_delivers_and_disarms() {
        let (_dir, store) = store();
        let sink = ScriptedSink::granted();
        let mut scheduler = Scheduler::new(store, &sink, cfg());
        let now = reference_now();

        let med = med_due_at("Soon", now + Duration::minutes(10));
        scheduler.update_medications(vec![med], now).await;

        // Not due yet
        scheduler.fire_due(now + Duration::minutes(5)).await;
        assert_eq!(sink.shown.lock().unwrap().len(), 0);

        scheduler.fire_due(now + Duration::minutes(11)).await;
        let shown = sink.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].medication_name, "Soon");
        drop(shown);
        assert_eq!(scheduler.armed_count(), 0);
    }

    #[tokio::test]
    async fn test_snooze_bound() {
        let (_dir, store) = store();
        // Every firing answered with "snooze"
        let sink = ScriptedSink::granted().script(&[
            ShowOutcome::Snoozed,
            ShowOutcome::Snoozed,
            ShowOutcome::Snoozed,
            ShowOutcome::Snoozed,
        ]);
        let mut scheduler = Scheduler::new(store, &sink, cfg());
        let now = reference_now();

        let med = med_due_at("Soon", now + Duration::minutes(10));
        scheduler.update_medications(vec![med], now).await;

        // Original firing plus three snoozed re-firings
        let mut t = now + Duration::minutes(11);
        for expected_armed in [1, 1, 1, 0] {
            scheduler.fire_due(t).await;
            assert_eq!(scheduler.armed_count(), expected_armed);
            t += Duration::minutes(16);
        }

        // 4 deliveries total; the 4th snooze request armed nothing
        assert_eq!(sink.shown.lock().unwrap().len(), 4);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        // An explicit 5th request on the exhausted chain is also ignored
        let tag = sink.shown.lock().unwrap()[0].tag.clone();
        assert!(!scheduler.snooze(&tag, t));
    }

    #[tokio::test]
    async fn test_snooze_counts_carried_on_refire() {
        let (_dir, store) = store();
        let sink = ScriptedSink::granted().script(&[ShowOutcome::Snoozed]);
        let mut scheduler = Scheduler::new(store, &sink, cfg());
        let now = reference_now();

        let med = med_due_at("Soon", now + Duration::minutes(10));
        scheduler.update_medications(vec![med], now).await;

        scheduler.fire_due(now + Duration::minutes(11)).await;
        assert_eq!(scheduler.armed_count(), 1);

        let snoozed = scheduler.armed.values().next().unwrap();
        assert_eq!(snoozed.snooze_count, 1);
        // Same tag as the original occurrence
        assert_eq!(snoozed.tag, sink.shown.lock().unwrap()[0].tag);
    }

    #[tokio::test]
    async fn test_mirror_survives_restart() {
        let (_dir, store) = store();
        let now = reference_now();
        let med = med_due_at("Soon", now + Duration::minutes(10));

        let sink = ScriptedSink::granted();
        {
            let mut scheduler = Scheduler::new(store.clone(), &sink, cfg());
            scheduler.update_medications(vec![med.clone()], now).await;
            assert_eq!(scheduler.armed_count(), 1);
        }

        // Fresh instance, as after a process restart: no one re-sends the
        // set, activation reloads the mirror.
        let sink2 = ScriptedSink::granted();
        let mut restarted = Scheduler::new(store, &sink2, cfg());
        restarted.activate(now).await;

        assert_eq!(restarted.medications(), &[med]);
        assert_eq!(restarted.armed_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_set_is_idle() {
        let (_dir, store) = store();
        let sink = ScriptedSink::granted();
        let mut scheduler = Scheduler::new(store, &sink, cfg());

        scheduler.activate(reference_now()).await;
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.next_deadline(), None);
    }
}
