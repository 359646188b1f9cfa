//! Notification sink trait and its implementations.
//!
//! The scheduler talks to the user through a [`NotifySink`]; the desktop
//! implementation shells out to `notify-send`, and a stdout sink backs
//! `--stdout` runs and tests.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::process::Command;
use uuid::Uuid;

/// Whether the environment lets us show notifications at all.
///
/// Denied is not an error: the scheduler degrades to doing nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// Errors from a single delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to spawn notifier: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("notifier exited with {0}")]
    Status(std::process::ExitStatus),
}

/// What the user did with a shown notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShowOutcome {
    Dismissed,
    Snoozed,
}

/// One reminder ready for delivery.
#[derive(Clone, Debug)]
pub struct DoseReminder {
    pub medication_id: Uuid,
    pub medication_name: String,
    pub at: DateTime<Local>,
    /// Opaque tag identifying the originating occurrence; snooze
    /// re-firings keep the tag of the original.
    pub tag: String,
    /// How many snoozes this chain has used so far.
    pub snooze_count: u8,
}

#[async_trait]
pub trait NotifySink: Send + Sync {
    /// Human-readable name for this sink (e.g. "notify-send", "stdout").
    fn name(&self) -> &str;

    /// Check, once, whether notifications can be shown.
    async fn request_permission(&self) -> Permission;

    /// Show a reminder and report what the user chose.
    async fn show(&self, reminder: &DoseReminder) -> Result<ShowOutcome, SinkError>;
}

#[async_trait]
impl NotifySink for Box<dyn NotifySink> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn request_permission(&self) -> Permission {
        (**self).request_permission().await
    }

    async fn show(&self, reminder: &DoseReminder) -> Result<ShowOutcome, SinkError> {
        (**self).show(reminder).await
    }
}

/// Desktop sink backed by `notify-send`.
///
/// Permission maps to the binary being present and runnable; a missing
/// `notify-send` means Denied and the scheduler stays silent.
pub struct NotifySendSink;

#[async_trait]
impl NotifySink for NotifySendSink {
    fn name(&self) -> &str {
        "notify-send"
    }

    async fn request_permission(&self) -> Permission {
        match Command::new("notify-send").arg("--version").output().await {
            Ok(out) if out.status.success() => Permission::Granted,
            _ => Permission::Denied,
        }
    }

    async fn show(&self, reminder: &DoseReminder) -> Result<ShowOutcome, SinkError> {
        // -A blocks until the notification is acted on and prints the
        // chosen action key, which is how the snooze choice reaches us.
        let output = Command::new("notify-send")
            .arg("--app-name=remedio")
            .arg("-A")
            .arg("snooze=Snooze 15 minutes")
            .arg(format!("--hint=string:x-remedio-tag:{}", reminder.tag))
            .arg("Medication reminder")
            .arg(format!("Time to take {}.", reminder.medication_name))
            .output()
            .await?;

        if !output.status.success() {
            return Err(SinkError::Status(output.status));
        }

        let choice = String::from_utf8_lossy(&output.stdout);
        if choice.trim() == "snooze" {
            Ok(ShowOutcome::Snoozed)
        } else {
            Ok(ShowOutcome::Dismissed)
        }
    }
}

/// Prints reminders to stdout. Always granted; never snoozes.
pub struct StdoutSink;

#[async_trait]
impl NotifySink for StdoutSink {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    async fn show(&self, reminder: &DoseReminder) -> Result<ShowOutcome, SinkError> {
        println!(
            "[{}] Time to take {}.",
            reminder.at.format("%Y-%m-%d %H:%M"),
            reminder.medication_name
        );
        Ok(ShowOutcome::Dismissed)
    }
}
