//! The Remedio notification daemon.
//!
//! Hosts the [`Scheduler`]: restores the medication mirror on start,
//! polls the durable store for medication-set changes, re-arms
//! periodically so the 48-hour horizon never runs dry, and sleeps until
//! the earliest armed deadline in between.

mod scheduler;
mod sink;

use chrono::{Local, Utc};
use clap::Parser;
use remedio_core::store::get_json;
use remedio_core::{Config, FileStore, Medication, MEDICATIONS_KEY};
use scheduler::Scheduler;
use sink::{NotifySendSink, NotifySink, StdoutSink};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

#[derive(Parser)]
#[command(name = "remedio-notify")]
#[command(about = "Medication reminder daemon", long_about = None)]
struct Cli {
    /// Override data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Print reminders to stdout instead of desktop notifications
    #[arg(long)]
    stdout: bool,

    /// Recompute once, print the armed-timer count, and exit
    #[arg(long)]
    once: bool,
}

fn init_logging(data_dir: &Path, to_console: bool) {
    if to_console {
        remedio_core::logging::init();
        return;
    }

    let log_path = data_dir.join("remedio_notify.log");
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_writer(move || -> Box<dyn Write + Send> {
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
            {
                Ok(f) => Box::new(f),
                Err(_) => Box::new(std::io::stdout()),
            }
        })
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config ({}), using defaults", e);
            Config::default()
        }
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());
    init_logging(&data_dir, cli.stdout || cli.once);

    tracing::info!(data_dir = %data_dir.display(), "remedio-notify starting");

    let store = FileStore::new(&data_dir);
    let notify_cfg = config.notify.clone();
    let sink: Box<dyn NotifySink> = if cli.stdout {
        Box::new(StdoutSink)
    } else {
        Box::new(NotifySendSink)
    };
    let mut scheduler = Scheduler::new(store.clone(), sink, notify_cfg.clone());

    // Restart resilience: rebuild from the persisted mirror, then pick up
    // the foreground set right away if it differs.
    scheduler.activate(Local::now()).await;
    poll_medications(&store, &mut scheduler).await;

    if cli.once {
        println!("armed {} reminder(s)", scheduler.armed_count());
        return;
    }

    let mut poll = tokio::time::interval(Duration::from_secs(notify_cfg.poll_secs));
    let mut rearm = tokio::time::interval(Duration::from_secs(notify_cfg.rearm_hours * 3600));
    // Both intervals complete their first tick immediately; consume those
    // so the loop below only sees real cadence.
    poll.tick().await;
    rearm.tick().await;

    loop {
        let sleep_for = match scheduler.next_deadline() {
            Some(at) => (at - Utc::now()).to_std().unwrap_or(Duration::ZERO),
            None => Duration::from_secs(3600),
        };

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {
                scheduler.fire_due(Local::now()).await;
            }
            _ = poll.tick() => {
                poll_medications(&store, &mut scheduler).await;
            }
            _ = rearm.tick() => {
                tracing::debug!("periodic re-arm");
                scheduler.recompute(Local::now()).await;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }
}

/// Consume the one-way "medication set updated" message: re-read the
/// foreground's set from the store and recompute when it changed.
async fn poll_medications(
    store: &FileStore,
    scheduler: &mut Scheduler<FileStore, Box<dyn NotifySink>>,
) {
    match get_json::<Vec<Medication>, _>(store, MEDICATIONS_KEY) {
        Ok(Some(meds)) if meds != scheduler.medications() => {
            tracing::info!(medications = meds.len(), "medication set changed");
            scheduler.update_medications(meds, Local::now()).await;
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "failed to poll medication set"),
    }
}
