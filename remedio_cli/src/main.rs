use chrono::{Duration, Local, NaiveDate};
use clap::{Parser, Subcommand};
use remedio_core::time::{date_key, local_date_of, to_local_hhmm};
use remedio_core::{
    Config, DosingRule, Error, FileStore, Result, Tracker, FREE_DOSE,
};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "remedio")]
#[command(about = "Medication reminder and dose tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the dose list for a day (default)
    Today {
        /// Target date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Add a medication
    Add {
        /// Display name
        name: String,

        /// Fixed dose time, repeatable (e.g. --at 08:00 --at 20:00)
        #[arg(long = "at", value_name = "HH:MM")]
        at: Vec<String>,

        /// Dose every N hours, starting at --first
        #[arg(long, value_name = "N", requires = "first")]
        every: Option<u32>,

        /// First dose time for --every
        #[arg(long, value_name = "HH:MM", requires = "every")]
        first: Option<String>,

        /// No schedule; log doses ad hoc
        #[arg(long, conflicts_with_all = ["at", "every"])]
        as_needed: bool,

        /// First active day (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        start: Option<String>,

        /// Last active day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
    },

    /// List the medication set
    List,

    /// Edit a medication (by id or name)
    Edit {
        /// Medication id or name
        med: String,

        /// New display name
        #[arg(long)]
        name: Option<String>,

        /// Replace the rule with fixed times, repeatable
        #[arg(long = "at", value_name = "HH:MM")]
        at: Vec<String>,

        /// Replace the rule with an interval, starting at --first
        #[arg(long, value_name = "N", requires = "first")]
        every: Option<u32>,

        /// First dose time for --every
        #[arg(long, value_name = "HH:MM", requires = "every")]
        first: Option<String>,

        /// Replace the rule with as-needed logging
        #[arg(long, conflicts_with_all = ["at", "every"])]
        as_needed: bool,

        /// New first active day
        #[arg(long)]
        start: Option<String>,

        /// New last active day
        #[arg(long, conflicts_with = "no_end")]
        end: Option<String>,

        /// Clear the end date
        #[arg(long)]
        no_end: bool,
    },

    /// Remove a medication (history is kept)
    Remove {
        /// Medication id or name
        med: String,
    },

    /// Record a taken dose
    Take {
        /// Medication id or name
        med: String,

        /// Scheduled slot being satisfied (HH:MM); optional for
        /// as-needed medications
        time: Option<String>,

        /// For interval medications: rebase the first dose time to now
        #[arg(long)]
        recalc: bool,
    },

    /// Show the taken-dose history
    History {
        /// How many days back to show
        #[arg(long, default_value_t = 7)]
        days: i64,
    },

    /// Delete a history entry by id
    Forget {
        /// History entry id
        entry: String,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Initialize logging
    remedio_core::logging::init();

    let cli = Cli::parse();

    // Determine data directory
    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let mut tracker = Tracker::load(FileStore::new(&data_dir))?;

    match cli.command {
        Some(Commands::Today { date }) => cmd_today(&tracker, parse_date_or_today(date)?),
        Some(Commands::Add {
            name,
            at,
            every,
            first,
            as_needed,
            start,
            end,
        }) => cmd_add(&mut tracker, &name, at, every, first, as_needed, start, end),
        Some(Commands::List) => cmd_list(&tracker),
        Some(Commands::Edit {
            med,
            name,
            at,
            every,
            first,
            as_needed,
            start,
            end,
            no_end,
        }) => cmd_edit(
            &mut tracker,
            &med,
            name,
            at,
            every,
            first,
            as_needed,
            start,
            end,
            no_end,
        ),
        Some(Commands::Remove { med }) => cmd_remove(&mut tracker, &med),
        Some(Commands::Take { med, time, recalc }) => cmd_take(&mut tracker, &med, time, recalc),
        Some(Commands::History { days }) => cmd_history(&tracker, days),
        Some(Commands::Forget { entry }) => cmd_forget(&mut tracker, &entry),
        None => cmd_today(&tracker, Local::now().date_naive()),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| Error::InvalidRule(format!("invalid date {:?}, expected YYYY-MM-DD", s)))
}

fn parse_date_or_today(s: Option<String>) -> Result<NaiveDate> {
    match s {
        Some(s) => parse_date(&s),
        None => Ok(Local::now().date_naive()),
    }
}

fn build_rule(
    at: Vec<String>,
    every: Option<u32>,
    first: Option<String>,
    as_needed: bool,
) -> Result<DosingRule> {
    if !at.is_empty() {
        Ok(DosingRule::FixedTimes { times: at })
    } else if let (Some(every), Some(first)) = (every, first) {
        Ok(DosingRule::IntervalHours {
            interval_hours: every,
            first_dose_time: first,
        })
    } else if as_needed {
        Ok(DosingRule::AsNeeded)
    } else {
        Err(Error::InvalidRule(
            "choose a dosing rule: --at, --every/--first, or --as-needed".into(),
        ))
    }
}

fn cmd_today(tracker: &Tracker<FileStore>, date: NaiveDate) -> Result<()> {
    let doses = tracker.doses_for(date);
    if doses.is_empty() {
        println!("No doses for {}.", date_key(date));
        return Ok(());
    }

    println!("Doses for {}:", date_key(date));
    for dose in doses.iter().filter(|d| !d.is_as_needed) {
        match &dose.taken_entry {
            Some(entry) => println!(
                "  [x] {}  {}  (taken at {})",
                dose.scheduled_time,
                dose.medication_name,
                to_local_hhmm(&entry.taken_at.with_timezone(&Local))
            ),
            None => println!("  [ ] {}  {}", dose.scheduled_time, dose.medication_name),
        }
    }

    let as_needed: Vec<_> = doses.iter().filter(|d| d.is_as_needed).collect();
    if !as_needed.is_empty() {
        println!();
        println!("As needed:");
        for dose in as_needed {
            let logged = tracker
                .history()
                .iter()
                .filter(|e| {
                    e.medication_id == dose.medication_id
                        && e.scheduled_time == FREE_DOSE
                        && local_date_of(&e.taken_at) == date
                })
                .count();
            if logged > 0 {
                println!("  - {}  (logged {}x)", dose.medication_name, logged);
            } else {
                println!("  - {}", dose.medication_name);
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_add(
    tracker: &mut Tracker<FileStore>,
    name: &str,
    at: Vec<String>,
    every: Option<u32>,
    first: Option<String>,
    as_needed: bool,
    start: Option<String>,
    end: Option<String>,
) -> Result<()> {
    let rule = build_rule(at, every, first, as_needed)?;
    let start = parse_date_or_today(start)?;
    let end = end.as_deref().map(parse_date).transpose()?;

    let med = tracker.add_medication(name, rule, start, end)?;
    println!("✓ Added {} ({})", med.name, med.rule);
    println!("  id: {}", med.id);
    Ok(())
}

fn cmd_list(tracker: &Tracker<FileStore>) -> Result<()> {
    if tracker.medications().is_empty() {
        println!("No medications. Add one with `remedio add`.");
        return Ok(());
    }

    for med in tracker.medications() {
        let range = match med.end_date {
            Some(end) => format!("{} to {}", date_key(med.start_date), date_key(end)),
            None => format!("from {}", date_key(med.start_date)),
        };
        println!("{}  ({})  {}", med.name, med.rule, range);
        println!("  id: {}", med.id);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_edit(
    tracker: &mut Tracker<FileStore>,
    selector: &str,
    name: Option<String>,
    at: Vec<String>,
    every: Option<u32>,
    first: Option<String>,
    as_needed: bool,
    start: Option<String>,
    end: Option<String>,
    no_end: bool,
) -> Result<()> {
    let mut med = tracker.resolve(selector)?.clone();

    if let Some(name) = name {
        med.name = name;
    }
    if !at.is_empty() || every.is_some() || as_needed {
        med.rule = build_rule(at, every, first, as_needed)?;
    }
    if let Some(start) = start {
        med.start_date = parse_date(&start)?;
    }
    if no_end {
        med.end_date = None;
    } else if let Some(end) = end {
        med.end_date = Some(parse_date(&end)?);
    }

    tracker.update_medication(med.clone())?;
    println!("✓ Updated {} ({})", med.name, med.rule);
    Ok(())
}

fn cmd_remove(tracker: &mut Tracker<FileStore>, selector: &str) -> Result<()> {
    let id = tracker.resolve(selector)?.id;
    let removed = tracker.remove_medication(id)?;
    println!("✓ Removed {}. History entries are kept.", removed.name);
    Ok(())
}

fn cmd_take(
    tracker: &mut Tracker<FileStore>,
    selector: &str,
    time: Option<String>,
    recalc: bool,
) -> Result<()> {
    let med = tracker.resolve(selector)?.clone();

    let slot = match time {
        Some(t) => t,
        None if matches!(med.rule, DosingRule::AsNeeded) => FREE_DOSE.to_string(),
        None => {
            return Err(Error::InvalidRule(
                "TIME is required for scheduled medications (e.g. `remedio take aspirin 08:00`)"
                    .into(),
            ))
        }
    };

    let entry = tracker.record_taken(med.id, &slot)?;
    println!(
        "✓ Recorded {} ({}) at {}",
        entry.medication_name,
        entry.scheduled_time,
        to_local_hhmm(&entry.taken_at.with_timezone(&Local))
    );

    if recalc {
        if matches!(med.rule, DosingRule::IntervalHours { .. }) {
            let updated =
                tracker.rebase_first_dose(med.id, entry.taken_at.with_timezone(&Local))?;
            println!("✓ Schedule rebased: {}", updated.rule);
        } else {
            eprintln!("--recalc only applies to interval medications; ignored");
        }
    }

    Ok(())
}

fn cmd_history(tracker: &Tracker<FileStore>, days: i64) -> Result<()> {
    let cutoff = chrono::Utc::now() - Duration::days(days);
    let mut entries: Vec<_> = tracker
        .history()
        .iter()
        .filter(|e| e.taken_at >= cutoff)
        .collect();
    entries.sort_by(|a, b| b.taken_at.cmp(&a.taken_at));

    if entries.is_empty() {
        println!("No doses taken in the last {} days.", days);
        return Ok(());
    }

    let mut current_day = String::new();
    for entry in entries {
        let day = date_key(local_date_of(&entry.taken_at));
        if day != current_day {
            println!("{}", day);
            current_day = day;
        }
        println!(
            "  {}  {}  (slot {})  {}",
            to_local_hhmm(&entry.taken_at.with_timezone(&Local)),
            entry.medication_name,
            entry.scheduled_time,
            entry.id
        );
    }
    Ok(())
}

fn cmd_forget(tracker: &mut Tracker<FileStore>, entry: &str) -> Result<()> {
    let id = Uuid::parse_str(entry).map_err(|_| Error::NotFound {
        what: "history entry",
        id: entry.to_string(),
    })?;

    let existed = tracker.history().iter().any(|e| e.id == id);
    tracker.delete_entry(id)?;
    if existed {
        println!("✓ Entry removed.");
    } else {
        println!("No such entry; nothing to do.");
    }
    Ok(())
}
