use clap::Subcommand;
use wakerep_core::workout::{completion_percentage, format_duration, HistoryRepository};
use wakerep_core::{Database, WorkoutStats};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List finished workouts, newest first
    List {
        /// Only workouts for this alarm
        #[arg(long)]
        alarm: Option<String>,
        /// Show at most this many
        #[arg(long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Totals, current-month completion and streak
    Stats,
    /// Delete one workout record
    Delete { id: String },
    /// Delete all workout records
    Clear {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        HistoryAction::List { alarm, limit, json } => {
            let mut records = match alarm {
                Some(id) => db.list_workouts_for_alarm(&id)?,
                None => db.list_workouts()?,
            };
            if let Some(n) = limit {
                records.truncate(n);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No workouts yet.");
            } else {
                for r in &records {
                    println!(
                        "{}  {:<16} {:>3}/{:<3} {:>3}%  {:>7}  {}{}",
                        r.completed_at
                            .with_timezone(&chrono::Local)
                            .format("%Y-%m-%d %H:%M"),
                        r.activity.display_name(),
                        r.completed,
                        r.target,
                        completion_percentage(r.completed, r.target),
                        format_duration(r.duration_secs),
                        r.alarm_title,
                        if r.was_completed { "" } else { " (dismissed)" },
                    );
                }
            }
        }
        HistoryAction::Stats => {
            let stats = WorkoutStats::compute_now(&db.list_workouts()?);
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        HistoryAction::Delete { id } => {
            if !db.delete_workout(&id)? {
                return Err(format!("workout not found: {id}").into());
            }
            println!("Workout deleted: {id}");
        }
        HistoryAction::Clear { yes } => {
            if !yes {
                return Err("refusing to clear history without --yes".into());
            }
            db.clear_workouts()?;
            println!("History cleared.");
        }
    }
    Ok(())
}
