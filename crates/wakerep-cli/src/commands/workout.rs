use clap::Subcommand;
use wakerep_core::motion::SimulatedSensor;
use wakerep_core::workout::{
    completion_percentage, format_duration, HistoryRepository, SessionState, WorkoutController,
};
use wakerep_core::{ActivityType, Config, Database, Event, WorkoutRecord};

use super::{print_event, LogFeedback, SampleInput};

#[derive(Subcommand)]
pub enum WorkoutAction {
    /// List activities with their unit, default target and instructions
    Activities,
    /// Effective detection profiles (config overrides applied) as JSON
    Profiles {
        /// Only this activity
        #[arg(long)]
        activity: Option<ActivityType>,
    },
    /// Replay recorded motion through a workout session
    Simulate {
        #[arg(long)]
        activity: ActivityType,
        /// Defaults per activity
        #[arg(long)]
        target: Option<u32>,
        #[command(flatten)]
        input: SampleInput,
        /// Store the result in workout history
        #[arg(long)]
        record: bool,
    },
}

pub fn run(action: WorkoutAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    match action {
        WorkoutAction::Activities => {
            for activity in ActivityType::ALL {
                println!(
                    "{:<18} {:<8} {:>4}  {}",
                    activity.as_str(),
                    activity.unit().to_string(),
                    activity.default_target(),
                    activity.instructions()
                );
            }
        }
        WorkoutAction::Profiles { activity } => {
            let activities = match activity {
                Some(a) => vec![a],
                None => ActivityType::ALL.to_vec(),
            };
            let mut out = serde_json::Map::new();
            for a in activities {
                out.insert(a.to_string(), serde_json::to_value(config.profile(a)?)?);
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        WorkoutAction::Simulate {
            activity,
            target,
            input,
            record,
        } => {
            let target = target.unwrap_or_else(|| config.default_target(activity));
            let mut controller = WorkoutController::new(Box::new(SimulatedSensor::new()))
                .with_profiles(config.detection_profiles()?)
                .with_feedback(Box::new(LogFeedback));
            let samples = input.load(controller.profile_for(activity).sample_interval_ms)?;

            controller.start(activity, target)?;
            if let Some(event) = controller.started_event() {
                print_event(&event)?;
            }
            for sample in &samples {
                for event in controller.on_sample(sample) {
                    print_event(&event)?;
                }
                if controller.state() == SessionState::Completed {
                    break;
                }
            }
            if let Some(summary) = controller.abort() {
                print_event(&Event::SessionAborted {
                    activity: summary.activity,
                    target: summary.target,
                    completed: summary.completed,
                    duration_secs: summary.duration_secs,
                    at: summary.ended_at,
                })?;
            }

            let summary = controller
                .summary()
                .ok_or("session ended without a summary")?;
            eprintln!(
                "{} {}/{} {} ({}%) in {}",
                activity.display_name(),
                summary.completed,
                summary.target,
                activity.unit(),
                completion_percentage(summary.completed, summary.target),
                format_duration(summary.duration_secs),
            );
            if record {
                let db = Database::open()?;
                let rec = WorkoutRecord::from_summary("simulation", "Simulation", summary);
                db.record_workout(&rec)?;
                eprintln!("Recorded: {}", rec.id);
            }
        }
    }
    Ok(())
}
