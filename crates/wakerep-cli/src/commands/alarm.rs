use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, Utc};
use clap::Subcommand;
use tracing::{info, warn};
use wakerep_core::alarm::{
    next_fire_after, parse_days, AlarmStore, PlaybackOptions, TriggerPayload,
};
use wakerep_core::motion::SimulatedSensor;
use wakerep_core::workout::{HistoryRepository, WorkoutController};
use wakerep_core::{
    ActivityType, Alarm, AlarmDismissal, AlarmPatch, AlarmService, AlarmTime, Config, Database,
    Event, NewAlarm, TokioTimerBackend,
};

use super::{print_event, ConsoleAudio, LogFeedback, SampleInput};

#[derive(Subcommand)]
pub enum AlarmAction {
    /// Create an alarm
    Add {
        /// Alarm title
        title: String,
        /// Time of day, "07:30" or "7:30 AM"
        #[arg(long)]
        time: AlarmTime,
        /// "weekdays", "weekends", "daily" or a list like "Mon,Wed,Fri"
        #[arg(long, default_value = "weekdays")]
        days: String,
        /// Exercise required to dismiss (defaults to config workout.default_activity)
        #[arg(long)]
        activity: Option<ActivityType>,
        /// Repetitions, steps or pulses to reach (defaults per activity)
        #[arg(long)]
        target: Option<u32>,
        #[arg(long, default_value = "")]
        melody: String,
        #[arg(long, default_value = "")]
        color: String,
    },
    /// List alarms
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one alarm as JSON
    Show { id: String },
    /// Change fields of an alarm
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        time: Option<AlarmTime>,
        #[arg(long)]
        days: Option<String>,
        #[arg(long)]
        activity: Option<ActivityType>,
        #[arg(long)]
        target: Option<u32>,
        #[arg(long)]
        melody: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    /// Enable or disable an alarm
    Toggle { id: String },
    /// Delete an alarm
    Delete { id: String },
    /// Next occurrence of every enabled alarm, soonest first
    Next {
        #[arg(long)]
        json: bool,
    },
    /// Arm all alarms and print triggers until Ctrl-C
    Watch {
        /// How often to re-read the alarm list for changes
        #[arg(long, default_value_t = 30)]
        poll_secs: u64,
    },
    /// Ring an alarm now and dismiss it with recorded motion
    Ring {
        id: String,
        #[command(flatten)]
        input: SampleInput,
        /// Take the emergency exit after this many samples
        #[arg(long)]
        give_up_after: Option<usize>,
    },
}

pub fn run(action: AlarmAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    // One-shot commands hold no timers; the store only edits the list and
    // prunes stale failure ids. `watch` reschedules from it on its next poll.
    let store = AlarmStore::new(&db);

    match action {
        AlarmAction::Add {
            title,
            time,
            days,
            activity,
            target,
            melody,
            color,
        } => {
            let config = Config::load()?;
            let activity = activity.unwrap_or(config.workout.default_activity);
            let mut new = NewAlarm::new(title, time, activity);
            new.days = parse_days(&days)?;
            new.target_count = target.unwrap_or_else(|| config.default_target(activity));
            new.melody = melody;
            new.color = color;
            let alarm = store.create(new)?;
            println!("Alarm created: {}", alarm.id);
            print_alarm_line(&alarm);
        }
        AlarmAction::List { json } => {
            let alarms = store.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&alarms)?);
            } else if alarms.is_empty() {
                println!("No alarms.");
            } else {
                for alarm in &alarms {
                    print_alarm_line(alarm);
                }
            }
        }
        AlarmAction::Show { id } => {
            let alarm = store.get(&id)?.ok_or_else(|| format!("alarm not found: {id}"))?;
            println!("{}", serde_json::to_string_pretty(&alarm)?);
        }
        AlarmAction::Update {
            id,
            title,
            time,
            days,
            activity,
            target,
            melody,
            color,
        } => {
            let patch = AlarmPatch {
                title,
                time,
                days: days.as_deref().map(parse_days).transpose()?,
                enabled: None,
                activity,
                target_count: target,
                melody,
                color,
            };
            if patch.is_empty() {
                return Err("nothing to update".into());
            }
            let alarm = store.update(&id, &patch)?;
            println!("Alarm updated: {}", alarm.id);
            print_alarm_line(&alarm);
        }
        AlarmAction::Toggle { id } => {
            let alarm = store.toggle(&id)?;
            let state = if alarm.enabled { "enabled" } else { "disabled" };
            println!("Alarm {state}: {}", alarm.id);
        }
        AlarmAction::Delete { id } => {
            let alarm = store.delete(&id)?;
            println!("Alarm deleted: {} ({})", alarm.id, alarm.title);
        }
        AlarmAction::Next { json } => {
            let alarms = store.list()?;
            let upcoming = upcoming(&alarms, Local::now().naive_local());
            if json {
                let rows: Vec<serde_json::Value> = upcoming
                    .iter()
                    .map(|(at, a)| serde_json::json!({ "alarm_id": a.id, "title": a.title, "fire_at": at }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if upcoming.is_empty() {
                println!("No enabled alarms.");
            } else {
                for (at, alarm) in &upcoming {
                    println!("{}  {}  {}", at.format("%a %Y-%m-%d %H:%M"), alarm.id, alarm.title);
                }
            }
        }
        AlarmAction::Watch { poll_secs } => watch(&db, poll_secs)?,
        AlarmAction::Ring {
            id,
            input,
            give_up_after,
        } => {
            let alarm = store.get(&id)?.ok_or_else(|| format!("alarm not found: {id}"))?;
            ring(&db, &alarm, &input, give_up_after)?;
        }
    }
    Ok(())
}

fn print_alarm_line(alarm: &Alarm) {
    let days: Vec<&str> = alarm.days.iter().map(|d| d.as_str()).collect();
    println!(
        "{}  {:>8}  {:<15}  {:>3} {:<16} {} [{}]",
        if alarm.enabled { "on " } else { "off" },
        alarm.time.display_12h(),
        days.join(","),
        alarm.target_count,
        alarm.activity.display_name(),
        alarm.title,
        alarm.id,
    );
}

fn upcoming(alarms: &[Alarm], now: NaiveDateTime) -> Vec<(NaiveDateTime, &Alarm)> {
    let mut out: Vec<_> = alarms
        .iter()
        .filter(|a| a.enabled)
        .map(|a| (next_fire_after(a, now), a))
        .collect();
    out.sort_by_key(|(at, _)| *at);
    out
}

fn watch(db: &Database, poll_secs: u64) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let on_trigger = Arc::new(|payload: TriggerPayload| {
        let event = Event::AlarmTriggered {
            alarm_id: payload.alarm_id,
            activity: payload.activity,
            target: payload.target,
            at: Utc::now(),
        };
        if let Err(e) = print_event(&event) {
            warn!(error = %e, "failed to print trigger");
        }
    });
    let config = Config::load()?;
    if !config.notifications.enabled {
        warn!("notifications.enabled is false; no alarm will be armed");
    }
    let backend = TokioTimerBackend::with_handle(runtime.handle().clone(), on_trigger)
        .with_notifications(config.notifications.enabled);
    let mut service = AlarmService::new(db, backend);

    let startup = service.startup(Local::now().naive_local())?;
    if !startup.previous_failures.is_empty() {
        info!(ids = ?startup.previous_failures, "retried alarms that failed last run");
    }
    for event in startup.report.events() {
        print_event(&event)?;
    }

    let mut known = service.list()?;
    runtime.block_on(async {
        let mut ticker = tokio::time::interval(Duration::from_secs(poll_secs.max(1)));
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = ticker.tick() => {
                    let current = service.list()?;
                    if current != known {
                        info!("alarm list changed; rescheduling");
                        let report = service.reschedule_all(Local::now().naive_local())?;
                        for event in report.events() {
                            print_event(&event)?;
                        }
                        known = current;
                    }
                }
            }
        }
        Ok::<_, Box<dyn std::error::Error>>(())
    })?;

    service.shutdown();
    info!("watch stopped");
    Ok(())
}

fn ring(
    db: &Database,
    alarm: &Alarm,
    input: &SampleInput,
    give_up_after: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let profiles = config.detection_profiles()?;
    let controller = WorkoutController::new(Box::new(SimulatedSensor::new()))
        .with_profiles(profiles)
        .with_feedback(Box::new(LogFeedback));
    let interval = controller.profile_for(alarm.activity).sample_interval_ms;
    let samples = input.load(interval)?;

    let mut dismissal = AlarmDismissal::new(controller, Box::new(ConsoleAudio::default()))
        .with_options(PlaybackOptions {
            looping: config.audio.loop_alarm,
            volume: config.audio.volume,
        });
    for event in dismissal.begin(alarm)? {
        print_event(&event)?;
    }

    let mut record = None;
    for (i, sample) in samples.iter().enumerate() {
        if give_up_after.is_some_and(|n| i >= n) {
            break;
        }
        let step = dismissal.on_sample(sample);
        for event in &step.events {
            print_event(event)?;
        }
        if step.finished.is_some() {
            record = step.finished;
            break;
        }
    }

    let record = match record {
        Some(r) => r,
        None => {
            let (event, record) = dismissal
                .emergency_dismiss()
                .ok_or("alarm was not ringing")?;
            print_event(&event)?;
            record
        }
    };
    db.record_workout(&record)?;
    Ok(())
}
