pub mod alarm;
pub mod config;
pub mod history;
pub mod workout;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;

use clap::Args;
use tracing::{debug, info};
use wakerep_core::alarm::{AudioPlayer, PlaybackHandle, PlaybackOptions};
use wakerep_core::error::AudioError;
use wakerep_core::motion::{parse_samples, samples_from_magnitudes};
use wakerep_core::workout::{Feedback, FeedbackKind};
use wakerep_core::{Event, MotionSample};

/// Recorded motion to replay: a CSV file or an inline magnitude list.
#[derive(Args, Debug, Clone)]
pub struct SampleInput {
    /// CSV file with `t,x,y,z` or `x,y,z` lines (`-` for stdin)
    #[arg(long, conflicts_with = "magnitudes")]
    pub samples: Option<PathBuf>,
    /// Comma-separated magnitudes in g, e.g. "1.0,1.3,1.3,0.9"
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub magnitudes: Option<Vec<f64>>,
    /// Spacing between samples without timestamps (defaults to the profile interval)
    #[arg(long)]
    pub interval_ms: Option<u64>,
}

impl SampleInput {
    pub fn load(&self, profile_interval_ms: u64) -> Result<Vec<MotionSample>, Box<dyn std::error::Error>> {
        let interval = self.interval_ms.unwrap_or(profile_interval_ms);
        if let Some(mags) = &self.magnitudes {
            return Ok(samples_from_magnitudes(mags, interval));
        }
        let Some(path) = &self.samples else {
            return Err("one of --samples or --magnitudes is required".into());
        };
        let reader: Box<dyn Read> = if path.as_os_str() == "-" {
            Box::new(std::io::stdin())
        } else {
            Box::new(File::open(path).map_err(|e| format!("{}: {e}", path.display()))?)
        };
        Ok(parse_samples(BufReader::new(reader), interval)?)
    }
}

/// One JSON object per line on stdout.
pub fn print_event(event: &Event) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

/// Stands in for the platform audio player: reports what would be played.
#[derive(Default)]
pub struct ConsoleAudio {
    next: u64,
}

impl AudioPlayer for ConsoleAudio {
    fn play(&mut self, sound: &str, options: PlaybackOptions) -> Result<PlaybackHandle, AudioError> {
        self.next += 1;
        info!(sound, looping = options.looping, volume = options.volume, "alarm sound started");
        Ok(PlaybackHandle(self.next))
    }

    fn stop(&mut self, handle: PlaybackHandle) {
        info!(handle = handle.0, "alarm sound stopped");
    }
}

pub struct LogFeedback;

impl Feedback for LogFeedback {
    fn pulse(&mut self, kind: FeedbackKind) {
        debug!(?kind, "haptic pulse");
    }
}
