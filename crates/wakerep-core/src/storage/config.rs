//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Per-activity detection tuning
//! - Notification and alarm sound preferences
//! - Defaults for new alarms
//!
//! Configuration is stored at `<data dir>/config.toml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::data_dir;
use crate::activity::ActivityType;
use crate::error::{ConfigError, Result};
use crate::motion::{DetectionProfile, ProfileOverrides};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// 0..=100
    #[serde(default = "default_volume")]
    pub volume: u8,
    #[serde(default = "default_true")]
    pub loop_alarm: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutConfig {
    #[serde(default = "default_activity")]
    pub default_activity: ActivityType,
    /// 0 means "use the activity's own default".
    #[serde(default)]
    pub default_target: u32,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Overrides keyed by activity name (`[detection.push-ups]`).
    #[serde(default)]
    pub detection: BTreeMap<String, ProfileOverrides>,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub workout: WorkoutConfig,
}

fn default_true() -> bool {
    true
}
fn default_volume() -> u8 {
    80
}
fn default_activity() -> ActivityType {
    ActivityType::JumpingJacks
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            loop_alarm: true,
        }
    }
}

impl Default for WorkoutConfig {
    fn default() -> Self {
        Self {
            default_activity: default_activity(),
            default_target: 0,
        }
    }
}

const PROFILE_FIELDS: [&str; 5] = [
    "sample_interval_ms",
    "magnitude_threshold",
    "release_ratio",
    "debounce_ms",
    "buffer_capacity",
];

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => parse_number(value).ok_or_else(|| {
                    invalid(format!("cannot parse '{value}' as number"))
                })?,
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                _ => serde_json::Value::String(value.into()),
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults on first run.
    ///
    /// # Errors
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file; writing defaults");
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    ///
    /// `detection.<activity>.<field>` reports the effective value, override
    /// or reference.
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some((activity, field)) = detection_key(key) {
            let profile = self.profile(activity).ok()?;
            let json = serde_json::to_value(profile).ok()?;
            return json.get(field).map(ToString::to_string);
        }
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key, in memory only.
    ///
    /// # Errors
    /// Unknown keys, unparsable values and values that would leave the
    /// config invalid are rejected and leave `self` unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let next = if let Some((activity, field)) = detection_key(key) {
            self.with_detection_override(activity, field, value)?
        } else {
            let mut json = serde_json::to_value(&*self)?;
            Self::set_json_value_by_path(&mut json, key, value)?;
            serde_json::from_value::<Config>(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?
        };
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Every settable key with its current value, sorted.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            flatten("", &json, &mut out);
        }
        out.retain(|(k, _)| !k.starts_with("detection."));
        for activity in ActivityType::ALL {
            for field in PROFILE_FIELDS {
                let key = format!("detection.{activity}.{field}");
                if let Some(v) = self.get(&key) {
                    out.push((key, v));
                }
            }
        }
        out.sort();
        out
    }

    /// Effective detection profile: reference values with overrides applied.
    pub fn profile(&self, activity: ActivityType) -> Result<DetectionProfile> {
        let base = DetectionProfile::for_activity(activity);
        match self.detection.get(activity.as_str()) {
            Some(overrides) => Ok(base.with_overrides(overrides)?),
            None => Ok(base),
        }
    }

    /// Effective profile for every activity that has overrides.
    pub fn detection_profiles(&self) -> Result<BTreeMap<ActivityType, DetectionProfile>> {
        let mut out = BTreeMap::new();
        for name in self.detection.keys() {
            let activity = ActivityType::from_str(name)?;
            out.insert(activity, self.profile(activity)?);
        }
        Ok(out)
    }

    /// Target for a new alarm of `activity`.
    pub fn default_target(&self, activity: ActivityType) -> u32 {
        if self.workout.default_target > 0 {
            self.workout.default_target
        } else {
            activity.default_target()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.audio.volume > 100 {
            return Err(ConfigError::InvalidValue {
                key: "audio.volume".into(),
                message: format!("{} is above 100", self.audio.volume),
            }
            .into());
        }
        self.detection_profiles()?;
        Ok(())
    }

    fn with_detection_override(
        &self,
        activity: ActivityType,
        field: &str,
        value: &str,
    ) -> Result<Self> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: format!("detection.{activity}.{field}"),
            message,
        };
        let mut next = self.clone();
        let slot = next.detection.entry(activity.as_str().to_string()).or_default();
        match field {
            "sample_interval_ms" => {
                slot.sample_interval_ms = Some(value.parse().map_err(|e| invalid(format!("{e}")))?)
            }
            "magnitude_threshold" => {
                slot.magnitude_threshold = Some(value.parse().map_err(|e| invalid(format!("{e}")))?)
            }
            "release_ratio" => {
                slot.release_ratio = Some(value.parse().map_err(|e| invalid(format!("{e}")))?)
            }
            "debounce_ms" => slot.debounce_ms = Some(value.parse().map_err(|e| invalid(format!("{e}")))?),
            "buffer_capacity" => {
                slot.buffer_capacity = Some(value.parse().map_err(|e| invalid(format!("{e}")))?)
            }
            _ => return Err(ConfigError::UnknownKey(format!("detection.{activity}.{field}")).into()),
        }
        Ok(next)
    }
}

/// `detection.<activity>.<field>` split into its parts.
fn detection_key(key: &str) -> Option<(ActivityType, &str)> {
    let rest = key.strip_prefix("detection.")?;
    let (activity, field) = rest.split_once('.')?;
    Some((ActivityType::from_str(activity).ok()?, field))
}

fn parse_number(value: &str) -> Option<serde_json::Value> {
    if let Ok(n) = value.parse::<u64>() {
        return Some(serde_json::Value::Number(n.into()));
    }
    value
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
}

fn flatten(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
    match value {
        serde_json::Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten(&key, v, out);
            }
        }
        serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}
