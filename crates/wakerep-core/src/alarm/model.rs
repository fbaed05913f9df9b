use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityType;
use crate::error::ValidationError;

/// Day of the week an alarm recurs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Day {
    pub const ALL: [Day; 7] = [Day::Mon, Day::Tue, Day::Wed, Day::Thu, Day::Fri, Day::Sat, Day::Sun];
    pub const WEEKDAYS: [Day; 5] = [Day::Mon, Day::Tue, Day::Wed, Day::Thu, Day::Fri];

    pub fn as_str(self) -> &'static str {
        match self {
            Day::Mon => "Mon",
            Day::Tue => "Tue",
            Day::Wed => "Wed",
            Day::Thu => "Thu",
            Day::Fri => "Fri",
            Day::Sat => "Sat",
            Day::Sun => "Sun",
        }
    }

    pub fn full_name(self) -> &'static str {
        match self {
            Day::Mon => "Monday",
            Day::Tue => "Tuesday",
            Day::Wed => "Wednesday",
            Day::Thu => "Thursday",
            Day::Fri => "Friday",
            Day::Sat => "Saturday",
            Day::Sun => "Sunday",
        }
    }

    pub fn weekday(self) -> Weekday {
        match self {
            Day::Mon => Weekday::Mon,
            Day::Tue => Weekday::Tue,
            Day::Wed => Weekday::Wed,
            Day::Thu => Weekday::Thu,
            Day::Fri => Weekday::Fri,
            Day::Sat => Weekday::Sat,
            Day::Sun => Weekday::Sun,
        }
    }
}

impl From<Weekday> for Day {
    fn from(w: Weekday) -> Self {
        match w {
            Weekday::Mon => Day::Mon,
            Weekday::Tue => Day::Tue,
            Weekday::Wed => Day::Wed,
            Weekday::Thu => Day::Thu,
            Weekday::Fri => Day::Fri,
            Weekday::Sat => Day::Sat,
            Weekday::Sun => Day::Sun,
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Day {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        Day::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(t) || d.full_name().eq_ignore_ascii_case(t))
            .ok_or_else(|| ValidationError::UnknownDay(s.to_string()))
    }
}

/// Parse `"Mon,Wed,Fri"`, `"weekdays"`, `"weekends"` or `"daily"`.
pub fn parse_days(input: &str) -> Result<BTreeSet<Day>, ValidationError> {
    match input.trim().to_ascii_lowercase().as_str() {
        "daily" | "everyday" | "all" => return Ok(Day::ALL.into_iter().collect()),
        "weekdays" => return Ok(Day::WEEKDAYS.into_iter().collect()),
        "weekends" => return Ok([Day::Sat, Day::Sun].into_iter().collect()),
        _ => {}
    }
    let days = input
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect::<Result<BTreeSet<Day>, _>>()?;
    if days.is_empty() {
        return Err(ValidationError::EmptyDays);
    }
    Ok(days)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Period {
    Am,
    Pm,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Period::Am => "AM",
            Period::Pm => "PM",
        })
    }
}

/// Wall-clock time of day, stored as 24-hour hour and minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AlarmTime {
    hour: u8,
    minute: u8,
}

impl AlarmTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ValidationError> {
        if hour > 23 || minute > 59 {
            return Err(ValidationError::InvalidTime(format!("{hour:02}:{minute:02}")));
        }
        Ok(Self { hour, minute })
    }

    /// From a 12-hour clock value (`hour` in 1..=12).
    pub fn from_12h(hour: u8, minute: u8, period: Period) -> Result<Self, ValidationError> {
        if !(1..=12).contains(&hour) {
            return Err(ValidationError::InvalidTime(format!("{hour}:{minute:02} {period}")));
        }
        let h24 = match (period, hour) {
            (Period::Am, 12) => 0,
            (Period::Am, h) => h,
            (Period::Pm, 12) => 12,
            (Period::Pm, h) => h + 12,
        };
        Self::new(h24, minute)
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// `(hour 1..=12, minute, period)`.
    pub fn to_12h(&self) -> (u8, u8, Period) {
        let period = if self.hour >= 12 { Period::Pm } else { Period::Am };
        let h = match self.hour % 12 {
            0 => 12,
            h => h,
        };
        (h, self.minute, period)
    }

    pub fn naive(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, 0).unwrap_or(NaiveTime::MIN)
    }

    /// `7:05 AM`.
    pub fn display_12h(&self) -> String {
        let (h, m, p) = self.to_12h();
        format!("{h}:{m:02} {p}")
    }
}

impl fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for AlarmTime {
    type Err = ValidationError;

    /// Accepts `HH:MM` (24-hour) or `H:MM AM|PM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidTime(s.to_string());
        let upper = s.trim().to_ascii_uppercase();
        let (clock, period) = if let Some(rest) = upper.strip_suffix("AM") {
            (rest.trim(), Some(Period::Am))
        } else if let Some(rest) = upper.strip_suffix("PM") {
            (rest.trim(), Some(Period::Pm))
        } else {
            (upper.as_str(), None)
        };
        let (h, m) = clock.split_once(':').ok_or_else(invalid)?;
        let hour: u8 = h.trim().parse().map_err(|_| invalid())?;
        let minute: u8 = m.trim().parse().map_err(|_| invalid())?;
        match period {
            Some(p) => Self::from_12h(hour, minute, p),
            None => Self::new(hour, minute),
        }
    }
}

impl TryFrom<String> for AlarmTime {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AlarmTime> for String {
    fn from(t: AlarmTime) -> Self {
        t.to_string()
    }
}

/// A scheduled wake event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: String,
    pub title: String,
    pub time: AlarmTime,
    pub days: BTreeSet<Day>,
    pub enabled: bool,
    pub activity: ActivityType,
    pub target_count: u32,
    #[serde(default)]
    pub melody: String,
    #[serde(default)]
    pub color: String,
}

impl Alarm {
    /// # Errors
    /// [`ValidationError::EmptyDays`] or [`ValidationError::NonPositiveTarget`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.days.is_empty() {
            return Err(ValidationError::EmptyDays);
        }
        if self.target_count == 0 {
            return Err(ValidationError::NonPositiveTarget);
        }
        Ok(())
    }

    pub fn recurs_on(&self, day: Day) -> bool {
        self.days.contains(&day)
    }
}

/// Fields for a new alarm. The id is assigned on creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlarm {
    pub title: String,
    pub time: AlarmTime,
    pub days: BTreeSet<Day>,
    pub activity: ActivityType,
    pub target_count: u32,
    #[serde(default)]
    pub melody: String,
    #[serde(default)]
    pub color: String,
}

impl NewAlarm {
    /// Weekday alarm with the activity's default target.
    pub fn new(title: impl Into<String>, time: AlarmTime, activity: ActivityType) -> Self {
        Self {
            title: title.into(),
            time,
            days: Day::WEEKDAYS.into_iter().collect(),
            activity,
            target_count: activity.default_target(),
            melody: String::new(),
            color: String::new(),
        }
    }

    pub fn into_alarm(self, id: String) -> Alarm {
        Alarm {
            id,
            title: self.title,
            time: self.time,
            days: self.days,
            enabled: true,
            activity: self.activity,
            target_count: self.target_count,
            melody: self.melody,
            color: self.color,
        }
    }
}

/// Partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlarmPatch {
    pub title: Option<String>,
    pub time: Option<AlarmTime>,
    pub days: Option<BTreeSet<Day>>,
    pub enabled: Option<bool>,
    pub activity: Option<ActivityType>,
    pub target_count: Option<u32>,
    pub melody: Option<String>,
    pub color: Option<String>,
}

impl AlarmPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply onto a copy of `alarm`; the caller validates the result.
    pub fn apply(&self, alarm: &Alarm) -> Alarm {
        let mut next = alarm.clone();
        if let Some(v) = &self.title {
            next.title = v.clone();
        }
        if let Some(v) = self.time {
            next.time = v;
        }
        if let Some(v) = &self.days {
            next.days = v.clone();
        }
        if let Some(v) = self.enabled {
            next.enabled = v;
        }
        if let Some(v) = self.activity {
            next.activity = v;
        }
        if let Some(v) = self.target_count {
            next.target_count = v;
        }
        if let Some(v) = &self.melody {
            next.melody = v.clone();
        }
        if let Some(v) = &self.color {
            next.color = v.clone();
        }
        next
    }
}
