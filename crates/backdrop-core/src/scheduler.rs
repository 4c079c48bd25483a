//! 定时调度
//!
//! Pure slot selection over local wall-clock time. Input is validated when
//! a [`ScheduleMode`] is built; [`select_slot`] itself is total.

use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, Timelike};
use regex::Regex;

use crate::models::{ScheduleOptions, DAY_SLOT, NIGHT_SLOT, WEEKLY_START};
use crate::utils::{AppError, AppResult};

const MINUTES_PER_DAY: u32 = 24 * 60;

fn time_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(?:[01]?\d|2[0-3])(?::[0-5]\d){1,2}$").ok())
        .as_ref()
}

/// `HH:MM` or `HH:MM:SS`, 24h, single-digit hours allowed.
pub fn is_valid_time(text: &str) -> bool {
    time_pattern().is_some_and(|re| re.is_match(text.trim()))
}

/// A validated time of day, minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    minutes: u32,
}

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> AppResult<Self> {
        if hour > 23 || minute > 59 {
            return Err(AppError::InvalidTime(format!("{hour:02}:{minute:02}")));
        }
        Ok(Self {
            minutes: hour * 60 + minute,
        })
    }

    /// Parse `HH:MM[:SS]`; seconds are dropped.
    pub fn parse(text: &str) -> AppResult<Self> {
        let text = text.trim();
        if !is_valid_time(text) {
            return Err(AppError::InvalidTime(text.to_string()));
        }
        let mut parts = text.split(':').map(|p| p.parse::<u32>().unwrap_or(0));
        let hour = parts.next().unwrap_or(0);
        let minute = parts.next().unwrap_or(0);
        Self::new(hour, minute)
    }

    /// Minutes since midnight.
    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn of(now: NaiveDateTime) -> Self {
        Self {
            minutes: now.hour() * 60 + now.minute(),
        }
    }
}

impl FromStr for ClockTime {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Active scheduling policy, built once from the persisted flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleMode {
    /// Manual: slot 0 stays selected.
    #[default]
    Off,
    DayNight {
        day_start: ClockTime,
        night_start: ClockTime,
    },
    Weekly,
    AutoRotate,
}

impl ScheduleMode {
    /// Resolve the flags by precedence: day/night, then weekly, then
    /// auto-rotate. More than one flag may be set.
    pub fn from_options(options: &ScheduleOptions) -> AppResult<Self> {
        if options.day_night_mode {
            Ok(ScheduleMode::DayNight {
                day_start: ClockTime::parse(&options.day_start_time)?,
                night_start: ClockTime::parse(&options.night_start_time)?,
            })
        } else if options.weekly {
            Ok(ScheduleMode::Weekly)
        } else if options.auto_switch {
            Ok(ScheduleMode::AutoRotate)
        } else {
            Ok(ScheduleMode::Off)
        }
    }

    /// Whether the watcher should be running for this mode.
    pub fn is_active(&self) -> bool {
        !matches!(self, ScheduleMode::Off)
    }
}

/// What the scheduler wants shown right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Day,
    Night,
    /// Monday = 0 .. Sunday = 6.
    Weekday(u8),
    /// Move one step forward in the auto-rotate pool.
    Advance,
}

impl Selection {
    /// Fixed slot for this selection, `None` for [`Selection::Advance`].
    pub fn slot(&self) -> Option<usize> {
        match self {
            Selection::Day => Some(DAY_SLOT),
            Selection::Night => Some(NIGHT_SLOT),
            Selection::Weekday(day) => Some(WEEKLY_START + *day as usize),
            Selection::Advance => None,
        }
    }
}

/// Day window is `[day_start, night_start)`, wrapping past midnight when
/// `day_start > night_start`.
pub fn is_day(day_start: ClockTime, night_start: ClockTime, now: ClockTime) -> bool {
    let (day, night, now) = (day_start.minutes, night_start.minutes, now.minutes % MINUTES_PER_DAY);
    if day < night {
        now >= day && now < night
    } else {
        now >= day || now < night
    }
}

/// Slot selection for `mode` at local time `now`. `None` in manual mode.
pub fn select_slot(mode: &ScheduleMode, now: NaiveDateTime) -> Option<Selection> {
    match mode {
        ScheduleMode::Off => None,
        ScheduleMode::DayNight {
            day_start,
            night_start,
        } => Some(if is_day(*day_start, *night_start, ClockTime::of(now)) {
            Selection::Day
        } else {
            Selection::Night
        }),
        ScheduleMode::Weekly => Some(Selection::Weekday(
            now.weekday().num_days_from_monday() as u8,
        )),
        ScheduleMode::AutoRotate => Some(Selection::Advance),
    }
}

/// Watcher period from an `HH:MM` interval. Zero is rejected.
pub fn interval_duration(text: &str) -> AppResult<Duration> {
    let time = ClockTime::parse(text)?;
    if time.minutes == 0 {
        return Err(AppError::InvalidTime(format!("{} (interval must be non-zero)", text.trim())));
    }
    Ok(Duration::from_secs(u64::from(time.minutes) * 60))
}

/// Check every time field before options are accepted.
pub fn validate_options(options: &ScheduleOptions) -> AppResult<()> {
    ClockTime::parse(&options.day_start_time)?;
    ClockTime::parse(&options.night_start_time)?;
    interval_duration(&options.interval_check_time)?;
    Ok(())
}

// ==================== 时钟 ====================

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub type SharedClock = Arc<dyn Clock>;

/// Local time from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// A clock that only moves when told to. Used by headless hosts and tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        self.now
            .lock()
            .map(|guard| *guard)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}
