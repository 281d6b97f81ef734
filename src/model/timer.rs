//! Concrete timers produced by evaluating a timer definition.
//!
//! Text forms follow ISO 8601:
//! - duration: `PT5M`, `P1DT12H`, `P2W`, `PT0.5S`
//! - cycle: `R3/PT10S`, `R/PT1M` (unbounded)
//! - date: RFC 3339 date-time, `2026-10-18T10:00:00Z`

use chrono::{DateTime, Duration, Months, Utc};

/// Failure to interpret the text of a timer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TimerParseError(String);

impl TimerParseError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A calendar period plus an exact duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    months: u32,
    duration: Duration,
}

impl Interval {
    pub fn from_duration(duration: Duration) -> Self {
        Self {
            months: 0,
            duration,
        }
    }

    /// Parse an ISO 8601 duration (`PnYnMnWnDTnHnMnS`).
    pub fn parse(text: &str) -> Result<Self, TimerParseError> {
        let body = text
            .strip_prefix('P')
            .ok_or_else(|| TimerParseError::new("expected duration to start with 'P'"))?;
        let (date_part, time_part) = match body.split_once('T') {
            Some((date, time)) => {
                if time.is_empty() {
                    return Err(TimerParseError::new("expected time component after 'T'"));
                }
                (date, Some(time))
            }
            None => (body, None),
        };
        if date_part.is_empty() && time_part.is_none() {
            return Err(TimerParseError::new("expected at least one duration component"));
        }

        let mut months: u32 = 0;
        let mut duration = Duration::zero();

        for (value, unit) in components(date_part)? {
            let whole = whole_number(&value, unit)?;
            match unit {
                'Y' => months = add_months(months, whole.checked_mul(12))?,
                'M' => months = add_months(months, Some(whole))?,
                'W' => duration = add_duration(duration, Duration::try_weeks(whole.into()))?,
                'D' => duration = add_duration(duration, Duration::try_days(whole.into()))?,
                other => {
                    return Err(TimerParseError::new(format!("unexpected date unit '{other}'")))
                }
            }
        }

        if let Some(time) = time_part {
            for (value, unit) in components(time)? {
                let part = match unit {
                    'H' => Duration::try_hours(whole_number(&value, unit)?.into()),
                    'M' => Duration::try_minutes(whole_number(&value, unit)?.into()),
                    'S' => seconds(&value)?,
                    other => {
                        return Err(TimerParseError::new(format!("unexpected time unit '{other}'")))
                    }
                };
                duration = add_duration(duration, part)?;
            }
        }

        Ok(Self { months, duration })
    }

    /// The instant this interval after `from`.
    pub fn after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        from.checked_add_months(Months::new(self.months))?
            .checked_add_signed(self.duration)
    }
}

fn add_months(current: u32, more: Option<u32>) -> Result<u32, TimerParseError> {
    more.and_then(|more| current.checked_add(more))
        .ok_or_else(|| TimerParseError::new("duration is too large"))
}

fn add_duration(current: Duration, more: Option<Duration>) -> Result<Duration, TimerParseError> {
    more.and_then(|more| current.checked_add(&more))
        .ok_or_else(|| TimerParseError::new("duration is too large"))
}

/// Largest seconds value whose milliseconds still fit a duration.
const MAX_SECONDS: f64 = (i64::MAX / 1_000) as f64;

fn seconds(value: &str) -> Result<Option<Duration>, TimerParseError> {
    let seconds: f64 = value
        .parse()
        .map_err(|_| TimerParseError::new(format!("invalid seconds value '{value}'")))?;
    if !seconds.is_finite() || seconds > MAX_SECONDS {
        return Err(TimerParseError::new("duration is too large"));
    }
    Ok(Duration::try_milliseconds((seconds * 1000.0).round() as i64))
}

fn whole_number(value: &str, unit: char) -> Result<u32, TimerParseError> {
    value
        .parse()
        .map_err(|_| TimerParseError::new(format!("invalid value '{value}' for unit '{unit}'")))
}

/// Split `5DT` style text into `(number, unit)` pairs.
fn components(text: &str) -> Result<Vec<(String, char)>, TimerParseError> {
    let mut parts = Vec::new();
    let mut number = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
        } else if c.is_ascii_alphabetic() {
            if number.is_empty() {
                return Err(TimerParseError::new(format!(
                    "expected a number before '{c}'"
                )));
            }
            parts.push((std::mem::take(&mut number), c));
        } else {
            return Err(TimerParseError::new(format!("unexpected character '{c}'")));
        }
    }
    if !number.is_empty() {
        return Err(TimerParseError::new(format!(
            "expected a unit after '{number}'"
        )));
    }
    Ok(parts)
}

/// An interval repeated a number of times (`None` = forever).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatingInterval {
    repetitions: Option<u32>,
    interval: Interval,
}

impl RepeatingInterval {
    pub fn new(repetitions: Option<u32>, interval: Interval) -> Self {
        Self {
            repetitions,
            interval,
        }
    }

    /// Parse `R<n>/<duration>` or `R/<duration>`.
    pub fn parse(text: &str) -> Result<Self, TimerParseError> {
        let rest = text
            .strip_prefix('R')
            .ok_or_else(|| TimerParseError::new("expected cycle to start with 'R'"))?;
        let (count, interval) = rest
            .split_once('/')
            .ok_or_else(|| TimerParseError::new("expected '/' between repetitions and interval"))?;
        let repetitions = if count.is_empty() {
            None
        } else {
            Some(count.parse().map_err(|_| {
                TimerParseError::new(format!("invalid repetition count '{count}'"))
            })?)
        };
        Ok(Self {
            repetitions,
            interval: Interval::parse(interval)?,
        })
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }
}

/// A fixed point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeDate {
    due: DateTime<Utc>,
}

impl TimeDate {
    pub fn parse(text: &str) -> Result<Self, TimerParseError> {
        let due = DateTime::parse_from_rfc3339(text)
            .map_err(|e| TimerParseError::new(e.to_string()))?
            .with_timezone(&Utc);
        Ok(Self { due })
    }
}

/// A timer ready to be subscribed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    Interval(Interval),
    Cycle(RepeatingInterval),
    Date(TimeDate),
}

impl Timer {
    /// Absolute due date in epoch milliseconds, relative to `now`.
    ///
    /// Saturates at the far end of the calendar instead of overflowing.
    pub fn due_date(&self, now: DateTime<Utc>) -> i64 {
        let due = match self {
            Timer::Interval(interval) => interval.after(now),
            Timer::Cycle(cycle) => cycle.interval.after(now),
            Timer::Date(date) => Some(date.due),
        };
        due.unwrap_or(DateTime::<Utc>::MAX_UTC).timestamp_millis()
    }

    /// Remaining repetitions; `None` for an unbounded cycle.
    pub fn repetitions(&self) -> Option<u32> {
        match self {
            Timer::Cycle(cycle) => cycle.repetitions,
            Timer::Interval(_) | Timer::Date(_) => Some(1),
        }
    }
}
