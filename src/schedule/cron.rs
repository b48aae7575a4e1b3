//! Five-field cron expressions evaluated in UTC.
//!
//! `minute hour day-of-month month day-of-week`, each field accepting `*`,
//! `*/n`, `a`, `a-b`, `a-b/n`, `a/n` and comma-separated lists of those.
//! Months and weekdays also accept three-letter names; weekday `7` is Sunday.
//!
//! Day matching follows classic cron: when either day field starts with `*`
//! both must match, otherwise either may match.

use crate::{Error, ErrorContext, Result};
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use std::fmt;
use std::str::FromStr;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Upper bound on the search for the next fire time.
const SEARCH_HORIZON_DAYS: i64 = 366 * 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Field {
    bits: u64,
    /// Field text started with `*`.
    star: bool,
}

impl Field {
    fn contains(&self, v: u32) -> bool {
        self.bits & (1u64 << v) != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: String,
    minutes: Field,
    hours: Field,
    days_of_month: Field,
    months: Field,
    days_of_week: Field,
}

impl CronExpression {
    pub fn parse(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(invalid(
                expr,
                format!("expected 5 fields, found {}", fields.len()),
            ));
        }
        let mut days_of_week = parse_field(fields[4], 0, 7, Some(&DAY_NAMES))
            .map_err(|d| invalid(expr, format!("day-of-week: {}", d)))?;
        if days_of_week.contains(7) {
            days_of_week.bits = (days_of_week.bits & !(1 << 7)) | 1;
        }
        Ok(Self {
            source: fields.join(" "),
            minutes: parse_field(fields[0], 0, 59, None)
                .map_err(|d| invalid(expr, format!("minute: {}", d)))?,
            hours: parse_field(fields[1], 0, 23, None)
                .map_err(|d| invalid(expr, format!("hour: {}", d)))?,
            days_of_month: parse_field(fields[2], 1, 31, None)
                .map_err(|d| invalid(expr, format!("day-of-month: {}", d)))?,
            months: parse_field(fields[3], 1, 12, Some(&MONTH_NAMES))
                .map_err(|d| invalid(expr, format!("month: {}", d)))?,
            days_of_week,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    fn day_matches(&self, t: &DateTime<Utc>) -> bool {
        let dom = self.days_of_month.contains(t.day());
        let dow = self.days_of_week.contains(t.weekday().num_days_from_sunday());
        if self.days_of_month.star || self.days_of_week.star {
            dom && dow
        } else {
            dom || dow
        }
    }

    /// First fire time strictly after `after`, or `None` if the expression
    /// never fires (e.g. `0 0 31 2 *`).
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let horizon = start + Duration::days(SEARCH_HORIZON_DAYS);
        let mut t = start;
        while t < horizon {
            if !self.months.contains(t.month()) {
                t = first_of_next_month(&t)?;
                continue;
            }
            if !self.day_matches(&t) {
                t = Utc
                    .with_ymd_and_hms(t.year(), t.month(), t.day(), 0, 0, 0)
                    .single()?
                    + Duration::days(1);
                continue;
            }
            if !self.hours.contains(t.hour()) {
                t = t.with_minute(0)? + Duration::hours(1);
                continue;
            }
            if !self.minutes.contains(t.minute()) {
                t += Duration::minutes(1);
                continue;
            }
            return Some(t);
        }
        None
    }

    /// The next `count` fire times after `after`.
    pub fn upcoming(&self, after: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let mut out = Vec::with_capacity(count);
        let mut cursor = after;
        while out.len() < count {
            match self.next_after(cursor) {
                Some(next) => {
                    out.push(next);
                    cursor = next;
                }
                None => break,
            }
        }
        out
    }
}

impl FromStr for CronExpression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn invalid(expr: &str, details: String) -> Error {
    Error::configuration_with_context(
        format!("invalid cron expression '{}'", expr),
        ErrorContext::new()
            .with_field_path("recurrence")
            .with_details(details),
    )
}

fn first_of_next_month(t: &DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (y, m) = if t.month() == 12 {
        (t.year() + 1, 1)
    } else {
        (t.year(), t.month() + 1)
    };
    Utc.with_ymd_and_hms(y, m, 1, 0, 0, 0).single()
}

fn parse_value(
    s: &str,
    min: u32,
    max: u32,
    names: Option<&[&str]>,
) -> std::result::Result<u32, String> {
    if let Some(names) = names {
        let lower = s.to_ascii_lowercase();
        if let Some(i) = names.iter().position(|n| *n == lower) {
            // month names start at 1, weekday names at 0
            return Ok(i as u32 + min);
        }
    }
    let v: u32 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if v < min || v > max {
        return Err(format!("{} is outside {}-{}", v, min, max));
    }
    Ok(v)
}

fn parse_field(
    text: &str,
    min: u32,
    max: u32,
    names: Option<&[&str]>,
) -> std::result::Result<Field, String> {
    let mut bits = 0u64;
    for part in text.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((r, s)) => {
                let step: u32 = s.parse().map_err(|_| format!("bad step '{}'", s))?;
                if step == 0 || step > max {
                    return Err(format!("step '{}' must be between 1 and {}", s, max));
                }
                (r, step)
            }
            None => (part, 1),
        };
        let (lo, hi) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            let lo = parse_value(a, min, max, names)?;
            let hi = parse_value(b, min, max, names)?;
            if lo > hi {
                return Err(format!("range {}-{} is reversed", lo, hi));
            }
            (lo, hi)
        } else {
            let v = parse_value(range, min, max, names)?;
            // `a/n` runs from a to the end of the range
            if part.contains('/') {
                (v, max)
            } else {
                (v, v)
            }
        };
        let mut v = lo;
        while v <= hi {
            bits |= 1u64 << v;
            v += step;
        }
    }
    if bits == 0 {
        return Err(format!("'{}' selects nothing", text));
    }
    Ok(Field {
        bits,
        star: text.starts_with('*'),
    })
}
