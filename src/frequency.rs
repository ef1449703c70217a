//! Period granularities used for statistics and recurring entries.
//!
//! A [Frequency] knows where the current period starts and how to find the
//! previous period of the same length, so that spending in "this week" can be
//! compared with "last week".

use std::{fmt::Display, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use time::{Date, Duration, Month, PrimitiveDateTime};

use crate::timezone::local_date_time;

/// A period granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Calendar days, starting at midnight.
    Daily,
    /// Calendar weeks, starting on Monday at midnight.
    Weekly,
    /// Calendar months, starting on the first at midnight.
    Monthly,
    /// Calendar years, starting on the first of January at midnight.
    Yearly,
}

/// The boundaries of the current period and the one before it.
///
/// The previous period ends exactly one second before the current period
/// starts, so the two periods neither overlap nor leave a gap at second
/// resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodRange {
    /// The first instant of the current period.
    #[serde(with = "local_date_time")]
    pub current_start: PrimitiveDateTime,
    /// The instant the range was calculated at.
    #[serde(with = "local_date_time")]
    pub now: PrimitiveDateTime,
    /// The first instant of the previous period.
    #[serde(with = "local_date_time")]
    pub previous_start: PrimitiveDateTime,
    /// The last second of the previous period.
    #[serde(with = "local_date_time")]
    pub previous_end: PrimitiveDateTime,
}

impl Frequency {
    /// The start of the period that contains `now`.
    pub fn start_of_current(self, now: PrimitiveDateTime) -> PrimitiveDateTime {
        let today = now.date();

        let start = match self {
            Frequency::Daily => today,
            Frequency::Weekly => {
                today - Duration::days(today.weekday().number_days_from_monday() as i64)
            }
            Frequency::Monthly => Date::from_calendar_date(today.year(), today.month(), 1)
                .expect("invalid month start date"),
            Frequency::Yearly => {
                Date::from_ordinal_date(today.year(), 1).expect("invalid year start date")
            }
        };

        start.midnight()
    }

    /// The last second of the period that contains `now`.
    pub fn end_of_current(self, now: PrimitiveDateTime) -> PrimitiveDateTime {
        let date = self.start_of_current(now).date();

        let next_start = match self {
            Frequency::Daily => date + Duration::days(1),
            Frequency::Weekly => date + Duration::weeks(1),
            Frequency::Monthly => {
                let (year, month) = match date.month() {
                    Month::December => (date.year() + 1, Month::January),
                    month => (date.year(), month.next()),
                };

                Date::from_calendar_date(year, month, 1).expect("invalid next month start date")
            }
            Frequency::Yearly => {
                Date::from_ordinal_date(date.year() + 1, 1).expect("invalid next year start date")
            }
        };

        next_start.midnight() - Duration::SECOND
    }

    /// The start of the period immediately before the one starting at `current_start`.
    fn previous_start(self, current_start: PrimitiveDateTime) -> PrimitiveDateTime {
        let date = current_start.date();

        let start = match self {
            Frequency::Daily => date - Duration::days(1),
            Frequency::Weekly => date - Duration::weeks(1),
            Frequency::Monthly => {
                let (year, month) = match date.month() {
                    Month::January => (date.year() - 1, Month::December),
                    month => (date.year(), month.previous()),
                };

                Date::from_calendar_date(year, month, 1).expect("invalid previous month start date")
            }
            Frequency::Yearly => Date::from_ordinal_date(date.year() - 1, 1)
                .expect("invalid previous year start date"),
        };

        start.midnight()
    }

    /// Calculate the current and previous period boundaries for `now`.
    pub fn period_range(self, now: PrimitiveDateTime) -> PeriodRange {
        let current_start = self.start_of_current(now);

        PeriodRange {
            current_start,
            now,
            previous_start: self.previous_start(current_start),
            previous_end: current_start - Duration::SECOND,
        }
    }

    /// The lowercase name used in URLs and the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }
}

impl Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error returned when parsing an unknown frequency name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFrequency(pub String);

impl Display for UnknownFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown frequency \"{}\"", self.0)
    }
}

impl std::error::Error for UnknownFrequency {}

impl FromStr for Frequency {
    type Err = UnknownFrequency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            _ => Err(UnknownFrequency(s.to_owned())),
        }
    }
}

impl ToSql for Frequency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Frequency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}
