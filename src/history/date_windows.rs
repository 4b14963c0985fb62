//! Calendar-aligned date windows
//!
//! GitHub's `contributionsCollection` only accepts ranges of at most one year,
//! so long ranges are split into windows. [`DateWindows`] normalizes a range to
//! whole UTC days and decomposes it, most recent window first.

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use strum::{AsRefStr, Display, EnumString};

use crate::error::ServiceError;

/// An inclusive `(from, to)` range of instants, `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateWindow {
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        self.from <= *instant && *instant <= self.to
    }
}

/// Unit a range is decomposed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Granularity {
    Yearly,
    Monthly,
    Weekly,
    Daily,
}

/// A relative range length, counted back from the reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offset {
    Years(i64),
    Months(i64),
    Weeks(i64),
    Days(i64),
}

/// How the start of a range is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    From(DateTime<Utc>),
    Offset(Offset),
}

/// An inclusive day-aligned range and its window decompositions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindows {
    pub from_date: DateTime<Utc>,
    pub to_date: DateTime<Utc>,
}

/// 00:00:00.000 of the instant's UTC day.
pub fn start_of_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    day_start(instant.date_naive())
}

/// 23:59:59.999 of the instant's UTC day.
pub fn end_of_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    day_end(instant.date_naive())
}

fn day_start(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
}

fn day_end(day: NaiveDate) -> DateTime<Utc> {
    day_start(day) + Duration::days(1) - Duration::milliseconds(1)
}

/// The day `count` units before `day`, or `None` past the calendar's range.
fn step_back(day: NaiveDate, granularity: Granularity, count: u32) -> Option<NaiveDate> {
    match granularity {
        Granularity::Yearly => day.checked_sub_months(Months::new(count.checked_mul(12)?)),
        Granularity::Monthly => day.checked_sub_months(Months::new(count)),
        Granularity::Weekly => day.checked_sub_signed(Duration::weeks(count.into())),
        Granularity::Daily => day.checked_sub_signed(Duration::days(count.into())),
    }
}

impl Offset {
    fn split(self) -> (Granularity, i64) {
        match self {
            Offset::Years(n) => (Granularity::Yearly, n),
            Offset::Months(n) => (Granularity::Monthly, n),
            Offset::Weeks(n) => (Granularity::Weekly, n),
            Offset::Days(n) => (Granularity::Daily, n),
        }
    }
}

impl DateWindows {
    /// Normalizes a range ending on `to`'s day.
    ///
    /// With an offset of `n` units the range covers exactly `n` units ending on
    /// `to`'s day. A zero or negative offset yields a range with
    /// `from_date > to_date`, whose window series is empty.
    pub fn new(to: DateTime<Utc>, span: Span) -> Self {
        let to_date = end_of_day(to);
        let from_date = match span {
            Span::From(from) => start_of_day(from),
            Span::Offset(offset) => {
                let (granularity, count) = offset.split();
                match u32::try_from(count) {
                    Ok(count) if count > 0 => step_back(to.date_naive(), granularity, count)
                        .map(|day| day_start(day) + Duration::days(1))
                        .unwrap_or(DateTime::<Utc>::MIN_UTC),
                    _ => to_date + Duration::milliseconds(1),
                }
            }
        };
        Self { from_date, to_date }
    }

    /// Range between two instants, both widened to whole days.
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self::new(to, Span::From(from))
    }

    pub fn is_empty(&self) -> bool {
        self.from_date > self.to_date
    }

    /// The whole range as a single window, or `None` when empty.
    pub fn whole(&self) -> Option<DateWindow> {
        (!self.is_empty()).then_some(DateWindow {
            from: self.from_date,
            to: self.to_date,
        })
    }

    /// Decomposes the range at `granularity`, most recent window first.
    ///
    /// Windows break on calendar boundaries counted back from `to_date`; the
    /// oldest window is clipped at `from_date` and may be shorter than a unit.
    pub fn windows(&self, granularity: Granularity) -> Vec<DateWindow> {
        let mut windows = Vec::new();
        if self.is_empty() {
            return windows;
        }

        // Window k starts k units before the last day, so a month-end clamp
        // in one window never shifts the boundaries of the next.
        let first_day = self.from_date.date_naive();
        let last_day = self.to_date.date_naive();
        let mut end_day = last_day;
        for units in 1u32.. {
            let start_day = step_back(last_day, granularity, units)
                .and_then(|day| day.succ_opt())
                .map_or(first_day, |day| day.max(first_day));

            windows.push(DateWindow {
                from: day_start(start_day),
                to: day_end(end_day),
            });

            match start_day.pred_opt() {
                Some(previous) if start_day > first_day => end_day = previous,
                _ => break,
            }
        }
        windows
    }

    pub fn yearly(&self) -> Vec<DateWindow> {
        self.windows(Granularity::Yearly)
    }

    pub fn monthly(&self) -> Vec<DateWindow> {
        self.windows(Granularity::Monthly)
    }

    pub fn weekly(&self) -> Vec<DateWindow> {
        self.windows(Granularity::Weekly)
    }

    pub fn daily(&self) -> Vec<DateWindow> {
        self.windows(Granularity::Daily)
    }
}

fn counted(
    count: u32,
    unit: &str,
    to: DateTime<Utc>,
    offset: Offset,
    granularity: Granularity,
) -> Result<Vec<DateWindow>, ServiceError> {
    if count == 0 {
        return Err(ServiceError::InvalidInput(format!(
            "Please provide variable '{}'.",
            unit
        )));
    }
    Ok(DateWindows::new(to, Span::Offset(offset)).windows(granularity))
}

/// `years` yearly windows ending on `to`'s day.
pub fn yearly(years: u32, to: DateTime<Utc>) -> Result<Vec<DateWindow>, ServiceError> {
    counted(years, "years", to, Offset::Years(years.into()), Granularity::Yearly)
}

/// `months` monthly windows ending on `to`'s day.
pub fn monthly(months: u32, to: DateTime<Utc>) -> Result<Vec<DateWindow>, ServiceError> {
    counted(months, "months", to, Offset::Months(months.into()), Granularity::Monthly)
}

/// `weeks` weekly windows ending on `to`'s day.
pub fn weekly(weeks: u32, to: DateTime<Utc>) -> Result<Vec<DateWindow>, ServiceError> {
    counted(weeks, "weeks", to, Offset::Weeks(weeks.into()), Granularity::Weekly)
}

/// `days` daily windows ending on `to`'s day.
pub fn daily(days: u32, to: DateTime<Utc>) -> Result<Vec<DateWindow>, ServiceError> {
    counted(days, "days", to, Offset::Days(days.into()), Granularity::Daily)
}
