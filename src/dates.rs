use chrono::{Months, NaiveDate};
use serde::Serialize;

use crate::error::{Result, TallyError};

/// Inclusive span of publication dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(TallyError::InvalidRange(format!("{} is after {}", start, end)));
        }
        Ok(Self { start, end })
    }
}

/// Splits `[from, to]` into consecutive ranges of `interval_years` calendar
/// years each, the last one clipped to `to`.
pub fn partition(from: NaiveDate, to: NaiveDate, interval_years: i32) -> Result<Vec<DateRange>> {
    if interval_years <= 0 {
        return Err(TallyError::InvalidRange(format!(
            "interval must be at least one year, got {}",
            interval_years
        )));
    }
    if from > to {
        return Err(TallyError::InvalidRange(format!("{} is after {}", from, to)));
    }

    let months = u32::try_from(interval_years)
        .ok()
        .and_then(|years| years.checked_mul(12))
        .ok_or_else(|| {
            TallyError::InvalidRange(format!("interval of {} years is too large", interval_years))
        })?;
    let step = Months::new(months);
    let mut ranges = Vec::new();
    let mut start = from;
    loop {
        // chrono clamps Feb 29 to Feb 28 when the target year is not a leap year
        let next_start = start.checked_add_months(step).ok_or_else(|| {
            TallyError::InvalidRange(format!("{} plus {} years overflows", start, interval_years))
        })?;
        let end = next_start.pred_opt().map_or(to, |d| d.min(to));
        ranges.push(DateRange { start, end });
        if end >= to {
            break;
        }
        start = match end.succ_opt() {
            Some(d) => d,
            None => break,
        };
    }
    Ok(ranges)
}

/// Accepts `MM/DD/YYYY` (the command-line format) and `YYYY-MM-DD` (what
/// HTML date inputs submit).
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|_| TallyError::InvalidDate(value.to_string()))
}
