use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SemesterError {
    #[error("semester year is not an integer: {0:?}")]
    BadYear(String),
    #[error("semester year out of range: {0}")]
    YearOutOfRange(i32),
}

/// Inclusive date range during which a grade is returned to student queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VisibilityWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl VisibilityWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Derives the release window from a `YEAR-TERM` semester code.
///
/// A term containing `1` is the autumn term (September through the following
/// January); anything else is the spring term (February through July).
pub fn window_for_semester(semester: &str) -> Result<VisibilityWindow, SemesterError> {
    let (year_part, term_part) = match semester.split_once('-') {
        Some((y, t)) => (y, t),
        None => (semester, ""),
    };
    let year: i32 = year_part
        .trim()
        .parse()
        .map_err(|_| SemesterError::BadYear(year_part.to_string()))?;

    let ymd = |y: i32, m: u32, d: u32| {
        NaiveDate::from_ymd_opt(y, m, d).ok_or(SemesterError::YearOutOfRange(year))
    };

    if term_part.contains('1') {
        let next = year
            .checked_add(1)
            .ok_or(SemesterError::YearOutOfRange(year))?;
        Ok(VisibilityWindow {
            start: ymd(year, 9, 1)?,
            end: ymd(next, 1, 31)?,
        })
    } else {
        Ok(VisibilityWindow {
            start: ymd(year, 2, 1)?,
            end: ymd(year, 7, 31)?,
        })
    }
}
