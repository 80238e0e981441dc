#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use hourbook_kernel_contracts::work::total_hours;
use hourbook_kernel_contracts::ContractViolation;
use hourbook_storage::LedgerRepo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryPeriod {
    Day,
    Week,
    Month,
    Year,
}

impl SummaryPeriod {
    pub const ALL: [SummaryPeriod; 4] = [Self::Day, Self::Week, Self::Month, Self::Year];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Inclusive window ending at or around `today`.
    ///
    /// `Week` is the trailing seven days plus today; `Month` and `Year` are the
    /// calendar month and year containing `today`.
    pub fn range(self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), ContractViolation> {
        const OUT_OF_CALENDAR: ContractViolation = ContractViolation::InvalidValue {
            field: "summary.period",
            reason: "window falls outside the supported calendar",
        };
        match self {
            Self::Day => Ok((today, today)),
            Self::Week => {
                let start = today
                    .checked_sub_days(Days::new(7))
                    .ok_or(OUT_OF_CALENDAR)?;
                Ok((start, today))
            }
            Self::Month => {
                let first = today.with_day(1).ok_or(OUT_OF_CALENDAR)?;
                let next_first = if today.month() == 12 {
                    NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
                };
                let last = next_first
                    .and_then(|d| d.pred_opt())
                    .ok_or(OUT_OF_CALENDAR)?;
                Ok((first, last))
            }
            Self::Year => {
                let first = NaiveDate::from_ymd_opt(today.year(), 1, 1).ok_or(OUT_OF_CALENDAR)?;
                let last = NaiveDate::from_ymd_opt(today.year(), 12, 31).ok_or(OUT_OF_CALENDAR)?;
                Ok((first, last))
            }
        }
    }
}

impl fmt::Display for SummaryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryPeriod {
    type Err = ContractViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or(ContractViolation::InvalidValue {
                field: "summary.period",
                reason: "must be one of day, week, month, year",
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub hours: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkSummary {
    pub period: SummaryPeriod,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: Vec<DayTotal>,
    pub total_hours: f64,
}

impl WorkSummary {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

pub fn summarize<R: LedgerRepo>(
    repo: &R,
    period: SummaryPeriod,
    today: NaiveDate,
) -> Result<WorkSummary, ContractViolation> {
    let (start, end) = period.range(today)?;
    let entries = repo.entries_in_range(start, end);
    Ok(WorkSummary {
        period,
        start,
        end,
        total_hours: total_hours(&entries),
        days: entries
            .into_iter()
            .map(|e| DayTotal {
                description: e.description_or_empty().to_string(),
                date: e.date,
                hours: e.hours,
            })
            .collect(),
    })
}
