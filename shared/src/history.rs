//! Pump history records and basal profiles

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::menu::{MenuDate, MenuTime};

/// Number of hourly slots in a basal profile
pub const BASAL_SLOTS: usize = 24;

/// How much of one history page to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryRange {
    #[default]
    Skip,
    /// Only the most recent record
    Last,
    /// Every record the pump keeps
    Full,
    /// Records strictly newer than the given time
    Since(NaiveDateTime),
}

/// Which history pages to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryRequest {
    pub bolus: HistoryRange,
    pub pump_errors: HistoryRange,
    pub tdd: HistoryRange,
    pub tbr: HistoryRange,
}

impl HistoryRequest {
    pub fn bolus(mut self, range: HistoryRange) -> Self {
        self.bolus = range;
        self
    }

    pub fn pump_errors(mut self, range: HistoryRange) -> Self {
        self.pump_errors = range;
        self
    }

    pub fn tdd(mut self, range: HistoryRange) -> Self {
        self.tdd = range;
        self
    }

    pub fn tbr(mut self, range: HistoryRange) -> Self {
        self.tbr = range;
        self
    }

    /// True if at least one page has to be visited
    pub fn reads_anything(&self) -> bool {
        [self.bolus, self.pump_errors, self.tdd, self.tbr]
            .iter()
            .any(|r| *r != HistoryRange::Skip)
    }
}

/// Common view on history records, used by pagination
pub trait HistoryRecord {
    fn timestamp(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bolus {
    pub timestamp: NaiveDateTime,
    pub amount: f64,
    /// Only normal boluses are fully supported
    pub is_valid: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PumpError {
    pub timestamp: NaiveDateTime,
    pub warning_code: Option<i64>,
    pub error_code: Option<i64>,
    pub message: String,
}

/// Total daily dose
#[derive(Debug, Clone, PartialEq)]
pub struct Tdd {
    pub timestamp: NaiveDateTime,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tbr {
    /// Start of the TBR, derived from the end time and duration
    pub timestamp: NaiveDateTime,
    pub duration: u32,
    pub percent: u32,
}

macro_rules! impl_history_record {
    ($($ty:ty),*) => {
        $(impl HistoryRecord for $ty {
            fn timestamp(&self) -> NaiveDateTime {
                self.timestamp
            }
        })*
    };
}

impl_history_record!(Bolus, PumpError, Tdd, Tbr);

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PumpHistory {
    pub bolus_history: Vec<Bolus>,
    pub pump_error_history: Vec<PumpError>,
    pub tdd_history: Vec<Tdd>,
    pub tbr_history: Vec<Tbr>,
}

impl PumpHistory {
    pub fn is_empty(&self) -> bool {
        self.bolus_history.is_empty()
            && self.pump_error_history.is_empty()
            && self.tdd_history.is_empty()
            && self.tbr_history.is_empty()
    }
}

/// Hourly basal rates in U/h, slot 0 starting at midnight
#[derive(Debug, Clone, PartialEq)]
pub struct BasalProfile {
    pub number: u8,
    pub hourly_rates: Vec<f64>,
}

impl BasalProfile {
    pub fn new(number: u8, hourly_rates: Vec<f64>) -> Self {
        Self {
            number,
            hourly_rates,
        }
    }

    pub fn total(&self) -> f64 {
        self.hourly_rates.iter().sum()
    }
}

/// Resolve a displayed date into a full date.
///
/// The pump omits the year: records are assumed to be from the current year,
/// except December records read in January which belong to the previous one.
pub fn resolve_record_date(date: MenuDate, today: NaiveDate) -> Option<NaiveDate> {
    let mut year = today.year();
    if today.month() == 1 && date.month == 12 {
        year -= 1;
    }
    NaiveDate::from_ymd_opt(year, date.month, date.day)
}

/// Resolve a displayed date and time into a timestamp, see [`resolve_record_date`]
pub fn resolve_record_time(date: MenuDate, time: MenuTime, today: NaiveDate) -> Option<NaiveDateTime> {
    resolve_record_date(date, today)?.and_hms_opt(time.hour, time.minute, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_december_record_read_in_january() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let resolved = resolve_record_date(MenuDate::new(30, 12), today).unwrap();
        assert_eq!(resolved, NaiveDate::from_ymd_opt(2023, 12, 30).unwrap());
    }

    #[test]
    fn test_record_time_same_year() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let resolved = resolve_record_time(MenuDate::new(9, 6), MenuTime::new(13, 45), today).unwrap();
        assert_eq!(resolved.to_string(), "2024-06-09 13:45:00");
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        let today = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        assert!(resolve_record_date(MenuDate::new(29, 2), today).is_none());
    }

    #[test]
    fn test_request_builder() {
        let request = HistoryRequest::default();
        assert!(!request.reads_anything());

        let request = request.bolus(HistoryRange::Last).tbr(HistoryRange::Full);
        assert!(request.reads_anything());
        assert_eq!(request.pump_errors, HistoryRange::Skip);
    }
}
