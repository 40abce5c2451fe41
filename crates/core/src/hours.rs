//! Branch operating hours.
//!
//! Hours are stored per weekday in branch-local time. A day without hours is
//! a closed day. Appointments must start and end on the same day, inside
//! the opening window.

use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Errors found when validating operating hours.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HoursError {
    /// Opening time is not before closing time.
    #[error("{day}: opening time {open} must be before closing time {close}")]
    OpenAfterClose {
        day: Weekday,
        open: NaiveTime,
        close: NaiveTime,
    },
}

/// Opening window for a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl DayHours {
    /// Whether `time` falls in `[open, close)`.
    #[must_use]
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.open && time < self.close
    }
}

/// Weekly schedule for a branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingHours {
    #[serde(default)]
    pub monday: Option<DayHours>,
    #[serde(default)]
    pub tuesday: Option<DayHours>,
    #[serde(default)]
    pub wednesday: Option<DayHours>,
    #[serde(default)]
    pub thursday: Option<DayHours>,
    #[serde(default)]
    pub friday: Option<DayHours>,
    #[serde(default)]
    pub saturday: Option<DayHours>,
    #[serde(default)]
    pub sunday: Option<DayHours>,
}

impl OperatingHours {
    /// Monday to Saturday 09:00-19:00, closed on Sunday.
    #[must_use]
    pub fn default_week() -> Self {
        let day = Some(DayHours {
            open: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(19, 0, 0).unwrap_or(NaiveTime::MIN),
        });
        Self {
            monday: day,
            tuesday: day,
            wednesday: day,
            thursday: day,
            friday: day,
            saturday: day,
            sunday: None,
        }
    }

    /// Hours for a given weekday, or `None` if closed.
    #[must_use]
    pub const fn for_day(&self, day: Weekday) -> Option<DayHours> {
        match day {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }

    fn days(&self) -> [(Weekday, Option<DayHours>); 7] {
        [
            (Weekday::Mon, self.monday),
            (Weekday::Tue, self.tuesday),
            (Weekday::Wed, self.wednesday),
            (Weekday::Thu, self.thursday),
            (Weekday::Fri, self.friday),
            (Weekday::Sat, self.saturday),
            (Weekday::Sun, self.sunday),
        ]
    }

    /// Check every open day has `open < close`.
    ///
    /// # Errors
    ///
    /// Returns the first day whose window is empty or inverted.
    pub fn validate(&self) -> Result<(), HoursError> {
        for (day, hours) in self.days() {
            if let Some(h) = hours
                && h.open >= h.close
            {
                return Err(HoursError::OpenAfterClose {
                    day,
                    open: h.open,
                    close: h.close,
                });
            }
        }
        Ok(())
    }

    /// Whether the branch is open at the given local time.
    #[must_use]
    pub fn is_open_at(&self, at: NaiveDateTime) -> bool {
        self.for_day(at.weekday())
            .is_some_and(|h| h.contains(at.time()))
    }

    /// Whether `[start, end)` lies on a single open day within its hours.
    ///
    /// An appointment may end exactly at closing time.
    #[must_use]
    pub fn covers(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        if end <= start || start.date() != end.date() {
            return false;
        }
        self.for_day(start.weekday())
            .is_some_and(|h| start.time() >= h.open && end.time() <= h.close)
    }

    /// Number of days the branch opens each week.
    #[must_use]
    pub fn open_days(&self) -> usize {
        self.days().iter().filter(|(_, h)| h.is_some()).count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        // 2025-06-02 is a Monday
        NaiveDate::from_ymd_opt(2025, 6, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_default_week() {
        let hours = OperatingHours::default_week();
        assert_eq!(hours.open_days(), 6);
        assert!(hours.sunday.is_none());
        assert!(hours.validate().is_ok());
    }

    #[test]
    fn test_is_open_at() {
        let hours = OperatingHours::default_week();
        assert!(hours.is_open_at(at(2, 9, 0)));
        assert!(hours.is_open_at(at(2, 18, 59)));
        assert!(!hours.is_open_at(at(2, 19, 0)));
        assert!(!hours.is_open_at(at(2, 8, 59)));
        // Sunday
        assert!(!hours.is_open_at(at(8, 12, 0)));
    }

    #[test]
    fn test_covers_allows_ending_at_close() {
        let hours = OperatingHours::default_week();
        assert!(hours.covers(at(3, 18, 0), at(3, 19, 0)));
        assert!(!hours.covers(at(3, 18, 30), at(3, 19, 30)));
    }

    #[test]
    fn test_covers_rejects_inverted_and_multi_day() {
        let hours = OperatingHours::default_week();
        assert!(!hours.covers(at(3, 12, 0), at(3, 11, 0)));
        assert!(!hours.covers(at(3, 12, 0), at(4, 12, 0)));
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let mut hours = OperatingHours::default_week();
        hours.friday = Some(DayHours {
            open: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            close: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        });
        assert!(matches!(
            hours.validate(),
            Err(HoursError::OpenAfterClose {
                day: Weekday::Fri,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_days_deserialize_as_closed() {
        let hours: OperatingHours =
            serde_json::from_str(r#"{"monday":{"open":"10:00:00","close":"18:00:00"}}"#).unwrap();
        assert!(hours.monday.is_some());
        assert_eq!(hours.open_days(), 1);
    }
}
