use crate::error::{Result, RosterError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::{Date, Month};

/// A calendar month, written `YYYY-MM`.
///
/// Ordering is by (year, month), which matches the ordering of the
/// zero-padded string form for four-digit years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u8,
}

impl YearMonth {
    pub fn new(year: i32, month: u8) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(RosterError::invalid(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        if !(0..=9999).contains(&year) {
            return Err(RosterError::invalid(format!(
                "year must be between 0 and 9999, got {year}"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: Date) -> Result<Self> {
        Self::new(date.year(), u8::from(date.month()))
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn calendar_month(&self) -> Month {
        // month is validated on construction
        Month::try_from(self.month).unwrap_or(Month::January)
    }

    /// The month before, or `InvalidInput` before year 0.
    pub fn previous(&self) -> Result<Self> {
        if self.month == 1 {
            Self::new(self.year - 1, 12)
        } else {
            Self::new(self.year, self.month - 1)
        }
    }

    /// The month after, or `InvalidInput` past year 9999.
    pub fn next(&self) -> Result<Self> {
        if self.month == 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }

    pub fn first_day(&self) -> Result<Date> {
        Date::from_calendar_date(self.year, self.calendar_month(), 1)
            .map_err(|err| RosterError::invalid(format!("{self}: {err}")))
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = RosterError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || RosterError::invalid(format!("expected YYYY-MM, got {s:?}"));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        if !year.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u8 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = RosterError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn parses_and_prints_zero_padded() {
        let ym: YearMonth = "2025-03".parse().unwrap();
        assert_eq!(ym.year(), 2025);
        assert_eq!(ym.month(), 3);
        assert_eq!(ym.to_string(), "2025-03");
    }

    #[test]
    fn rejects_malformed_strings() {
        for bad in ["2025-3", "25-03", "2025-13", "2025-00", "2025/03", "abcd-ef", ""] {
            assert!(bad.parse::<YearMonth>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn ordering_matches_padded_string_ordering() {
        let months = ["2024-12", "2025-01", "2025-02", "2025-10", "2026-01"];
        for a in months {
            for b in months {
                let ya: YearMonth = a.parse().unwrap();
                let yb: YearMonth = b.parse().unwrap();
                assert_eq!(ya.cmp(&yb), a.cmp(b), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn navigation_wraps_across_years() {
        let jan = YearMonth::new(2025, 1).unwrap();
        assert_eq!(jan.previous().unwrap(), YearMonth::new(2024, 12).unwrap());
        assert_eq!(jan.previous().unwrap().next().unwrap(), jan);
        let dec = YearMonth::new(2025, 12).unwrap();
        assert_eq!(dec.next().unwrap(), YearMonth::new(2026, 1).unwrap());
    }

    #[test]
    fn navigation_stops_at_four_digit_years() {
        let last = YearMonth::new(9999, 12).unwrap();
        assert!(matches!(last.next(), Err(RosterError::InvalidInput(_))));
        assert_eq!(last.previous().unwrap().to_string(), "9999-11");

        let first = YearMonth::new(0, 1).unwrap();
        assert!(matches!(first.previous(), Err(RosterError::InvalidInput(_))));
        let second = first.next().unwrap();
        assert_eq!(second.to_string(), "0000-02");
        assert_eq!("0000-02".parse::<YearMonth>().unwrap(), second);
    }

    #[test]
    fn from_date_and_first_day() {
        let ym = YearMonth::from_date(date!(2024 - 02 - 29)).unwrap();
        assert_eq!(ym.to_string(), "2024-02");
        assert_eq!(ym.first_day().unwrap(), date!(2024 - 02 - 01));
        let before_year_zero = Date::from_calendar_date(-1, Month::June, 15).unwrap();
        assert!(YearMonth::from_date(before_year_zero).is_err());
    }

    #[test]
    fn serde_uses_string_form() {
        let ym = YearMonth::new(2025, 7).unwrap();
        assert_eq!(serde_json::to_string(&ym).unwrap(), "\"2025-07\"");
        let back: YearMonth = serde_json::from_str("\"2025-07\"").unwrap();
        assert_eq!(back, ym);
        assert!(serde_json::from_str::<YearMonth>("\"2025-7\"").is_err());
    }
}
