//! Date windows: relative/absolute bounds and resolution against "today"

use crate::error::{DslError, Result};
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Print format for absolute dates, e.g. `1-Jan-25`
const SHORT_DATE: &str = "%-d-%b-%y";
const ISO_DATE: &str = "%Y-%m-%d";

/// Unit of a relative offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Unit {
    /// `d`
    Day,
    /// `w`
    Week,
    /// `m`
    Month,
    /// `y`
    Year,
}

impl Unit {
    const fn suffix(self) -> char {
        match self {
            Self::Day => 'd',
            Self::Week => 'w',
            Self::Month => 'm',
            Self::Year => 'y',
        }
    }

    const fn from_suffix(c: char) -> Option<Self> {
        match c {
            'd' => Some(Self::Day),
            'w' => Some(Self::Week),
            'm' => Some(Self::Month),
            'y' => Some(Self::Year),
            _ => None,
        }
    }
}

/// One end of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Bound {
    /// Offset from today, e.g. `-30d`
    Relative {
        /// Signed amount
        amount: i64,
        /// Unit
        unit: Unit,
    },

    /// Fixed calendar date
    Absolute(NaiveDate),
}

impl Bound {
    /// Relative offset in days
    #[inline]
    #[must_use]
    pub const fn days(amount: i64) -> Self {
        Self::Relative {
            amount,
            unit: Unit::Day,
        }
    }

    /// Resolve to a calendar date
    ///
    /// # Errors
    /// Returns error if the offset leaves chrono's date range
    pub fn resolve(&self, today: NaiveDate) -> Result<NaiveDate> {
        let (amount, unit) = match *self {
            Self::Absolute(date) => return Ok(date),
            Self::Relative { amount, unit } => (amount, unit),
        };
        let overflow = || DslError::InvalidDate {
            text: self.to_string(),
        };
        let magnitude = amount.unsigned_abs();
        let resolved = match unit {
            Unit::Day | Unit::Week => {
                let per = if unit == Unit::Week { 7 } else { 1 };
                let days = Days::new(magnitude.checked_mul(per).ok_or_else(overflow)?);
                if amount < 0 {
                    today.checked_sub_days(days)
                } else {
                    today.checked_add_days(days)
                }
            }
            Unit::Month | Unit::Year => {
                let per = if unit == Unit::Year { 12 } else { 1 };
                let months = u32::try_from(magnitude.checked_mul(per).ok_or_else(overflow)?)
                    .map_err(|_| overflow())?;
                if amount < 0 {
                    today.checked_sub_months(Months::new(months))
                } else {
                    today.checked_add_months(Months::new(months))
                }
            }
        };
        resolved.ok_or_else(overflow)
    }
}

impl Display for Bound {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relative { amount, unit } => write!(f, "{amount}{}", unit.suffix()),
            Self::Absolute(date) => write!(f, "{}", date.format(SHORT_DATE)),
        }
    }
}

impl FromStr for Bound {
    type Err = DslError;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        let invalid = || DslError::InvalidDate {
            text: text.to_string(),
        };

        if let Some(last) = text.chars().last() {
            if let Some(unit) = Unit::from_suffix(last) {
                let number = &text[..text.len() - 1];
                let digits = number.strip_prefix(&['-', '+'][..]).unwrap_or(number);
                if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                    let amount = number.parse::<i64>().map_err(|_| invalid())?;
                    return Ok(Self::Relative { amount, unit });
                }
            }
        }

        NaiveDate::parse_from_str(text, ISO_DATE)
            .or_else(|_| NaiveDate::parse_from_str(text, SHORT_DATE))
            .or_else(|_| NaiveDate::parse_from_str(text, "%d-%b-%y"))
            .map(Self::Absolute)
            .map_err(|_| invalid())
    }
}

/// A date window; a missing end means "today"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    /// Start bound
    pub start: Bound,

    /// End bound, open when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Bound>,
}

impl Window {
    /// Closed window
    #[inline]
    #[must_use]
    pub const fn new(start: Bound, end: Bound) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Window ending today
    #[inline]
    #[must_use]
    pub const fn open(start: Bound) -> Self {
        Self { start, end: None }
    }

    /// Resolve both bounds to calendar dates
    ///
    /// # Errors
    /// Returns error if a bound overflows or the start lands after the end
    pub fn resolve(&self, today: NaiveDate) -> Result<ResolvedWindow> {
        let from = self.start.resolve(today)?;
        let to = match &self.end {
            Some(end) => end.resolve(today)?,
            None => today,
        };
        if from > to {
            return Err(DslError::InvertedWindow { from, to });
        }
        Ok(ResolvedWindow { from, to })
    }
}

impl Display for Window {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.end {
            Some(end) => write!(f, "{}:{}", self.start, end),
            None => write!(f, "{}", self.start),
        }
    }
}

/// A window pinned to calendar dates (both ends inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedWindow {
    /// First day
    pub from: NaiveDate,
    /// Last day
    pub to: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, ISO_DATE).unwrap()
    }

    #[test]
    fn parses_relative_bounds() {
        assert_eq!("-30d".parse::<Bound>().unwrap(), Bound::days(-30));
        assert_eq!("0d".parse::<Bound>().unwrap(), Bound::days(0));
        assert_eq!(
            "-2w".parse::<Bound>().unwrap(),
            Bound::Relative {
                amount: -2,
                unit: Unit::Week
            }
        );
    }

    #[test]
    fn parses_absolute_bounds() {
        assert_eq!(
            "1-Jan-25".parse::<Bound>().unwrap(),
            Bound::Absolute(d("2025-01-01"))
        );
        assert_eq!(
            "2025-03-15".parse::<Bound>().unwrap(),
            Bound::Absolute(d("2025-03-15"))
        );
        assert_eq!(Bound::Absolute(d("2025-01-01")).to_string(), "1-Jan-25");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            "yesterday".parse::<Bound>(),
            Err(DslError::InvalidDate { .. })
        ));
    }

    #[test]
    fn resolves_relative_window() {
        let w = Window::new(Bound::days(-30), Bound::days(-1));
        let r = w.resolve(d("2025-02-01")).unwrap();
        assert_eq!(r.from, d("2025-01-02"));
        assert_eq!(r.to, d("2025-01-31"));
    }

    #[test]
    fn open_window_ends_today() {
        let w = Window::open(Bound::Relative {
            amount: -1,
            unit: Unit::Month,
        });
        let r = w.resolve(d("2025-03-31")).unwrap();
        assert_eq!(r.from, d("2025-02-28"));
        assert_eq!(r.to, d("2025-03-31"));
    }

    #[test]
    fn inverted_window_is_an_error() {
        let w = Window::new(Bound::days(-1), Bound::days(-30));
        assert!(matches!(
            w.resolve(d("2025-02-01")),
            Err(DslError::InvertedWindow { .. })
        ));
    }
}
