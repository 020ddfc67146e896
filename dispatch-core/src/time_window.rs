//! Daily time windows written as `HH:MM-HH:MM`.
//!
//! A [`TimeWindow`] keeps its textual key as the source of truth and derives
//! its `begin` and `end` minutes from it whenever one is built.
//!
//! # Examples
//! ```
//! use dispatch_core::TimeWindow;
//!
//! let morning = TimeWindow::parse("09:00-12:00")?;
//! let lunch = TimeWindow::parse("11:30-14:00")?;
//! assert_eq!(morning.begin(), 540);
//! assert!(morning.overlaps(&lunch));
//! # Ok::<(), dispatch_core::TimeWindowError>(())
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Number of characters in a well-formed key.
const KEY_LEN: usize = 11;

/// Errors raised while parsing a time window key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeWindowError {
    /// The key does not follow the `HH:MM-HH:MM` layout.
    #[error("time window {key:?} is not in HH:MM-HH:MM format")]
    Malformed {
        /// Offending key.
        key: String,
    },
    /// One half of the key is not a valid 24-hour clock time.
    #[error("time window {key:?} contains invalid 24-hour time {time:?}")]
    InvalidTime {
        /// Offending key.
        key: String,
        /// The half that failed to parse.
        time: String,
    },
}

/// A daily interval measured in minutes since midnight.
///
/// Minute `m` lies inside the window when `begin <= m < end`. A key whose
/// end does not come after its begin, such as `22:00-02:00`, contains no
/// minute, but its endpoints can still fall inside another window.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct TimeWindow {
    key: String,
    begin: u16,
    end: u16,
}

impl TimeWindow {
    /// Parse a key and derive its minute bounds.
    ///
    /// # Errors
    /// Returns [`TimeWindowError`] when the key is not `HH:MM-HH:MM` or
    /// either half is not a valid 24-hour time.
    pub fn parse(key: &str) -> Result<Self, TimeWindowError> {
        let (begin, end) = parse_bounds(key)?;
        Ok(Self {
            key: key.to_owned(),
            begin,
            end,
        })
    }

    /// The canonical `HH:MM-HH:MM` key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// First minute inside the window.
    #[must_use]
    pub const fn begin(&self) -> u16 {
        self.begin
    }

    /// First minute after the window.
    #[must_use]
    pub const fn end(&self) -> u16 {
        self.end
    }

    /// Report whether either window's begin or end falls inside the other.
    ///
    /// Windows that touch at a boundary, such as `09:00-11:00` and
    /// `11:00-12:00`, overlap: the first ends on the second's first minute.
    ///
    /// # Examples
    /// ```
    /// use dispatch_core::TimeWindow;
    ///
    /// let a = TimeWindow::parse("09:00-11:00")?;
    /// let b = TimeWindow::parse("11:00-12:00")?;
    /// let c = TimeWindow::parse("12:30-13:00")?;
    /// assert!(a.overlaps(&b));
    /// assert!(!a.overlaps(&c));
    /// # Ok::<(), dispatch_core::TimeWindowError>(())
    /// ```
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        other.contains(self.begin)
            || other.contains(self.end)
            || self.contains(other.begin)
            || self.contains(other.end)
    }

    const fn contains(&self, minute: u16) -> bool {
        self.begin <= minute && minute < self.end
    }
}

/// Parse a `HH:MM-HH:MM` key into `(begin, end)` minutes since midnight.
///
/// # Errors
/// Returns [`TimeWindowError::Malformed`] for layout problems and
/// [`TimeWindowError::InvalidTime`] for out-of-range hours or minutes.
pub fn parse_bounds(key: &str) -> Result<(u16, u16), TimeWindowError> {
    let malformed = || TimeWindowError::Malformed {
        key: key.to_owned(),
    };
    if key.len() != KEY_LEN {
        return Err(malformed());
    }
    let (start, finish) = key.split_once('-').ok_or_else(malformed)?;
    Ok((parse_clock(key, start)?, parse_clock(key, finish)?))
}

fn parse_clock(key: &str, text: &str) -> Result<u16, TimeWindowError> {
    let malformed = || TimeWindowError::Malformed {
        key: key.to_owned(),
    };
    let (hours, minutes) = text.split_once(':').ok_or_else(malformed)?;
    let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(hours) || !two_digits(minutes) {
        return Err(malformed());
    }
    let hour: u16 = hours.parse().map_err(|_| malformed())?;
    let minute: u16 = minutes.parse().map_err(|_| malformed())?;
    if hour > 23 || minute > 59 {
        return Err(TimeWindowError::InvalidTime {
            key: key.to_owned(),
            time: text.to_owned(),
        });
    }
    Ok(hour * 60 + minute)
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl FromStr for TimeWindow {
    type Err = TimeWindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TimeWindow {
    type Error = TimeWindowError;

    fn try_from(key: String) -> Result<Self, Self::Error> {
        let (begin, end) = parse_bounds(&key)?;
        Ok(Self { key, begin, end })
    }
}

impl From<TimeWindow> for String {
    fn from(window: TimeWindow) -> Self {
        window.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("00:00-23:59", 0, 1439)]
    #[case("09:00-18:00", 540, 1080)]
    #[case("12:30-12:45", 750, 765)]
    fn parses_minute_bounds(#[case] key: &str, #[case] begin: u16, #[case] end: u16) {
        let window = TimeWindow::parse(key).expect("valid window");
        assert_eq!((window.begin(), window.end()), (begin, end));
        assert_eq!(window.key(), key);
    }

    #[rstest]
    #[case("9:00-18:00")]
    #[case("09:00-18:00 ")]
    #[case("09:00_18:00")]
    #[case("0900-1800xx")]
    #[case("aa:bb-cc:dd")]
    #[case("")]
    fn rejects_malformed_keys(#[case] key: &str) {
        let err = TimeWindow::parse(key).expect_err("malformed key");
        assert!(matches!(err, TimeWindowError::Malformed { .. }), "{err:?}");
    }

    #[rstest]
    #[case("24:00-25:00")]
    #[case("09:60-10:00")]
    #[case("09:00-10:75")]
    fn rejects_invalid_clock_times(#[case] key: &str) {
        let err = TimeWindow::parse(key).expect_err("invalid time");
        assert!(matches!(err, TimeWindowError::InvalidTime { .. }), "{err:?}");
    }

    #[rstest]
    #[case("09:00-12:00", "11:00-13:00", true)]
    #[case("09:00-12:00", "10:00-11:00", true)]
    #[case("10:00-11:00", "09:00-12:00", true)]
    #[case::touching("09:00-11:00", "11:00-14:00", true)]
    #[case::touching_reversed("11:00-12:00", "09:00-11:00", true)]
    #[case::apart("09:00-10:00", "14:00-15:00", false)]
    #[case::one_minute_gap("09:00-10:00", "10:01-11:00", false)]
    #[case::single_minute("09:00-09:01", "09:00-09:01", true)]
    #[case::zero_length_inside("12:00-12:00", "11:00-13:00", true)]
    #[case::overnight_end_inside("22:00-02:00", "01:00-03:00", true)]
    #[case::overnight_apart("22:00-02:00", "05:00-06:00", false)]
    fn overlap_tests_every_endpoint_and_is_symmetric(
        #[case] left: &str,
        #[case] right: &str,
        #[case] expected: bool,
    ) {
        let a = TimeWindow::parse(left).expect("left window");
        let b = TimeWindow::parse(right).expect("right window");
        assert_eq!(a.overlaps(&b), expected);
        assert_eq!(b.overlaps(&a), expected);
    }

    #[rstest]
    fn display_round_trips_through_from_str() {
        let window: TimeWindow = "08:15-09:45".parse().expect("valid window");
        assert_eq!(window.to_string(), "08:15-09:45");
    }
}
