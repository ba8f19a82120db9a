use crate::error::GateError;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Suffix shared by every bucket channel name.
pub const BUCKET_SUFFIX: &str = "-posts";

// ---------------------------------------------------------------------------
// PeriodKey
// ---------------------------------------------------------------------------

/// A calendar month in UTC, written `YYYY-MM`.
///
/// Field order makes the derived `Ord` chronological, which also matches the
/// lexicographic order of the textual form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeriodKey {
    year: i32,
    month: u32,
}

impl PeriodKey {
    pub fn new(year: i32, month: u32) -> Result<Self, GateError> {
        if !(0..=9999).contains(&year) || !(1..=12).contains(&month) {
            return Err(GateError::InvalidPeriod(format!("{year}-{month}")));
        }
        Ok(Self { year, month })
    }

    /// The month containing `at`, on the UTC calendar.
    pub fn of(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    /// The calendar month before this one.
    pub fn pred(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// The calendar month after this one.
    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Midnight UTC on the first day of the month.
    pub fn first_instant(self) -> DateTime<Utc> {
        let date = NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .unwrap_or(NaiveDate::MIN)
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default();
        Utc.from_utc_datetime(&date)
    }

    /// Name of the bucket channel for this month, e.g. `2025-08-posts`.
    pub fn channel_name(self) -> String {
        format!("{self}{BUCKET_SUFFIX}")
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for PeriodKey {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = period_re()
            .captures(s)
            .ok_or_else(|| GateError::InvalidPeriod(s.to_string()))?;
        split_captures(&caps).ok_or_else(|| GateError::InvalidPeriod(s.to_string()))
    }
}

impl TryFrom<String> for PeriodKey {
    type Error = GateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeriodKey> for String {
    fn from(key: PeriodKey) -> Self {
        key.to_string()
    }
}

// ---------------------------------------------------------------------------
// Channel name matching
// ---------------------------------------------------------------------------

static PERIOD_RE: OnceLock<Regex> = OnceLock::new();
static BUCKET_RE: OnceLock<Regex> = OnceLock::new();

fn period_re() -> &'static Regex {
    PERIOD_RE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{2})$").expect("static regex"))
}

fn bucket_re() -> &'static Regex {
    BUCKET_RE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{2})-posts$").expect("static regex"))
}

fn split_captures(caps: &regex::Captures<'_>) -> Option<PeriodKey> {
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    PeriodKey::new(year, month).ok()
}

/// Decide whether `name` is a bucket this system owns.
///
/// Only names of the exact form `YYYY-MM-posts` with a real month are
/// recognized; everything else returns `None` and must be left untouched.
pub fn parse_channel_name(name: &str) -> Option<PeriodKey> {
    let caps = bucket_re().captures(name)?;
    split_captures(&caps)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn of_projects_onto_utc_month() {
        let key = PeriodKey::of(utc(2025, 8, 15));
        assert_eq!(key.to_string(), "2025-08");
        assert_eq!(key.channel_name(), "2025-08-posts");
    }

    #[test]
    fn of_uses_utc_at_month_edge() {
        let late = Utc.with_ymd_and_hms(2025, 1, 31, 23, 59, 59).unwrap();
        let early = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(PeriodKey::of(late).to_string(), "2025-01");
        assert_eq!(PeriodKey::of(early).to_string(), "2025-02");
    }

    #[test]
    fn pred_and_succ_roll_over_years() {
        let jan = PeriodKey::new(2025, 1).unwrap();
        assert_eq!(jan.pred(), PeriodKey::new(2024, 12).unwrap());
        let dec = PeriodKey::new(2024, 12).unwrap();
        assert_eq!(dec.succ(), jan);
    }

    #[test]
    fn ordering_is_chronological() {
        let a = PeriodKey::new(2024, 12).unwrap();
        let b = PeriodKey::new(2025, 1).unwrap();
        let c = PeriodKey::new(2025, 10).unwrap();
        assert!(a < b && b < c);
        assert!(a.to_string() < b.to_string() && b.to_string() < c.to_string());
    }

    #[test]
    fn first_instant_is_midnight_on_day_one() {
        let key = PeriodKey::new(2025, 3).unwrap();
        assert_eq!(
            key.first_instant(),
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn recognizes_only_exact_bucket_names() {
        assert_eq!(
            parse_channel_name("2025-07-posts"),
            Some(PeriodKey::new(2025, 7).unwrap())
        );
        for name in [
            "general",
            "2025-7-posts",
            "2025-07-post",
            "2025-07-posts-old",
            "archive-2025-07-posts",
            "2025-07-Posts",
            " 2025-07-posts",
            "25-07-posts",
            "2025-13-posts",
            "2025-00-posts",
            "",
        ] {
            assert_eq!(parse_channel_name(name), None, "should ignore {name:?}");
        }
    }

    #[test]
    fn parse_round_trips_display() {
        let key: PeriodKey = "2024-02".parse().unwrap();
        assert_eq!(key.year(), 2024);
        assert_eq!(key.month(), 2);
        assert!("2024-2".parse::<PeriodKey>().is_err());
        assert!("2024-02-posts".parse::<PeriodKey>().is_err());
    }

    #[test]
    fn new_rejects_out_of_range() {
        assert!(PeriodKey::new(2025, 0).is_err());
        assert!(PeriodKey::new(2025, 13).is_err());
        assert!(PeriodKey::new(10_000, 1).is_err());
    }

    #[test]
    fn serializes_as_string() {
        let key = PeriodKey::new(2025, 1).unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"2025-01\"");
        let back: PeriodKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
