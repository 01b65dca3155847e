//! Recurrence rules for calendar events.
//!
//! The LLM returns a loose description of recurrence. [`RawRecurrence`]
//! accepts whatever shape it sends and [`RawRecurrence::normalize`] turns it
//! into a [`RecurrenceRule`] that always satisfies:
//! - `interval >= 1`
//! - at most one of `count` / `until` (`count` wins when both are given)
//! - `byday` only contains valid weekday codes

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Recurrence frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Some(Self::Daily),
            "WEEKLY" => Some(Self::Weekly),
            "MONTHLY" => Some(Self::Monthly),
            "YEARLY" => Some(Self::Yearly),
            _ => None,
        }
    }
}

/// RFC 5545 two-letter weekday code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    #[serde(rename = "MO")]
    Monday,
    #[serde(rename = "TU")]
    Tuesday,
    #[serde(rename = "WE")]
    Wednesday,
    #[serde(rename = "TH")]
    Thursday,
    #[serde(rename = "FR")]
    Friday,
    #[serde(rename = "SA")]
    Saturday,
    #[serde(rename = "SU")]
    Sunday,
}

impl Weekday {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Monday => "MO",
            Self::Tuesday => "TU",
            Self::Wednesday => "WE",
            Self::Thursday => "TH",
            Self::Friday => "FR",
            Self::Saturday => "SA",
            Self::Sunday => "SU",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "MO" => Some(Self::Monday),
            "TU" => Some(Self::Tuesday),
            "WE" => Some(Self::Wednesday),
            "TH" => Some(Self::Thursday),
            "FR" => Some(Self::Friday),
            "SA" => Some(Self::Saturday),
            "SU" => Some(Self::Sunday),
            _ => None,
        }
    }
}

/// A validated recurrence rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub freq: Frequency,

    pub interval: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub byday: BTreeSet<Weekday>,
}

impl RecurrenceRule {
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq,
            interval: 1,
            count: None,
            until: None,
            byday: BTreeSet::new(),
        }
    }

    /// Render as an `RRULE:` line for the calendar API
    pub fn to_rrule(&self) -> String {
        let mut parts = vec![format!("FREQ={}", self.freq.as_str())];

        if self.interval > 1 {
            parts.push(format!("INTERVAL={}", self.interval));
        }
        if let Some(count) = self.count {
            parts.push(format!("COUNT={}", count));
        } else if let Some(until) = self.until {
            parts.push(format!("UNTIL={}T235959Z", until.format("%Y%m%d")));
        }
        if !self.byday.is_empty() {
            let days: Vec<&str> = self.byday.iter().map(Weekday::code).collect();
            parts.push(format!("BYDAY={}", days.join(",")));
        }

        format!("RRULE:{}", parts.join(";"))
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rrule())
    }
}

/// Reasons a raw recurrence cannot become a rule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecurrenceError {
    #[error("recurrence is missing a frequency")]
    MissingFrequency,

    #[error("unknown recurrence frequency: {0}")]
    UnknownFrequency(String),
}

/// `byday` arrives either as a list or as a comma-separated string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WeekdayList {
    List(Vec<String>),
    Joined(String),
}

impl WeekdayList {
    fn codes(&self) -> Vec<&str> {
        match self {
            Self::List(items) => items.iter().map(String::as_str).collect(),
            Self::Joined(s) => s.split(',').collect(),
        }
    }
}

/// Recurrence exactly as the LLM sent it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecurrence {
    #[serde(default)]
    pub freq: Option<String>,

    #[serde(default)]
    pub interval: Option<i64>,

    #[serde(default)]
    pub count: Option<i64>,

    #[serde(default)]
    pub until: Option<String>,

    #[serde(default)]
    pub byday: Option<WeekdayList>,
}

impl RawRecurrence {
    /// Validate and normalize into a rule.
    ///
    /// Only a missing or unknown frequency is an error; everything else is
    /// repaired (and logged) so the event can still carry its recurrence.
    pub fn normalize(self) -> Result<RecurrenceRule, RecurrenceError> {
        let freq_text = self.freq.ok_or(RecurrenceError::MissingFrequency)?;
        let freq = Frequency::parse(&freq_text)
            .ok_or_else(|| RecurrenceError::UnknownFrequency(freq_text.clone()))?;

        let mut rule = RecurrenceRule::new(freq);

        rule.interval = match self.interval {
            Some(n) if n >= 1 => u32::try_from(n).unwrap_or(u32::MAX),
            Some(n) => {
                warn!(interval = n, "Recurrence interval below 1, using 1");
                1
            }
            None => 1,
        };

        rule.count = match self.count {
            Some(n) if n >= 1 => Some(u32::try_from(n).unwrap_or(u32::MAX)),
            Some(n) => {
                warn!(count = n, "Ignoring non-positive recurrence count");
                None
            }
            None => None,
        };

        rule.until = self.until.as_deref().and_then(|raw| {
            let parsed = parse_until(raw);
            if parsed.is_none() {
                warn!(until = raw, "Ignoring unparseable recurrence end date");
            }
            parsed
        });

        if rule.count.is_some() && rule.until.is_some() {
            warn!("Recurrence has both count and until, keeping count");
            rule.until = None;
        }

        if let Some(days) = &self.byday {
            for code in days.codes() {
                match Weekday::from_code(code) {
                    Some(day) => {
                        rule.byday.insert(day);
                    }
                    None => warn!(code, "Dropping unknown weekday code"),
                }
            }
        }

        Ok(rule)
    }
}

/// Accepts `YYYY-MM-DD`, `YYYYMMDD`, or either followed by a time part
fn parse_until(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Some(date) = raw
        .get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    {
        return Some(date);
    }
    raw.get(..8)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> RawRecurrence {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_count_wins_over_until() {
        let rule = raw(r#"{"freq": "WEEKLY", "count": 5, "until": "2026-12-31"}"#)
            .normalize()
            .unwrap();

        assert_eq!(rule.count, Some(5));
        assert_eq!(rule.until, None);
        assert_eq!(rule.to_rrule(), "RRULE:FREQ=WEEKLY;COUNT=5");
    }

    #[test]
    fn test_count_until_policy_is_deterministic() {
        let json = r#"{"freq": "daily", "count": 3, "until": "20261231"}"#;
        let first = raw(json).normalize().unwrap();
        let second = raw(json).normalize().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_until_only() {
        let rule = raw(r#"{"freq": "MONTHLY", "until": "2027-01-15"}"#)
            .normalize()
            .unwrap();
        assert_eq!(rule.to_rrule(), "RRULE:FREQ=MONTHLY;UNTIL=20270115T235959Z");
    }

    #[test]
    fn test_interval_and_byday() {
        let rule = raw(r#"{"freq": "WEEKLY", "interval": 2, "byday": ["we", "MO", "XX", "MO"]}"#)
            .normalize()
            .unwrap();

        assert_eq!(rule.interval, 2);
        assert_eq!(rule.byday.len(), 2);
        assert_eq!(rule.to_rrule(), "RRULE:FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE");
    }

    #[test]
    fn test_byday_as_joined_string() {
        let rule = raw(r#"{"freq": "WEEKLY", "byday": "TU,TH"}"#).normalize().unwrap();
        assert_eq!(rule.to_rrule(), "RRULE:FREQ=WEEKLY;BYDAY=TU,TH");
    }

    #[test]
    fn test_zero_interval_normalized() {
        let rule = raw(r#"{"freq": "DAILY", "interval": 0, "count": 0}"#)
            .normalize()
            .unwrap();
        assert_eq!(rule.interval, 1);
        assert_eq!(rule.count, None);
    }

    #[test]
    fn test_unknown_frequency_rejected() {
        let err = raw(r#"{"freq": "HOURLY"}"#).normalize().unwrap_err();
        assert_eq!(err, RecurrenceError::UnknownFrequency("HOURLY".to_string()));

        let err = raw(r#"{"count": 2}"#).normalize().unwrap_err();
        assert_eq!(err, RecurrenceError::MissingFrequency);
    }
}
