//! Day keys
//!
//! A `DayKey` is the canonical `YYYY-MM-DD` identifier of a calendar day.
//! It doubles as the document key in the remote collection and as the sort
//! key for reports.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

/// Error returned when a string is not a canonical day key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid day key '{0}'. Expected YYYY-MM-DD")]
pub struct DayKeyError(pub String);

/// Canonical calendar-day key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(NaiveDate);

impl DayKey {
    /// Key for a calendar date
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Key for the local-calendar day an instant falls on
    ///
    /// The instant is first converted to local time, so a late-evening UTC
    /// timestamp may land on the previous or next day depending on the zone.
    pub fn from_instant<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self {
        let local = instant.with_timezone(&Local);
        debug!(%local, "DayKey::from_instant: called");
        Self(local.date_naive())
    }

    /// Key for today in local time
    pub fn today() -> Self {
        Self::from_instant(&Local::now())
    }

    /// Parse a canonical `YYYY-MM-DD` key
    ///
    /// Non-padded forms such as `2024-7-4` are rejected so that every day has
    /// exactly one key.
    pub fn parse(s: &str) -> Result<Self, DayKeyError> {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| DayKeyError(s.to_string()))?;
        let key = Self(date);
        if key.to_string() != s {
            debug!(%s, "DayKey::parse: rejected non-canonical key");
            return Err(DayKeyError(s.to_string()));
        }
        Ok(key)
    }

    /// The calendar date this key names
    pub fn to_date(self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.0.year(), self.0.month(), self.0.day())
    }
}

impl FromStr for DayKey {
    type Err = DayKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<NaiveDate> for DayKey {
    fn from(date: NaiveDate) -> Self {
        Self::from_date(date)
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
