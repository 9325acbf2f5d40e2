//! Year values and the `{variable}_{year}` property keys built from them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A four-digit calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Year(u16);

impl Year {
    pub fn new(value: u16) -> Option<Self> {
        (1000..=9999).contains(&value).then_some(Year(value))
    }

    pub fn get(self) -> u16 {
        self.0
    }

    /// Every year from `self` through `to`, inclusive.
    pub fn through(self, to: Year) -> impl Iterator<Item = Year> {
        (self.0..=to.0).map(Year)
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl FromStr for Year {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
            anyhow::bail!("'{s}' is not a four-digit year");
        }
        let value: u16 = s.parse()?;
        Year::new(value).ok_or_else(|| anyhow::anyhow!("'{s}' is not a four-digit year"))
    }
}

impl TryFrom<u16> for Year {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Year::new(value).ok_or_else(|| format!("{value} is not a four-digit year"))
    }
}

impl From<Year> for u16 {
    fn from(year: Year) -> u16 {
        year.0
    }
}

/// A merged property key: one indicator observed in one year.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MergedKey {
    pub variable: String,
    pub year: Year,
}

impl MergedKey {
    pub fn new(variable: impl Into<String>, year: Year) -> Self {
        Self {
            variable: variable.into(),
            year,
        }
    }

    /// Splits on the last underscore. Keys whose suffix is not a year (or
    /// that have no underscore, or an empty variable) are not merged keys.
    pub fn parse(key: &str) -> Option<Self> {
        let (variable, suffix) = key.rsplit_once('_')?;
        if variable.is_empty() {
            return None;
        }
        let year = suffix.parse().ok()?;
        Some(Self::new(variable, year))
    }
}

impl fmt::Display for MergedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.variable, self.year)
    }
}
