//! Windowed, null-tolerant averages over stored readings.
//!
//! Averages are computed in process over the full `find_all` snapshot; the
//! store is not asked to filter. A missing value is excluded from both the sum
//! and the count, and a window with no values yields `None` rather than zero.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::{
    assessment::{total_dissolved_solids, TdsPolicy},
    errors::QueryError,
    models::{Parameter, Reading},
};

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Overall,
    Month { year: i32, month: u32 },
}

impl Window {
    pub fn this_month(now: DateTime<Utc>) -> Self {
        Window::Month {
            year: now.year(),
            month: now.month(),
        }
    }

    /// Parse `YYYY-MM`.
    pub fn parse_month(text: &str) -> Result<Self, QueryError> {
        // ---
        let trimmed = text.trim();
        let date = NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d")
            .map_err(|_| QueryError::InvalidMonth(text.to_string()))?;
        Ok(Window::Month {
            year: date.year(),
            month: date.month(),
        })
    }

    /// Resolve query-string style input. `window` is `overall` (default) or
    /// `month`; a month window uses `month` when given, else the month of `now`.
    /// A bare `month` without `window` also selects a month window.
    pub fn from_query(
        window: Option<&str>,
        month: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Self, QueryError> {
        // ---
        let kind = window.map(|w| w.trim().to_ascii_lowercase());
        match (kind.as_deref(), month) {
            (None, None) | (Some("overall"), _) => Ok(Window::Overall),
            (None, Some(m)) | (Some("month"), Some(m)) => Window::parse_month(m),
            (Some("month"), None) => Ok(Window::this_month(now)),
            (Some(_), _) => Err(QueryError::InvalidWindow(
                window.unwrap_or_default().to_string(),
            )),
        }
    }

    /// Month windows never admit readings without a timestamp.
    pub fn contains(&self, reading: &Reading) -> bool {
        // ---
        match self {
            Window::Overall => true,
            Window::Month { year, month } => reading
                .timestamp
                .is_some_and(|ts| ts.year() == *year && ts.month() == *month),
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Overall => f.write_str("overall"),
            Window::Month { year, month } => write!(f, "{year:04}-{month:02}"),
        }
    }
}

/// Running sum and count of present values.
#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn finish(self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator {
    tds_policy: TdsPolicy,
}

impl Aggregator {
    pub fn new(tds_policy: TdsPolicy) -> Self {
        Self { tds_policy }
    }

    pub fn average(
        &self,
        readings: &[Reading],
        parameter: Parameter,
        window: Window,
    ) -> Option<f64> {
        // ---
        let mut mean = Mean::default();
        for reading in readings.iter().filter(|r| window.contains(r)) {
            mean.push(self.value_of(reading, parameter));
        }
        mean.finish()
    }

    /// Every parameter name mapped to its average; no-data entries stay `None`.
    pub fn all_averages(
        &self,
        readings: &[Reading],
        window: Window,
    ) -> BTreeMap<&'static str, Option<f64>> {
        // ---
        Parameter::ALL
            .iter()
            .map(|&p| (p.name(), self.average(readings, p, window)))
            .collect()
    }

    fn value_of(&self, reading: &Reading, parameter: Parameter) -> Option<f64> {
        // ---
        match parameter {
            Parameter::Tds => total_dissolved_solids(&reading.measurements, self.tds_policy),
            other => reading.measurements.get(other),
        }
    }
}
