//! Raw feed row → typed [`Reading`].
//!
//! Only the column count and undecodable bytes are hard rejections. Numeric
//! fields are parsed leniently: blank or garbage tokens become `None`.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};

use crate::{
    errors::RowRejection,
    feed::RawRow,
    models::{Measurements, Reading, TimestampSource},
};

// ---

/// objectId, pH, alkalinity, conductivity, BOD, nitrite-N, copper-1 (mg/L),
/// copper-2 (µg/L), iron (µg/L), zinc (µg/L).
pub const FEED_COLUMNS: usize = 10;

/// Index of the optional trailing timestamp column.
const TIMESTAMP_COLUMN: usize = FEED_COLUMNS;

#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    honor_feed_timestamp: bool,
}

impl Normalizer {
    /// With `honor_feed_timestamp` the layout gains an 11th column holding the
    /// sample time; rows must then carry exactly 11 fields.
    pub fn new(honor_feed_timestamp: bool) -> Self {
        Self {
            honor_feed_timestamp,
        }
    }

    pub fn expected_columns(&self) -> usize {
        // ---
        if self.honor_feed_timestamp {
            FEED_COLUMNS + 1
        } else {
            FEED_COLUMNS
        }
    }

    pub fn normalize(&self, row: &RawRow, now: DateTime<Utc>) -> Result<Reading, RowRejection> {
        // ---
        if row.invalid_utf8 {
            return Err(RowRejection::InvalidUtf8);
        }

        let expected = self.expected_columns();
        if row.fields.len() != expected {
            return Err(RowRejection::ColumnCountMismatch {
                expected,
                found: row.fields.len(),
            });
        }

        let f = &row.fields;
        let measurement = |idx: usize| parse_measurement(&f[idx], idx, row.line);

        let object_id = parse_object_id(&f[0]);
        if object_id.is_none() {
            tracing::debug!("Line {}: unparseable OBJECTID '{}'", row.line, f[0]);
        }

        let feed_timestamp = if self.honor_feed_timestamp {
            let parsed = parse_feed_timestamp(&f[TIMESTAMP_COLUMN]);
            if parsed.is_none() {
                tracing::warn!(
                    "Line {}: timestamp '{}' not understood, using pipeline time",
                    row.line,
                    f[TIMESTAMP_COLUMN]
                );
            }
            parsed
        } else {
            None
        };

        // Postgres keeps microseconds; truncate so natural-key lookups match.
        let (timestamp, timestamp_source) = match feed_timestamp {
            Some(ts) => (ts.trunc_subsecs(6), TimestampSource::Feed),
            None => (now.trunc_subsecs(6), TimestampSource::Pipeline),
        };

        Ok(Reading {
            id: None,
            object_id,
            timestamp: Some(timestamp),
            timestamp_source,
            measurements: Measurements {
                ph: measurement(1),
                alkalinity_mgl: measurement(2),
                conductivity_uscm: measurement(3),
                bod_mgl: measurement(4),
                nitrite_mgl: measurement(5),
                copper1_mgl: measurement(6),
                copper2_ugl: measurement(7),
                iron_ugl: measurement(8),
                zinc_ugl: measurement(9),
            },
        })
    }
}

fn parse_object_id(field: &str) -> Option<i64> {
    field.trim().parse::<i64>().ok()
}

fn parse_measurement(field: &str, column: usize, line: usize) -> Option<f64> {
    // ---
    let token = field.trim();
    if token.is_empty() {
        return None;
    }
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            tracing::debug!("Line {line}: column {column} value '{token}' is not a number");
            None
        }
    }
}

/// RFC 3339, or a zone-less ISO date-time taken as UTC.
fn parse_feed_timestamp(field: &str) -> Option<DateTime<Utc>> {
    // ---
    let token = field.trim();
    if token.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(token) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(token, fmt).ok())
        .map(|naive| naive.and_utc())
}
