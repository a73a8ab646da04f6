//! Data models for the water-quality pipeline.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::QueryError;

// ---

/// Where a reading's timestamp came from.
///
/// The deduplication guard keys on `(object_id, timestamp)` only when the
/// feed supplied the timestamp; a pipeline-assigned instant is unique per
/// run and would never match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    Feed,
    #[default]
    Pipeline,
}

impl TimestampSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampSource::Feed => "feed",
            TimestampSource::Pipeline => "pipeline",
        }
    }

    /// Lenient decoding of the stored column; unknown values count as pipeline.
    pub fn from_column(value: &str) -> Self {
        match value {
            "feed" => TimestampSource::Feed,
            _ => TimestampSource::Pipeline,
        }
    }
}

/// The nine measured values of one sample. Missing values stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    // ---
    pub ph: Option<f64>,
    pub alkalinity_mgl: Option<f64>,
    pub conductivity_uscm: Option<f64>,
    pub bod_mgl: Option<f64>,
    pub nitrite_mgl: Option<f64>,
    pub copper1_mgl: Option<f64>,
    pub copper2_ugl: Option<f64>,
    pub iron_ugl: Option<f64>,
    pub zinc_ugl: Option<f64>,
}

impl Measurements {
    /// Raw value for a measured parameter. `Tds` is derived and yields `None`
    /// here; see [`crate::assessment::total_dissolved_solids`].
    pub fn get(&self, parameter: Parameter) -> Option<f64> {
        // ---
        match parameter {
            Parameter::Ph => self.ph,
            Parameter::Alkalinity => self.alkalinity_mgl,
            Parameter::Conductivity => self.conductivity_uscm,
            Parameter::Bod => self.bod_mgl,
            Parameter::Nitrite => self.nitrite_mgl,
            Parameter::CopperMgl => self.copper1_mgl,
            Parameter::CopperUgl => self.copper2_ugl,
            Parameter::IronUgl => self.iron_ugl,
            Parameter::ZincUgl => self.zinc_ugl,
            Parameter::Tds => None,
        }
    }
}

/// One sensor sample as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    // ---
    /// Store-generated identifier, `None` until saved.
    #[serde(default)]
    pub id: Option<Uuid>,

    pub object_id: Option<i64>,

    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub timestamp_source: TimestampSource,

    #[serde(flatten)]
    pub measurements: Measurements,
}

/// Logical identity of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub object_id: i64,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn natural_key(&self) -> Option<NaturalKey> {
        // ---
        Some(NaturalKey {
            object_id: self.object_id?,
            timestamp: self.timestamp?,
        })
    }
}

/// Queryable parameter names, including the derived TDS value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parameter {
    Ph,
    Alkalinity,
    Conductivity,
    Bod,
    Nitrite,
    CopperMgl,
    CopperUgl,
    IronUgl,
    ZincUgl,
    Tds,
}

impl Parameter {
    pub const ALL: [Parameter; 10] = [
        Parameter::Ph,
        Parameter::Alkalinity,
        Parameter::Conductivity,
        Parameter::Bod,
        Parameter::Nitrite,
        Parameter::CopperMgl,
        Parameter::CopperUgl,
        Parameter::IronUgl,
        Parameter::ZincUgl,
        Parameter::Tds,
    ];

    pub fn name(&self) -> &'static str {
        // ---
        match self {
            Parameter::Ph => "ph",
            Parameter::Alkalinity => "alkalinity",
            Parameter::Conductivity => "conductivity",
            Parameter::Bod => "bod",
            Parameter::Nitrite => "nitrite",
            Parameter::CopperMgl => "copper_mgl",
            Parameter::CopperUgl => "copper_ugl",
            Parameter::IronUgl => "iron_ugl",
            Parameter::ZincUgl => "zinc_ugl",
            Parameter::Tds => "tds",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Parameter {
    type Err = QueryError;

    /// Case-insensitive; also accepts the older camel-style names
    /// (`copperMgL`, `ironUgL`, ...) that existing clients send.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        let parameter = match s.trim().to_ascii_lowercase().as_str() {
            "ph" => Parameter::Ph,
            "alkalinity" => Parameter::Alkalinity,
            "conductivity" => Parameter::Conductivity,
            "bod" => Parameter::Bod,
            "nitrite" | "nitrite_n" => Parameter::Nitrite,
            "copper_mgl" | "coppermgl" => Parameter::CopperMgl,
            "copper_ugl" | "copperugl" => Parameter::CopperUgl,
            "iron_ugl" | "ironugl" => Parameter::IronUgl,
            "zinc_ugl" | "zincugl" => Parameter::ZincUgl,
            "tds" => Parameter::Tds,
            _ => return Err(QueryError::UnknownParameter(s.to_string())),
        };
        Ok(parameter)
    }
}
