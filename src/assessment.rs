//! Safety assessment of a single reading against WHO drinking-water limits.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Measurements, Reading};

// ---

/// WHO guideline limits and unit conversion factors.
pub mod limits {
    pub const MIN_PH: f64 = 6.5;
    pub const MAX_PH: f64 = 8.5;

    /// mg/L
    pub const MAX_ALKALINITY_MG_L: f64 = 500.0;

    /// µS/cm
    pub const MAX_CONDUCTIVITY_US_CM: f64 = 2000.0;

    /// mg/L, exclusive: a reading of exactly 1.0 is a violation.
    pub const MAX_NITRITE_MG_L: f64 = 1.0;

    /// mg/L
    pub const MAX_TDS_MG_L: f64 = 1000.0;

    pub const UG_L_TO_MG_L: f64 = 0.001;
}

/// How a missing TDS operand is treated. One policy is held per deployment
/// and shared by assessment and aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TdsPolicy {
    /// Missing operands contribute 0.
    #[default]
    MissingAsZero,
    /// Any missing operand makes TDS unknown; the TDS check then passes.
    MissingIsUnknown,
}

impl FromStr for TdsPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s.trim().to_ascii_lowercase().as_str() {
            "missing-as-zero" | "zero" => Ok(TdsPolicy::MissingAsZero),
            "missing-is-unknown" | "unknown" => Ok(TdsPolicy::MissingIsUnknown),
            other => Err(format!(
                "'{other}' (expected missing-as-zero or missing-is-unknown)"
            )),
        }
    }
}

impl fmt::Display for TdsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TdsPolicy::MissingAsZero => f.write_str("missing-as-zero"),
            TdsPolicy::MissingIsUnknown => f.write_str("missing-is-unknown"),
        }
    }
}

/// `copper1 (mg/L) + (copper2 + iron + zinc) (µg/L) * 0.001`, in mg/L.
pub fn total_dissolved_solids(m: &Measurements, policy: TdsPolicy) -> Option<f64> {
    // ---
    let operands = [m.copper1_mgl, m.copper2_ugl, m.iron_ugl, m.zinc_ugl];
    if policy == TdsPolicy::MissingIsUnknown && operands.iter().any(Option::is_none) {
        return None;
    }

    let copper1 = m.copper1_mgl.unwrap_or(0.0);
    let micrograms =
        m.copper2_ugl.unwrap_or(0.0) + m.iron_ugl.unwrap_or(0.0) + m.zinc_ugl.unwrap_or(0.0);
    Some(copper1 + micrograms * limits::UG_L_TO_MG_L)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyStatus {
    Safe,
    Unsafe,
}

impl SafetyStatus {
    /// Traffic-light flag used in logs and by older dashboards.
    pub fn flag(&self) -> &'static str {
        match self {
            SafetyStatus::Safe => "GREEN",
            SafetyStatus::Unsafe => "RED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    // ---
    pub record_ref: Option<Uuid>,
    pub object_id: Option<i64>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub measurements: Measurements,
    pub total_dissolved_solids: Option<f64>,
    pub status: SafetyStatus,
    /// Empty iff `status` is `Safe`.
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyAssessor {
    tds_policy: TdsPolicy,
}

impl SafetyAssessor {
    pub fn new(tds_policy: TdsPolicy) -> Self {
        Self { tds_policy }
    }

    pub fn tds_policy(&self) -> TdsPolicy {
        self.tds_policy
    }

    /// Evaluate every check independently. A missing value passes its check.
    pub fn assess(&self, reading: &Reading) -> AssessmentResult {
        // ---
        let m = &reading.measurements;
        let tds = total_dissolved_solids(m, self.tds_policy);
        let mut issues = Vec::new();

        if let Some(ph) = m.ph {
            if !(limits::MIN_PH..=limits::MAX_PH).contains(&ph) {
                issues.push(format!(
                    "pH out of range ({ph:.2}, safe range {:.2}-{:.2})",
                    limits::MIN_PH,
                    limits::MAX_PH
                ));
            }
        }

        if let Some(alkalinity) = m.alkalinity_mgl {
            if alkalinity > limits::MAX_ALKALINITY_MG_L {
                issues.push(format!(
                    "alkalinity exceeds limit ({alkalinity:.2} mg/L > {:.2} mg/L)",
                    limits::MAX_ALKALINITY_MG_L
                ));
            }
        }

        if let Some(conductivity) = m.conductivity_uscm {
            if conductivity > limits::MAX_CONDUCTIVITY_US_CM {
                issues.push(format!(
                    "conductivity exceeds limit ({conductivity:.2} µS/cm > {:.2} µS/cm)",
                    limits::MAX_CONDUCTIVITY_US_CM
                ));
            }
        }

        if let Some(nitrite) = m.nitrite_mgl {
            if nitrite >= limits::MAX_NITRITE_MG_L {
                issues.push(format!(
                    "nitrite exceeds limit ({nitrite:.3} mg/L, must stay below {:.2} mg/L)",
                    limits::MAX_NITRITE_MG_L
                ));
            }
        }

        if let Some(tds) = tds {
            if tds > limits::MAX_TDS_MG_L {
                issues.push(format!(
                    "TDS exceeds limit ({tds:.2} mg/L > {:.2} mg/L)",
                    limits::MAX_TDS_MG_L
                ));
            }
        }

        let status = if issues.is_empty() {
            SafetyStatus::Safe
        } else {
            SafetyStatus::Unsafe
        };

        tracing::debug!(
            "Assessed object {:?}: TDS {:?} mg/L, status {}",
            reading.object_id,
            tds,
            status.flag()
        );

        AssessmentResult {
            record_ref: reading.id,
            object_id: reading.object_id,
            timestamp: reading.timestamp,
            measurements: *m,
            total_dissolved_solids: tds,
            status,
            issues,
        }
    }
}
