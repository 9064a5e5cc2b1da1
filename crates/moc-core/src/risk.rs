//! # Risk Assessment Engine
//!
//! Classifies a change on the severity x probability risk matrix.
//!
//! - `risk_code` is the probability letter (`A` = 1) followed by the severity
//!   number, e.g. probability 3 and severity 4 give `C4`
//! - `band` is bucketed from the product `severity * probability`
//!
//! The engine is a pure function with no memory of prior calls. It returns
//! the symbolic band only; colors and styles belong to the renderer.

use crate::MocError;
use crate::primitives::{HIGH_BAND_MAX, LOW_BAND_MAX, MAX_RISK_LEVEL, MEDIUM_BAND_MAX, MIN_RISK_LEVEL};
use serde::{Deserialize, Serialize};

// =============================================================================
// RISK BAND
// =============================================================================

/// Categorical risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskBand {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskBand {
    /// Bucket a severity x probability product.
    #[must_use]
    pub fn from_product(product: u8) -> Self {
        if product <= LOW_BAND_MAX {
            RiskBand::Low
        } else if product <= MEDIUM_BAND_MAX {
            RiskBand::Medium
        } else if product <= HIGH_BAND_MAX {
            RiskBand::High
        } else {
            RiskBand::Critical
        }
    }

    /// Get the band name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            RiskBand::Low => "Low",
            RiskBand::Medium => "Medium",
            RiskBand::High => "High",
            RiskBand::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for RiskBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// RISK INPUT
// =============================================================================

/// An unvalidated `(severity, probability)` pair as entered at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RiskInput {
    pub severity: u8,
    pub probability: u8,
}

impl RiskInput {
    /// Create a new input pair.
    #[must_use]
    pub const fn new(severity: u8, probability: u8) -> Self {
        Self {
            severity,
            probability,
        }
    }

    /// Run the pair through the engine.
    pub fn assess(&self) -> Result<RiskAssessment, MocError> {
        assess_risk(self.severity, self.probability)
    }
}

// =============================================================================
// RISK ASSESSMENT
// =============================================================================

/// An immutable risk classification.
///
/// Only [`assess_risk`] constructs one; to change it, assess a new pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RiskAssessment {
    severity: u8,
    probability: u8,
    risk_code: String,
    band: RiskBand,
}

impl RiskAssessment {
    /// Severity level (1..=4).
    #[must_use]
    pub fn severity(&self) -> u8 {
        self.severity
    }

    /// Probability level (1..=4).
    #[must_use]
    pub fn probability(&self) -> u8 {
        self.probability
    }

    /// Matrix cell code, e.g. `C4`.
    #[must_use]
    pub fn risk_code(&self) -> &str {
        &self.risk_code
    }

    /// Categorical band.
    #[must_use]
    pub fn band(&self) -> RiskBand {
        self.band
    }

    /// Severity x probability.
    #[must_use]
    pub fn product(&self) -> u8 {
        self.severity.saturating_mul(self.probability)
    }

    /// Check whether this assessment sits in a strictly lower band than `other`.
    #[must_use]
    pub fn is_reduction_of(&self, other: &RiskAssessment) -> bool {
        self.band < other.band
    }
}

// =============================================================================
// ENGINE
// =============================================================================

fn in_range(level: u8) -> bool {
    (MIN_RISK_LEVEL..=MAX_RISK_LEVEL).contains(&level)
}

/// Letter for a probability level (`1` -> `A`), or `None` when out of range.
#[must_use]
pub fn probability_letter(probability: u8) -> Option<char> {
    if !in_range(probability) {
        return None;
    }
    let offset = probability - MIN_RISK_LEVEL;
    Some(char::from(b'A'.saturating_add(offset)))
}

/// Classify a `(severity, probability)` pair.
///
/// Returns `MocError::InvalidRiskInput` if either level is outside
/// `MIN_RISK_LEVEL..=MAX_RISK_LEVEL`; no assessment is produced in that case.
pub fn assess_risk(severity: u8, probability: u8) -> Result<RiskAssessment, MocError> {
    let invalid = MocError::InvalidRiskInput {
        severity,
        probability,
    };
    if !in_range(severity) {
        return Err(invalid);
    }
    let letter = probability_letter(probability).ok_or(invalid)?;

    let product = severity.saturating_mul(probability);

    Ok(RiskAssessment {
        severity,
        probability,
        risk_code: format!("{}{}", letter, severity),
        band: RiskBand::from_product(product),
    })
}

/// The full matrix, one row per probability level (`A` first), one column
/// per severity level.
#[must_use]
pub fn risk_matrix() -> Vec<Vec<RiskAssessment>> {
    (MIN_RISK_LEVEL..=MAX_RISK_LEVEL)
        .map(|probability| {
            (MIN_RISK_LEVEL..=MAX_RISK_LEVEL)
                .filter_map(|severity| assess_risk(severity, probability).ok())
                .collect()
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
