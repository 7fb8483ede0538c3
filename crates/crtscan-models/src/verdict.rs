//! Section verdict definitions.
//!
//! A verdict is produced once per closed section and is immutable afterwards.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Outcome category of an inspected section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SectionCategory {
    /// Screen handled cleanly.
    Pass,
    /// Screen broke during handling.
    Broken,
    /// Phosphor coating remained on the glass.
    PhosphorResidue,
    /// Cone glass remained attached.
    ConeResidue,
    /// Fog test section located (fog footage only).
    FogDetected,
}

impl SectionCategory {
    /// All categories, highest arbitration priority first.
    pub const ALL: &'static [SectionCategory] = &[
        SectionCategory::Broken,
        SectionCategory::ConeResidue,
        SectionCategory::PhosphorResidue,
        SectionCategory::Pass,
        SectionCategory::FogDetected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionCategory::Pass => "pass",
            SectionCategory::Broken => "broken",
            SectionCategory::PhosphorResidue => "phosphor_residue",
            SectionCategory::ConeResidue => "cone_residue",
            SectionCategory::FogDetected => "fog_detected",
        }
    }

    /// Label written to the `ExaminationResult` field of reports.
    pub fn label(&self) -> &'static str {
        match self {
            SectionCategory::Pass => "Pass",
            SectionCategory::Broken => "Broken",
            SectionCategory::PhosphorResidue => "PhosphorResidue",
            SectionCategory::ConeResidue => "ConeResidue",
            SectionCategory::FogDetected => "Fog",
        }
    }

    /// Returns true for categories that indicate a defect.
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            SectionCategory::Broken | SectionCategory::PhosphorResidue | SectionCategory::ConeResidue
        )
    }
}

impl fmt::Display for SectionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SectionCategory {
    type Err = SectionCategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pass" => Ok(SectionCategory::Pass),
            "broken" => Ok(SectionCategory::Broken),
            "phosphor_residue" | "phosphor" => Ok(SectionCategory::PhosphorResidue),
            "cone_residue" | "cone" => Ok(SectionCategory::ConeResidue),
            "fog_detected" | "fog" => Ok(SectionCategory::FogDetected),
            _ => Err(SectionCategoryParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown section category: {0}")]
pub struct SectionCategoryParseError(String);

/// Final judgement for one closed section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClassificationVerdict {
    /// Order of the section within its video (0-based).
    pub section_index: usize,
    pub category: SectionCategory,
    /// Residual-area percentage; only meaningful for `ConeResidue`.
    pub metric: f64,
    pub key_frame_index: u64,
    pub key_timestamp_ms: f64,
    pub section_start_index: u64,
    pub section_end_index: u64,
    pub section_start_ms: f64,
    pub section_end_ms: f64,
}

impl ClassificationVerdict {
    /// Section length in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        (self.section_end_ms - self.section_start_ms).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse() {
        assert_eq!("pass".parse::<SectionCategory>().unwrap(), SectionCategory::Pass);
        assert_eq!("cone".parse::<SectionCategory>().unwrap(), SectionCategory::ConeResidue);
        assert_eq!(
            "PHOSPHOR_RESIDUE".parse::<SectionCategory>().unwrap(),
            SectionCategory::PhosphorResidue
        );
        assert!("cracked".parse::<SectionCategory>().is_err());
    }

    #[test]
    fn test_category_defects() {
        assert!(SectionCategory::Broken.is_defect());
        assert!(!SectionCategory::Pass.is_defect());
        assert!(!SectionCategory::FogDetected.is_defect());
        assert_eq!(SectionCategory::ALL[0], SectionCategory::Broken);
    }

    #[test]
    fn test_verdict_duration() {
        let verdict = ClassificationVerdict {
            section_index: 0,
            category: SectionCategory::Pass,
            metric: 0.0,
            key_frame_index: 40,
            key_timestamp_ms: 1333.3,
            section_start_index: 10,
            section_end_index: 40,
            section_start_ms: 333.3,
            section_end_ms: 1333.3,
        };
        assert!((verdict.duration_ms() - 1000.0).abs() < 1e-6);
    }
}
