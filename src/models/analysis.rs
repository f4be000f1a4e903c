use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::biomarker::{ExcludedBiomarker, ExtractedBiomarker};
use super::correlation::ClinicalCorrelation;
use super::diagnosis::{ConsensusDiagnosis, ConsensusMetrics};
use super::triage::TriageResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub critical: usize,
    pub attention: usize,
    pub normal: usize,
    /// 0–100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_risk_score: Option<u8>,
}

impl AnalysisSummary {
    pub fn total(&self) -> usize {
        self.critical + self.attention + self.normal
    }
}

/// Versions of the reference tables a result was computed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceVersions {
    pub markers: String,
    pub patterns: String,
}

/// Root aggregate of one analysis run. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabAnalysisResult {
    /// Deterministic fingerprint of the inputs, usable as a cache key.
    pub input_fingerprint: Uuid,
    pub summary: AnalysisSummary,
    pub triage: TriageResult,
    pub biomarkers: Vec<ExtractedBiomarker>,
    pub excluded_biomarkers: Vec<ExcludedBiomarker>,
    pub correlations: Vec<ClinicalCorrelation>,
    pub diagnoses: Vec<ConsensusDiagnosis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_metrics: Option<ConsensusMetrics>,
    pub reference_versions: ReferenceVersions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_total() {
        let summary = AnalysisSummary {
            critical: 1,
            attention: 3,
            normal: 10,
            overall_risk_score: None,
        };
        assert_eq!(summary.total(), 14);
    }
}
