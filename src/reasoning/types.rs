use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    BiomarkerStatus, ConsensusDiagnosis, ConsensusMetrics, ExcludedBiomarker, ExtractedBiomarker,
    LabAnalysisResult, ModelDifferential, RawLabResult,
};

// ---------------------------------------------------------------------------
// ClassifiedPanel
// ---------------------------------------------------------------------------

/// Output of classifying a whole lab panel.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedPanel {
    pub biomarkers: Vec<ExtractedBiomarker>,
    pub excluded: Vec<ExcludedBiomarker>,
}

impl ClassifiedPanel {
    pub fn count(&self, status: BiomarkerStatus) -> usize {
        self.biomarkers.iter().filter(|b| b.status == status).count()
    }
}

// ---------------------------------------------------------------------------
// Consensus output
// ---------------------------------------------------------------------------

/// A model entry dropped during aggregation. Warning-level, never fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MalformedEntry {
    pub model: String,
    /// 1-indexed position in the model's list; 0 when the whole list was rejected.
    pub position: usize,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ConsensusOutcome {
    pub diagnoses: Vec<ConsensusDiagnosis>,
    pub metrics: ConsensusMetrics,
    pub malformed: Vec<MalformedEntry>,
}

// ---------------------------------------------------------------------------
// ReasoningError
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ReasoningError {
    #[error("Invalid reference range for {marker}: {reason}")]
    InvalidRange { marker: String, reason: String },

    #[error("No model output supplied, cannot build a consensus")]
    NoModelOutput,

    #[error("No biomarkers supplied")]
    NoBiomarkers,

    #[error("Reference data load failed ({0}): {1}")]
    ReferenceDataLoad(String, String),

    #[error("Reference data parse failed ({0}): {1}")]
    ReferenceDataParse(String, String),

    #[error("Reference data invalid ({0}): {1}")]
    ReferenceDataInvalid(String, String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid {field} value: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// ---------------------------------------------------------------------------
// AnalysisEngine trait
// ---------------------------------------------------------------------------

/// The single outward entry point of the reasoning core.
pub trait AnalysisEngine {
    /// Full run: labs plus one ranked differential per model.
    fn run_analysis(
        &self,
        labs: &[RawLabResult],
        models: &[ModelDifferential],
    ) -> Result<LabAnalysisResult, ReasoningError>;

    /// Lab-only run, used to build the case handed to diagnosis sources.
    fn analyze_labs(&self, labs: &[RawLabResult]) -> Result<LabAnalysisResult, ReasoningError>;
}
