use std::time::Instant;

use uuid::Uuid;

use crate::config::EngineConfig;
use crate::models::{
    ConsensusDiagnosis, ConsensusMetrics, LabAnalysisResult, ModelDifferential, RawLabResult,
};

use super::classifier::classify_raw_panel;
use super::consensus::aggregate;
use super::correlation::detect;
use super::matching::{DiagnosisMatcher, NameAndCodeMatcher};
use super::reference::ClinicalReferenceData;
use super::summary::build;
use super::triage::triage;
use super::types::{AnalysisEngine, ReasoningError};

/// Namespace for input fingerprints. Changing it changes every fingerprint.
const FINGERPRINT_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_2a9e_4b7d_4e0a_9c35_d2e8_71b4_0f66);

/// Default implementation of the analysis engine.
/// Runs classify, detect, triage, aggregate and summarize in sequence over
/// immutable reference data. Holds no per-run state.
pub struct DefaultAnalysisEngine {
    reference: ClinicalReferenceData,
    config: EngineConfig,
    matcher: Box<dyn DiagnosisMatcher>,
}

impl DefaultAnalysisEngine {
    pub fn new(reference: ClinicalReferenceData, config: EngineConfig) -> Self {
        Self {
            reference,
            config,
            matcher: Box::new(NameAndCodeMatcher),
        }
    }

    pub fn with_matcher(mut self, matcher: Box<dyn DiagnosisMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Build an engine from config, loading external reference tables when
    /// `resources_dir` is set and the bundled ones otherwise.
    pub fn from_config(config: EngineConfig) -> Result<Self, ReasoningError> {
        config.validate()?;
        let reference = match &config.resources_dir {
            Some(dir) => ClinicalReferenceData::load(dir)?,
            None => ClinicalReferenceData::bundled()?,
        };
        Ok(Self::new(reference, config))
    }

    pub fn reference(&self) -> &ClinicalReferenceData {
        &self.reference
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn fingerprint(
        &self,
        labs: &[RawLabResult],
        models: &[ModelDifferential],
    ) -> Result<Uuid, ReasoningError> {
        let bytes = serde_json::to_vec(&(labs, models, self.reference.versions()))
            .map_err(|e| ReasoningError::Serialization(e.to_string()))?;
        Ok(Uuid::new_v5(&FINGERPRINT_NAMESPACE, &bytes))
    }

    fn analyze(
        &self,
        labs: &[RawLabResult],
        models: Option<&[ModelDifferential]>,
    ) -> Result<LabAnalysisResult, ReasoningError> {
        if labs.is_empty() {
            return Err(ReasoningError::NoBiomarkers);
        }
        let start = Instant::now();

        let panel = classify_raw_panel(labs, &self.reference, &self.config.classifier);
        let correlations = detect(&panel.biomarkers, &self.reference.patterns.patterns);
        let triage = triage(&panel.biomarkers, &correlations);

        let (diagnoses, consensus_metrics): (Vec<ConsensusDiagnosis>, Option<ConsensusMetrics>) =
            match models {
                Some(models) => {
                    let outcome = aggregate(models, self.matcher.as_ref(), &self.config.consensus)?;
                    (outcome.diagnoses, Some(outcome.metrics))
                }
                None => (Vec::new(), None),
            };

        let summary = build(
            &panel.biomarkers,
            &correlations,
            &triage,
            consensus_metrics.as_ref(),
        );
        let input_fingerprint = self.fingerprint(labs, models.unwrap_or(&[]))?;

        tracing::info!(
            fingerprint = %input_fingerprint,
            biomarkers = panel.biomarkers.len(),
            excluded = panel.excluded.len(),
            correlations = correlations.len(),
            diagnoses = diagnoses.len(),
            urgency = %triage.urgency,
            risk_score = ?summary.overall_risk_score,
            processing_ms = start.elapsed().as_millis() as u64,
            "Analysis complete"
        );

        Ok(LabAnalysisResult {
            input_fingerprint,
            summary,
            triage,
            biomarkers: panel.biomarkers,
            excluded_biomarkers: panel.excluded,
            correlations,
            diagnoses,
            consensus_metrics,
            reference_versions: self.reference.versions(),
        })
    }
}

impl AnalysisEngine for DefaultAnalysisEngine {
    fn run_analysis(
        &self,
        labs: &[RawLabResult],
        models: &[ModelDifferential],
    ) -> Result<LabAnalysisResult, ReasoningError> {
        if models.is_empty() {
            return Err(ReasoningError::NoModelOutput);
        }
        self.analyze(labs, Some(models))
    }

    fn analyze_labs(&self, labs: &[RawLabResult]) -> Result<LabAnalysisResult, ReasoningError> {
        self.analyze(labs, None)
    }
}
