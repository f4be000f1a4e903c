//! Diagnosis source harness.
//!
//! Reasoning models are external collaborators. Each is wrapped in a
//! [`DiagnosisSource`]; `gather_differentials` queries all of them in
//! parallel under a shared timeout and hands whatever came back to the
//! aggregator. A slow or failing model never blocks the others.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    ClinicalCorrelation, ExtractedBiomarker, LabAnalysisResult, ModelDifferential,
    ProposedDiagnosis, RawLabResult, TriageResult,
};
use crate::reasoning::{AnalysisEngine, DefaultAnalysisEngine, ReasoningError};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),
}

/// The lab-side picture handed to every reasoning model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseContext {
    pub biomarkers: Vec<ExtractedBiomarker>,
    pub correlations: Vec<ClinicalCorrelation>,
    pub triage: TriageResult,
}

impl CaseContext {
    pub fn from_result(result: &LabAnalysisResult) -> Self {
        Self {
            biomarkers: result.biomarkers.clone(),
            correlations: result.correlations.clone(),
            triage: result.triage.clone(),
        }
    }
}

/// One reasoning model (allows mocking).
pub trait DiagnosisSource: Send + Sync {
    fn model_name(&self) -> &str;

    fn generate(&self, case: &CaseContext) -> Result<Vec<ProposedDiagnosis>, SourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureKind {
    TimedOut,
    Failed(String),
    Panicked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub model: String,
    pub kind: FailureKind,
}

#[derive(Debug, Clone, Default)]
pub struct GatheredDifferentials {
    /// Successful outputs, in source order, with measured processing time.
    pub outputs: Vec<ModelDifferential>,
    pub failures: Vec<SourceFailure>,
}

/// Query every source concurrently. Each runs on the blocking pool and is
/// abandoned once `timeout` elapses.
pub async fn gather_differentials(
    sources: Vec<Arc<dyn DiagnosisSource>>,
    case: Arc<CaseContext>,
    timeout: Duration,
) -> GatheredDifferentials {
    let tasks = sources.into_iter().map(|source| {
        let case = Arc::clone(&case);
        async move {
            let model = source.model_name().to_string();
            let start = Instant::now();
            let handle = tokio::task::spawn_blocking(move || source.generate(&case));

            let outcome = match tokio::time::timeout(timeout, handle).await {
                Err(_) => Err(FailureKind::TimedOut),
                Ok(Err(join_error)) if join_error.is_panic() => Err(FailureKind::Panicked),
                Ok(Err(join_error)) => Err(FailureKind::Failed(join_error.to_string())),
                Ok(Ok(Err(e))) => Err(FailureKind::Failed(e.to_string())),
                Ok(Ok(Ok(diagnoses))) => Ok(diagnoses),
            };
            (model, start.elapsed().as_millis() as u64, outcome)
        }
    });

    let mut gathered = GatheredDifferentials::default();
    for (model, elapsed_ms, outcome) in join_all(tasks).await {
        match outcome {
            Ok(diagnoses) => {
                tracing::debug!(
                    model = %model,
                    diagnoses = diagnoses.len(),
                    processing_ms = elapsed_ms,
                    "Model differential received"
                );
                gathered.outputs.push(ModelDifferential {
                    model,
                    diagnoses,
                    processing_time_ms: Some(elapsed_ms),
                });
            }
            Err(kind) => {
                tracing::warn!(model = %model, failure = ?kind, "Diagnosis source failed");
                gathered.failures.push(SourceFailure { model, kind });
            }
        }
    }

    tracing::info!(
        succeeded = gathered.outputs.len(),
        failed = gathered.failures.len(),
        "Differentials gathered"
    );
    gathered
}

/// Full analysis plus the sources that produced nothing.
#[derive(Debug, Clone)]
pub struct SourcedAnalysis {
    pub result: LabAnalysisResult,
    pub failures: Vec<SourceFailure>,
}

/// Analyze the labs, hand the case to every source under the engine's
/// configured per-source timeout, then aggregate whatever came back.
///
/// Fails with `NoModelOutput` when no source produced a list.
pub async fn analyze_with_sources(
    engine: &DefaultAnalysisEngine,
    labs: &[RawLabResult],
    sources: Vec<Arc<dyn DiagnosisSource>>,
) -> Result<SourcedAnalysis, ReasoningError> {
    let lab_result = engine.analyze_labs(labs)?;
    let case = Arc::new(CaseContext::from_result(&lab_result));

    let gathered = gather_differentials(sources, case, engine.config().sources.timeout()).await;
    let result = engine.run_analysis(labs, &gathered.outputs)?;

    Ok(SourcedAnalysis {
        result,
        failures: gathered.failures,
    })
}

/// Find the JSON payload in free-form model output.
/// Accepts fenced blocks, a bare array or a bare object.
fn extract_json_block(response: &str) -> Result<&str, SourceError> {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return Ok(after_fence[..end].trim());
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            let block = after_fence[..end].trim();
            if block.starts_with('{') || block.starts_with('[') {
                return Ok(block);
            }
        }
    }

    for (open, close) in [('[', ']'), ('{', '}')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if start < end {
                return Ok(&trimmed[start..=end]);
            }
        }
    }

    Err(SourceError::InvalidResponse(
        "No JSON block found in model response".to_string(),
    ))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DifferentialPayload {
    List(Vec<ProposedDiagnosis>),
    Wrapped { diagnoses: Vec<ProposedDiagnosis> },
}

/// Parse a model's text response into its ranked list.
pub fn parse_differential(response: &str) -> Result<Vec<ProposedDiagnosis>, SourceError> {
    let block = extract_json_block(response)?;
    let payload: DifferentialPayload = serde_json::from_str(block)
        .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;
    Ok(match payload {
        DifferentialPayload::List(diagnoses) => diagnoses,
        DifferentialPayload::Wrapped { diagnoses } => diagnoses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Urgency, Workflow};

    struct MockSource {
        name: String,
        response: Result<Vec<ProposedDiagnosis>, String>,
        delay: Duration,
    }

    impl MockSource {
        fn ok(name: &str, diagnoses: &[&str]) -> Self {
            Self {
                name: name.to_string(),
                response: Ok(diagnoses
                    .iter()
                    .map(|d| ProposedDiagnosis::named(d, 70.0))
                    .collect()),
                delay: Duration::ZERO,
            }
        }

        fn failing(name: &str) -> Self {
            Self {
                name: name.to_string(),
                response: Err("connection refused".to_string()),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    impl DiagnosisSource for MockSource {
        fn model_name(&self) -> &str {
            &self.name
        }

        fn generate(&self, _case: &CaseContext) -> Result<Vec<ProposedDiagnosis>, SourceError> {
            std::thread::sleep(self.delay);
            self.response
                .clone()
                .map_err(SourceError::Unavailable)
        }
    }

    struct PanickingSource;

    impl DiagnosisSource for PanickingSource {
        fn model_name(&self) -> &str {
            "panicky"
        }

        fn generate(&self, _case: &CaseContext) -> Result<Vec<ProposedDiagnosis>, SourceError> {
            panic!("model adapter bug");
        }
    }

    fn case() -> Arc<CaseContext> {
        Arc::new(CaseContext {
            biomarkers: vec![],
            correlations: vec![],
            triage: TriageResult {
                urgency: Urgency::Routine,
                red_flags: vec![],
                recommended_workflow: Workflow::Primary,
                confidence: 40,
            },
        })
    }

    #[tokio::test]
    async fn gathers_all_successful_sources_in_order() {
        let sources: Vec<Arc<dyn DiagnosisSource>> = vec![
            Arc::new(MockSource::ok("model-a", &["Hipotireoidismo"])),
            Arc::new(MockSource::ok("model-b", &["Hipotireoidismo", "Anemia"])),
        ];
        let gathered = gather_differentials(sources, case(), Duration::from_secs(5)).await;
        assert!(gathered.failures.is_empty());
        let models: Vec<&str> = gathered.outputs.iter().map(|o| o.model.as_str()).collect();
        assert_eq!(models, vec!["model-a", "model-b"]);
        assert!(gathered.outputs.iter().all(|o| o.processing_time_ms.is_some()));
        assert_eq!(gathered.outputs[1].diagnoses.len(), 2);
    }

    #[tokio::test]
    async fn slow_source_times_out_without_blocking_others() {
        let sources: Vec<Arc<dyn DiagnosisSource>> = vec![
            Arc::new(MockSource::ok("fast", &["A"])),
            Arc::new(MockSource::ok("slow", &["B"]).with_delay(Duration::from_millis(800))),
        ];
        let start = Instant::now();
        let gathered = gather_differentials(sources, case(), Duration::from_millis(100)).await;
        assert!(start.elapsed() < Duration::from_millis(700));
        assert_eq!(gathered.outputs.len(), 1);
        assert_eq!(gathered.outputs[0].model, "fast");
        assert_eq!(
            gathered.failures,
            vec![SourceFailure {
                model: "slow".into(),
                kind: FailureKind::TimedOut
            }]
        );
    }

    #[tokio::test]
    async fn failing_and_panicking_sources_reported() {
        let sources: Vec<Arc<dyn DiagnosisSource>> = vec![
            Arc::new(MockSource::failing("down")),
            Arc::new(PanickingSource),
            Arc::new(MockSource::ok("up", &["A"])),
        ];
        let gathered = gather_differentials(sources, case(), Duration::from_secs(5)).await;
        assert_eq!(gathered.outputs.len(), 1);
        assert_eq!(gathered.failures.len(), 2);
        assert!(matches!(gathered.failures[0].kind, FailureKind::Failed(ref msg) if msg.contains("connection refused")));
        assert_eq!(gathered.failures[1].kind, FailureKind::Panicked);
    }

    #[tokio::test]
    async fn no_sources_gathers_nothing() {
        let gathered = gather_differentials(Vec::new(), case(), Duration::from_secs(1)).await;
        assert!(gathered.outputs.is_empty());
        assert!(gathered.failures.is_empty());
    }

    fn engine_with_timeout(secs: u64) -> DefaultAnalysisEngine {
        let mut config = crate::config::EngineConfig::default();
        config.sources.model_timeout_secs = secs;
        DefaultAnalysisEngine::from_config(config).unwrap()
    }

    fn labs() -> Vec<RawLabResult> {
        vec![
            RawLabResult {
                name: "TSH".into(),
                value: 7.8,
                unit: Some("mUI/L".into()),
                reference_range: None,
            },
            RawLabResult {
                name: "T4 Livre".into(),
                value: 0.8,
                unit: Some("ng/dL".into()),
                reference_range: None,
            },
        ]
    }

    #[tokio::test]
    async fn analyze_with_sources_uses_configured_timeout() {
        let engine = engine_with_timeout(1);
        let sources: Vec<Arc<dyn DiagnosisSource>> = vec![
            Arc::new(MockSource::ok("model-a", &["Hipotireoidismo"])),
            Arc::new(MockSource::ok("model-b", &["Hipotireoidismo"])),
            Arc::new(MockSource::ok("slow", &["Anemia"]).with_delay(Duration::from_millis(1500))),
        ];
        let start = Instant::now();
        let sourced = analyze_with_sources(&engine, &labs(), sources).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(1400));

        let metrics = sourced.result.consensus_metrics.unwrap();
        assert_eq!(metrics.models_used, vec!["model-a", "model-b"]);
        assert_eq!(sourced.result.diagnoses.len(), 1);
        assert_eq!(
            sourced.failures,
            vec![SourceFailure {
                model: "slow".into(),
                kind: FailureKind::TimedOut
            }]
        );
    }

    #[tokio::test]
    async fn analyze_with_sources_fails_when_every_source_fails() {
        let engine = engine_with_timeout(5);
        let sources: Vec<Arc<dyn DiagnosisSource>> = vec![
            Arc::new(MockSource::failing("down")),
            Arc::new(PanickingSource),
        ];
        let err = analyze_with_sources(&engine, &labs(), sources).await.unwrap_err();
        assert!(matches!(err, ReasoningError::NoModelOutput));
    }

    #[test]
    fn parse_bare_array() {
        let diagnoses =
            parse_differential(r#"[{"name": "Hipotireoidismo", "icd10": "E03.9", "confidence": 80}]"#)
                .unwrap();
        assert_eq!(diagnoses.len(), 1);
        assert_eq!(diagnoses[0].icd10.as_deref(), Some("E03.9"));
    }

    #[test]
    fn parse_fenced_wrapped_object() {
        let text = "Segue o diferencial:\n```json\n{\"diagnoses\": [{\"name\": \"Anemia ferropriva\", \"rank\": 1}]}\n```\n";
        let diagnoses = parse_differential(text).unwrap();
        assert_eq!(diagnoses[0].name, "Anemia ferropriva");
        assert_eq!(diagnoses[0].rank, Some(1));
    }

    #[test]
    fn parse_rejects_prose() {
        let err = parse_differential("Não foi possível avaliar o caso.").unwrap_err();
        assert!(matches!(err, SourceError::InvalidResponse(_)));
    }

    #[test]
    fn case_context_from_result() {
        let engine = crate::reasoning::DefaultAnalysisEngine::from_config(Default::default()).unwrap();
        let labs = vec![crate::models::RawLabResult {
            name: "TSH".into(),
            value: 7.8,
            unit: Some("mUI/L".into()),
            reference_range: None,
        }];
        let result = crate::reasoning::AnalysisEngine::analyze_labs(&engine, &labs).unwrap();
        let case = CaseContext::from_result(&result);
        assert_eq!(case.biomarkers.len(), 1);
        assert_eq!(case.triage, result.triage);
    }
}
