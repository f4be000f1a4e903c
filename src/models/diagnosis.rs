use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::enums::ConsensusLevel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferentialDiagnosis {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icd10: Option<String>,
    /// 0–100.
    pub confidence: f64,
    #[serde(default)]
    pub supporting_evidence: Vec<String>,
    #[serde(default)]
    pub contradicting_evidence: Vec<String>,
    #[serde(default)]
    pub suggested_tests: Vec<String>,
}

/// One entry of a model's ranked list, as returned by the model service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedDiagnosis {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icd10: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Explicit 1-indexed rank. Falls back to array position when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub supporting_evidence: Vec<String>,
    #[serde(default)]
    pub contradicting_evidence: Vec<String>,
    #[serde(default)]
    pub suggested_tests: Vec<String>,
}

impl ProposedDiagnosis {
    pub fn named(name: &str, confidence: f64) -> Self {
        Self {
            name: name.to_string(),
            icd10: None,
            confidence: Some(confidence),
            rank: None,
            reasoning: None,
            supporting_evidence: Vec::new(),
            contradicting_evidence: Vec::new(),
            suggested_tests: Vec::new(),
        }
    }

    pub fn with_icd10(mut self, code: &str) -> Self {
        self.icd10 = Some(code.to_string());
        self
    }
}

/// One reasoning model's ranked differential for a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDifferential {
    pub model: String,
    pub diagnoses: Vec<ProposedDiagnosis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

/// Per-model contribution recorded on a consensus item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDetail {
    pub rank: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusDiagnosis {
    #[serde(flatten)]
    pub diagnosis: DifferentialDiagnosis,
    pub aggregate_score: f64,
    pub consensus_level: ConsensusLevel,
    /// Keyed by model name; ordered so serialization is stable.
    pub model_details: BTreeMap<String, ModelDetail>,
}

impl ConsensusDiagnosis {
    pub fn name(&self) -> &str {
        &self.diagnosis.name
    }

    /// Ranks of every contributing model, ascending.
    pub fn ranks(&self) -> Vec<u32> {
        let mut ranks: Vec<u32> = self.model_details.values().map(|d| d.rank).collect();
        ranks.sort_unstable();
        ranks
    }
}

/// Run-level summary of one aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConsensusMetrics {
    pub models_used: Vec<String>,
    /// 0–100.
    pub strong_consensus_rate: f64,
    pub moderate_consensus_count: usize,
    pub divergent_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divergent_diagnoses: Option<Vec<String>>,
    pub total_processing_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_timings: Option<BTreeMap<String, u64>>,
    pub malformed_entries_dropped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposed_diagnosis_minimal_json() {
        let dx: ProposedDiagnosis =
            serde_json::from_str(r#"{"name": "Hipotireoidismo"}"#).unwrap();
        assert_eq!(dx.name, "Hipotireoidismo");
        assert!(dx.confidence.is_none());
        assert!(dx.rank.is_none());
        assert!(dx.suggested_tests.is_empty());
    }

    #[test]
    fn consensus_diagnosis_flattens_base_fields() {
        let mut details = BTreeMap::new();
        details.insert(
            "model-a".to_string(),
            ModelDetail {
                rank: 1,
                confidence: Some(90.0),
                reasoning: None,
            },
        );
        let dx = ConsensusDiagnosis {
            diagnosis: DifferentialDiagnosis {
                name: "Diabetes Mellitus tipo 2".into(),
                icd10: Some("E11".into()),
                confidence: 90.0,
                supporting_evidence: vec![],
                contradicting_evidence: vec![],
                suggested_tests: vec![],
            },
            aggregate_score: 1.0,
            consensus_level: ConsensusLevel::Single,
            model_details: details,
        };
        let json = serde_json::to_value(&dx).unwrap();
        assert_eq!(json["name"], "Diabetes Mellitus tipo 2");
        assert_eq!(json["icd10"], "E11");
        assert_eq!(json["consensus_level"], "single");
        assert_eq!(json["model_details"]["model-a"]["rank"], 1);
    }

    #[test]
    fn ranks_sorted() {
        let mut details = BTreeMap::new();
        for (model, rank) in [("b", 3), ("a", 1)] {
            details.insert(
                model.to_string(),
                ModelDetail {
                    rank,
                    confidence: None,
                    reasoning: None,
                },
            );
        }
        let dx = ConsensusDiagnosis {
            diagnosis: DifferentialDiagnosis {
                name: "x".into(),
                icd10: None,
                confidence: 0.0,
                supporting_evidence: vec![],
                contradicting_evidence: vec![],
                suggested_tests: vec![],
            },
            aggregate_score: 1.333,
            consensus_level: ConsensusLevel::Weak,
            model_details: details,
        };
        assert_eq!(dx.ranks(), vec![1, 3]);
    }
}
