use serde::{Deserialize, Serialize};

use super::enums::{CorrelationConfidence, CorrelationType, EvidenceSource};

/// A reference backing a correlation (lab value, SOAP note line, history item).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub source: EvidenceSource,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalCorrelation {
    #[serde(rename = "type")]
    pub correlation_type: CorrelationType,
    /// `ExtractedBiomarker.id`s that met the pattern criteria.
    pub markers: Vec<String>,
    pub pattern: String,
    pub clinical_implication: String,
    pub confidence: CorrelationConfidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria_met: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Vec<Evidence>>,
}

impl ClinicalCorrelation {
    /// Append caller-assembled evidence (SOAP, history) to this correlation.
    pub fn with_evidence(mut self, extra: impl IntoIterator<Item = Evidence>) -> Self {
        let evidence = self.evidence.get_or_insert_with(Vec::new);
        evidence.extend(extra);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_evidence_appends() {
        let correlation = ClinicalCorrelation {
            correlation_type: CorrelationType::InsulinResistance,
            markers: vec!["glucose".into(), "insulin".into()],
            pattern: "Resistência insulínica".into(),
            clinical_implication: "x".into(),
            confidence: CorrelationConfidence::Low,
            criteria_met: Some("2/4".into()),
            evidence: None,
        }
        .with_evidence([Evidence {
            source: EvidenceSource::Soap,
            reference: "S: poliúria há 2 meses".into(),
        }]);

        let evidence = correlation.evidence.unwrap();
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].source, EvidenceSource::Soap);
    }

    #[test]
    fn type_field_serialized_as_type() {
        let correlation = ClinicalCorrelation {
            correlation_type: CorrelationType::InfectionPattern,
            markers: vec![],
            pattern: "p".into(),
            clinical_implication: "c".into(),
            confidence: CorrelationConfidence::High,
            criteria_met: None,
            evidence: None,
        };
        let json = serde_json::to_value(&correlation).unwrap();
        assert_eq!(json["type"], "infection_pattern");
        assert!(json.get("criteria_met").is_none());
    }
}
