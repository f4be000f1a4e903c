//! Multi-marker pattern detection.
//!
//! Patterns come from the reference table; the detector only counts which
//! criteria are met and grades confidence. It never fails: an absent marker
//! simply does not meet its criterion.

use std::collections::HashMap;

use crate::models::{
    ClinicalCorrelation, CorrelationConfidence, Evidence, EvidenceSource, ExtractedBiomarker,
};

use super::messages::MessageTemplates;
use super::reference::{CorrelationPattern, PatternCriterion};

fn criterion_met(criterion: &PatternCriterion, biomarker: &ExtractedBiomarker) -> bool {
    if !biomarker.is_abnormal() {
        return false;
    }
    biomarker
        .deviation_side()
        .is_some_and(|side| criterion.side.accepts(side))
}

/// Confidence for `met` criteria out of a pattern that fires.
fn grade(pattern: &CorrelationPattern, met: usize) -> CorrelationConfidence {
    if met > pattern.min_criteria {
        CorrelationConfidence::High
    } else {
        pattern
            .confidence_at_minimum
            .min(CorrelationConfidence::Medium)
    }
}

/// Evaluate every pattern against the classified biomarkers.
pub fn detect(
    biomarkers: &[ExtractedBiomarker],
    patterns: &[CorrelationPattern],
) -> Vec<ClinicalCorrelation> {
    // First occurrence wins when a marker appears twice in a panel.
    let mut by_id: HashMap<&str, &ExtractedBiomarker> = HashMap::new();
    for biomarker in biomarkers {
        by_id.entry(biomarker.id.as_str()).or_insert(biomarker);
    }

    let mut correlations = Vec::new();

    for pattern in patterns {
        let matched: Vec<&ExtractedBiomarker> = pattern
            .criteria
            .iter()
            .filter_map(|criterion| {
                by_id
                    .get(criterion.marker.as_str())
                    .copied()
                    .filter(|b| criterion_met(criterion, b))
            })
            .collect();

        if matched.len() < pattern.min_criteria {
            tracing::debug!(
                pattern = %pattern.correlation_type.as_str(),
                met = matched.len(),
                required = pattern.min_criteria,
                "Pattern not met"
            );
            continue;
        }

        let confidence = grade(pattern, matched.len());
        tracing::debug!(
            pattern = %pattern.correlation_type.as_str(),
            met = matched.len(),
            confidence = %confidence,
            "Pattern detected"
        );

        let evidence = matched
            .iter()
            .map(|b| Evidence {
                source: EvidenceSource::Lab,
                reference: MessageTemplates::lab_evidence(
                    &b.name,
                    b.value,
                    &b.unit,
                    b.status.as_str(),
                ),
            })
            .collect();

        correlations.push(ClinicalCorrelation {
            correlation_type: pattern.correlation_type,
            markers: matched.iter().map(|b| b.id.clone()).collect(),
            pattern: pattern.name.clone(),
            clinical_implication: pattern.clinical_implication.clone(),
            confidence,
            criteria_met: Some(format!("{}/{}", matched.len(), pattern.criteria.len())),
            evidence: Some(evidence),
        });
    }

    correlations
}
