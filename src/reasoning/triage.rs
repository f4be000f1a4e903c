use crate::models::{
    BiomarkerStatus, ClinicalCorrelation, CorrelationConfidence, ExtractedBiomarker, RedFlag,
    TriageResult, Urgency,
};

use super::messages::MessageTemplates;

const BASE_CONFIDENCE: u32 = 40;
const CONFIDENCE_PER_SIGNAL: u32 = 10;
const MAX_SIGNAL_CONFIDENCE: u32 = 95;

fn signal_confidence(signals: usize) -> u8 {
    let raw = BASE_CONFIDENCE + CONFIDENCE_PER_SIGNAL * signals as u32;
    raw.min(MAX_SIGNAL_CONFIDENCE) as u8
}

fn is_supporting(correlation: &ClinicalCorrelation) -> bool {
    correlation.confidence >= CorrelationConfidence::Medium
}

fn is_acute_trigger(correlation: &ClinicalCorrelation) -> bool {
    correlation.confidence == CorrelationConfidence::High && correlation.correlation_type.is_acute()
}

/// Assign an urgency tier. Precedence is critical, then high, then routine;
/// the first matching tier wins.
pub fn triage(
    biomarkers: &[ExtractedBiomarker],
    correlations: &[ClinicalCorrelation],
) -> TriageResult {
    let mut red_flags = Vec::new();

    for biomarker in biomarkers {
        if biomarker.status != BiomarkerStatus::Critical {
            continue;
        }
        if let Some(risk) = &biomarker.acute_risk {
            red_flags.push(RedFlag {
                description: MessageTemplates::red_flag_marker(
                    &risk.description,
                    &biomarker.name,
                    biomarker.value,
                    &biomarker.unit,
                ),
                related_markers: vec![biomarker.id.clone()],
                action: risk.action.clone(),
            });
        }
    }
    let marker_triggers = red_flags.len();

    for correlation in correlations.iter().filter(|c| is_acute_trigger(c)) {
        red_flags.push(RedFlag {
            description: MessageTemplates::red_flag_correlation(
                &correlation.pattern,
                correlation.criteria_met.as_deref(),
            ),
            related_markers: correlation.markers.clone(),
            action: MessageTemplates::correlation_action(correlation.correlation_type).to_string(),
        });
    }

    if !red_flags.is_empty() {
        let other_critical = biomarkers
            .iter()
            .filter(|b| b.status == BiomarkerStatus::Critical && b.acute_risk.is_none())
            .count();
        let other_supporting = correlations
            .iter()
            .filter(|c| is_supporting(c) && !is_acute_trigger(c))
            .count();
        let signals = red_flags.len() + other_critical + other_supporting;

        tracing::debug!(
            marker_triggers,
            correlation_triggers = red_flags.len() - marker_triggers,
            signals,
            "Critical triage"
        );
        TriageResult {
            urgency: Urgency::Critical,
            red_flags,
            recommended_workflow: Urgency::Critical.workflow(),
            confidence: signal_confidence(signals),
        }
    } else {
        let abnormal = biomarkers.iter().filter(|b| b.is_abnormal()).count();
        let supporting = correlations.iter().filter(|c| is_supporting(c)).count();

        if abnormal >= 2 && supporting >= 1 {
            TriageResult {
                urgency: Urgency::High,
                red_flags,
                recommended_workflow: Urgency::High.workflow(),
                confidence: signal_confidence(abnormal + supporting),
            }
        } else {
            let confidence = if biomarkers.is_empty() {
                BASE_CONFIDENCE as u8
            } else {
                let normal = biomarkers.len() - abnormal;
                let fraction = normal as f64 / biomarkers.len() as f64;
                (BASE_CONFIDENCE as f64 + (50.0 * fraction).round()) as u8
            };
            TriageResult {
                urgency: Urgency::Routine,
                red_flags,
                recommended_workflow: Urgency::Routine.workflow(),
                confidence,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AcuteRisk, CorrelationType, NumericRange, Workflow};

    fn marker(id: &str, status: BiomarkerStatus, acute: bool) -> ExtractedBiomarker {
        ExtractedBiomarker {
            id: id.into(),
            name: id.into(),
            value: 1.0,
            unit: "mg/dL".into(),
            lab_range: NumericRange::new(0.0, 2.0),
            functional_range: NumericRange::new(0.5, 1.5),
            status,
            interpretation: String::new(),
            deviation_score: 0.0,
            acute_risk: acute.then(|| AcuteRisk {
                tag: "hyperkalemia".into(),
                description: "Hipercalemia grave".into(),
                action: "Encaminhar à emergência para ECG e correção imediata".into(),
            }),
        }
    }

    fn correlation(t: CorrelationType, confidence: CorrelationConfidence) -> ClinicalCorrelation {
        ClinicalCorrelation {
            correlation_type: t,
            markers: vec!["crp".into(), "leukocytes".into()],
            pattern: "Padrão".into(),
            clinical_implication: String::new(),
            confidence,
            criteria_met: Some("3/5".into()),
            evidence: None,
        }
    }

    #[test]
    fn acute_critical_marker_triggers_critical() {
        let biomarkers = vec![marker("potassium", BiomarkerStatus::Critical, true)];
        let result = triage(&biomarkers, &[]);
        assert_eq!(result.urgency, Urgency::Critical);
        assert_eq!(result.recommended_workflow, Workflow::Emergency);
        assert_eq!(result.red_flags.len(), 1);
        assert_eq!(result.red_flags[0].related_markers, vec!["potassium"]);
        assert!(!result.red_flags[0].action.is_empty());
        // Single trigger.
        assert_eq!(result.confidence, 50);
    }

    #[test]
    fn critical_without_acute_risk_is_not_a_trigger() {
        let biomarkers = vec![marker("ldl", BiomarkerStatus::Critical, false)];
        let result = triage(&biomarkers, &[]);
        assert_eq!(result.urgency, Urgency::Routine);
        assert!(result.red_flags.is_empty());
    }

    #[test]
    fn high_confidence_infection_triggers_critical() {
        let correlations = vec![correlation(
            CorrelationType::InfectionPattern,
            CorrelationConfidence::High,
        )];
        let result = triage(&[], &correlations);
        assert_eq!(result.urgency, Urgency::Critical);
        assert_eq!(result.red_flags.len(), 1);
        assert!(result.red_flags[0].action.contains("infecciosa"));
    }

    #[test]
    fn medium_infection_is_not_critical() {
        let biomarkers = vec![
            marker("crp", BiomarkerStatus::Attention, false),
            marker("leukocytes", BiomarkerStatus::Attention, false),
        ];
        let correlations = vec![correlation(
            CorrelationType::InfectionPattern,
            CorrelationConfidence::Medium,
        )];
        let result = triage(&biomarkers, &correlations);
        assert_eq!(result.urgency, Urgency::High);
        assert_eq!(result.recommended_workflow, Workflow::Specialist);
        // 2 abnormal + 1 correlation.
        assert_eq!(result.confidence, 70);
    }

    #[test]
    fn high_confidence_non_acute_family_is_not_critical() {
        let correlations = vec![correlation(
            CorrelationType::ThyroidDysfunction,
            CorrelationConfidence::High,
        )];
        let result = triage(&[], &correlations);
        assert_eq!(result.urgency, Urgency::Routine);
    }

    #[test]
    fn high_needs_both_markers_and_correlation() {
        let biomarkers = vec![
            marker("tsh", BiomarkerStatus::Attention, false),
            marker("free_t4", BiomarkerStatus::Attention, false),
        ];
        assert_eq!(triage(&biomarkers, &[]).urgency, Urgency::Routine);

        let low_only = vec![correlation(
            CorrelationType::LiverDysfunction,
            CorrelationConfidence::Low,
        )];
        assert_eq!(triage(&biomarkers, &low_only).urgency, Urgency::Routine);
    }

    #[test]
    fn red_flags_list_markers_before_correlations() {
        let biomarkers = vec![marker("potassium", BiomarkerStatus::Critical, true)];
        let correlations = vec![correlation(
            CorrelationType::CardiovascularRisk,
            CorrelationConfidence::High,
        )];
        let result = triage(&biomarkers, &correlations);
        assert_eq!(result.red_flags.len(), 2);
        assert_eq!(result.red_flags[0].related_markers, vec!["potassium"]);
        assert_eq!(result.red_flags[1].action, "Avaliação cardiológica urgente");
        assert_eq!(result.confidence, 60);
    }

    #[test]
    fn critical_confidence_counts_corroborating_signals_and_caps() {
        let mut biomarkers = vec![marker("potassium", BiomarkerStatus::Critical, true)];
        for i in 0..10 {
            biomarkers.push(marker(&format!("m{}", i), BiomarkerStatus::Critical, false));
        }
        let result = triage(&biomarkers, &[]);
        assert_eq!(result.confidence, 95);
    }

    #[test]
    fn routine_confidence_tracks_normal_fraction() {
        let all_normal = vec![
            marker("a", BiomarkerStatus::Normal, false),
            marker("b", BiomarkerStatus::Normal, false),
        ];
        assert_eq!(triage(&all_normal, &[]).confidence, 90);

        let half = vec![
            marker("a", BiomarkerStatus::Normal, false),
            marker("b", BiomarkerStatus::Attention, false),
        ];
        assert_eq!(triage(&half, &[]).confidence, 65);

        assert_eq!(triage(&[], &[]).confidence, 40);
    }
}
