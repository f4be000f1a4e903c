use crate::models::{
    AnalysisSummary, BiomarkerStatus, ClinicalCorrelation, ConsensusMetrics, CorrelationConfidence,
    ExtractedBiomarker, TriageResult, Urgency,
};

fn base_score(urgency: Urgency, attention: usize) -> u32 {
    let a = attention as u32;
    match urgency {
        Urgency::Routine => (10 + 4 * a).min(49),
        Urgency::High => (50 + 4 * a).min(79),
        Urgency::Critical => 80 + (2 * a).min(10),
    }
}

fn correlation_weight(confidence: CorrelationConfidence) -> u32 {
    match confidence {
        CorrelationConfidence::High => 3,
        CorrelationConfidence::Medium => 2,
        CorrelationConfidence::Low => 1,
    }
}

/// Summed confidence weight of the detected correlations.
pub fn correlation_points(correlations: &[ClinicalCorrelation]) -> u32 {
    correlations
        .iter()
        .map(|c| correlation_weight(c.confidence))
        .sum()
}

/// Compute the 0–100 overall risk score.
///
/// Base band per urgency tier, raised by critical markers, by correlation
/// confidence and by divergence between models. For fixed inputs the score
/// never decreases with urgency.
pub fn overall_risk_score(
    urgency: Urgency,
    attention: usize,
    critical: usize,
    correlation_points: u32,
    divergent: usize,
) -> u8 {
    let critical_bonus = (3 * critical as u32).min(10);
    let correlation_bonus = correlation_points.min(10);
    let divergence_bonus = (5 * divergent as u32).min(15);
    let bonus = critical_bonus + correlation_bonus + divergence_bonus;
    (base_score(urgency, attention) + bonus).min(100) as u8
}

/// Roll classified markers, correlations, triage and consensus metrics into
/// the summary.
pub fn build(
    biomarkers: &[ExtractedBiomarker],
    correlations: &[ClinicalCorrelation],
    triage: &TriageResult,
    metrics: Option<&ConsensusMetrics>,
) -> AnalysisSummary {
    let count = |status: BiomarkerStatus| biomarkers.iter().filter(|b| b.status == status).count();
    let critical = count(BiomarkerStatus::Critical);
    let attention = count(BiomarkerStatus::Attention);
    let normal = count(BiomarkerStatus::Normal);

    let overall_risk_score = if biomarkers.is_empty() && metrics.is_none() {
        None
    } else {
        let divergent = metrics.map_or(0, |m| m.divergent_count);
        Some(overall_risk_score(
            triage.urgency,
            attention,
            critical,
            correlation_points(correlations),
            divergent,
        ))
    };

    AnalysisSummary {
        critical,
        attention,
        normal,
        overall_risk_score,
    }
}
