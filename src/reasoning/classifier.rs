//! Biomarker status classification.
//!
//! Pure functions: a value and its two ranges in, a status and a unit-less
//! deviation score out. Range problems are surfaced as `InvalidRange` and
//! excluded per marker by `classify_panel`, never coerced.

use crate::config::ClassifierConfig;
use crate::models::{
    AcuteRisk, BiomarkerInput, BiomarkerStatus, ExcludedBiomarker, ExtractedBiomarker,
    NumericRange, RawLabResult,
};

use super::helpers::normalize_text;
use super::messages::MessageTemplates;
use super::reference::{ClinicalReferenceData, MarkerRule};
use super::types::{ClassifiedPanel, ReasoningError};

/// Result of classifying a single value.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub status: BiomarkerStatus,
    pub deviation_score: f64,
    pub interpretation: String,
    pub acute_risk: Option<AcuteRisk>,
}

/// Reject inverted ranges and zero-width ranges the value does not sit on.
pub fn validate_ranges(input: &BiomarkerInput) -> Result<(), ReasoningError> {
    let invalid = |reason: String| ReasoningError::InvalidRange {
        marker: input.id.clone(),
        reason,
    };

    if !input.value.is_finite() {
        return Err(invalid(format!("value {} is not a finite number", input.value)));
    }

    for (label, range) in [("lab", &input.lab_range), ("functional", &input.functional_range)] {
        if !range.min.is_finite() || !range.max.is_finite() {
            return Err(invalid(format!("{} range has a non-finite bound", label)));
        }
        if range.is_inverted() {
            return Err(invalid(format!(
                "{} range min {} > max {}",
                label, range.min, range.max
            )));
        }
        if range.width() == 0.0 && range.distance(input.value) > 0.0 {
            return Err(invalid(format!(
                "{} range has zero width at {} and value {} lies off it",
                label, range.min, input.value
            )));
        }
    }
    Ok(())
}

/// Distance to the functional range over its width; 0 inside the range.
pub fn deviation_score(value: f64, functional: &NumericRange) -> f64 {
    let distance = functional.distance(value);
    if distance == 0.0 {
        return 0.0;
    }
    let width = functional.width();
    if width <= 0.0 {
        // Zero width with the value off it; validate_ranges rejects this.
        return f64::INFINITY;
    }
    (distance / width).max(0.0)
}

/// Whether the value exceeds the lab range by more than `margin` of the
/// violated bound (of the range width when that bound is zero).
fn exceeds_critical_margin(value: f64, lab: &NumericRange, margin: f64) -> bool {
    let excess = lab.distance(value);
    if excess == 0.0 {
        return false;
    }
    let bound = if value < lab.min { lab.min } else { lab.max };
    let scale = if bound.abs() > f64::EPSILON {
        bound.abs()
    } else {
        lab.width()
    };
    if scale <= 0.0 {
        return true;
    }
    excess / scale > margin
}

/// Classify one value against its ranges.
pub fn classify(
    input: &BiomarkerInput,
    rule: Option<&MarkerRule>,
    config: &ClassifierConfig,
) -> Result<Classification, ReasoningError> {
    validate_ranges(input)?;

    let value = input.value;
    let lab_side = input.lab_range.side_of(value);
    let functional_side = input.functional_range.side_of(value);

    let allowlisted = match (rule.and_then(|r| r.critical_side), lab_side) {
        (Some(critical_side), Some(side)) => critical_side.accepts(side),
        _ => false,
    };

    let (status, interpretation) = match lab_side {
        Some(side) if allowlisted || exceeds_critical_margin(value, &input.lab_range, config.critical_margin) => (
            BiomarkerStatus::Critical,
            MessageTemplates::interpretation_critical(side, &input.lab_range),
        ),
        Some(side) => (
            BiomarkerStatus::Attention,
            MessageTemplates::interpretation_outside_lab(side, &input.lab_range),
        ),
        None => match functional_side {
            Some(side) => (
                BiomarkerStatus::Attention,
                MessageTemplates::interpretation_outside_functional(side, &input.functional_range),
            ),
            None => (
                BiomarkerStatus::Normal,
                MessageTemplates::interpretation_normal(&input.functional_range),
            ),
        },
    };

    let acute_risk = rule.and_then(|r| {
        r.acute_risks
            .iter()
            .find(|risk| risk.applies(value, &input.lab_range))
            .map(|risk| risk.to_risk())
    });

    Ok(Classification {
        status,
        deviation_score: deviation_score(value, &input.functional_range),
        interpretation,
        acute_risk,
    })
}

fn slug(name: &str) -> String {
    normalize_text(name).replace(' ', "_")
}

/// Resolve an extracted lab value into a classifier input using the marker table.
///
/// The lab-printed range wins over the table's lab range. A value reported in
/// a registered alternate unit is converted, printed range included, to the
/// table's unit. Any other unit keeps its own value and printed range, and
/// the table's ranges are not applied.
pub fn resolve_raw(
    raw: &RawLabResult,
    reference: &ClinicalReferenceData,
) -> Result<BiomarkerInput, ExcludedBiomarker> {
    let rule = reference.resolve_marker(&raw.name);
    let id = rule.map(|r| r.id.clone()).unwrap_or_else(|| slug(&raw.name));

    let exclude = |reason: &str| ExcludedBiomarker {
        id: id.clone(),
        name: raw.name.clone(),
        reason: reason.to_string(),
    };

    let factor = match (raw.unit.as_deref(), rule) {
        (Some(unit), Some(r)) => r.factor_for(unit),
        _ => Some(1.0),
    };
    let table_rule = rule.filter(|_| factor.is_some());
    let factor = factor.unwrap_or(1.0);

    if factor != 1.0 {
        tracing::debug!(
            marker = %id,
            unit = raw.unit.as_deref().unwrap_or_default(),
            factor,
            "Converted to registered unit"
        );
    }

    let lab_range = raw
        .reference_range
        .map(|r| r.scaled(factor))
        .or_else(|| table_rule.map(|r| r.lab_range));
    let Some(lab_range) = lab_range else {
        return Err(if table_rule.is_some() || rule.is_none() {
            exclude("no reference range printed or registered")
        } else {
            exclude("unit differs from the registered unit and no reference range was printed")
        });
    };
    let functional_range = table_rule
        .map(|r| r.functional_range)
        .unwrap_or(lab_range);

    let unit = match table_rule {
        Some(r) => r.unit.clone(),
        None => raw.unit.clone().unwrap_or_default(),
    };

    Ok(BiomarkerInput {
        id,
        name: raw.name.clone(),
        value: raw.value * factor,
        unit,
        lab_range,
        functional_range,
    })
}

/// Classify a panel of resolved inputs. Invalid markers are excluded and
/// logged; the rest are classified.
///
/// A marker's critical allowlist and acute-risk thresholds only apply when
/// the input is in the marker's registered unit.
pub fn classify_panel(
    inputs: &[BiomarkerInput],
    reference: &ClinicalReferenceData,
    config: &ClassifierConfig,
) -> ClassifiedPanel {
    let mut panel = ClassifiedPanel::default();

    for input in inputs {
        let rule = reference
            .rule(&input.id)
            .or_else(|| reference.resolve_marker(&input.name))
            .filter(|r| r.accepts_unit(&input.unit));

        match classify(input, rule, config) {
            Ok(c) => panel.biomarkers.push(ExtractedBiomarker {
                id: input.id.clone(),
                name: input.name.clone(),
                value: input.value,
                unit: input.unit.clone(),
                lab_range: input.lab_range,
                functional_range: input.functional_range,
                status: c.status,
                interpretation: c.interpretation,
                deviation_score: c.deviation_score,
                acute_risk: c.acute_risk,
            }),
            Err(ReasoningError::InvalidRange { marker, reason }) => {
                tracing::warn!(marker = %marker, reason = %reason, "Biomarker excluded");
                panel.excluded.push(ExcludedBiomarker {
                    id: input.id.clone(),
                    name: input.name.clone(),
                    reason,
                });
            }
            Err(e) => {
                tracing::warn!(marker = %input.id, error = %e, "Biomarker excluded");
                panel.excluded.push(ExcludedBiomarker {
                    id: input.id.clone(),
                    name: input.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    panel
}

/// Resolve and classify raw extracted lab values.
pub fn classify_raw_panel(
    raws: &[RawLabResult],
    reference: &ClinicalReferenceData,
    config: &ClassifierConfig,
) -> ClassifiedPanel {
    let mut inputs = Vec::with_capacity(raws.len());
    let mut unresolved = Vec::new();

    for raw in raws {
        match resolve_raw(raw, reference) {
            Ok(input) => inputs.push(input),
            Err(excluded) => {
                tracing::warn!(
                    marker = %excluded.id,
                    reason = %excluded.reason,
                    "Biomarker excluded"
                );
                unresolved.push(excluded);
            }
        }
    }

    let mut panel = classify_panel(&inputs, reference, config);
    panel.excluded.extend(unresolved);
    panel
}
