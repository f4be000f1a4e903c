use crate::models::{CorrelationType, NumericRange, Side};

use super::helpers::format_value;

/// Physician-facing text templates (pt-BR).
/// Wording is descriptive: the engine reports findings, the physician decides.
pub struct MessageTemplates;

impl MessageTemplates {
    fn range(range: &NumericRange) -> String {
        format!("{}–{}", format_value(range.min), format_value(range.max))
    }

    fn direction(side: Side) -> &'static str {
        match side {
            Side::Low => "abaixo",
            Side::High | Side::Both => "acima",
        }
    }

    /// CRITICAL: far outside, or allowlisted and outside, the lab range.
    pub fn interpretation_critical(side: Side, lab: &NumericRange) -> String {
        format!(
            "Valor crítico, {} da faixa de referência laboratorial ({}).",
            Self::direction(side),
            Self::range(lab),
        )
    }

    /// ATTENTION: mildly outside the lab range.
    pub fn interpretation_outside_lab(side: Side, lab: &NumericRange) -> String {
        format!(
            "Discretamente {} da faixa de referência laboratorial ({}).",
            Self::direction(side),
            Self::range(lab),
        )
    }

    /// ATTENTION: inside the lab range, outside the functional optimum.
    pub fn interpretation_outside_functional(side: Side, functional: &NumericRange) -> String {
        format!(
            "Dentro da referência laboratorial, porém {} da faixa funcional ideal ({}).",
            Self::direction(side),
            Self::range(functional),
        )
    }

    /// NORMAL.
    pub fn interpretation_normal(functional: &NumericRange) -> String {
        format!(
            "Dentro da faixa funcional ideal ({}).",
            Self::range(functional)
        )
    }

    /// Lab evidence line attached to correlations.
    pub fn lab_evidence(name: &str, value: f64, unit: &str, status: &str) -> String {
        if unit.is_empty() {
            format!("{}: {} ({})", name, format_value(value), status)
        } else {
            format!("{}: {} {} ({})", name, format_value(value), unit, status)
        }
    }

    /// Red flag for a critical marker carrying an acute-risk tag.
    pub fn red_flag_marker(risk: &str, name: &str, value: f64, unit: &str) -> String {
        if unit.is_empty() {
            format!("{}: {} {}", risk, name, format_value(value))
        } else {
            format!("{}: {} {} {}", risk, name, format_value(value), unit)
        }
    }

    /// Red flag for a high-confidence acute correlation.
    pub fn red_flag_correlation(pattern: &str, criteria_met: Option<&str>) -> String {
        match criteria_met {
            Some(met) => format!("{} com alta confiança ({} critérios)", pattern, met),
            None => format!("{} com alta confiança", pattern),
        }
    }

    /// Recommended action for an acute correlation family.
    pub fn correlation_action(correlation_type: CorrelationType) -> &'static str {
        match correlation_type {
            CorrelationType::InfectionPattern => {
                "Investigação infecciosa imediata com avaliação clínica no mesmo dia"
            }
            CorrelationType::CardiovascularRisk => "Avaliação cardiológica urgente",
            _ => "Reavaliação clínica prioritária",
        }
    }
}
