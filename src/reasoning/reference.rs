use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::{
    AcuteRisk, CorrelationConfidence, CorrelationType, NumericRange, ReferenceVersions, Side,
};

use super::helpers::{normalize_text, unit_key};
use super::types::ReasoningError;

pub const MARKER_TABLE_FILE: &str = "marker_reference.json";
pub const PATTERN_TABLE_FILE: &str = "correlation_patterns.json";

static BUNDLED_MARKERS: &str = include_str!("../../resources/marker_reference.json");
static BUNDLED_PATTERNS: &str = include_str!("../../resources/correlation_patterns.json");

// ---------------------------------------------------------------------------
// Marker table
// ---------------------------------------------------------------------------

/// An acute-risk tag registered for one side of a marker's lab range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcuteRiskRule {
    pub tag: String,
    pub side: Side,
    /// Value that must be reached on `side`. Absent: any out-of-range value.
    #[serde(default)]
    pub threshold: Option<f64>,
    pub description: String,
    pub action: String,
}

impl AcuteRiskRule {
    pub fn applies(&self, value: f64, lab_range: &NumericRange) -> bool {
        let Some(actual) = lab_range.side_of(value) else {
            return false;
        };
        if !self.side.accepts(actual) {
            return false;
        }
        match (self.threshold, actual) {
            (None, _) => true,
            (Some(t), Side::High) => value >= t,
            (Some(t), Side::Low) => value <= t,
            (Some(_), Side::Both) => false,
        }
    }

    pub fn to_risk(&self) -> AcuteRisk {
        AcuteRisk {
            tag: self.tag.clone(),
            description: self.description.clone(),
            action: self.action.clone(),
        }
    }
}

/// An alternate unit a marker may be reported in. `factor` converts a value
/// in `unit` to the marker's registered unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitConversion {
    pub unit: String,
    pub factor: f64,
}

/// Reference entry for one biomarker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub unit: String,
    pub lab_range: NumericRange,
    pub functional_range: NumericRange,
    /// Critical-marker allowlist: any out-of-lab-range value on this side is critical.
    #[serde(default)]
    pub critical_side: Option<Side>,
    #[serde(default)]
    pub acute_risks: Vec<AcuteRiskRule>,
    #[serde(default)]
    pub conversions: Vec<UnitConversion>,
}

impl MarkerRule {
    /// Factor converting a value in `unit` to the registered unit: 1 for the
    /// registered unit itself, `None` for a unit with no known conversion.
    pub fn factor_for(&self, unit: &str) -> Option<f64> {
        let key = unit_key(unit);
        if key == unit_key(&self.unit) {
            return Some(1.0);
        }
        self.conversions
            .iter()
            .find(|c| unit_key(&c.unit) == key)
            .map(|c| c.factor)
    }

    /// Whether a value reported in `unit` is directly comparable to this rule.
    pub fn accepts_unit(&self, unit: &str) -> bool {
        unit_key(unit) == unit_key(&self.unit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerTable {
    pub version: String,
    pub markers: Vec<MarkerRule>,
}

// ---------------------------------------------------------------------------
// Pattern table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternCriterion {
    pub marker: String,
    pub side: Side,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationPattern {
    #[serde(rename = "type")]
    pub correlation_type: CorrelationType,
    pub name: String,
    pub clinical_implication: String,
    pub min_criteria: usize,
    /// Confidence when exactly `min_criteria` are met. Clamped to medium.
    #[serde(default = "default_confidence_at_minimum")]
    pub confidence_at_minimum: CorrelationConfidence,
    pub criteria: Vec<PatternCriterion>,
}

fn default_confidence_at_minimum() -> CorrelationConfidence {
    CorrelationConfidence::Low
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternTable {
    pub version: String,
    pub patterns: Vec<CorrelationPattern>,
}

// ---------------------------------------------------------------------------
// ClinicalReferenceData
// ---------------------------------------------------------------------------

/// Loaded, validated reference tables plus a normalized-name index.
#[derive(Debug, Clone)]
pub struct ClinicalReferenceData {
    pub markers: MarkerTable,
    pub patterns: PatternTable,
    index: HashMap<String, usize>,
}

impl ClinicalReferenceData {
    /// Load both tables from a resources directory.
    pub fn load(resources_dir: &Path) -> Result<Self, ReasoningError> {
        let markers_path = resources_dir.join(MARKER_TABLE_FILE);
        let patterns_path = resources_dir.join(PATTERN_TABLE_FILE);

        let markers_json = std::fs::read_to_string(&markers_path).map_err(|e| {
            ReasoningError::ReferenceDataLoad(markers_path.display().to_string(), e.to_string())
        })?;
        let patterns_json = std::fs::read_to_string(&patterns_path).map_err(|e| {
            ReasoningError::ReferenceDataLoad(patterns_path.display().to_string(), e.to_string())
        })?;

        let data = Self::from_json(&markers_json, &patterns_json)?;
        tracing::info!(
            dir = %resources_dir.display(),
            markers_version = %data.markers.version,
            patterns_version = %data.patterns.version,
            "Loaded clinical reference data"
        );
        Ok(data)
    }

    /// Reference tables compiled into the binary.
    pub fn bundled() -> Result<Self, ReasoningError> {
        Self::from_json(BUNDLED_MARKERS, BUNDLED_PATTERNS)
    }

    pub fn from_json(markers_json: &str, patterns_json: &str) -> Result<Self, ReasoningError> {
        let markers: MarkerTable = serde_json::from_str(markers_json).map_err(|e| {
            ReasoningError::ReferenceDataParse(MARKER_TABLE_FILE.into(), e.to_string())
        })?;
        let patterns: PatternTable = serde_json::from_str(patterns_json).map_err(|e| {
            ReasoningError::ReferenceDataParse(PATTERN_TABLE_FILE.into(), e.to_string())
        })?;
        Self::from_tables(markers, patterns)
    }

    pub fn from_tables(markers: MarkerTable, patterns: PatternTable) -> Result<Self, ReasoningError> {
        validate_markers(&markers)?;
        validate_patterns(&patterns)?;

        let mut index = HashMap::new();
        for (i, rule) in markers.markers.iter().enumerate() {
            let keys = std::iter::once(&rule.id)
                .chain(std::iter::once(&rule.name))
                .chain(rule.aliases.iter());
            for key in keys {
                // First entry wins on alias collisions.
                index.entry(normalize_text(key)).or_insert(i);
            }
        }

        for pattern in &patterns.patterns {
            for criterion in &pattern.criteria {
                if !markers.markers.iter().any(|m| m.id == criterion.marker) {
                    tracing::debug!(
                        pattern = %pattern.name,
                        marker = %criterion.marker,
                        "Pattern criterion references a marker absent from the marker table"
                    );
                }
            }
        }

        Ok(Self {
            markers,
            patterns,
            index,
        })
    }

    /// Look up a rule by exact id.
    pub fn rule(&self, id: &str) -> Option<&MarkerRule> {
        self.markers.markers.iter().find(|m| m.id == id)
    }

    /// Resolve a free-text lab name (id, display name or alias) to its rule.
    pub fn resolve_marker(&self, name: &str) -> Option<&MarkerRule> {
        self.index
            .get(&normalize_text(name))
            .and_then(|&i| self.markers.markers.get(i))
    }

    pub fn versions(&self) -> ReferenceVersions {
        ReferenceVersions {
            markers: self.markers.version.clone(),
            patterns: self.patterns.version.clone(),
        }
    }
}

fn validate_markers(table: &MarkerTable) -> Result<(), ReasoningError> {
    let mut seen = std::collections::HashSet::new();
    for rule in &table.markers {
        if !seen.insert(rule.id.as_str()) {
            return Err(ReasoningError::ReferenceDataInvalid(
                MARKER_TABLE_FILE.into(),
                format!("duplicate marker id '{}'", rule.id),
            ));
        }
        for (label, range) in [("lab", &rule.lab_range), ("functional", &rule.functional_range)] {
            if range.is_inverted() || !range.min.is_finite() || !range.max.is_finite() {
                return Err(ReasoningError::ReferenceDataInvalid(
                    MARKER_TABLE_FILE.into(),
                    format!(
                        "marker '{}' has an invalid {} range ({}..{})",
                        rule.id, label, range.min, range.max
                    ),
                ));
            }
        }
        for conversion in &rule.conversions {
            if !conversion.factor.is_finite() || conversion.factor <= 0.0 {
                return Err(ReasoningError::ReferenceDataInvalid(
                    MARKER_TABLE_FILE.into(),
                    format!(
                        "marker '{}' has an invalid conversion factor {} for '{}'",
                        rule.id, conversion.factor, conversion.unit
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn validate_patterns(table: &PatternTable) -> Result<(), ReasoningError> {
    for pattern in &table.patterns {
        if pattern.min_criteria == 0 || pattern.min_criteria > pattern.criteria.len() {
            return Err(ReasoningError::ReferenceDataInvalid(
                PATTERN_TABLE_FILE.into(),
                format!(
                    "pattern '{}' requires {} of {} criteria",
                    pattern.name,
                    pattern.min_criteria,
                    pattern.criteria.len()
                ),
            ));
        }
    }
    Ok(())
}
