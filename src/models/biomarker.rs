use serde::{Deserialize, Serialize};

use super::enums::{BiomarkerStatus, Side};

/// Closed numeric interval, used for lab-printed and functional ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
}

impl NumericRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Absolute gap to the nearer bound, 0 inside the range.
    pub fn distance(&self, value: f64) -> f64 {
        if value < self.min {
            self.min - value
        } else if value > self.max {
            value - self.max
        } else {
            0.0
        }
    }

    /// Which side of the range the value falls on, `None` inside.
    pub fn side_of(&self, value: f64) -> Option<Side> {
        if value < self.min {
            Some(Side::Low)
        } else if value > self.max {
            Some(Side::High)
        } else {
            None
        }
    }

    pub fn is_inverted(&self) -> bool {
        self.min > self.max
    }

    /// Both bounds multiplied by a positive unit factor.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.min * factor, self.max * factor)
    }
}

/// A lab value as handed over by the document extraction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLabResult {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub reference_range: Option<NumericRange>,
}

/// Fully-resolved classifier input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomarkerInput {
    pub id: String,
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub lab_range: NumericRange,
    pub functional_range: NumericRange,
}

/// Registered acute-risk tag attached to a marker value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcuteRisk {
    pub tag: String,
    pub description: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedBiomarker {
    pub id: String,
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub lab_range: NumericRange,
    pub functional_range: NumericRange,
    pub status: BiomarkerStatus,
    pub interpretation: String,
    pub deviation_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acute_risk: Option<AcuteRisk>,
}

impl ExtractedBiomarker {
    pub fn is_abnormal(&self) -> bool {
        self.status != BiomarkerStatus::Normal
    }

    /// Side this value deviates on: functional range first, then lab range.
    pub fn deviation_side(&self) -> Option<Side> {
        self.functional_range
            .side_of(self.value)
            .or_else(|| self.lab_range.side_of(self.value))
    }
}

/// A marker left out of the analysis, with the reason it was excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedBiomarker {
    pub id: String,
    pub name: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_inside_is_zero() {
        let range = NumericRange::new(70.0, 99.0);
        assert_eq!(range.distance(80.0), 0.0);
        assert_eq!(range.distance(70.0), 0.0);
        assert_eq!(range.distance(99.0), 0.0);
    }

    #[test]
    fn distance_outside_is_gap_to_nearer_bound() {
        let range = NumericRange::new(70.0, 99.0);
        assert_eq!(range.distance(60.0), 10.0);
        assert_eq!(range.distance(120.0), 21.0);
    }

    #[test]
    fn side_of_value() {
        let range = NumericRange::new(3.5, 5.1);
        assert_eq!(range.side_of(3.0), Some(Side::Low));
        assert_eq!(range.side_of(6.0), Some(Side::High));
        assert_eq!(range.side_of(4.0), None);
    }

    #[test]
    fn raw_lab_result_optional_fields_default() {
        let raw: RawLabResult =
            serde_json::from_str(r#"{"name": "Glicose", "value": 92.0}"#).unwrap();
        assert!(raw.unit.is_none());
        assert!(raw.reference_range.is_none());
    }
}
