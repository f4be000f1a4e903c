use crate::reasoning::ReasoningError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Variant declaration order defines `Ord` (least severe first).
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ReasoningError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ReasoningError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(BiomarkerStatus {
    Normal => "normal",
    Attention => "attention",
    Critical => "critical",
});

// `Both` doubles as "either side" in pattern criteria and as the
// two-sided allowlist entry in the marker table.
str_enum!(Side {
    Low => "low",
    High => "high",
    Both => "both",
});

str_enum!(CorrelationConfidence {
    Low => "low",
    Medium => "medium",
    High => "high",
});

str_enum!(EvidenceSource {
    Lab => "lab",
    Soap => "soap",
    History => "history",
});

str_enum!(Urgency {
    Routine => "routine",
    High => "high",
    Critical => "critical",
});

str_enum!(Workflow {
    Primary => "primary",
    Specialist => "specialist",
    Emergency => "emergency",
});

str_enum!(ConsensusLevel {
    Divergent => "divergent",
    Single => "single",
    Weak => "weak",
    Moderate => "moderate",
    Strong => "strong",
});

impl Side {
    /// Whether a criterion on `self` accepts a deviation on `actual`.
    pub fn accepts(&self, actual: Side) -> bool {
        *self == Side::Both || *self == actual
    }
}

impl Urgency {
    pub fn workflow(&self) -> Workflow {
        match self {
            Self::Critical => Workflow::Emergency,
            Self::High => Workflow::Specialist,
            Self::Routine => Workflow::Primary,
        }
    }
}

/// Named clinical pattern families. A pattern table naming any other family
/// fails to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationType {
    MetabolicSyndrome,
    InsulinResistance,
    InfectionPattern,
    CardiovascularRisk,
    IronDeficiencyAnemia,
    ThyroidDysfunction,
    LiverDysfunction,
    RenalDysfunction,
    SystemicInflammation,
}

impl CorrelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MetabolicSyndrome => "metabolic_syndrome",
            Self::InsulinResistance => "insulin_resistance",
            Self::InfectionPattern => "infection_pattern",
            Self::CardiovascularRisk => "cardiovascular_risk",
            Self::IronDeficiencyAnemia => "iron_deficiency_anemia",
            Self::ThyroidDysfunction => "thyroid_dysfunction",
            Self::LiverDysfunction => "liver_dysfunction",
            Self::RenalDysfunction => "renal_dysfunction",
            Self::SystemicInflammation => "systemic_inflammation",
        }
    }

    /// Families whose high-confidence detection escalates triage to critical.
    pub fn is_acute(&self) -> bool {
        matches!(self, Self::InfectionPattern | Self::CardiovascularRisk)
    }
}
