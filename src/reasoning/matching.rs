//! Diagnosis identity across models.
//!
//! Two reasoning models rarely spell a diagnosis the same way. The matcher
//! decides when two entries are the same clinical entity; it is a trait so
//! deployments can trade recall for precision.

use super::helpers::{normalize_icd10, normalize_text};

/// Normalized identity of one proposed diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiagnosisKey {
    pub name: String,
    /// Compact ICD-10 ("E119"); `None` when absent or malformed.
    pub icd10: Option<String>,
}

impl DiagnosisKey {
    pub fn new(name: &str, icd10: Option<&str>) -> Self {
        Self {
            name: normalize_text(name),
            icd10: icd10.and_then(normalize_icd10),
        }
    }

    /// Codes conflict only when both are present and differ.
    pub fn codes_compatible(&self, other: &DiagnosisKey) -> bool {
        match (&self.icd10, &other.icd10) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

pub trait DiagnosisMatcher: Send + Sync {
    fn same_diagnosis(&self, a: &DiagnosisKey, b: &DiagnosisKey) -> bool;

    fn name(&self) -> &'static str;
}

/// Default: identical normalized names with compatible ICD-10 codes.
/// A conflicting code keeps two entries apart even when names agree.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameAndCodeMatcher;

impl DiagnosisMatcher for NameAndCodeMatcher {
    fn same_diagnosis(&self, a: &DiagnosisKey, b: &DiagnosisKey) -> bool {
        a.name == b.name && a.codes_compatible(b)
    }

    fn name(&self) -> &'static str {
        "name_and_code"
    }
}

/// Also merges differently-worded entries sharing an ICD-10 code.
#[derive(Debug, Clone, Copy, Default)]
pub struct IcdPreferredMatcher;

impl DiagnosisMatcher for IcdPreferredMatcher {
    fn same_diagnosis(&self, a: &DiagnosisKey, b: &DiagnosisKey) -> bool {
        match (&a.icd10, &b.icd10) {
            (Some(x), Some(y)) if x == y => true,
            _ => a.name == b.name && a.codes_compatible(b),
        }
    }

    fn name(&self) -> &'static str {
        "icd_preferred"
    }
}
