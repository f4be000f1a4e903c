pub mod classifier;
pub mod consensus;
pub mod correlation;
pub mod engine;
pub mod helpers;
pub mod matching;
pub mod messages;
pub mod reference;
pub mod summary;
pub mod triage;
pub mod types;

pub use engine::DefaultAnalysisEngine;
pub use matching::{DiagnosisKey, DiagnosisMatcher, IcdPreferredMatcher, NameAndCodeMatcher};
pub use reference::ClinicalReferenceData;
pub use types::{AnalysisEngine, ClassifiedPanel, ConsensusOutcome, MalformedEntry, ReasoningError};
