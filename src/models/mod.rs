pub mod analysis;
pub mod biomarker;
pub mod correlation;
pub mod diagnosis;
pub mod enums;
pub mod triage;

pub use analysis::*;
pub use biomarker::*;
pub use correlation::*;
pub use diagnosis::*;
pub use enums::*;
pub use triage::*;
