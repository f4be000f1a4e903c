use serde::{Deserialize, Serialize};

use super::enums::{Urgency, Workflow};

/// A discrete high-severity finding with an explicit recommended action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedFlag {
    pub description: String,
    pub related_markers: Vec<String>,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    pub urgency: Urgency,
    pub red_flags: Vec<RedFlag>,
    pub recommended_workflow: Workflow,
    /// 0–100: how strongly independent signals corroborate `urgency`.
    pub confidence: u8,
}
