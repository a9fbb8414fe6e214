use serde::{Deserialize, Serialize};

/// A generated operating procedure: the ordered activities an accounting
/// team runs through when taking on a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatingProcedure {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<ProcedureTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureTask {
    pub name: String,
    pub description: String,
    /// Days from onboarding start
    #[serde(default)]
    pub due_offset: i32,
    pub assigned_role: String,
    #[serde(default)]
    pub required_documents: Vec<String>,
    #[serde(default)]
    pub steps: Vec<ProcedureStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureStep {
    pub name: String,
    pub description: String,
    pub order: i32,
}
