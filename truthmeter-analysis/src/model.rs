use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content submitted for analysis plus the label of the model that wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub content: String,
    #[serde(alias = "model")]
    pub source_model_label: String,
}

impl AnalysisRequest {
    pub fn new(content: impl Into<String>, source_model_label: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_model_label: source_model_label.into(),
        }
    }
}

/// Per-dimension scores, each in `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetrics {
    pub factual_correctness: u8,
    pub logical_consistency: u8,
    pub clarity: u8,
    pub depth: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub overall_accuracy: u8,
    pub metrics: AnalysisMetrics,
    pub what_went_wrong: Vec<String>,
    pub what_went_right: Vec<String>,
    pub detailed_analysis: String,
    pub confidence: u8,
}

/// One persisted analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisHistoryEntry {
    pub id: String,
    pub source_model_label: String,
    pub truncated_content: String,
    pub result: AnalysisResult,
    pub created_at: DateTime<Utc>,
    /// USD.
    pub estimated_cost: f64,
}
