use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    OpportunityIdentification,
    SequenceGeneration,
    SequenceEvaluation,
    SequenceSelection,
}

impl fmt::Display for ProgressPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProgressPhase::OpportunityIdentification => "opportunity_identification",
            ProgressPhase::SequenceGeneration => "sequence_generation",
            ProgressPhase::SequenceEvaluation => "sequence_evaluation",
            ProgressPhase::SequenceSelection => "sequence_selection",
        };
        write!(f, "{s}")
    }
}

/// Stage-specific counters. Absent fields are not relevant to the stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_filtered_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequences_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feasible_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infeasible_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequences_per_second: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub phase: ProgressPhase,
    pub sub_phase: String,
    pub current: usize,
    pub total: usize,
    pub message: String,
    pub details: ProgressDetails,
}

impl ProgressUpdate {
    pub fn new(phase: ProgressPhase, sub_phase: &str, current: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            phase,
            sub_phase: sub_phase.to_string(),
            current,
            total,
            message: message.into(),
            details: ProgressDetails::default(),
        }
    }

    pub fn with_details(mut self, details: ProgressDetails) -> Self {
        self.details = details;
        self
    }
}
