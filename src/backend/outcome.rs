//! Add-objects status reporting

use serde::Serialize;
use uuid::Uuid;

use crate::version::VersionKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failure,
    Pending,
}

/// What happened to one submitted object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddOutcome {
    /// Submitted id; empty when the body had none
    pub id: String,
    /// Version stored, or already present, for this submission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionKey>,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AddOutcome {
    pub fn success(id: impl Into<String>, version: VersionKey) -> Self {
        Self {
            id: id.into(),
            version: Some(version),
            status: OutcomeStatus::Success,
            message: None,
        }
    }

    pub fn failure(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: None,
            status: OutcomeStatus::Failure,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Complete,
    Pending,
}

/// Status of one `add_objects` call. Outcomes are in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub id: Uuid,
    pub status: ReportStatus,
    pub request_timestamp: VersionKey,
    pub total_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub pending_count: usize,
    pub outcomes: Vec<AddOutcome>,
}

impl StatusReport {
    pub fn new(request_timestamp: VersionKey, outcomes: Vec<AddOutcome>) -> Self {
        let count = |status: OutcomeStatus| outcomes.iter().filter(|o| o.status == status).count();
        let success_count = count(OutcomeStatus::Success);
        let failure_count = count(OutcomeStatus::Failure);
        let pending_count = count(OutcomeStatus::Pending);

        Self {
            id: Uuid::new_v4(),
            status: if pending_count == 0 {
                ReportStatus::Complete
            } else {
                ReportStatus::Pending
            },
            request_timestamp,
            total_count: outcomes.len(),
            success_count,
            failure_count,
            pending_count,
            outcomes,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &AddOutcome> {
        self.outcomes.iter().filter(|o| o.status == OutcomeStatus::Failure)
    }
}
