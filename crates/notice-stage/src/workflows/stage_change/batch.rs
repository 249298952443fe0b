use serde::{Deserialize, Serialize};

use super::domain::{ErrorCode, NoticeNumber, Stage};

/// Portal batch submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(default)]
    pub items: Vec<BatchItem>,
}

/// One requested stage change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    #[serde(default)]
    pub notice_no: String,
    /// Target stage code; derived from the notice's progression when absent.
    #[serde(default)]
    pub new_stage: Option<String>,
    #[serde(default, alias = "reason")]
    pub reason_code: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
    /// Re-apply even though the same change was already recorded today.
    #[serde(default, alias = "isConfirmation")]
    pub confirmation: Option<bool>,
    #[serde(default)]
    pub dh_mha_check: Option<bool>,
}

impl BatchItem {
    pub fn new(notice_no: impl Into<String>, new_stage: Option<&str>) -> Self {
        Self {
            notice_no: notice_no.into(),
            new_stage: new_stage.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn confirmed(mut self) -> Self {
        self.confirmation = Some(true);
        self
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmation == Some(true)
    }
}

/// Malformed input that rejects a whole batch before any item is processed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchInputError {
    #[error("items list cannot be empty")]
    EmptyItems,
    #[error("noticeNo is required (item {index})")]
    MissingNoticeNumber { index: usize },
}

impl BatchInputError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EmptyItems => "INVALID_FORMAT",
            Self::MissingNoticeNumber { .. } => "MISSING_DATA",
        }
    }
}

impl BatchRequest {
    pub fn validate(&self) -> Result<(), BatchInputError> {
        if self.items.is_empty() {
            return Err(BatchInputError::EmptyItems);
        }
        if let Some(index) = self
            .items
            .iter()
            .position(|item| item.notice_no.trim().is_empty())
        {
            return Err(BatchInputError::MissingNoticeNumber { index });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemOutcome {
    Updated,
    Warning,
    Failed,
}

/// Per-item result line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeResult {
    pub notice_no: NoticeNumber,
    pub outcome: ItemOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_stage: Option<Stage>,
}

impl NoticeResult {
    pub fn updated(notice_no: NoticeNumber, previous: Option<Stage>, new: Stage) -> Self {
        Self {
            notice_no,
            outcome: ItemOutcome::Updated,
            code: None,
            message: Some("Stage changed successfully".to_string()),
            previous_stage: previous,
            new_stage: Some(new),
        }
    }

    pub fn warning(notice_no: NoticeNumber, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            notice_no,
            outcome: ItemOutcome::Warning,
            code: Some(code),
            message: Some(message.into()),
            previous_stage: None,
            new_stage: None,
        }
    }

    pub fn failed(notice_no: NoticeNumber, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            notice_no,
            outcome: ItemOutcome::Failed,
            code: Some(code),
            message: Some(message.into()),
            previous_stage: None,
            new_stage: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Success,
    Partial,
    Warning,
    Failed,
}

/// Roll per-item counts up into one batch status.
pub fn derive_status(succeeded: usize, failed: usize, warnings: usize) -> BatchStatus {
    if failed == 0 && warnings == 0 {
        BatchStatus::Success
    } else if succeeded == 0 && warnings > 0 {
        BatchStatus::Warning
    } else if succeeded == 0 {
        BatchStatus::Failed
    } else {
        BatchStatus::Partial
    }
}

/// Counts reported to the caller; warnings are folded into `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub status: BatchStatus,
    pub summary: BatchSummary,
    pub results: Vec<NoticeResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_url: Option<String>,
    pub existing_record_warning: bool,
}

impl BatchResult {
    pub fn from_results(results: Vec<NoticeResult>) -> Self {
        let count = |outcome: ItemOutcome| results.iter().filter(|r| r.outcome == outcome).count();
        let succeeded = count(ItemOutcome::Updated);
        let warnings = count(ItemOutcome::Warning);
        let failed = count(ItemOutcome::Failed);

        Self {
            status: derive_status(succeeded, failed, warnings),
            summary: BatchSummary {
                requested: results.len(),
                succeeded,
                failed: failed + warnings,
            },
            existing_record_warning: warnings > 0,
            report_url: None,
            results,
        }
    }
}
