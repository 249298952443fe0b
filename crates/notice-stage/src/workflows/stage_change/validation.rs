use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::batch::BatchInputError;
use super::domain::{ErrorCode, NoticeNumber, Stage};
use super::eligibility::EligibilityVerdict;
use super::service::StageChangeService;

/// Dry-run request: which of these notices could move to `new_processing_stage`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    #[serde(default)]
    pub new_processing_stage: Option<String>,
    #[serde(default)]
    pub reason_of_change: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub notices: Vec<NoticeToValidate>,
}

/// Reason code whose free-text remarks are mandatory.
pub const OTHER_REASON: &str = "OTH";

impl ValidationRequest {
    /// Same shape checks as a portal batch.
    pub fn validate(&self) -> Result<(), BatchInputError> {
        if self.notices.is_empty() {
            return Err(BatchInputError::EmptyItems);
        }
        if let Some(index) = self
            .notices
            .iter()
            .position(|notice| notice.notice_no.trim().is_empty())
        {
            return Err(BatchInputError::MissingNoticeNumber { index });
        }
        Ok(())
    }

    fn remarks_missing(&self) -> bool {
        let other_reason = self
            .reason_of_change
            .as_deref()
            .is_some_and(|reason| reason.trim() == OTHER_REASON);
        other_reason
            && self
                .remarks
                .as_deref()
                .map_or(true, |remarks| remarks.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeToValidate {
    pub notice_no: String,
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default)]
    pub offender_type: Option<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeableNotice {
    pub notice_no: NoticeNumber,
    pub current_stage: Option<String>,
    pub offender_type: Option<String>,
    pub entity_type: Option<String>,
    pub chosen_stage: Stage,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonChangeableNotice {
    pub notice_no: NoticeNumber,
    pub current_stage: Option<String>,
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub total: usize,
    pub changeable: usize,
    pub non_changeable: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub changeable_notices: Vec<ChangeableNotice>,
    pub non_changeable_notices: Vec<NonChangeableNotice>,
    pub summary: ValidationSummary,
}

impl ValidationOutcome {
    fn summarise(mut self, total: usize) -> Self {
        self.summary = ValidationSummary {
            total,
            changeable: self.changeable_notices.len(),
            non_changeable: self.non_changeable_notices.len(),
        };
        self
    }
}

impl StageChangeService {
    /// Run the eligibility resolver over each notice without writing anything.
    pub fn validate_notices(
        &self,
        request: &ValidationRequest,
    ) -> Result<ValidationOutcome, BatchInputError> {
        request.validate()?;
        let total = request.notices.len();
        let mut outcome = ValidationOutcome::default();

        if request.remarks_missing() {
            info!(total, "validation rejected, remarks missing for reason OTH");
            outcome.non_changeable_notices = request
                .notices
                .iter()
                .map(|notice| NonChangeableNotice {
                    notice_no: NoticeNumber::new(notice.notice_no.as_str()),
                    current_stage: notice.current_stage.clone(),
                    code: ErrorCode::RemarksRequired,
                    message: "Remarks are mandatory when reason for change is 'OTH' (Others)"
                        .to_string(),
                })
                .collect();
            return Ok(outcome.summarise(total));
        }

        let requested = request.new_processing_stage.as_deref();
        for notice in &request.notices {
            let notice_no = NoticeNumber::new(notice.notice_no.as_str());
            let verdict = self.eligibility.check(&notice_no, requested);
            let current_stage = self
                .stores
                .notices
                .fetch(&notice_no)
                .ok()
                .flatten()
                .and_then(|n| n.current_stage())
                .map(|stage| stage.code().to_string());

            match verdict {
                Ok(EligibilityVerdict::Changeable {
                    role, chosen_stage, ..
                }) => {
                    debug!(%notice_no, %chosen_stage, "notice changeable");
                    outcome.changeable_notices.push(ChangeableNotice {
                        notice_no,
                        current_stage: current_stage.or_else(|| notice.current_stage.clone()),
                        offender_type: notice
                            .offender_type
                            .clone()
                            .or_else(|| Some(role.label().to_string())),
                        entity_type: notice.entity_type.clone(),
                        chosen_stage,
                        message: format!("Eligible for stage change to {chosen_stage}"),
                    });
                }
                Ok(EligibilityVerdict::NotChangeable { code, message }) => {
                    debug!(%notice_no, %code, "notice not changeable");
                    outcome.non_changeable_notices.push(NonChangeableNotice {
                        notice_no,
                        current_stage,
                        code,
                        message,
                    });
                }
                Err(err) => {
                    error!(%notice_no, error = %err, "validation lookup failed");
                    outcome.non_changeable_notices.push(NonChangeableNotice {
                        notice_no,
                        current_stage: None,
                        code: ErrorCode::ValidationError,
                        message: format!("Validation error: {err}"),
                    });
                }
            }
        }

        let outcome = outcome.summarise(total);
        info!(
            total,
            changeable = outcome.summary.changeable,
            non_changeable = outcome.summary.non_changeable,
            "validation completed"
        );
        Ok(outcome)
    }
}
