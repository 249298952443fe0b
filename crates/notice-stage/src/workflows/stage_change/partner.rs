use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::audit::AuditContext;
use super::domain::{ChangeSource, NoticeNumber, Stage};
use super::repository::RepositoryError;
use super::service::{AmountPolicy, CommitError, StageChangeService};

/// Channel code the partner system sends for itself.
pub const PARTNER_CHANNEL_CODE: &str = "005";
pub const PARTNER_REASON: &str = "PLS";
pub const PARTNER_REPORT_USER: &str = "PLUS_SYSTEM";

/// Offence type / target stage combinations acknowledged without any change.
const SKIPPED_TRANSITIONS: &[(&str, Stage)] = &[
    ("U", Stage::Dn1),
    ("U", Stage::Dn2),
    ("U", Stage::Dr3),
    ("U", Stage::Cpc),
];

/// Stage change pushed by the external partner for a set of notices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerChangeRequest {
    #[serde(default)]
    pub notice_no: Vec<String>,
    #[serde(default)]
    pub last_stage_name: String,
    #[serde(default)]
    pub next_stage_name: String,
    #[serde(default)]
    pub offence_type: Option<String>,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartnerChangeOutcome {
    Applied,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartnerChangeError {
    #[error("stage change to CFC is not allowed from partner source {channel}")]
    CourtReferralDenied { channel: String },
    #[error("stage transition not allowed: {last} -> {next}")]
    TransitionNotAllowed { last: String, next: String },
    #[error("stage map unavailable: {0}")]
    StageMapUnavailable(String),
    #[error("{}", .0.join("; "))]
    ProcessingFailed(Vec<String>),
}

impl PartnerChangeError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::CourtReferralDenied { .. } => "OCMS-4004",
            Self::TransitionNotAllowed { .. } => "OCMS-4000",
            Self::StageMapUnavailable(_) => "OCMS-5000",
            Self::ProcessingFailed(_) => "PROCESSING_FAILED",
        }
    }
}

fn is_skipped(offence_type: Option<&str>, next: Stage) -> bool {
    let Some(offence_type) = offence_type.map(str::trim) else {
        return false;
    };
    SKIPPED_TRANSITIONS
        .iter()
        .any(|(kind, stage)| kind.eq_ignore_ascii_case(offence_type) && *stage == next)
}

impl StageChangeService {
    /// Apply a partner-pushed stage change to every listed notice.
    ///
    /// All notices are attempted; per-notice failures are returned together.
    pub fn apply_partner_change(
        &self,
        request: &PartnerChangeRequest,
    ) -> Result<PartnerChangeOutcome, PartnerChangeError> {
        let source = request.source.trim();
        let next_code = request.next_stage_name.trim();
        let last_code = request.last_stage_name.trim();
        info!(
            notices = request.notice_no.len(),
            last = last_code,
            next = next_code,
            source,
            "processing partner stage change"
        );

        if source == PARTNER_CHANNEL_CODE && next_code.eq_ignore_ascii_case(Stage::Cfc.code()) {
            error!(source, "partner attempted court referral");
            return Err(PartnerChangeError::CourtReferralDenied {
                channel: source.to_string(),
            });
        }

        let not_allowed = || PartnerChangeError::TransitionNotAllowed {
            last: last_code.to_string(),
            next: next_code.to_string(),
        };
        let next = Stage::parse_code(next_code).ok_or_else(not_allowed)?;

        if is_skipped(request.offence_type.as_deref(), next) {
            info!(offence_type = ?request.offence_type, %next, "partner change skipped by rule");
            return Ok(PartnerChangeOutcome::Skipped);
        }

        let last = Stage::parse_code(last_code).ok_or_else(not_allowed)?;
        match self.stores.stage_map.allows(last, next) {
            Ok(true) => debug!(%last, %next, "stage map allows transition"),
            Ok(false) => return Err(not_allowed()),
            Err(err) => return Err(PartnerChangeError::StageMapUnavailable(err.to_string())),
        }

        let context = AuditContext {
            source: ChangeSource::Plus,
            reason: Some(PARTNER_REASON.to_string()),
            remarks: Some(format!(
                "Type: {}, Source: {}",
                request.offence_type.as_deref().unwrap_or_default(),
                source
            )),
            authorised_by: source.to_string(),
            created_by: ChangeSource::System.label().to_string(),
        };

        let now = self.clock.now();
        let mut seen = HashSet::new();
        let mut errors = Vec::new();
        for raw in &request.notice_no {
            let notice_no = NoticeNumber::new(raw.as_str());
            if !seen.insert(notice_no.clone()) {
                warn!(%notice_no, "duplicate notice in partner request");
                errors.push(format!("Duplicate noticeNo in request: {notice_no}"));
                continue;
            }

            let lock = self.locks.for_notice(&notice_no);
            let _guard = lock.hold();
            let committed = self.commit(
                &notice_no,
                next,
                AmountPolicy::Recalculate,
                Some(&context),
                now,
            );
            match committed {
                Ok(committed) => info!(
                    %notice_no,
                    previous = ?committed.previous_stage,
                    %next,
                    "partner stage change applied"
                ),
                Err(CommitError::NoticeMissing(_)) => {
                    warn!(%notice_no, "partner notice not found");
                    errors.push(format!("Notice {notice_no} failed: NOTICE_NOT_FOUND"));
                }
                Err(CommitError::Repository(err @ RepositoryError::VersionConflict { .. })) => {
                    warn!(%notice_no, error = %err, "partner change lost a concurrent update");
                    errors.push(format!("Notice {notice_no} failed: {err}"));
                }
                Err(err) => {
                    error!(%notice_no, error = %err, "partner change failed unexpectedly");
                    errors.push(format!(
                        "Notice {notice_no} failed with unexpected error: {err}"
                    ));
                }
            }
        }

        if !errors.is_empty() {
            return Err(PartnerChangeError::ProcessingFailed(errors));
        }

        self.generate_report(now.date(), Some(ChangeSource::Plus), PARTNER_REPORT_USER);
        Ok(PartnerChangeOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_rule_matches_literal_table() {
        assert!(is_skipped(Some("U"), Stage::Dn1));
        assert!(is_skipped(Some("u"), Stage::Cpc));
        assert!(!is_skipped(Some("U"), Stage::Rd1));
        assert!(!is_skipped(Some("O"), Stage::Dn1));
        assert!(!is_skipped(None, Stage::Dn1));
    }

    #[test]
    fn processing_failure_joins_messages() {
        let err = PartnerChangeError::ProcessingFailed(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "a; b");
        assert_eq!(err.code(), "PROCESSING_FAILED");
    }
}
