mod policy;
mod rules;

pub use policy::SuspensionPolicy;

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::domain::{ErrorCode, Notice, NoticeNumber, OffenderParty, OffenderRole, Stage};
use super::repository::{NoticeRepository, PartyRepository, RepositoryError};

/// Decision on whether a notice may move to a stage right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EligibilityVerdict {
    #[serde(rename_all = "camelCase")]
    Changeable {
        role: OffenderRole,
        eligible_stages: Vec<Stage>,
        chosen_stage: Stage,
    },
    NotChangeable { code: ErrorCode, message: String },
}

impl EligibilityVerdict {
    fn rejected(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::NotChangeable {
            code,
            message: message.into(),
        }
    }

    pub fn is_changeable(&self) -> bool {
        matches!(self, Self::Changeable { .. })
    }

    pub fn role(&self) -> Option<&OffenderRole> {
        match self {
            Self::Changeable { role, .. } => Some(role),
            Self::NotChangeable { .. } => None,
        }
    }

    pub fn chosen_stage(&self) -> Option<Stage> {
        match self {
            Self::Changeable { chosen_stage, .. } => Some(*chosen_stage),
            Self::NotChangeable { .. } => None,
        }
    }
}

/// Pure eligibility decision over a notice snapshot and its parties.
///
/// `requested` is the raw stage code from the caller; blank means "derive it".
pub fn resolve_eligibility(
    notice: Option<&Notice>,
    parties: &[OffenderParty],
    requested: Option<&str>,
    policy: &SuspensionPolicy,
) -> EligibilityVerdict {
    if notice.is_none() && parties.is_empty() {
        return EligibilityVerdict::rejected(ErrorCode::NotFound, "Notice not found");
    }

    let Some(role) = rules::resolve_role(notice.is_some(), parties) else {
        return EligibilityVerdict::rejected(
            ErrorCode::RoleConflict,
            "Cannot determine offender role",
        );
    };

    let current = notice.and_then(Notice::current_stage);
    if current.is_some_and(Stage::is_court) {
        return EligibilityVerdict::rejected(ErrorCode::CourtStage, "Notice is at court stage");
    }

    if let Some((code, message)) = notice.and_then(|notice| policy.blocks(notice)) {
        return EligibilityVerdict::rejected(code, message);
    }

    let requested = requested.map(str::trim).filter(|code| !code.is_empty());
    let chosen = match requested {
        Some(code) => match code.parse::<Stage>() {
            Ok(stage) => stage,
            Err(_) => {
                return EligibilityVerdict::rejected(
                    ErrorCode::IneligibleStage,
                    format!("Stage {code} not eligible for role {role}"),
                )
            }
        },
        None => match rules::derive_next_stage(current, &role) {
            Some(stage) => stage,
            None => {
                return EligibilityVerdict::rejected(
                    ErrorCode::NoStageRule,
                    "Cannot derive next stage",
                )
            }
        },
    };

    let eligible = rules::eligible_stages(&role);
    if !eligible.contains(&chosen) {
        return EligibilityVerdict::rejected(
            ErrorCode::IneligibleStage,
            format!("Stage {chosen} not eligible for role {role}"),
        );
    }

    EligibilityVerdict::Changeable {
        role,
        eligible_stages: eligible.to_vec(),
        chosen_stage: chosen,
    }
}

/// Fetches notice and party snapshots and resolves eligibility. Performs no writes.
#[derive(Clone)]
pub struct EligibilityResolver {
    notices: Arc<dyn NoticeRepository>,
    parties: Arc<dyn PartyRepository>,
    policy: SuspensionPolicy,
}

impl EligibilityResolver {
    pub fn new(
        notices: Arc<dyn NoticeRepository>,
        parties: Arc<dyn PartyRepository>,
        policy: SuspensionPolicy,
    ) -> Self {
        Self {
            notices,
            parties,
            policy,
        }
    }

    pub fn policy(&self) -> &SuspensionPolicy {
        &self.policy
    }

    pub fn check(
        &self,
        notice_no: &NoticeNumber,
        requested: Option<&str>,
    ) -> Result<EligibilityVerdict, RepositoryError> {
        let notice = self.notices.fetch(notice_no)?;
        let parties = self.parties.for_notice(notice_no)?;
        let verdict = resolve_eligibility(notice.as_ref(), &parties, requested, &self.policy);
        debug!(%notice_no, ?requested, changeable = verdict.is_changeable(), "eligibility resolved");
        Ok(verdict)
    }
}
