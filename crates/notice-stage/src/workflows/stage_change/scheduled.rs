use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::audit::{AuditContext, AuditKey};
use super::domain::{ChangeSource, NoticeNumber, Stage};
use super::service::{AmountPolicy, CommitError, StageChangeService};

/// Run of the scheduled progression job over notices due for `current_stage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledProgressionRequest {
    pub notice_numbers: Vec<String>,
    pub current_stage: Stage,
    /// Defaults to the service clock.
    #[serde(default)]
    pub processing_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledProgressionSummary {
    pub total: usize,
    pub automatic: usize,
    pub manual: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub success: bool,
}

enum Progressed {
    Automatic,
    Manual,
    Skipped(String),
}

impl StageChangeService {
    /// Advance each notice into `current_stage`, keeping amounts already set by manual changes.
    pub fn progress_scheduled(
        &self,
        request: &ScheduledProgressionRequest,
    ) -> ScheduledProgressionSummary {
        let now = request.processing_date.unwrap_or_else(|| self.clock.now());
        let stage = request.current_stage;
        let mut summary = ScheduledProgressionSummary {
            total: request.notice_numbers.len(),
            ..ScheduledProgressionSummary::default()
        };

        for raw in &request.notice_numbers {
            let notice_no = NoticeNumber::new(raw.as_str());
            let lock = self.locks.for_notice(&notice_no);
            let _guard = lock.hold();

            match self.progress_one(&notice_no, stage, now) {
                Ok(Progressed::Automatic) => summary.automatic += 1,
                Ok(Progressed::Manual) => summary.manual += 1,
                Ok(Progressed::Skipped(reason)) => {
                    warn!(%notice_no, %reason, "scheduled progression skipped notice");
                    summary.skipped += 1;
                    summary.errors.push(format!("{notice_no}: {reason}"));
                }
                Err(err) => {
                    error!(%notice_no, error = %err, "scheduled progression failed");
                    summary.errors.push(format!("{notice_no}: {err}"));
                }
            }
        }

        summary.success = summary.errors.is_empty();
        info!(
            total = summary.total,
            automatic = summary.automatic,
            manual = summary.manual,
            skipped = summary.skipped,
            errors = summary.errors.len(),
            "scheduled progression completed"
        );
        summary
    }

    fn progress_one(
        &self,
        notice_no: &NoticeNumber,
        stage: Stage,
        now: NaiveDateTime,
    ) -> Result<Progressed, CommitError> {
        let Some(notice) = self.stores.notices.fetch(notice_no)? else {
            return Ok(Progressed::Skipped("notice not found".to_string()));
        };
        if notice.history.next_stage != Some(stage) {
            return Ok(Progressed::Skipped(format!(
                "stage mismatch (expected {stage}, actual {})",
                notice
                    .history
                    .next_stage
                    .map(|s| s.code())
                    .unwrap_or("none")
            )));
        }

        if self.is_manual_change(notice_no, stage, now) {
            debug!(%notice_no, %stage, "manual change found, amount left untouched");
            self.commit(notice_no, stage, AmountPolicy::Retain, None, now)?;
            return Ok(Progressed::Manual);
        }

        let context = AuditContext {
            source: ChangeSource::System,
            reason: None,
            remarks: None,
            authorised_by: ChangeSource::System.label().to_string(),
            created_by: ChangeSource::System.label().to_string(),
        };
        self.commit(notice_no, stage, AmountPolicy::Recalculate, Some(&context), now)?;
        Ok(Progressed::Automatic)
    }

    /// A same-day record from a manual channel means the amount was already settled.
    fn is_manual_change(
        &self,
        notice_no: &NoticeNumber,
        stage: Stage,
        now: NaiveDateTime,
    ) -> bool {
        let key = AuditKey {
            notice_no: notice_no.clone(),
            date_of_change: now.date(),
            new_stage: stage,
        };
        match self.stores.audits.fetch(&key) {
            Ok(record) => record.is_some_and(|record| record.source.is_manual()),
            Err(err) => {
                error!(
                    %notice_no,
                    error = %err,
                    "manual change lookup failed, treating as automatic"
                );
                false
            }
        }
    }
}
