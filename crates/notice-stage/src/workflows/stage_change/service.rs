use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, error, info, warn};

use super::amount::AmountPayableCalculator;
use super::audit::{AuditContext, StageChangeRecord};
use super::batch::{BatchInputError, BatchItem, BatchRequest, BatchResult, NoticeResult};
use super::domain::{ChangeSource, Clock, ErrorCode, Notice, NoticeNumber, Stage};
use super::eligibility::{EligibilityResolver, EligibilityVerdict, SuspensionPolicy};
use super::locks::NoticeLocks;
use super::notification::NotificationQueue;
use super::parameters::ParameterLookup;
use super::repository::{
    AuditRepository, FailureNotification, NoticeRepository, PartyRepository, RepositoryError,
    ReportGenerator, StageMapRepository,
};
use super::transition::{StageTransitionApplier, DEFAULT_STAGE_DAYS};

/// External collaborators the engine reads from and writes to.
#[derive(Clone)]
pub struct StageChangeStores {
    pub notices: Arc<dyn NoticeRepository>,
    pub parties: Arc<dyn PartyRepository>,
    pub audits: Arc<dyn AuditRepository>,
    pub parameters: Arc<dyn ParameterLookup>,
    pub stage_map: Arc<dyn StageMapRepository>,
    pub reports: Arc<dyn ReportGenerator>,
}

/// Tunables resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageChangeSettings {
    pub default_stage_days: i64,
    pub suspension_policy: SuspensionPolicy,
}

impl Default for StageChangeSettings {
    fn default() -> Self {
        Self {
            default_stage_days: DEFAULT_STAGE_DAYS,
            suspension_policy: SuspensionPolicy::permissive(),
        }
    }
}

/// Whether a commit recomputes the amount payable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AmountPolicy {
    Recalculate,
    Retain,
}

/// Outcome of the shared commit core.
#[derive(Debug)]
pub(super) struct Committed {
    pub(super) previous_stage: Option<Stage>,
    pub(super) notice: Notice,
}

#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("notice {0} not found")]
    NoticeMissing(NoticeNumber),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Error raised by the read-side service operations.
#[derive(Debug, thiserror::Error)]
pub enum StageChangeError {
    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl StageChangeError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            Self::Repository(_) => "UNEXPECTED",
        }
    }
}

/// Batch orchestrator composing eligibility, amount calculation, transition and audit.
pub struct StageChangeService {
    pub(super) stores: StageChangeStores,
    pub(super) eligibility: EligibilityResolver,
    pub(super) calculator: AmountPayableCalculator,
    pub(super) applier: StageTransitionApplier,
    pub(super) locks: NoticeLocks,
    pub(super) notifications: NotificationQueue,
    pub(super) clock: Arc<dyn Clock>,
}

impl StageChangeService {
    pub fn new(
        stores: StageChangeStores,
        settings: StageChangeSettings,
        notifications: NotificationQueue,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let eligibility = EligibilityResolver::new(
            stores.notices.clone(),
            stores.parties.clone(),
            settings.suspension_policy,
        );
        let calculator = AmountPayableCalculator::new(stores.parameters.clone());
        let applier = StageTransitionApplier::with_default_stage_days(
            stores.parameters.clone(),
            settings.default_stage_days,
        );

        Self {
            stores,
            eligibility,
            calculator,
            applier,
            locks: NoticeLocks::default(),
            notifications,
            clock,
        }
    }

    pub fn eligibility(&self) -> &EligibilityResolver {
        &self.eligibility
    }

    /// Process a portal batch. Only malformed input fails the call as a whole.
    pub fn process_batch(
        &self,
        request: BatchRequest,
        user_id: &str,
    ) -> Result<BatchResult, BatchInputError> {
        request.validate()?;
        let now = self.clock.now();

        let results: Vec<NoticeResult> = request
            .items
            .iter()
            .map(|item| self.process_item(item, user_id, now))
            .collect();

        let mut result = BatchResult::from_results(results);
        info!(
            user_id,
            status = ?result.status,
            requested = result.summary.requested,
            succeeded = result.summary.succeeded,
            failed = result.summary.failed,
            "change processing stage batch completed"
        );

        if result.summary.succeeded > 0 {
            result.report_url = self.generate_report(now.date(), None, user_id);
        }

        if result.summary.failed > 0 {
            self.notifications.enqueue(FailureNotification {
                batch_date: now.date(),
                requested_by: user_id.to_string(),
                total_requested: result.summary.requested,
                failed_count: result.summary.failed,
                results: result.results.clone(),
            });
        }

        Ok(result)
    }

    fn process_item(&self, item: &BatchItem, user_id: &str, now: NaiveDateTime) -> NoticeResult {
        let notice_no = NoticeNumber::new(item.notice_no.as_str());
        let lock = self.locks.for_notice(&notice_no);
        let _guard = lock.hold();

        match self.try_item(&notice_no, item, user_id, now) {
            Ok(result) => result,
            Err(err) => {
                error!(%notice_no, error = %err, "unexpected error processing notice");
                NoticeResult::failed(notice_no, ErrorCode::Unexpected, err.to_string())
            }
        }
    }

    fn try_item(
        &self,
        notice_no: &NoticeNumber,
        item: &BatchItem,
        user_id: &str,
        now: NaiveDateTime,
    ) -> Result<NoticeResult, CommitError> {
        let requested = item
            .new_stage
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty());

        if let Some(stage) = requested.and_then(Stage::parse_code) {
            if !item.is_confirmed()
                && self.stores.audits.exists(notice_no, stage, now.date())?
            {
                warn!(%notice_no, %stage, "stage change already recorded today");
                return Ok(NoticeResult::warning(
                    notice_no.clone(),
                    ErrorCode::ExistingChangeToday,
                    "Existing change record found for today; resubmit with confirmation to apply",
                ));
            }
        }

        let chosen = match self.eligibility.check(notice_no, requested)? {
            EligibilityVerdict::Changeable { chosen_stage, .. } => chosen_stage,
            EligibilityVerdict::NotChangeable { code, message } => {
                info!(%notice_no, %code, "notice not changeable");
                return Ok(NoticeResult::failed(notice_no.clone(), code, message));
            }
        };

        let context = AuditContext::portal(user_id, item.reason_code.clone(), item.remark.clone());
        let committed = match self.commit(
            notice_no,
            chosen,
            AmountPolicy::Recalculate,
            Some(&context),
            now,
        ) {
            Ok(committed) => committed,
            Err(CommitError::NoticeMissing(_)) => {
                return Ok(NoticeResult::failed(
                    notice_no.clone(),
                    ErrorCode::NotFound,
                    "Notice not found",
                ))
            }
            Err(err) => return Err(err),
        };

        if let Some(allowed) = item.dh_mha_check {
            self.update_dh_mha_flag(notice_no, allowed);
        }

        info!(
            %notice_no,
            previous = ?committed.previous_stage,
            new = %chosen,
            amount = ?committed.notice.amount_payable,
            "stage changed"
        );
        Ok(NoticeResult::updated(
            notice_no.clone(),
            committed.previous_stage,
            chosen,
        ))
    }

    /// Fetch, optionally recalculate, shift history, persist, then write the audit record.
    pub(super) fn commit(
        &self,
        notice_no: &NoticeNumber,
        new_stage: Stage,
        amount: AmountPolicy,
        audit: Option<&AuditContext>,
        now: NaiveDateTime,
    ) -> Result<Committed, CommitError> {
        let mut notice = self
            .stores
            .notices
            .fetch(notice_no)?
            .ok_or_else(|| CommitError::NoticeMissing(notice_no.clone()))?;
        let previous_stage = notice.current_stage();

        if amount == AmountPolicy::Recalculate {
            let payable = self.calculator.calculate(
                previous_stage,
                Some(new_stage),
                notice.amount_payable,
            );
            notice.amount_payable = Some(payable);
            notice.payment_acceptance_allowed = true;
        }

        let updated = self.applier.apply(notice, new_stage, now);
        let saved = self.stores.notices.save(updated)?;

        if let Some(context) = audit {
            let record = context.record(notice_no.clone(), previous_stage, new_stage, now);
            match self.stores.audits.insert(record) {
                Ok(()) => debug!(
                    %notice_no,
                    %new_stage,
                    source = %context.source,
                    "audit record written"
                ),
                Err(RepositoryError::Conflict) => warn!(
                    %notice_no,
                    %new_stage,
                    "audit record for today already exists, keeping original"
                ),
                Err(err) => return Err(err.into()),
            }
        }

        Ok(Committed {
            previous_stage,
            notice: saved,
        })
    }

    fn update_dh_mha_flag(&self, notice_no: &NoticeNumber, allowed: bool) {
        let parties = match self.stores.parties.for_notice(notice_no) {
            Ok(parties) => parties,
            Err(err) => {
                error!(%notice_no, error = %err, "failed to load parties for dh/mha flag");
                return;
            }
        };
        for mut party in parties {
            party.dh_mha_check_allowed = Some(allowed);
            if let Err(err) = self.stores.parties.save(party) {
                error!(%notice_no, error = %err, "failed to update dh/mha flag");
            }
        }
    }

    /// Best-effort report over the day's audit records, optionally narrowed to one source.
    pub(super) fn generate_report(
        &self,
        date: NaiveDate,
        source: Option<ChangeSource>,
        requested_by: &str,
    ) -> Option<String> {
        let records = match self.stores.audits.find_by_date(date) {
            Ok(records) => records,
            Err(err) => {
                error!(error = %err, "failed to load change records for report");
                return None;
            }
        };
        let records: Vec<_> = records
            .into_iter()
            .filter(|record| source.map_or(true, |source| record.source == source))
            .collect();
        if records.is_empty() {
            warn!(?source, "no change records found for report");
            return None;
        }

        match self.stores.reports.generate(&records, requested_by) {
            Ok(url) => Some(url),
            Err(err) => {
                error!(error = %err, "report generation failed, batch outcome unaffected");
                None
            }
        }
    }

    /// Change records created within the inclusive date range.
    pub fn change_records_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<StageChangeRecord>, StageChangeError> {
        if start > end {
            return Err(StageChangeError::InvalidDateRange { start, end });
        }
        let from = start.and_time(chrono::NaiveTime::MIN);
        let until = end
            .succ_opt()
            .map(|next| next.and_time(chrono::NaiveTime::MIN) - chrono::Duration::nanoseconds(1))
            .unwrap_or(NaiveDateTime::MAX);
        Ok(self.stores.audits.find_by_created_between(from, until)?)
    }
}
