use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::audit::{AuditKey, StageChangeRecord};
use super::batch::NoticeResult;
use super::domain::{Notice, NoticeNumber, OffenderParty, Stage};

/// Storage abstraction over the externally managed notice table.
pub trait NoticeRepository: Send + Sync {
    fn fetch(&self, notice_no: &NoticeNumber) -> Result<Option<Notice>, RepositoryError>;

    /// Persist `notice` if its `version` still matches the stored copy.
    ///
    /// Returns the stored notice with its bumped version.
    fn save(&self, notice: Notice) -> Result<Notice, RepositoryError>;

    fn find_by_vehicle(&self, vehicle_no: &str) -> Result<Vec<Notice>, RepositoryError>;

    fn find_by_last_stage(
        &self,
        stage: Stage,
        on: Option<NaiveDate>,
    ) -> Result<Vec<Notice>, RepositoryError>;
}

/// Owner/driver party records keyed by notice.
pub trait PartyRepository: Send + Sync {
    fn for_notice(&self, notice_no: &NoticeNumber) -> Result<Vec<OffenderParty>, RepositoryError>;
    fn find_by_id_no(&self, id_no: &str) -> Result<Vec<OffenderParty>, RepositoryError>;
    fn save(&self, party: OffenderParty) -> Result<(), RepositoryError>;
}

/// Append-only store of stage change records.
pub trait AuditRepository: Send + Sync {
    fn exists(
        &self,
        notice_no: &NoticeNumber,
        new_stage: Stage,
        date: NaiveDate,
    ) -> Result<bool, RepositoryError>;
    fn fetch(&self, key: &AuditKey) -> Result<Option<StageChangeRecord>, RepositoryError>;

    /// Insert a new record; an existing record under the same key yields `Conflict`.
    fn insert(&self, record: StageChangeRecord) -> Result<(), RepositoryError>;
    fn find_by_date(&self, date: NaiveDate) -> Result<Vec<StageChangeRecord>, RepositoryError>;
    fn find_by_created_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<StageChangeRecord>, RepositoryError>;
}

/// Allow-list of stage transitions accepted from the external partner channel.
pub trait StageMapRepository: Send + Sync {
    fn allows(&self, last: Stage, next: Stage) -> Result<bool, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stale write for notice {notice_no}: expected version {expected}, found {found}")]
    VersionConflict {
        notice_no: NoticeNumber,
        expected: u64,
        found: u64,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Renders change records into a downloadable report and returns its location.
pub trait ReportGenerator: Send + Sync {
    fn generate(
        &self,
        records: &[StageChangeRecord],
        requested_by: &str,
    ) -> Result<String, ReportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("report rendering failed: {0}")]
    Render(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Outbound hook for failure notifications (e-mail or chat adapters).
pub trait NotificationSender: Send + Sync {
    /// Returns whether the notification was actually delivered.
    fn notify_failures(&self, notification: &FailureNotification)
        -> Result<bool, NotificationError>;
}

/// Summary of a batch's failed and warning items.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureNotification {
    pub batch_date: NaiveDate,
    pub requested_by: String,
    pub total_requested: usize,
    pub failed_count: usize,
    pub results: Vec<NoticeResult>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
