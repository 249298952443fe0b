//! Notice processing-stage changes: eligibility, amount payable, history shift and audit.
//!
//! Three channels feed the same commit core: the staff portal batch, the external
//! partner push and the scheduled progression job.

pub mod amount;
pub mod audit;
pub mod batch;
pub mod domain;
pub mod eligibility;
pub(crate) mod locks;
pub mod memory;
pub mod notification;
pub mod parameters;
pub mod partner;
pub mod report;
pub mod repository;
pub mod router;
pub mod scheduled;
pub mod search;
pub mod service;
pub mod transition;
pub mod validation;

#[cfg(test)]
mod tests;

pub use amount::AmountPayableCalculator;
pub use audit::{AuditContext, AuditKey, StageChangeRecord};
pub use batch::{
    BatchInputError, BatchItem, BatchRequest, BatchResult, BatchStatus, BatchSummary,
    ItemOutcome, NoticeResult,
};
pub use domain::{
    ChangeSource, Clock, ErrorCode, FixedClock, Notice, NoticeNumber, OffenderParty,
    OffenderRole, Stage, StageHistory, Suspension, SuspensionType, SystemClock,
};
pub use eligibility::{
    resolve_eligibility, EligibilityResolver, EligibilityVerdict, SuspensionPolicy,
};
pub use memory::{
    InMemoryAuditRepository, InMemoryNoticeRepository, InMemoryPartyRepository, ParameterTable,
    StageMap,
};
pub use notification::{LogNotificationSender, NotificationQueue, NotificationWorker};
pub use parameters::ParameterLookup;
pub use partner::{PartnerChangeError, PartnerChangeOutcome, PartnerChangeRequest};
pub use report::{group_by_date, CsvReportGenerator, ReportEntry};
pub use repository::{
    AuditRepository, FailureNotification, NoticeRepository, NotificationError,
    NotificationSender, PartyRepository, ReportError, ReportGenerator, RepositoryError,
    StageMapRepository,
};
pub use router::stage_change_router;
pub use scheduled::{ScheduledProgressionRequest, ScheduledProgressionSummary};
pub use search::{SearchCriteria, SearchOutcome};
pub use service::{
    CommitError, StageChangeError, StageChangeService, StageChangeSettings, StageChangeStores,
};
pub use transition::StageTransitionApplier;
pub use validation::{ValidationOutcome, ValidationRequest};
