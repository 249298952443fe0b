use std::str::FromStr;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::Value;

use super::super::audit::StageChangeRecord;
use super::super::domain::{FixedClock, Notice, NoticeNumber, OffenderParty, Stage, StageHistory};
use super::super::memory::{
    InMemoryAuditRepository, InMemoryNoticeRepository, InMemoryPartyRepository, ParameterTable,
    StageMap,
};
use super::super::notification::{NotificationQueue, NotificationWorker};
use super::super::parameters::{ADMIN_FEE, AMOUNT_CODE, NEXT_STAGE_CODE, STAGE_DAYS, SURCHARGE};
use super::super::repository::{
    FailureNotification, NoticeRepository, NotificationError, NotificationSender, PartyRepository,
    ReportError, ReportGenerator, RepositoryError, StageMapRepository,
};
use super::super::service::{StageChangeService, StageChangeSettings, StageChangeStores};

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).expect("valid date")
}

pub(super) fn now() -> NaiveDateTime {
    today().and_hms_opt(10, 0, 0).expect("valid time")
}

pub(super) fn days_ago(days: i64) -> NaiveDateTime {
    now() - chrono::Duration::days(days)
}

pub(super) fn dec(raw: &str) -> Decimal {
    Decimal::from_str(raw).expect("valid decimal")
}

pub(super) fn default_parameters() -> ParameterTable {
    ParameterTable::default()
        .with(ADMIN_FEE, AMOUNT_CODE, "50.00")
        .with(SURCHARGE, AMOUNT_CODE, "100.00")
        .with("NEXT_STAGE_ROV", NEXT_STAGE_CODE, "RD1")
        .with("NEXT_STAGE_RD1", NEXT_STAGE_CODE, "RD2")
        .with("NEXT_STAGE_RD2", NEXT_STAGE_CODE, "RR3")
        .with("NEXT_STAGE_DN1", NEXT_STAGE_CODE, "DN2")
        .with("NEXT_STAGE_DN2", NEXT_STAGE_CODE, "DR3")
        .with(STAGE_DAYS, "RD1", "21")
        .with(STAGE_DAYS, "DN2", "21")
        .with(STAGE_DAYS, "DR3", "28")
}

/// Notice sitting in `stage` since ten days ago with nothing else scheduled.
pub(super) fn notice_at(notice_no: &str, stage: Stage, amount: &str) -> Notice {
    Notice {
        history: StageHistory {
            last_stage: Some(stage),
            last_stage_date: Some(days_ago(10)),
            ..StageHistory::default()
        },
        amount_payable: Some(dec(amount)),
        offence_type: Some("O".to_string()),
        vehicle_no: Some("SBA1234A".to_string()),
        offence_at: Some(days_ago(30)),
        ..Notice::new(notice_no)
    }
}

pub(super) fn party(notice_no: &str, indicator: &str, id_no: &str) -> OffenderParty {
    OffenderParty {
        notice_no: NoticeNumber::new(notice_no),
        role_indicator: Some(indicator.to_string()),
        id_no: Some(id_no.to_string()),
        name: Some(format!("Party {id_no}")),
        entity_type: Some("I".to_string()),
        dh_mha_check_allowed: None,
    }
}

/// Records every report request instead of writing files.
#[derive(Default)]
pub(super) struct RecordingReports {
    pub(super) requests: Mutex<Vec<(usize, String)>>,
    pub(super) fail: bool,
}

impl RecordingReports {
    pub(super) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(super) fn requests(&self) -> Vec<(usize, String)> {
        self.requests.lock().expect("reports mutex poisoned").clone()
    }
}

impl ReportGenerator for RecordingReports {
    fn generate(
        &self,
        records: &[StageChangeRecord],
        requested_by: &str,
    ) -> Result<String, ReportError> {
        if self.fail {
            return Err(ReportError::Render("storage offline".to_string()));
        }
        self.requests
            .lock()
            .expect("reports mutex poisoned")
            .push((records.len(), requested_by.to_string()));
        Ok(format!("reports/{requested_by}.csv"))
    }
}

#[derive(Default)]
pub(super) struct RecordingSender {
    pub(super) sent: Mutex<Vec<FailureNotification>>,
}

impl RecordingSender {
    pub(super) fn sent(&self) -> Vec<FailureNotification> {
        self.sent.lock().expect("sender mutex poisoned").clone()
    }
}

impl NotificationSender for RecordingSender {
    fn notify_failures(
        &self,
        notification: &FailureNotification,
    ) -> Result<bool, NotificationError> {
        self.sent
            .lock()
            .expect("sender mutex poisoned")
            .push(notification.clone());
        Ok(true)
    }
}

/// Notice store whose writes fail for one notice number.
pub(super) struct FailingSaveRepository {
    pub(super) inner: InMemoryNoticeRepository,
    pub(super) failing: NoticeNumber,
}

impl NoticeRepository for FailingSaveRepository {
    fn fetch(&self, notice_no: &NoticeNumber) -> Result<Option<Notice>, RepositoryError> {
        self.inner.fetch(notice_no)
    }

    fn save(&self, notice: Notice) -> Result<Notice, RepositoryError> {
        if notice.notice_no == self.failing {
            return Err(RepositoryError::Unavailable("disk full".to_string()));
        }
        self.inner.save(notice)
    }

    fn find_by_vehicle(&self, vehicle_no: &str) -> Result<Vec<Notice>, RepositoryError> {
        self.inner.find_by_vehicle(vehicle_no)
    }

    fn find_by_last_stage(
        &self,
        stage: Stage,
        on: Option<NaiveDate>,
    ) -> Result<Vec<Notice>, RepositoryError> {
        self.inner.find_by_last_stage(stage, on)
    }
}

pub(super) struct UnavailableStageMap;

impl StageMapRepository for UnavailableStageMap {
    fn allows(&self, _last: Stage, _next: Stage) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("stage map offline".to_string()))
    }
}

pub(super) struct HarnessOptions {
    pub(super) settings: StageChangeSettings,
    pub(super) parameters: ParameterTable,
    pub(super) stage_map: Arc<dyn StageMapRepository>,
    pub(super) reports: Arc<RecordingReports>,
    pub(super) failing_save: Option<&'static str>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            settings: StageChangeSettings::default(),
            parameters: default_parameters(),
            stage_map: Arc::new(
                StageMap::default()
                    .allow(Stage::Rd1, Stage::Rd2)
                    .allow(Stage::Dn1, Stage::Dn2)
                    .allow(Stage::Rr3, Stage::Cpc),
            ),
            reports: Arc::new(RecordingReports::default()),
            failing_save: None,
        }
    }
}

pub(super) struct Harness {
    pub(super) notices: InMemoryNoticeRepository,
    pub(super) parties: InMemoryPartyRepository,
    pub(super) audits: InMemoryAuditRepository,
    pub(super) reports: Arc<RecordingReports>,
    pub(super) sender: Arc<RecordingSender>,
    pub(super) worker: NotificationWorker,
    pub(super) service: Arc<StageChangeService>,
}

impl Harness {
    pub(super) fn seed_notice(&self, notice: Notice) {
        self.notices.put(notice).expect("seed notice");
    }

    pub(super) fn seed_party(&self, party: OffenderParty) {
        self.parties.save(party).expect("seed party");
    }

    pub(super) fn notice(&self, notice_no: &str) -> Notice {
        self.notices
            .fetch(&NoticeNumber::new(notice_no))
            .expect("fetch notice")
            .expect("notice present")
    }

    pub(super) fn records(&self) -> Vec<StageChangeRecord> {
        self.audits.all().expect("audit records")
    }
}

pub(super) fn build_harness() -> Harness {
    build_harness_with(HarnessOptions::default())
}

pub(super) fn build_harness_with(options: HarnessOptions) -> Harness {
    let notices = InMemoryNoticeRepository::default();
    let parties = InMemoryPartyRepository::default();
    let audits = InMemoryAuditRepository::default();
    let sender = Arc::new(RecordingSender::default());
    let (queue, worker) = NotificationQueue::channel(sender.clone());

    let notice_store: Arc<dyn NoticeRepository> = match options.failing_save {
        Some(failing) => Arc::new(FailingSaveRepository {
            inner: notices.clone(),
            failing: NoticeNumber::new(failing),
        }),
        None => Arc::new(notices.clone()),
    };

    let stores = StageChangeStores {
        notices: notice_store,
        parties: Arc::new(parties.clone()),
        audits: Arc::new(audits.clone()),
        parameters: Arc::new(options.parameters),
        stage_map: options.stage_map,
        reports: options.reports.clone(),
    };
    let service = StageChangeService::new(
        stores,
        options.settings,
        queue,
        Arc::new(FixedClock(now())),
    );

    Harness {
        notices,
        parties,
        audits,
        reports: options.reports,
        sender,
        worker,
        service: Arc::new(service),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
