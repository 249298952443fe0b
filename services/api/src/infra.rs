use chrono::{NaiveDate, NaiveDateTime};
use metrics_exporter_prometheus::PrometheusHandle;
use notice_stage::config::StageChangeConfig;
use notice_stage::workflows::stage_change::{
    Clock, CsvReportGenerator, InMemoryAuditRepository, InMemoryNoticeRepository,
    InMemoryPartyRepository, Notice, NoticeNumber, NotificationQueue, NotificationSender,
    NotificationWorker, OffenderParty, ParameterTable, PartyRepository, RepositoryError, Stage,
    StageChangeService, StageChangeStores, StageHistory, StageMap, Suspension, SuspensionType,
};
use rust_decimal::Decimal;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local stores kept alongside the service so callers can seed and inspect them.
#[derive(Clone, Default)]
pub(crate) struct LocalStores {
    pub(crate) notices: InMemoryNoticeRepository,
    pub(crate) parties: InMemoryPartyRepository,
    pub(crate) audits: InMemoryAuditRepository,
}

pub(crate) struct Assembled {
    pub(crate) stores: LocalStores,
    pub(crate) service: Arc<StageChangeService>,
    pub(crate) worker: NotificationWorker,
}

pub(crate) fn default_parameters() -> ParameterTable {
    ParameterTable::default()
        .with("ADMIN_FEE", "AMOUNT", "50.00")
        .with("SURCHARGE", "AMOUNT", "100.00")
        .with("NEXT_STAGE_ROV", "NEXT_STAGE", "RD1")
        .with("NEXT_STAGE_RD1", "NEXT_STAGE", "RD2")
        .with("NEXT_STAGE_RD2", "NEXT_STAGE", "RR3")
        .with("NEXT_STAGE_RR3", "NEXT_STAGE", "CPC")
        .with("NEXT_STAGE_DN1", "NEXT_STAGE", "DN2")
        .with("NEXT_STAGE_DN2", "NEXT_STAGE", "DR3")
        .with("NEXT_STAGE_DR3", "NEXT_STAGE", "CPC")
        .with("STAGEDAYS", "ROV", "14")
        .with("STAGEDAYS", "RD1", "21")
        .with("STAGEDAYS", "RD2", "21")
        .with("STAGEDAYS", "DN1", "14")
        .with("STAGEDAYS", "DN2", "21")
}

pub(crate) fn default_stage_map() -> StageMap {
    StageMap::default()
        .allow(Stage::Rov, Stage::Rd1)
        .allow(Stage::Rd1, Stage::Rd2)
        .allow(Stage::Rd2, Stage::Rr3)
        .allow(Stage::Rr3, Stage::Cpc)
        .allow(Stage::Dn1, Stage::Dn2)
        .allow(Stage::Dn2, Stage::Dr3)
        .allow(Stage::Dr3, Stage::Cpc)
}

/// Wire the engine over in-memory stores and a CSV report directory.
pub(crate) fn assemble(
    config: &StageChangeConfig,
    sender: Arc<dyn NotificationSender>,
    clock: Arc<dyn Clock>,
) -> Assembled {
    let local = LocalStores::default();
    let notices = Arc::new(local.notices.clone());
    let reports = CsvReportGenerator::new(config.report_dir.clone(), notices.clone(), clock.clone());

    let stores = StageChangeStores {
        notices,
        parties: Arc::new(local.parties.clone()),
        audits: Arc::new(local.audits.clone()),
        parameters: Arc::new(default_parameters()),
        stage_map: Arc::new(default_stage_map()),
        reports: Arc::new(reports),
    };
    let (queue, worker) = NotificationQueue::channel(sender);
    let service = StageChangeService::new(stores, config.settings(), queue, clock);

    Assembled {
        stores: local,
        service: Arc::new(service),
        worker,
    }
}

fn sample_notice(
    notice_no: &str,
    vehicle_no: &str,
    stage: Stage,
    next: Option<Stage>,
    amount: Decimal,
    now: NaiveDateTime,
) -> Notice {
    Notice {
        offence_type: Some("O".to_string()),
        vehicle_no: Some(vehicle_no.to_string()),
        offence_at: Some(now - chrono::Duration::days(45)),
        history: StageHistory {
            last_stage: Some(stage),
            last_stage_date: Some(now - chrono::Duration::days(14)),
            next_stage: next,
            next_stage_date: next.map(|_| now),
            ..StageHistory::default()
        },
        amount_payable: Some(amount),
        ..Notice::new(notice_no)
    }
}

fn sample_party(notice_no: &str, indicator: &str, id_no: &str, name: &str) -> OffenderParty {
    OffenderParty {
        notice_no: NoticeNumber::new(notice_no),
        role_indicator: Some(indicator.to_string()),
        id_no: Some(id_no.to_string()),
        name: Some(name.to_string()),
        entity_type: Some("I".to_string()),
        dh_mha_check_allowed: None,
    }
}

/// Seed a handful of notices covering driver, owner, court and suspended cases.
pub(crate) fn seed_sample_notices(
    stores: &LocalStores,
    now: NaiveDateTime,
) -> Result<(), RepositoryError> {
    let amount = Decimal::new(15000, 2);
    stores.notices.put(sample_notice(
        "500500303J",
        "SBA1234A",
        Stage::Dn1,
        None,
        amount,
        now,
    ))?;
    stores.notices.put(sample_notice(
        "500500304K",
        "SBA1234A",
        Stage::Rov,
        Some(Stage::Rd1),
        Decimal::new(7000, 2),
        now,
    ))?;
    stores.notices.put(sample_notice(
        "500500305L",
        "SGX4321B",
        Stage::Crt,
        None,
        amount,
        now,
    ))?;

    let mut suspended = sample_notice(
        "500500306M",
        "SGX4321B",
        Stage::Rd2,
        None,
        Decimal::new(7000, 2),
        now,
    );
    suspended.suspension = Some(Suspension {
        kind: SuspensionType::Permanent,
        reason: Some("APP".to_string()),
    });
    stores.notices.put(suspended)?;

    stores
        .parties
        .save(sample_party("500500303J", "D", "S1234567D", "Tan Wei Ming"))?;
    stores
        .parties
        .save(sample_party("500500304K", "O", "S7654321H", "Lim Mei Ling"))?;
    stores
        .parties
        .save(sample_party("500500305L", "O", "T0123456J", "Goh Kok Wah"))?;
    Ok(())
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notice_stage::workflows::stage_change::{FixedClock, LogNotificationSender};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .expect("valid date")
            .and_hms_opt(9, 0, 0)
            .expect("valid time")
    }

    #[test]
    fn seeded_stores_are_visible_to_the_service() {
        let assembled = assemble(
            &StageChangeConfig::default(),
            Arc::new(LogNotificationSender::default()),
            Arc::new(FixedClock(now())),
        );
        seed_sample_notices(&assembled.stores, now()).expect("seed");

        let verdict = assembled
            .service
            .eligibility()
            .check(&NoticeNumber::new("500500303J"), Some("DR3"))
            .expect("eligibility");
        assert_eq!(verdict.chosen_stage(), Some(Stage::Dr3));
        assert_eq!(assembled.stores.notices.all().expect("notices").len(), 4);
    }

    #[test]
    fn parse_date_reports_bad_input() {
        assert!(parse_date("2025-06-02").is_ok());
        assert!(parse_date("02/06/2025")
            .expect_err("rejects format")
            .contains("02/06/2025"));
    }
}
