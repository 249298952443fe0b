use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use super::super::audit::{AuditContext, StageChangeRecord};
use super::super::domain::{FixedClock, NoticeNumber, Stage};
use super::super::report::{group_by_date, CsvReportGenerator};
use super::super::repository::{AuditRepository, ReportError, ReportGenerator};
use super::super::service::StageChangeError;
use super::common::*;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("notice-stage-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

fn record(notice_no: &str, new_stage: Stage, days_back: i64) -> StageChangeRecord {
    AuditContext::portal("officer 1", Some("SUP".to_string()), Some("ok".to_string())).record(
        NoticeNumber::new(notice_no),
        Some(Stage::Rov),
        new_stage,
        days_ago(days_back),
    )
}

#[test]
fn csv_report_is_written_with_notice_details() {
    let harness = build_harness();
    harness.seed_notice(notice_at("N-1", Stage::Rd1, "70.00"));
    let dir = scratch_dir("csv-report");
    let generator = CsvReportGenerator::new(
        &dir,
        Arc::new(harness.notices.clone()),
        Arc::new(FixedClock(now())),
    );

    let path = generator
        .generate(&[record("N-1", Stage::Rd1, 0)], "officer 1")
        .expect("report written");

    assert!(path.ends_with("ChangeStageReport_20250602100000_officer_1.csv"));
    let contents = fs::read_to_string(&path).expect("read report");
    let mut lines = contents.lines();
    assert_eq!(
        lines.next(),
        Some(
            "S/N,Notice Number,Offence Type,Vehicle No,Previous Processing Stage,\
             New Processing Stage,Date of Change,Reason for Change,Remarks,\
             Authorised Officer,Submitted Date,Source"
        )
    );
    assert_eq!(
        lines.next(),
        Some("1,N-1,O,SBA1234A,ROV,RD1,2025-06-02,SUP,ok,officer 1,2025-06-02 10:00:00,OCMS")
    );
    assert_eq!(lines.next(), None);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn reports_in_the_same_second_do_not_overwrite() {
    let harness = build_harness();
    harness.seed_notice(notice_at("N-1", Stage::Rd1, "70.00"));
    harness.seed_notice(notice_at("N-2", Stage::Rd1, "70.00"));
    let dir = scratch_dir("same-second");
    let generator = CsvReportGenerator::new(
        &dir,
        Arc::new(harness.notices.clone()),
        Arc::new(FixedClock(now())),
    );

    let first = generator
        .generate(&[record("N-1", Stage::Rd1, 0)], "officer1")
        .expect("first report");
    let second = generator
        .generate(&[record("N-2", Stage::Rd1, 0)], "officer1")
        .expect("second report");

    assert_ne!(first, second);
    assert!(second.ends_with("ChangeStageReport_20250602100000_officer1_1.csv"));
    assert!(fs::read_to_string(&first)
        .expect("read first")
        .contains("1,N-1,"));
    assert!(fs::read_to_string(&second)
        .expect("read second")
        .contains("1,N-2,"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn empty_report_is_refused() {
    let harness = build_harness();
    let generator = CsvReportGenerator::new(
        scratch_dir("empty-report"),
        Arc::new(harness.notices.clone()),
        Arc::new(FixedClock(now())),
    );
    assert!(matches!(
        generator.generate(&[], "officer1"),
        Err(ReportError::Render(_))
    ));
}

#[test]
fn records_are_grouped_oldest_day_first() {
    let grouped = group_by_date(vec![
        record("N-1", Stage::Rd1, 0),
        record("N-2", Stage::Rd1, 2),
        record("N-3", Stage::Rd2, 0),
    ]);

    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped[0].date, days_ago(2).date());
    assert_eq!(grouped[0].notice_count, 1);
    assert_eq!(grouped[1].date, today());
    assert_eq!(grouped[1].notice_count, 2);
}

#[test]
fn change_records_between_is_inclusive() {
    let harness = build_harness();
    for (no, days_back) in [("N-1", 0), ("N-2", 3), ("N-3", 7)] {
        harness
            .audits
            .insert(record(no, Stage::Rd1, days_back))
            .expect("seed record");
    }

    let records = harness
        .service
        .change_records_between(days_ago(3).date(), today())
        .expect("records");
    let numbers: Vec<_> = records.iter().map(|r| r.notice_no.as_str()).collect();
    assert_eq!(numbers, vec!["N-2", "N-1"]);
}

#[test]
fn inverted_date_range_is_rejected() {
    let harness = build_harness();
    let err = harness
        .service
        .change_records_between(today(), days_ago(1).date())
        .expect_err("start after end");
    assert!(matches!(err, StageChangeError::InvalidDateRange { .. }));
    assert_eq!(err.code(), "INVALID_DATE_RANGE");
}
