use super::super::audit::AuditContext;
use super::super::domain::{ChangeSource, Notice, NoticeNumber, Stage};
use super::super::repository::AuditRepository;
use super::super::scheduled::ScheduledProgressionRequest;
use super::common::*;

fn due(notice_no: &str, last: Stage, next: Stage, amount: &str) -> Notice {
    let mut notice = notice_at(notice_no, last, amount);
    notice.history.next_stage = Some(next);
    notice.history.next_stage_date = Some(now());
    notice
}

fn run(stage: Stage, notices: &[&str]) -> ScheduledProgressionRequest {
    ScheduledProgressionRequest {
        notice_numbers: notices.iter().map(|n| n.to_string()).collect(),
        current_stage: stage,
        processing_date: None,
    }
}

#[test]
fn automatic_progression_recalculates_and_audits() {
    let harness = build_harness();
    harness.seed_notice(due("N-1", Stage::Rd2, Stage::Rr3, "70.00"));

    let summary = harness.service.progress_scheduled(&run(Stage::Rr3, &["N-1"]));

    assert_eq!(summary.total, 1);
    assert_eq!(summary.automatic, 1);
    assert_eq!(summary.manual, 0);
    assert!(summary.success);

    let notice = harness.notice("N-1");
    assert_eq!(notice.amount_payable, Some(dec("120.00")));
    assert_eq!(notice.history.previous_stage, Some(Stage::Rd2));
    assert_eq!(notice.history.last_stage, Some(Stage::Rr3));

    let records = harness.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source, ChangeSource::System);
    assert_eq!(records[0].created_by, "SYSTEM");
}

#[test]
fn manual_change_today_keeps_amount_and_skips_audit() {
    let harness = build_harness();
    harness.seed_notice(due("N-1", Stage::Rd2, Stage::Rr3, "70.00"));
    let manual = AuditContext::portal("officer1", Some("SUP".to_string()), None).record(
        NoticeNumber::new("N-1"),
        Some(Stage::Rd2),
        Stage::Rr3,
        now(),
    );
    harness.audits.insert(manual.clone()).expect("seed record");

    let summary = harness.service.progress_scheduled(&run(Stage::Rr3, &["N-1"]));

    assert_eq!(summary.manual, 1);
    assert_eq!(summary.automatic, 0);
    let notice = harness.notice("N-1");
    assert_eq!(notice.amount_payable, Some(dec("70.00")));
    assert_eq!(notice.history.last_stage, Some(Stage::Rr3));
    assert_eq!(harness.records(), vec![manual]);
}

#[test]
fn mismatched_and_missing_notices_are_skipped() {
    let harness = build_harness();
    harness.seed_notice(due("N-1", Stage::Rov, Stage::Rd1, "70.00"));
    harness.seed_notice(due("N-2", Stage::Rd2, Stage::Rr3, "70.00"));

    let summary = harness
        .service
        .progress_scheduled(&run(Stage::Rr3, &["N-1", "N-2", "N-404"]));

    assert_eq!(summary.total, 3);
    assert_eq!(summary.automatic, 1);
    assert_eq!(summary.skipped, 2);
    assert!(!summary.success);
    assert_eq!(
        summary.errors,
        vec![
            "N-1: stage mismatch (expected RR3, actual RD1)".to_string(),
            "N-404: notice not found".to_string(),
        ]
    );
    assert_eq!(harness.notice("N-1").version, 0);
}

#[test]
fn processing_date_overrides_clock() {
    let harness = build_harness();
    harness.seed_notice(due("N-1", Stage::Rd2, Stage::Rr3, "70.00"));
    let run_at = days_ago(1);

    let mut request = run(Stage::Rr3, &["N-1"]);
    request.processing_date = Some(run_at);
    harness.service.progress_scheduled(&request);

    let notice = harness.notice("N-1");
    assert_eq!(notice.history.last_stage_date, Some(run_at));
    assert_eq!(harness.records()[0].date_of_change, run_at.date());
}
