use super::super::domain::{NoticeNumber, Stage, Suspension, SuspensionType};
use super::super::search::{SearchCriteria, SEARCH_COURT_STAGE, SEARCH_PS_ACTIVE};
use super::common::*;

fn numbers(hits: impl Iterator<Item = NoticeNumber>) -> Vec<String> {
    hits.map(|no| no.as_str().to_string()).collect()
}

#[test]
fn empty_criteria_returns_nothing() {
    let harness = build_harness();
    harness.seed_notice(notice_at("N-1", Stage::Rov, "70.00"));

    let outcome = harness
        .service
        .search_notices(&SearchCriteria::default())
        .expect("search");
    assert_eq!(outcome.summary.total, 0);
}

#[test]
fn id_number_takes_precedence_and_deduplicates() {
    let harness = build_harness();
    harness.seed_notice(notice_at("N-1", Stage::Rov, "70.00"));
    harness.seed_notice(notice_at("N-2", Stage::Dn1, "70.00"));
    harness.seed_party(party("N-1", "O", "S1"));
    harness.seed_party(party("N-1", "H", "S1"));
    harness.seed_party(party("N-2", "D", "S2"));

    let criteria = SearchCriteria {
        id_no: Some("s1".to_string()),
        notice_no: Some("N-2".to_string()),
        ..SearchCriteria::default()
    };
    let outcome = harness.service.search_notices(&criteria).expect("search");

    assert_eq!(
        numbers(outcome.eligible_notices.into_iter().map(|hit| hit.notice_no)),
        vec!["N-1".to_string()]
    );
}

#[test]
fn notice_number_wins_over_vehicle() {
    let harness = build_harness();
    harness.seed_notice(notice_at("N-1", Stage::Rov, "70.00"));
    harness.seed_notice(notice_at("N-2", Stage::Rov, "70.00"));

    let criteria = SearchCriteria {
        notice_no: Some("N-2".to_string()),
        vehicle_no: Some("SBA1234A".to_string()),
        ..SearchCriteria::default()
    };
    let outcome = harness.service.search_notices(&criteria).expect("search");
    assert_eq!(outcome.summary.total, 1);
    assert_eq!(outcome.eligible_notices[0].notice_no, NoticeNumber::new("N-2"));
}

#[test]
fn vehicle_and_stage_results_are_merged_without_duplicates() {
    let harness = build_harness();
    let mut other_vehicle = notice_at("N-3", Stage::Rd1, "70.00");
    other_vehicle.vehicle_no = Some("SGX9".to_string());
    harness.seed_notice(notice_at("N-1", Stage::Rd1, "70.00"));
    harness.seed_notice(notice_at("N-2", Stage::Rov, "70.00"));
    harness.seed_notice(other_vehicle);

    let criteria = SearchCriteria {
        vehicle_no: Some("sba1234a".to_string()),
        last_processing_stage: Some(Stage::Rd1),
        date_of_current_processing_stage: Some(days_ago(10).date()),
        ..SearchCriteria::default()
    };
    let outcome = harness.service.search_notices(&criteria).expect("search");

    assert_eq!(
        numbers(outcome.eligible_notices.into_iter().map(|hit| hit.notice_no)),
        vec!["N-1".to_string(), "N-2".to_string(), "N-3".to_string()]
    );
}

#[test]
fn suspended_and_court_notices_are_listed_as_ineligible() {
    let harness = build_harness();
    let mut suspended = notice_at("N-PS", Stage::Crt, "70.00");
    suspended.suspension = Some(Suspension {
        kind: SuspensionType::Permanent,
        reason: None,
    });
    harness.seed_notice(suspended);
    harness.seed_notice(notice_at("N-CRT", Stage::Crc, "70.00"));
    harness.seed_notice(notice_at("N-OK", Stage::Rov, "70.00"));

    let criteria = SearchCriteria {
        vehicle_no: Some("SBA1234A".to_string()),
        ..SearchCriteria::default()
    };
    let outcome = harness.service.search_notices(&criteria).expect("search");

    assert_eq!(outcome.summary.eligible, 1);
    assert_eq!(outcome.summary.ineligible, 2);
    let reasons: Vec<_> = outcome
        .ineligible_notices
        .iter()
        .map(|hit| (hit.notice.notice_no.as_str().to_string(), hit.reason_code))
        .collect();
    assert_eq!(
        reasons,
        vec![
            ("N-CRT".to_string(), SEARCH_COURT_STAGE),
            ("N-PS".to_string(), SEARCH_PS_ACTIVE),
        ]
    );
}
