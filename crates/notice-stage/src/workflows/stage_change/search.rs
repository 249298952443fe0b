use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::domain::{Notice, NoticeNumber, OffenderParty, Stage};
use super::repository::RepositoryError;
use super::service::StageChangeService;

pub const SEARCH_COURT_STAGE: &str = "SEARCH_COURT_STAGE";
pub const SEARCH_PS_ACTIVE: &str = "SEARCH_PS_ACTIVE";
pub const SEARCH_ERROR: &str = "SEARCH_ERROR";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    #[serde(default)]
    pub notice_no: Option<String>,
    #[serde(default)]
    pub id_no: Option<String>,
    #[serde(default)]
    pub vehicle_no: Option<String>,
    #[serde(default)]
    pub last_processing_stage: Option<Stage>,
    #[serde(default)]
    pub date_of_current_processing_stage: Option<NaiveDate>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl SearchCriteria {
    pub fn is_empty(&self) -> bool {
        present(&self.notice_no).is_none()
            && present(&self.id_no).is_none()
            && present(&self.vehicle_no).is_none()
            && self.last_processing_stage.is_none()
    }
}

/// Notice row shown to the officer picking notices to change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub notice_no: NoticeNumber,
    pub offence_type: Option<String>,
    pub offence_date_time: Option<NaiveDateTime>,
    pub offender_name: Option<String>,
    pub offender_id: Option<String>,
    pub vehicle_no: Option<String>,
    pub current_processing_stage: Option<Stage>,
    pub current_processing_stage_date: Option<NaiveDateTime>,
    pub owner_driver_indicator: Option<String>,
    pub entity_type: Option<String>,
}

impl SearchHit {
    fn new(notice: &Notice, party: Option<&OffenderParty>) -> Self {
        Self {
            notice_no: notice.notice_no.clone(),
            offence_type: notice.offence_type.clone(),
            offence_date_time: notice.offence_at,
            offender_name: party.and_then(|p| p.name.clone()),
            offender_id: party.and_then(|p| p.id_no.clone()),
            vehicle_no: notice.vehicle_no.clone(),
            current_processing_stage: notice.history.last_stage,
            current_processing_stage_date: notice.history.last_stage_date,
            owner_driver_indicator: party.and_then(|p| p.role_indicator.clone()),
            entity_type: party.and_then(|p| p.entity_type.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IneligibleHit {
    #[serde(flatten)]
    pub notice: SearchHit,
    pub reason_code: &'static str,
    pub reason_message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchSummary {
    pub total: usize,
    pub eligible: usize,
    pub ineligible: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub eligible_notices: Vec<SearchHit>,
    pub ineligible_notices: Vec<IneligibleHit>,
    pub summary: SearchSummary,
}

impl StageChangeService {
    /// Find notices by id number, notice number, vehicle or stage and split them by eligibility.
    pub fn search_notices(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<SearchOutcome, RepositoryError> {
        if criteria.is_empty() {
            info!("search without criteria, returning empty result");
            return Ok(SearchOutcome::default());
        }

        let notices = match present(&criteria.id_no) {
            Some(id_no) => self.notices_for_id(id_no)?,
            None => self.notices_for_criteria(criteria)?,
        };

        let mut outcome = SearchOutcome::default();
        for notice in &notices {
            let party = match self.stores.parties.for_notice(&notice.notice_no) {
                Ok(parties) => parties.into_iter().next(),
                Err(err) => {
                    error!(
                        notice_no = %notice.notice_no,
                        error = %err,
                        "party lookup failed during search"
                    );
                    outcome.ineligible_notices.push(IneligibleHit {
                        notice: SearchHit::new(notice, None),
                        reason_code: SEARCH_ERROR,
                        reason_message: format!("Search error: {err}"),
                    });
                    continue;
                }
            };
            let hit = SearchHit::new(notice, party.as_ref());

            let rejection = if notice.is_permanently_suspended() {
                Some((SEARCH_PS_ACTIVE, "Permanent Suspension is active"))
            } else if notice.current_stage().is_some_and(Stage::is_court) {
                Some((SEARCH_COURT_STAGE, "Notice is in court stage"))
            } else {
                None
            };

            match rejection {
                Some((reason_code, reason_message)) => {
                    debug!(notice_no = %notice.notice_no, reason_code, "search hit ineligible");
                    outcome.ineligible_notices.push(IneligibleHit {
                        notice: hit,
                        reason_code,
                        reason_message: reason_message.to_string(),
                    });
                }
                None => outcome.eligible_notices.push(hit),
            }
        }

        outcome.summary = SearchSummary {
            total: notices.len(),
            eligible: outcome.eligible_notices.len(),
            ineligible: outcome.ineligible_notices.len(),
        };
        info!(
            total = outcome.summary.total,
            eligible = outcome.summary.eligible,
            ineligible = outcome.summary.ineligible,
            "search completed"
        );
        Ok(outcome)
    }

    fn notices_for_id(&self, id_no: &str) -> Result<Vec<Notice>, RepositoryError> {
        let mut seen = HashSet::new();
        let mut notices = Vec::new();
        for party in self.stores.parties.find_by_id_no(id_no)? {
            if !seen.insert(party.notice_no.clone()) {
                continue;
            }
            if let Some(notice) = self.stores.notices.fetch(&party.notice_no)? {
                notices.push(notice);
            }
        }
        Ok(notices)
    }

    fn notices_for_criteria(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<Notice>, RepositoryError> {
        if let Some(notice_no) = present(&criteria.notice_no) {
            return Ok(self
                .stores
                .notices
                .fetch(&NoticeNumber::new(notice_no))?
                .into_iter()
                .collect());
        }

        let mut found = Vec::new();
        if let Some(vehicle_no) = present(&criteria.vehicle_no) {
            found.extend(self.stores.notices.find_by_vehicle(vehicle_no)?);
        }
        if let Some(stage) = criteria.last_processing_stage {
            found.extend(
                self.stores
                    .notices
                    .find_by_last_stage(stage, criteria.date_of_current_processing_stage)?,
            );
        }

        let mut seen = HashSet::new();
        found.retain(|notice| seen.insert(notice.notice_no.clone()));
        Ok(found)
    }
}
