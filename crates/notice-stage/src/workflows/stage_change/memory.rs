//! Process-local stores backing the demo command, the service binary and the tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{NaiveDate, NaiveDateTime};

use super::audit::{AuditKey, StageChangeRecord};
use super::domain::{Notice, NoticeNumber, OffenderParty, Stage};
use super::parameters::ParameterLookup;
use super::repository::{
    AuditRepository, NoticeRepository, PartyRepository, RepositoryError, StageMapRepository,
};

fn guard<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
}

#[derive(Default, Clone)]
pub struct InMemoryNoticeRepository {
    notices: Arc<Mutex<BTreeMap<NoticeNumber, Notice>>>,
}

impl InMemoryNoticeRepository {
    /// Seed or overwrite a notice, bypassing the version check.
    pub fn put(&self, notice: Notice) -> Result<(), RepositoryError> {
        guard(&self.notices)?.insert(notice.notice_no.clone(), notice);
        Ok(())
    }

    pub fn all(&self) -> Result<Vec<Notice>, RepositoryError> {
        Ok(guard(&self.notices)?.values().cloned().collect())
    }
}

impl NoticeRepository for InMemoryNoticeRepository {
    fn fetch(&self, notice_no: &NoticeNumber) -> Result<Option<Notice>, RepositoryError> {
        Ok(guard(&self.notices)?.get(notice_no).cloned())
    }

    fn save(&self, mut notice: Notice) -> Result<Notice, RepositoryError> {
        let mut notices = guard(&self.notices)?;
        let stored = notices
            .get(&notice.notice_no)
            .ok_or(RepositoryError::NotFound)?;
        if stored.version != notice.version {
            return Err(RepositoryError::VersionConflict {
                notice_no: notice.notice_no.clone(),
                expected: notice.version,
                found: stored.version,
            });
        }
        notice.version += 1;
        notices.insert(notice.notice_no.clone(), notice.clone());
        Ok(notice)
    }

    fn find_by_vehicle(&self, vehicle_no: &str) -> Result<Vec<Notice>, RepositoryError> {
        let vehicle_no = vehicle_no.trim();
        Ok(guard(&self.notices)?
            .values()
            .filter(|notice| {
                notice
                    .vehicle_no
                    .as_deref()
                    .is_some_and(|v| v.eq_ignore_ascii_case(vehicle_no))
            })
            .cloned()
            .collect())
    }

    fn find_by_last_stage(
        &self,
        stage: Stage,
        on: Option<NaiveDate>,
    ) -> Result<Vec<Notice>, RepositoryError> {
        Ok(guard(&self.notices)?
            .values()
            .filter(|notice| notice.history.last_stage == Some(stage))
            .filter(|notice| match on {
                Some(date) => notice.history.last_stage_date.map(|at| at.date()) == Some(date),
                None => true,
            })
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryPartyRepository {
    parties: Arc<Mutex<Vec<OffenderParty>>>,
}

impl InMemoryPartyRepository {
    pub fn all(&self) -> Result<Vec<OffenderParty>, RepositoryError> {
        Ok(guard(&self.parties)?.clone())
    }
}

impl PartyRepository for InMemoryPartyRepository {
    fn for_notice(&self, notice_no: &NoticeNumber) -> Result<Vec<OffenderParty>, RepositoryError> {
        Ok(guard(&self.parties)?
            .iter()
            .filter(|party| &party.notice_no == notice_no)
            .cloned()
            .collect())
    }

    fn find_by_id_no(&self, id_no: &str) -> Result<Vec<OffenderParty>, RepositoryError> {
        let id_no = id_no.trim();
        Ok(guard(&self.parties)?
            .iter()
            .filter(|party| {
                party
                    .id_no
                    .as_deref()
                    .is_some_and(|id| id.eq_ignore_ascii_case(id_no))
            })
            .cloned()
            .collect())
    }

    /// Upsert keyed by notice number and role indicator.
    fn save(&self, party: OffenderParty) -> Result<(), RepositoryError> {
        let mut parties = guard(&self.parties)?;
        match parties.iter_mut().find(|existing| {
            existing.notice_no == party.notice_no && existing.role_indicator == party.role_indicator
        }) {
            Some(existing) => *existing = party,
            None => parties.push(party),
        }
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryAuditRepository {
    records: Arc<Mutex<BTreeMap<AuditKey, StageChangeRecord>>>,
}

impl InMemoryAuditRepository {
    pub fn all(&self) -> Result<Vec<StageChangeRecord>, RepositoryError> {
        Ok(guard(&self.records)?.values().cloned().collect())
    }
}

impl AuditRepository for InMemoryAuditRepository {
    fn exists(
        &self,
        notice_no: &NoticeNumber,
        new_stage: Stage,
        date: NaiveDate,
    ) -> Result<bool, RepositoryError> {
        let key = AuditKey {
            notice_no: notice_no.clone(),
            date_of_change: date,
            new_stage,
        };
        Ok(guard(&self.records)?.contains_key(&key))
    }

    fn fetch(&self, key: &AuditKey) -> Result<Option<StageChangeRecord>, RepositoryError> {
        Ok(guard(&self.records)?.get(key).cloned())
    }

    fn insert(&self, record: StageChangeRecord) -> Result<(), RepositoryError> {
        let mut records = guard(&self.records)?;
        let key = record.key();
        if records.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        records.insert(key, record);
        Ok(())
    }

    fn find_by_date(&self, date: NaiveDate) -> Result<Vec<StageChangeRecord>, RepositoryError> {
        Ok(guard(&self.records)?
            .values()
            .filter(|record| record.date_of_change == date)
            .cloned()
            .collect())
    }

    fn find_by_created_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<StageChangeRecord>, RepositoryError> {
        let mut records: Vec<_> = guard(&self.records)?
            .values()
            .filter(|record| record.created_at >= start && record.created_at <= end)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.created_at);
        Ok(records)
    }
}

/// Parameter table keyed by `(parameter_id, code)`.
#[derive(Debug, Default, Clone)]
pub struct ParameterTable {
    values: HashMap<(String, String), String>,
}

impl ParameterTable {
    pub fn with(mut self, parameter_id: &str, code: &str, value: &str) -> Self {
        self.values
            .insert((parameter_id.to_string(), code.to_string()), value.to_string());
        self
    }
}

impl ParameterLookup for ParameterTable {
    fn get(&self, parameter_id: &str, code: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .values
            .get(&(parameter_id.to_string(), code.to_string()))
            .cloned())
    }
}

/// Allow-list of `(last, next)` stage pairs.
#[derive(Debug, Default, Clone)]
pub struct StageMap {
    allowed: HashSet<(Stage, Stage)>,
}

impl StageMap {
    pub fn allow(mut self, last: Stage, next: Stage) -> Self {
        self.allowed.insert((last, next));
        self
    }
}

impl StageMapRepository for StageMap {
    fn allows(&self, last: Stage, next: Stage) -> Result<bool, RepositoryError> {
        Ok(self.allowed.contains(&(last, next)))
    }
}
