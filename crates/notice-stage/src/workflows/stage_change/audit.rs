use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::domain::{ChangeSource, NoticeNumber, Stage};

/// Natural key of a stage change record, doubling as the same-day idempotency fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditKey {
    pub notice_no: NoticeNumber,
    pub date_of_change: NaiveDate,
    pub new_stage: Stage,
}

/// Immutable record of one applied stage change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageChangeRecord {
    pub notice_no: NoticeNumber,
    pub date_of_change: NaiveDate,
    pub previous_stage: Option<Stage>,
    pub new_stage: Stage,
    pub reason: Option<String>,
    pub authorised_by: String,
    pub source: ChangeSource,
    pub remarks: Option<String>,
    pub created_at: NaiveDateTime,
    pub created_by: String,
}

impl StageChangeRecord {
    pub fn key(&self) -> AuditKey {
        AuditKey {
            notice_no: self.notice_no.clone(),
            date_of_change: self.date_of_change,
            new_stage: self.new_stage,
        }
    }
}

/// Who/why metadata a channel attaches to each change it commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditContext {
    pub source: ChangeSource,
    pub reason: Option<String>,
    pub remarks: Option<String>,
    pub authorised_by: String,
    pub created_by: String,
}

impl AuditContext {
    /// Staff portal change authorised and created by the same user.
    pub fn portal(user_id: &str, reason: Option<String>, remarks: Option<String>) -> Self {
        Self {
            source: ChangeSource::Ocms,
            reason,
            remarks,
            authorised_by: user_id.to_string(),
            created_by: user_id.to_string(),
        }
    }

    pub fn record(
        &self,
        notice_no: NoticeNumber,
        previous_stage: Option<Stage>,
        new_stage: Stage,
        now: NaiveDateTime,
    ) -> StageChangeRecord {
        StageChangeRecord {
            notice_no,
            date_of_change: now.date(),
            previous_stage,
            new_stage,
            reason: self.reason.clone(),
            authorised_by: self.authorised_by.clone(),
            source: self.source,
            remarks: self.remarks.clone(),
            created_at: now,
            created_by: self.created_by.clone(),
        }
    }
}
