use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use super::audit::StageChangeRecord;
use super::domain::{Clock, Notice};
use super::repository::{NoticeRepository, ReportError, ReportGenerator};

const GENERATION_ATTEMPTS: usize = 2;
const NAME_ATTEMPTS: usize = 100;

/// Writes change reports as CSV files into a local directory.
pub struct CsvReportGenerator {
    directory: PathBuf,
    notices: Arc<dyn NoticeRepository>,
    clock: Arc<dyn Clock>,
}

impl CsvReportGenerator {
    pub fn new(
        directory: impl Into<PathBuf>,
        notices: Arc<dyn NoticeRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory: directory.into(),
            notices,
            clock,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_name(stamp: &str, requested_by: &str, sequence: usize) -> String {
        let user: String = requested_by
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let user = if user.is_empty() { "SYSTEM" } else { &user };
        if sequence == 0 {
            format!("ChangeStageReport_{stamp}_{user}.csv")
        } else {
            format!("ChangeStageReport_{stamp}_{user}_{sequence}.csv")
        }
    }

    /// Reports from the same user within one second get a numeric suffix, never an overwrite.
    fn create_file(&self, requested_by: &str) -> Result<(PathBuf, File), ReportError> {
        let stamp = self.clock.now().format("%Y%m%d%H%M%S").to_string();
        for sequence in 0..NAME_ATTEMPTS {
            let path = self
                .directory
                .join(Self::file_name(&stamp, requested_by, sequence));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(ReportError::Render(format!(
            "no free report file name for {stamp} after {NAME_ATTEMPTS} attempts"
        )))
    }

    fn write(&self, records: &[StageChangeRecord], requested_by: &str) -> Result<String, ReportError> {
        fs::create_dir_all(&self.directory)?;
        let (path, file) = self.create_file(requested_by)?;

        let mut writer = csv::Writer::from_writer(file);
        for (index, record) in records.iter().enumerate() {
            let notice = self.notices.fetch(&record.notice_no).ok().flatten();
            writer.serialize(ReportRow::new(index + 1, record, notice.as_ref()))?;
        }
        writer.flush()?;

        Ok(path.to_string_lossy().into_owned())
    }
}

impl ReportGenerator for CsvReportGenerator {
    fn generate(
        &self,
        records: &[StageChangeRecord],
        requested_by: &str,
    ) -> Result<String, ReportError> {
        if records.is_empty() {
            return Err(ReportError::Render("no change records to report".to_string()));
        }

        let mut last_error = None;
        for attempt in 1..=GENERATION_ATTEMPTS {
            match self.write(records, requested_by) {
                Ok(url) => {
                    info!(%url, records = records.len(), "change report generated");
                    return Ok(url);
                }
                Err(err) => {
                    warn!(attempt, error = %err, "change report generation failed");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ReportError::Render("report generation not attempted".to_string())))
    }
}

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    #[serde(rename = "S/N")]
    serial: usize,
    #[serde(rename = "Notice Number")]
    notice_no: &'a str,
    #[serde(rename = "Offence Type")]
    offence_type: &'a str,
    #[serde(rename = "Vehicle No")]
    vehicle_no: &'a str,
    #[serde(rename = "Previous Processing Stage")]
    previous_stage: &'a str,
    #[serde(rename = "New Processing Stage")]
    new_stage: &'a str,
    #[serde(rename = "Date of Change")]
    date_of_change: String,
    #[serde(rename = "Reason for Change")]
    reason: &'a str,
    #[serde(rename = "Remarks")]
    remarks: &'a str,
    #[serde(rename = "Authorised Officer")]
    authorised_by: &'a str,
    #[serde(rename = "Submitted Date")]
    submitted: String,
    #[serde(rename = "Source")]
    source: &'static str,
}

impl<'a> ReportRow<'a> {
    fn new(serial: usize, record: &'a StageChangeRecord, notice: Option<&'a Notice>) -> Self {
        Self {
            serial,
            notice_no: record.notice_no.as_str(),
            offence_type: notice
                .and_then(|n| n.offence_type.as_deref())
                .unwrap_or_default(),
            vehicle_no: notice
                .and_then(|n| n.vehicle_no.as_deref())
                .unwrap_or_default(),
            previous_stage: record.previous_stage.map(|s| s.code()).unwrap_or_default(),
            new_stage: record.new_stage.code(),
            date_of_change: record.date_of_change.format("%Y-%m-%d").to_string(),
            reason: record.reason.as_deref().unwrap_or_default(),
            remarks: record.remarks.as_deref().unwrap_or_default(),
            authorised_by: &record.authorised_by,
            submitted: record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            source: record.source.label(),
        }
    }
}

/// One day's worth of change records in a report listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub date: NaiveDate,
    pub notice_count: usize,
    pub records: Vec<StageChangeRecord>,
}

/// Group records by date of change, oldest first.
pub fn group_by_date(records: Vec<StageChangeRecord>) -> Vec<ReportEntry> {
    let mut days: BTreeMap<NaiveDate, Vec<StageChangeRecord>> = BTreeMap::new();
    for record in records {
        days.entry(record.date_of_change).or_default().push(record);
    }
    days.into_iter()
        .map(|(date, records)| ReportEntry {
            date,
            notice_count: records.len(),
            records,
        })
        .collect()
}
