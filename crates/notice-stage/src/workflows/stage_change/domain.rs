use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for offence notices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoticeNumber(pub String);

impl NoticeNumber {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoticeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Processing stage codes a notice can sit in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "NPA")]
    Npa,
    #[serde(rename = "ROV")]
    Rov,
    #[serde(rename = "ENA")]
    Ena,
    #[serde(rename = "RD1")]
    Rd1,
    #[serde(rename = "RD2")]
    Rd2,
    #[serde(rename = "RR3")]
    Rr3,
    #[serde(rename = "DN1")]
    Dn1,
    #[serde(rename = "DN2")]
    Dn2,
    #[serde(rename = "DR3")]
    Dr3,
    #[serde(rename = "CFC")]
    Cfc,
    #[serde(rename = "CPC")]
    Cpc,
    #[serde(rename = "CRT")]
    Crt,
    #[serde(rename = "CRC")]
    Crc,
    #[serde(rename = "CFI")]
    Cfi,
}

impl Stage {
    pub const fn ordered() -> [Self; 14] {
        [
            Self::Npa,
            Self::Rov,
            Self::Ena,
            Self::Rd1,
            Self::Rd2,
            Self::Rr3,
            Self::Dn1,
            Self::Dn2,
            Self::Dr3,
            Self::Cfc,
            Self::Cpc,
            Self::Crt,
            Self::Crc,
            Self::Cfi,
        ]
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::Npa => "NPA",
            Self::Rov => "ROV",
            Self::Ena => "ENA",
            Self::Rd1 => "RD1",
            Self::Rd2 => "RD2",
            Self::Rr3 => "RR3",
            Self::Dn1 => "DN1",
            Self::Dn2 => "DN2",
            Self::Dr3 => "DR3",
            Self::Cfc => "CFC",
            Self::Cpc => "CPC",
            Self::Crt => "CRT",
            Self::Crc => "CRC",
            Self::Cfi => "CFI",
        }
    }

    /// Parse a stage code leniently (trimmed, case-insensitive). Blank input yields `None`.
    pub fn parse_code(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        trimmed.parse().ok()
    }

    /// Court stages lock a notice against any manual change.
    pub const fn is_court(self) -> bool {
        matches!(self, Self::Crt | Self::Crc | Self::Cfi)
    }

    /// Court referral stages (fine/prosecution) that attract a surcharge on entry.
    pub const fn is_court_referral(self) -> bool {
        matches!(self, Self::Cfc | Self::Cpc)
    }

    pub const fn is_owner_early(self) -> bool {
        matches!(self, Self::Rov | Self::Ena | Self::Rd1 | Self::Rd2)
    }

    pub const fn is_driver_early(self) -> bool {
        matches!(self, Self::Dn1 | Self::Dn2)
    }

    /// Owner and driver reminder stages, final reminders included.
    pub const fn is_reminder(self) -> bool {
        self.is_owner_early() || self.is_driver_early() || matches!(self, Self::Rr3 | Self::Dr3)
    }

    /// Owner reminder stages that can be re-entered manually (ENA excluded).
    pub const fn is_owner_reentry(self) -> bool {
        matches!(self, Self::Rov | Self::Rd1 | Self::Rd2)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown processing stage code '{0}'")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let code = value.trim().to_ascii_uppercase();
        Self::ordered()
            .into_iter()
            .find(|stage| stage.code() == code)
            .ok_or_else(|| UnknownStage(value.to_string()))
    }
}

/// Effective offender role used to pick the eligible stage set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OffenderRole {
    Driver,
    Owner,
    Hirer,
    Director,
    Other(String),
}

impl OffenderRole {
    /// Normalize an owner/driver indicator code (`D`, `O`, `H`, `DIR` or the full word).
    pub fn from_indicator(raw: &str) -> Option<Self> {
        let code = raw.trim().to_ascii_uppercase();
        match code.as_str() {
            "" => None,
            "D" | "DRIVER" => Some(Self::Driver),
            "O" | "OWNER" => Some(Self::Owner),
            "H" | "HIRER" => Some(Self::Hirer),
            "DIR" | "DIRECTOR" => Some(Self::Director),
            _ => Some(Self::Other(code)),
        }
    }

    /// Lookup priority when a notice carries several parties (lower wins).
    pub const fn priority(&self) -> u8 {
        match self {
            Self::Driver => 1,
            Self::Owner => 2,
            Self::Hirer => 3,
            Self::Director | Self::Other(_) => 4,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Driver => "DRIVER",
            Self::Owner => "OWNER",
            Self::Hirer => "HIRER",
            Self::Director => "DIRECTOR",
            Self::Other(code) => code.as_str(),
        }
    }
}

impl Serialize for OffenderRole {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

impl fmt::Display for OffenderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuspensionType {
    Permanent,
    Temporary,
}

/// Suspension marker carried by a notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suspension {
    pub kind: SuspensionType,
    pub reason: Option<String>,
}

/// Three-slot sliding window of a notice's stage history.
///
/// Values are never patched slot by slot; [`StageHistory::advance`] builds the successor
/// window from the current one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageHistory {
    pub previous_stage: Option<Stage>,
    pub previous_stage_date: Option<NaiveDateTime>,
    pub last_stage: Option<Stage>,
    pub last_stage_date: Option<NaiveDateTime>,
    pub next_stage: Option<Stage>,
    pub next_stage_date: Option<NaiveDateTime>,
}

impl StageHistory {
    /// Shift `last -> previous` and `next -> last`, then install a fresh `next` slot.
    ///
    /// When no scheduled next stage exists the applied stage becomes `last`.
    pub fn advance(
        &self,
        applied: Stage,
        upcoming: Stage,
        now: NaiveDateTime,
        upcoming_on: NaiveDateTime,
    ) -> Self {
        Self {
            previous_stage: self.last_stage,
            previous_stage_date: self.last_stage_date,
            last_stage: Some(self.next_stage.unwrap_or(applied)),
            last_stage_date: Some(now),
            next_stage: Some(upcoming),
            next_stage_date: Some(upcoming_on),
        }
    }
}

/// Offence notice record as held by the notice store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub notice_no: NoticeNumber,
    #[serde(default)]
    pub offence_type: Option<String>,
    #[serde(default)]
    pub vehicle_no: Option<String>,
    #[serde(default)]
    pub offence_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub history: StageHistory,
    #[serde(default)]
    pub amount_payable: Option<Decimal>,
    #[serde(default)]
    pub payment_acceptance_allowed: bool,
    #[serde(default)]
    pub suspension: Option<Suspension>,
    /// Optimistic concurrency token, bumped by the store on every save.
    #[serde(default)]
    pub version: u64,
}

impl Notice {
    pub fn new(notice_no: impl Into<String>) -> Self {
        Self {
            notice_no: NoticeNumber::new(notice_no),
            offence_type: None,
            vehicle_no: None,
            offence_at: None,
            history: StageHistory::default(),
            amount_payable: None,
            payment_acceptance_allowed: false,
            suspension: None,
            version: 0,
        }
    }

    pub fn current_stage(&self) -> Option<Stage> {
        self.history.last_stage
    }

    pub fn is_permanently_suspended(&self) -> bool {
        matches!(
            self.suspension,
            Some(Suspension {
                kind: SuspensionType::Permanent,
                ..
            })
        )
    }
}

/// Owner/driver/hirer/director party attached to a notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffenderParty {
    pub notice_no: NoticeNumber,
    pub role_indicator: Option<String>,
    #[serde(default)]
    pub id_no: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub dh_mha_check_allowed: Option<bool>,
}

impl OffenderParty {
    pub fn role(&self) -> Option<OffenderRole> {
        self.role_indicator
            .as_deref()
            .and_then(OffenderRole::from_indicator)
    }
}

/// Channel a stage change originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeSource {
    Ocms,
    Plus,
    System,
    Avss,
}

impl ChangeSource {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ocms => "OCMS",
            Self::Plus => "PLUS",
            Self::System => "SYSTEM",
            Self::Avss => "AVSS",
        }
    }

    /// Staff portal and partner changes are manual; system and AVSS changes are not.
    pub const fn is_manual(self) -> bool {
        matches!(self, Self::Ocms | Self::Plus)
    }
}

impl fmt::Display for ChangeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classified outcome codes surfaced per notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    RoleConflict,
    NoStageRule,
    IneligibleStage,
    CourtStage,
    PsBlocked,
    TsBlocked,
    ExistingChangeToday,
    RemarksRequired,
    ValidationError,
    Unexpected,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::RoleConflict => "ROLE_CONFLICT",
            Self::NoStageRule => "NO_STAGE_RULE",
            Self::IneligibleStage => "INELIGIBLE_STAGE",
            Self::CourtStage => "COURT_STAGE",
            Self::PsBlocked => "PS_BLOCKED",
            Self::TsBlocked => "TS_BLOCKED",
            Self::ExistingChangeToday => "EXISTING_CHANGE_TODAY",
            Self::RemarksRequired => "REMARKS_REQUIRED",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::Unexpected => "UNEXPECTED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of the current time so the engine can be driven deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Wall clock in the service's local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .expect("valid date")
            .and_hms_opt(hour, 0, 0)
            .expect("valid time")
    }

    #[test]
    fn stage_codes_parse_case_insensitively() {
        assert_eq!(Stage::parse_code(" rd1 "), Some(Stage::Rd1));
        assert_eq!(Stage::parse_code("DR3"), Some(Stage::Dr3));
        assert_eq!(Stage::parse_code(""), None);
        assert_eq!(Stage::parse_code("XYZ"), None);
        assert!("XYZ".parse::<Stage>().is_err());
    }

    #[test]
    fn stage_groups_keep_court_and_referral_apart() {
        assert!(Stage::Crt.is_court());
        assert!(!Stage::Cfc.is_court());
        assert!(Stage::Cfc.is_court_referral());
        assert!(Stage::Rr3.is_reminder());
        assert!(!Stage::Npa.is_reminder());
        assert!(Stage::Ena.is_owner_early());
        assert!(!Stage::Ena.is_owner_reentry());
    }

    #[test]
    fn role_indicators_normalize() {
        assert_eq!(OffenderRole::from_indicator("d"), Some(OffenderRole::Driver));
        assert_eq!(OffenderRole::from_indicator("DIR"), Some(OffenderRole::Director));
        assert_eq!(
            OffenderRole::from_indicator("x"),
            Some(OffenderRole::Other("X".to_string()))
        );
        assert_eq!(OffenderRole::from_indicator("  "), None);
        assert!(OffenderRole::Driver.priority() < OffenderRole::Owner.priority());
        assert!(OffenderRole::Owner.priority() < OffenderRole::Hirer.priority());
    }

    #[test]
    fn advance_shifts_scheduled_next_into_last() {
        let history = StageHistory {
            previous_stage: Some(Stage::Npa),
            previous_stage_date: Some(at(1, 9)),
            last_stage: Some(Stage::Rov),
            last_stage_date: Some(at(2, 9)),
            next_stage: Some(Stage::Rd1),
            next_stage_date: Some(at(9, 9)),
        };

        let advanced = history.advance(Stage::Rd2, Stage::Rr3, at(5, 10), at(19, 10));

        assert_eq!(advanced.previous_stage, Some(Stage::Rov));
        assert_eq!(advanced.previous_stage_date, Some(at(2, 9)));
        assert_eq!(advanced.last_stage, Some(Stage::Rd1));
        assert_eq!(advanced.last_stage_date, Some(at(5, 10)));
        assert_eq!(advanced.next_stage, Some(Stage::Rr3));
        assert_eq!(advanced.next_stage_date, Some(at(19, 10)));
        assert_eq!(history.last_stage, Some(Stage::Rov), "source window untouched");
    }

    #[test]
    fn advance_falls_back_to_applied_stage_without_scheduled_next() {
        let history = StageHistory {
            last_stage: Some(Stage::Dn1),
            last_stage_date: Some(at(2, 9)),
            ..StageHistory::default()
        };

        let advanced = history.advance(Stage::Dr3, Stage::Dr3, at(5, 10), at(19, 10));

        assert_eq!(advanced.previous_stage, Some(Stage::Dn1));
        assert_eq!(advanced.last_stage, Some(Stage::Dr3));
        assert_eq!(advanced.next_stage, Some(Stage::Dr3));
    }

    #[test]
    fn advance_keeps_previous_window_when_stage_repeats_across_slots() {
        let history = StageHistory {
            previous_stage: Some(Stage::Rd1),
            previous_stage_date: Some(at(1, 9)),
            last_stage: Some(Stage::Rd1),
            last_stage_date: Some(at(2, 9)),
            next_stage: Some(Stage::Rd1),
            next_stage_date: Some(at(3, 9)),
        };

        let advanced = history.advance(Stage::Rd1, Stage::Rd2, at(4, 9), at(18, 9));

        assert_eq!(advanced.previous_stage_date, Some(at(2, 9)));
        assert_eq!(advanced.last_stage, Some(Stage::Rd1));
        assert_eq!(advanced.last_stage_date, Some(at(4, 9)));
        assert_eq!(advanced.next_stage, Some(Stage::Rd2));
    }
}
