use serde::{Deserialize, Serialize};

use super::super::domain::{ErrorCode, Notice, SuspensionType};

/// Toggleable rules for notices under suspension.
///
/// The default is permissive: suspended notices remain changeable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspensionPolicy {
    pub block_permanent: bool,
    /// Temporary suspension reason codes that lock the notice.
    pub blocked_temporary_reasons: Vec<String>,
}

impl SuspensionPolicy {
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Returns the blocking code and message when the notice's suspension forbids a change.
    pub fn blocks(&self, notice: &Notice) -> Option<(ErrorCode, String)> {
        let suspension = notice.suspension.as_ref()?;
        match suspension.kind {
            SuspensionType::Permanent if self.block_permanent => Some((
                ErrorCode::PsBlocked,
                "Notice has permanent suspension".to_string(),
            )),
            SuspensionType::Temporary => {
                let reason = suspension.reason.as_deref()?.trim();
                self.blocked_temporary_reasons
                    .iter()
                    .any(|blocked| blocked.eq_ignore_ascii_case(reason))
                    .then(|| {
                        (
                            ErrorCode::TsBlocked,
                            format!("Notice has temporary suspension {reason}"),
                        )
                    })
            }
            SuspensionType::Permanent => None,
        }
    }
}
