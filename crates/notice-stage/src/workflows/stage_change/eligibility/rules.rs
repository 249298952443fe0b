use super::super::domain::{OffenderParty, OffenderRole, Stage};

pub(crate) const DRIVER_STAGES: [Stage; 3] = [Stage::Dn1, Stage::Dn2, Stage::Dr3];
pub(crate) const OWNER_STAGES: [Stage; 4] = [Stage::Rov, Stage::Rd1, Stage::Rd2, Stage::Rr3];

/// Party with the highest-priority role indicator (driver > owner > hirer > other).
///
/// Parties without an indicator sort last.
pub(crate) fn primary_party(parties: &[OffenderParty]) -> Option<&OffenderParty> {
    parties
        .iter()
        .min_by_key(|party| party.role().map(|role| role.priority()).unwrap_or(u8::MAX))
}

/// Effective role of a notice. A notice without any indicated party defaults to owner.
pub(crate) fn resolve_role(notice_exists: bool, parties: &[OffenderParty]) -> Option<OffenderRole> {
    if let Some(role) = primary_party(parties).and_then(OffenderParty::role) {
        return Some(role);
    }
    notice_exists.then_some(OffenderRole::Owner)
}

/// Stages the role may be moved into.
pub(crate) fn eligible_stages(role: &OffenderRole) -> &'static [Stage] {
    match role {
        OffenderRole::Driver => &DRIVER_STAGES,
        _ => &OWNER_STAGES,
    }
}

/// Default progression when the caller does not name a target stage.
pub(crate) fn derive_next_stage(current: Option<Stage>, role: &OffenderRole) -> Option<Stage> {
    let current = current?;
    match role {
        OffenderRole::Driver => match current {
            Stage::Npa | Stage::Ena => Some(Stage::Dn1),
            Stage::Dn1 => Some(Stage::Dn2),
            Stage::Dn2 => Some(Stage::Dr3),
            _ => None,
        },
        _ => match current {
            Stage::Npa => Some(Stage::Rov),
            Stage::Rov => Some(Stage::Rd1),
            Stage::Rd1 => Some(Stage::Rd2),
            Stage::Rd2 => Some(Stage::Rr3),
            _ => None,
        },
    }
}
