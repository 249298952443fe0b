use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, error, warn};

use super::domain::Stage;
use super::parameters::{ParameterLookup, Parameters};

/// What a transition adds on top of the composition amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charge {
    Composition,
    AdminFee,
    Surcharge,
}

/// First-match charge rules for a `previous -> new` stage change.
///
/// Arm order matters: the stage groups overlap.
pub fn charge_for(previous: Stage, new: Stage) -> Option<Charge> {
    use Stage::*;

    let charge = match (previous, new) {
        (p, Rr3) if p.is_owner_early() => Charge::AdminFee,
        (p, Dr3) if p.is_driver_early() => Charge::AdminFee,
        (p, n) if p.is_reminder() && n.is_court_referral() => Charge::Surcharge,
        (p, Rr3 | Dr3) if p.is_court_referral() => Charge::AdminFee,
        (p, Rov | Rd1 | Rd2 | Dn1 | Dn2) if p.is_court_referral() => Charge::Composition,
        (Rr3, n) if n.is_owner_reentry() => Charge::Composition,
        (Dr3, n) if n.is_driver_early() => Charge::Composition,
        (Rov | Ena | Rd1, Rd1 | Rd2) => Charge::Composition,
        (Dn1, Dn2) => Charge::Composition,
        (Rd1 | Rd2 | Rr3, n) if n.is_driver_early() => Charge::Composition,
        (Dn1 | Dn2 | Dr3, n) if n.is_owner_reentry() => Charge::Composition,
        _ => return None,
    };
    Some(charge)
}

/// Round half-up to cents.
pub fn to_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Computes the amount payable after a stage change. Never fails.
#[derive(Clone)]
pub struct AmountPayableCalculator {
    parameters: Arc<dyn ParameterLookup>,
}

impl AmountPayableCalculator {
    pub fn new(parameters: Arc<dyn ParameterLookup>) -> Self {
        Self { parameters }
    }

    pub fn calculate(
        &self,
        previous: Option<Stage>,
        new: Option<Stage>,
        composition: Option<Decimal>,
    ) -> Decimal {
        let composition = composition.unwrap_or_else(|| {
            warn!("composition amount missing, defaulting to 0.00");
            Decimal::ZERO
        });

        let (Some(previous), Some(new)) = (previous, new) else {
            warn!(?previous, ?new, "stage missing, using composition amount only");
            return to_currency(composition);
        };

        let result = match charge_for(previous, new) {
            Some(Charge::AdminFee) => self.add_admin_fee(composition),
            Some(Charge::Surcharge) => self.add_surcharge(composition),
            Some(Charge::Composition) => to_currency(composition),
            None => {
                warn!(%previous, %new, "no amount rule matched, using composition amount");
                to_currency(composition)
            }
        };

        debug!(%previous, %new, %composition, %result, "calculated amount payable");
        result
    }

    fn add_admin_fee(&self, composition: Decimal) -> Decimal {
        match Parameters::new(self.parameters.as_ref()).admin_fee() {
            Some(fee) => to_currency(composition + fee),
            None => {
                error!("admin fee parameter not found, using composition amount only");
                to_currency(composition)
            }
        }
    }

    fn add_surcharge(&self, composition: Decimal) -> Decimal {
        match Parameters::new(self.parameters.as_ref()).surcharge() {
            Some(surcharge) => to_currency(composition + surcharge),
            None => {
                error!("surcharge parameter not found, using composition amount only");
                to_currency(composition)
            }
        }
    }
}
