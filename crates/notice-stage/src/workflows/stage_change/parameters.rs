use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::{debug, error, warn};

use super::domain::Stage;
use super::repository::RepositoryError;

pub const ADMIN_FEE: &str = "ADMIN_FEE";
pub const SURCHARGE: &str = "SURCHARGE";
pub const AMOUNT_CODE: &str = "AMOUNT";
pub const STAGE_DAYS: &str = "STAGEDAYS";
pub const NEXT_STAGE_CODE: &str = "NEXT_STAGE";

/// Read-only key/value parameter table (`parameter_id`, `code`) -> value.
pub trait ParameterLookup: Send + Sync {
    fn get(&self, parameter_id: &str, code: &str) -> Result<Option<String>, RepositoryError>;
}

/// Parameter id holding the stage scheduled after `stage`.
pub fn next_stage_parameter(stage: Stage) -> String {
    format!("NEXT_STAGE_{}", stage.code())
}

/// Typed accessors over a [`ParameterLookup`]. Every accessor degrades to `None`.
pub struct Parameters<'a> {
    lookup: &'a dyn ParameterLookup,
}

impl<'a> Parameters<'a> {
    pub fn new(lookup: &'a dyn ParameterLookup) -> Self {
        Self { lookup }
    }

    fn value(&self, parameter_id: &str, code: &str) -> Option<String> {
        match self.lookup.get(parameter_id, code) {
            Ok(Some(value)) if !value.trim().is_empty() => Some(value.trim().to_string()),
            Ok(_) => None,
            Err(err) => {
                warn!(parameter_id, code, error = %err, "parameter lookup failed");
                None
            }
        }
    }

    fn amount(&self, parameter_id: &str) -> Option<Decimal> {
        let raw = self.value(parameter_id, AMOUNT_CODE)?;
        match Decimal::from_str(&raw) {
            Ok(amount) => {
                debug!(parameter_id, %amount, "resolved amount parameter");
                Some(amount)
            }
            Err(err) => {
                error!(parameter_id, value = %raw, error = %err, "amount parameter is not a decimal");
                None
            }
        }
    }

    pub fn admin_fee(&self) -> Option<Decimal> {
        self.amount(ADMIN_FEE)
    }

    pub fn surcharge(&self) -> Option<Decimal> {
        self.amount(SURCHARGE)
    }

    /// Stage configured to follow `stage`, ignoring codes the engine does not know.
    pub fn next_stage(&self, stage: Stage) -> Option<Stage> {
        let parameter_id = next_stage_parameter(stage);
        let raw = self.value(&parameter_id, NEXT_STAGE_CODE)?;
        match raw.parse::<Stage>() {
            Ok(next) => Some(next),
            Err(err) => {
                warn!(parameter_id = %parameter_id, error = %err, "ignoring next stage parameter");
                None
            }
        }
    }

    /// Days until the stage after `stage` falls due. Negative values are rejected.
    pub fn stage_days(&self, stage: Stage) -> Option<i64> {
        let raw = self.value(STAGE_DAYS, stage.code())?;
        match raw.parse::<i64>() {
            Ok(days) if days >= 0 => Some(days),
            Ok(days) => {
                warn!(stage = %stage, days, "negative STAGEDAYS value");
                None
            }
            Err(_) => {
                warn!(stage = %stage, value = %raw, "STAGEDAYS value is not an integer");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Table(HashMap<(String, String), String>);

    impl Table {
        fn with(entries: &[(&str, &str, &str)]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(id, code, value)| ((id.to_string(), code.to_string()), value.to_string()))
                    .collect(),
            )
        }
    }

    impl ParameterLookup for Table {
        fn get(&self, parameter_id: &str, code: &str) -> Result<Option<String>, RepositoryError> {
            Ok(self
                .0
                .get(&(parameter_id.to_string(), code.to_string()))
                .cloned())
        }
    }

    struct Offline;

    impl ParameterLookup for Offline {
        fn get(&self, _parameter_id: &str, _code: &str) -> Result<Option<String>, RepositoryError> {
            Err(RepositoryError::Unavailable("parameter table offline".to_string()))
        }
    }

    #[test]
    fn reads_typed_values() {
        let table = Table::with(&[
            ("ADMIN_FEE", "AMOUNT", " 50.00 "),
            ("NEXT_STAGE_RD1", "NEXT_STAGE", "RD2"),
            ("STAGEDAYS", "RD1", "21"),
        ]);
        let params = Parameters::new(&table);

        assert_eq!(params.admin_fee(), Some(Decimal::new(5000, 2)));
        assert_eq!(params.surcharge(), None);
        assert_eq!(params.next_stage(Stage::Rd1), Some(Stage::Rd2));
        assert_eq!(params.stage_days(Stage::Rd1), Some(21));
    }

    #[test]
    fn rejects_malformed_values() {
        let table = Table::with(&[
            ("SURCHARGE", "AMOUNT", "lots"),
            ("NEXT_STAGE_RD1", "NEXT_STAGE", "ZZZ"),
            ("STAGEDAYS", "RD1", "-3"),
            ("STAGEDAYS", "RD2", "soon"),
        ]);
        let params = Parameters::new(&table);

        assert_eq!(params.surcharge(), None);
        assert_eq!(params.next_stage(Stage::Rd1), None);
        assert_eq!(params.stage_days(Stage::Rd1), None);
        assert_eq!(params.stage_days(Stage::Rd2), None);
    }

    #[test]
    fn lookup_failures_read_as_absent() {
        let params = Parameters::new(&Offline);
        assert_eq!(params.admin_fee(), None);
        assert_eq!(params.next_stage(Stage::Dn1), None);
    }
}
