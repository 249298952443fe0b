use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, warn};

use super::domain::{Notice, Stage};
use super::parameters::{ParameterLookup, Parameters};

pub const DEFAULT_STAGE_DAYS: i64 = 14;

/// The single stage-history mutation shared by every change channel.
#[derive(Clone)]
pub struct StageTransitionApplier {
    parameters: Arc<dyn ParameterLookup>,
    default_stage_days: i64,
}

impl StageTransitionApplier {
    pub fn new(parameters: Arc<dyn ParameterLookup>) -> Self {
        Self::with_default_stage_days(parameters, DEFAULT_STAGE_DAYS)
    }

    pub fn with_default_stage_days(parameters: Arc<dyn ParameterLookup>, days: i64) -> Self {
        Self {
            parameters,
            default_stage_days: days.max(0),
        }
    }

    /// Stage scheduled after `stage`; without a configured successor the stage loops on itself.
    pub fn upcoming_stage(&self, stage: Stage) -> Stage {
        Parameters::new(self.parameters.as_ref())
            .next_stage(stage)
            .unwrap_or(stage)
    }

    /// Days until the upcoming stage falls due.
    pub fn stage_days(&self, stage: Stage) -> i64 {
        match Parameters::new(self.parameters.as_ref()).stage_days(stage) {
            Some(days) => days,
            None => {
                warn!(
                    stage = %stage,
                    default_days = self.default_stage_days,
                    "policy gap: no usable STAGEDAYS parameter, applying default"
                );
                self.default_stage_days
            }
        }
    }

    /// Move `notice` into `new_stage` at `now`, returning the updated notice.
    pub fn apply(&self, notice: Notice, new_stage: Stage, now: NaiveDateTime) -> Notice {
        let upcoming = self.upcoming_stage(new_stage);
        let upcoming_on = now + Duration::days(self.stage_days(new_stage));
        let history = notice.history.advance(new_stage, upcoming, now, upcoming_on);

        debug!(
            notice_no = %notice.notice_no,
            from = ?notice.history.last_stage,
            last = ?history.last_stage,
            next = %upcoming,
            next_date = %upcoming_on,
            "stage history shifted"
        );

        Notice { history, ..notice }
    }
}
