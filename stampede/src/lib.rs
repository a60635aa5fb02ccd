#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

extern crate self as stampede;

pub mod scenario;
#[doc(hidden)]
pub mod transaction;

pub(crate) mod measurement;
pub(crate) mod task_atomics;
pub(crate) mod timer;
pub(crate) mod vu_pool;

#[cfg(test)]
pub(crate) mod test_utils;

pub use scenario::{ConfigurableScenario, Scenario};
pub use stampede_core::{
    Aggregation, CheckSummary, Comparison, Metric, RampProfile, RunStatistics, Stage,
    StageParseError, Threshold, ThresholdError, ThresholdOutcome, DEFAULT_GRACEFUL_STOP,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use stampede_macros::{scenario, transaction};
pub use transaction::check;

pub mod prelude {
    pub use crate::scenario::ConfigurableScenario;
    pub use crate::transaction::check;
    pub use stampede_core::{RunStatistics, Stage, Threshold};
    pub use stampede_macros::{scenario, transaction};
}
