//! Unit execution: per-unit path selection and the parallel, order-preserving dispatcher.

mod dispatcher;
mod selector;

pub use dispatcher::{Dispatcher, StageReport, normalize_to_peak};
pub use selector::{ExecutionContext, UnitFailurePolicy, UnitOutcome, run_unit};
