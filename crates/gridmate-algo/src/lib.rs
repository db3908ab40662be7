//! Analysis on gridmate networks.
//!
//! - [`power_flow`]: AC power flow by Newton-Raphson or backward/forward sweep
//! - [`violations`]: voltage band and loading limit checks on solved results
//! - [`contingency`]: N-1 / N-2 outage sweeps over independent network copies

pub mod contingency;
pub mod power_flow;
pub mod violations;

pub use contingency::{
    run_contingency_analysis, ContingencyOptions, ContingencyOutcome, ContingencyReport,
    ContingencySummary, ContingencyType, Outage,
};
pub use power_flow::{run_power_flow, solve, Algorithm, PowerFlowOptions};
pub use violations::{ViolationLimits, ViolationSet};
