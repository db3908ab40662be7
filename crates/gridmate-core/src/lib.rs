//! Network data model for the gridmate tool server.
//!
//! A [`PowerNet`] holds one [`Table`] per element class. Indices are stable
//! and never reused, elements reference each other by index, and the last
//! power-flow result stays attached to the network with a staleness marker.

pub mod diagnostics;
pub mod elements;
pub mod error;
pub mod network;
pub mod results;
pub mod std_types;
pub mod table;
pub mod topology;
pub mod units;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use elements::{
    Bus, BusType, ElementKind, ExtGrid, Gen, Line, Load, Shunt, Switch, SwitchTarget, Transformer,
};
pub use error::{GridError, GridResult};
pub use network::{ElementCounts, PowerNet, DEFAULT_F_HZ, DEFAULT_SN_MVA};
pub use results::{
    BusResult, InjectionResult, LineResult, PowerFlowResults, ResultStatus, TrafoResult,
};
pub use table::{Table, MAX_INDEX};
pub use topology::{Connection, Topology};
