//! AC power flow on a [`PowerNet`].
//!
//! Two solvers share one per-unit model ([`model::NetworkModel`]):
//!
//! | Algorithm | Topology | Notes |
//! |-----------|----------|-------|
//! | [`Algorithm::NewtonRaphson`] | any | dense polar Jacobian, faer LU |
//! | [`Algorithm::BackwardForwardSweep`] | radial only | generators as fixed-P injections |
//!
//! Hitting the iteration cap is not an error: the returned results carry
//! `converged = false`. Modelling problems (no slack, loads without a path
//! to a slack, meshed network under the sweep, singular Jacobian) are
//! reported as [`GridError::Solver`].

pub mod flows;
pub mod model;
pub mod newton;
pub mod sweep;

use std::fmt;
use std::str::FromStr;

use gridmate_core::{GridError, GridResult, PowerFlowResults, PowerNet};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use model::NetworkModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    #[serde(rename = "nr", alias = "newton_raphson")]
    NewtonRaphson,
    #[serde(rename = "bfsw", alias = "backward_forward_sweep")]
    BackwardForwardSweep,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::NewtonRaphson => "nr",
            Algorithm::BackwardForwardSweep => "bfsw",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = GridError;

    fn from_str(s: &str) -> GridResult<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "nr" | "newton" | "newton_raphson" => Ok(Algorithm::NewtonRaphson),
            "bfsw" | "sweep" | "backward_forward_sweep" => Ok(Algorithm::BackwardForwardSweep),
            _ => Err(GridError::validation(format!(
                "unknown power flow algorithm '{s}', expected 'nr' or 'bfsw'"
            ))),
        }
    }
}

/// Power flow settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerFlowOptions {
    pub algorithm: Algorithm,
    /// Honour transformer phase shifts and external grid angles
    pub calculate_voltage_angles: bool,
    pub max_iteration: usize,
    /// Largest accepted nodal power mismatch, in MVA
    pub tolerance_mva: f64,
}

impl Default for PowerFlowOptions {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::NewtonRaphson,
            calculate_voltage_angles: true,
            max_iteration: 10,
            tolerance_mva: 1e-8,
        }
    }
}

impl PowerFlowOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_voltage_angles(mut self, enable: bool) -> Self {
        self.calculate_voltage_angles = enable;
        self
    }

    pub fn with_max_iteration(mut self, max_iteration: usize) -> Self {
        self.max_iteration = max_iteration;
        self
    }

    pub fn with_tolerance(mut self, tolerance_mva: f64) -> Self {
        self.tolerance_mva = tolerance_mva;
        self
    }

    pub fn validate(&self) -> GridResult<()> {
        if self.max_iteration == 0 {
            return Err(GridError::validation("max_iteration must be at least 1"));
        }
        if !(self.tolerance_mva.is_finite() && self.tolerance_mva > 0.0) {
            return Err(GridError::validation(format!(
                "tolerance_mva must be positive, got {}",
                self.tolerance_mva
            )));
        }
        Ok(())
    }
}

/// Solver output: complex node voltages in p.u. plus convergence data.
#[derive(Debug, Clone)]
pub struct Solution {
    pub v: Vec<Complex64>,
    pub converged: bool,
    pub iterations: usize,
    pub max_mismatch_mva: f64,
}

impl Solution {
    fn new(
        v_mag: &[f64],
        v_ang: &[f64],
        converged: bool,
        iterations: usize,
        max_mismatch_mva: f64,
    ) -> Self {
        let v = v_mag
            .iter()
            .zip(v_ang)
            .map(|(&m, &a)| Complex64::from_polar(m, a))
            .collect();
        Self::from_complex(v, converged, iterations, max_mismatch_mva)
    }

    fn from_complex(
        v: Vec<Complex64>,
        converged: bool,
        iterations: usize,
        max_mismatch_mva: f64,
    ) -> Self {
        Self {
            v,
            converged,
            iterations,
            max_mismatch_mva,
        }
    }
}

/// Solves the network without touching it.
pub fn solve(net: &PowerNet, options: &PowerFlowOptions) -> GridResult<PowerFlowResults> {
    options.validate()?;
    let model = NetworkModel::build(net, options.calculate_voltage_angles)?;
    let solution = match options.algorithm {
        Algorithm::NewtonRaphson => {
            newton::solve(&model, options.max_iteration, options.tolerance_mva)?
        }
        Algorithm::BackwardForwardSweep => {
            sweep::solve(&model, options.max_iteration, options.tolerance_mva)?
        }
    };
    Ok(flows::assemble(net, &model, &solution, options.algorithm.as_str()))
}

/// Solves the network and records the outcome on it.
///
/// Converged results are attached (replacing earlier ones). A run that hits
/// the iteration cap clears attached results so nothing stale is reported
/// as current. Errors leave the network untouched.
pub fn run_power_flow(net: &mut PowerNet, options: &PowerFlowOptions) -> GridResult<PowerFlowResults> {
    let results = solve(net, options)?;
    if results.converged {
        info!(
            algorithm = %options.algorithm,
            iterations = results.iterations,
            max_mismatch_mva = results.max_mismatch_mva,
            "power flow converged"
        );
        net.attach_results(results.clone());
    } else {
        warn!(
            algorithm = %options.algorithm,
            iterations = results.iterations,
            max_mismatch_mva = results.max_mismatch_mva,
            "power flow did not converge"
        );
        net.clear_results();
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!("nr".parse::<Algorithm>().unwrap(), Algorithm::NewtonRaphson);
        assert_eq!("BFSW".parse::<Algorithm>().unwrap(), Algorithm::BackwardForwardSweep);
        assert_eq!(
            "backward-forward-sweep".parse::<Algorithm>().unwrap(),
            Algorithm::BackwardForwardSweep
        );
        assert!(matches!("dc".parse::<Algorithm>(), Err(GridError::Validation(_))));
    }

    #[test]
    fn test_default_options() {
        let opts = PowerFlowOptions::default();
        assert_eq!(opts.algorithm, Algorithm::NewtonRaphson);
        assert!(opts.calculate_voltage_angles);
        assert_eq!(opts.max_iteration, 10);
        assert_eq!(opts.tolerance_mva, 1e-8);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let opts: PowerFlowOptions =
            serde_json::from_str(r#"{"algorithm": "bfsw", "max_iteration": 30}"#).unwrap();
        assert_eq!(opts.algorithm, Algorithm::BackwardForwardSweep);
        assert_eq!(opts.max_iteration, 30);
        assert!(opts.calculate_voltage_angles);
    }

    #[test]
    fn test_invalid_options_rejected() {
        assert!(PowerFlowOptions::new().with_max_iteration(0).validate().is_err());
        assert!(PowerFlowOptions::new().with_tolerance(-1.0).validate().is_err());
        assert!(PowerFlowOptions::new().with_tolerance(f64::NAN).validate().is_err());
    }
}
