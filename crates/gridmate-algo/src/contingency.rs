//! N-1 / N-2 outage analysis.
//!
//! Every candidate outage is applied to its own clone of the baseline
//! network and solved with a full AC power flow. Failures are recorded per
//! contingency; the baseline is only ever borrowed.

use std::fmt;
use std::str::FromStr;

use gridmate_core::{ElementKind, GridError, GridResult, PowerNet};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::power_flow::{self, PowerFlowOptions};
use crate::violations::{self, ViolationLimits, ViolationSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContingencyType {
    #[serde(rename = "N-1")]
    N1,
    #[serde(rename = "N-2")]
    N2,
}

impl ContingencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContingencyType::N1 => "N-1",
            ContingencyType::N2 => "N-2",
        }
    }
}

impl fmt::Display for ContingencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContingencyType {
    type Err = GridError;

    fn from_str(s: &str) -> GridResult<Self> {
        match s.trim().to_ascii_uppercase().replace(['-', '_', ' '], "").as_str() {
            "N1" => Ok(ContingencyType::N1),
            "N2" => Ok(ContingencyType::N2),
            _ => Err(GridError::validation(format!(
                "unknown contingency type '{s}', expected 'N-1' or 'N-2'"
            ))),
        }
    }
}

/// Element classes that may be outaged.
pub const OUTAGE_KINDS: [ElementKind; 2] = [ElementKind::Line, ElementKind::Trafo];

#[derive(Debug, Clone)]
pub struct ContingencyOptions {
    pub contingency_type: ContingencyType,
    pub element_kinds: Vec<ElementKind>,
    pub power_flow: PowerFlowOptions,
    pub limits: ViolationLimits,
    /// Evaluate outages on the rayon pool
    pub parallel: bool,
}

impl Default for ContingencyOptions {
    fn default() -> Self {
        Self {
            contingency_type: ContingencyType::N1,
            element_kinds: OUTAGE_KINDS.to_vec(),
            power_flow: PowerFlowOptions::default(),
            limits: ViolationLimits::default(),
            parallel: true,
        }
    }
}

impl ContingencyOptions {
    pub fn validate(&self) -> GridResult<()> {
        if self.element_kinds.is_empty() {
            return Err(GridError::validation("no element classes selected for outage"));
        }
        if let Some(kind) = self.element_kinds.iter().find(|k| !OUTAGE_KINDS.contains(k)) {
            return Err(GridError::validation(format!(
                "cannot outage element class '{kind}', expected line or trafo"
            )));
        }
        self.power_flow.validate()?;
        self.limits.validate()
    }
}

/// An outaged element, `(class, index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outage {
    pub element: ElementKind,
    pub index: usize,
}

impl fmt::Display for Outage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.element.table_name(), self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContingencyOutcome {
    pub label: String,
    pub outaged: Vec<Outage>,
    pub converged: bool,
    pub violations: Option<ViolationSet>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContingencySummary {
    pub total: usize,
    pub converged: usize,
    pub not_converged: usize,
    pub failed: usize,
    pub with_violations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContingencyReport {
    pub contingency_type: ContingencyType,
    pub outcomes: Vec<ContingencyOutcome>,
    pub summary: ContingencySummary,
}

/// In-service candidates of the selected classes, in class then index order.
/// A class listed twice contributes its elements once.
pub fn candidates(net: &PowerNet, kinds: &[ElementKind]) -> Vec<Outage> {
    let mut out = Vec::new();
    let mut seen = Vec::new();
    for &kind in kinds {
        if seen.contains(&kind) {
            continue;
        }
        seen.push(kind);
        let indices: Vec<usize> = match kind {
            ElementKind::Line => net
                .line
                .iter()
                .filter(|(_, l)| l.in_service)
                .map(|(i, _)| i)
                .collect(),
            ElementKind::Trafo => net
                .trafo
                .iter()
                .filter(|(_, t)| t.in_service)
                .map(|(i, _)| i)
                .collect(),
            _ => Vec::new(),
        };
        out.extend(indices.into_iter().map(|index| Outage {
            element: kind,
            index,
        }));
    }
    out
}

/// Outage sets for the requested order; N-2 takes every unordered pair.
pub fn enumerate(candidates: &[Outage], contingency_type: ContingencyType) -> Vec<Vec<Outage>> {
    match contingency_type {
        ContingencyType::N1 => candidates.iter().map(|&c| vec![c]).collect(),
        ContingencyType::N2 => {
            let mut sets = Vec::new();
            for (i, &a) in candidates.iter().enumerate() {
                for &b in &candidates[i + 1..] {
                    sets.push(vec![a, b]);
                }
            }
            sets
        }
    }
}

fn label(outaged: &[Outage]) -> String {
    outaged
        .iter()
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join("+")
}

/// Solves one outage on a private copy of the baseline.
pub fn evaluate(baseline: &PowerNet, outaged: &[Outage], options: &ContingencyOptions) -> ContingencyOutcome {
    let label = label(outaged);
    let mut working = baseline.clone();
    working.clear_results();

    let mut outcome = ContingencyOutcome {
        label,
        outaged: outaged.to_vec(),
        converged: false,
        violations: None,
        error: None,
    };
    for o in outaged {
        if let Err(e) = working.set_in_service(o.element, o.index, false) {
            outcome.error = Some(e.to_string());
            return outcome;
        }
    }

    match power_flow::solve(&working, &options.power_flow) {
        Ok(results) if results.converged => {
            outcome.converged = true;
            outcome.violations = Some(violations::check(&results, &options.limits));
        }
        Ok(results) => {
            outcome.error = Some(format!(
                "power flow did not converge within {} iterations (mismatch {:.3e} MVA)",
                results.iterations, results.max_mismatch_mva
            ));
        }
        Err(e) => outcome.error = Some(e.to_string()),
    }
    debug!(
        contingency = %outcome.label,
        converged = outcome.converged,
        "contingency evaluated"
    );
    outcome
}

/// Runs the full sweep. Outcome order follows [`enumerate`] regardless of
/// whether the pool is used.
pub fn run_contingency_analysis(
    baseline: &PowerNet,
    options: &ContingencyOptions,
) -> GridResult<ContingencyReport> {
    options.validate()?;
    let sets = enumerate(
        &candidates(baseline, &options.element_kinds),
        options.contingency_type,
    );

    let outcomes: Vec<ContingencyOutcome> = if options.parallel {
        sets.par_iter()
            .map(|set| evaluate(baseline, set, options))
            .collect()
    } else {
        sets.iter().map(|set| evaluate(baseline, set, options)).collect()
    };

    let mut summary = ContingencySummary {
        total: outcomes.len(),
        ..Default::default()
    };
    for o in &outcomes {
        if o.converged {
            summary.converged += 1;
            if o.violations.as_ref().is_some_and(|v| !v.is_empty()) {
                summary.with_violations += 1;
            }
        } else {
            summary.not_converged += 1;
        }
        if o.error.is_some() {
            summary.failed += 1;
        }
    }
    info!(
        kind = %options.contingency_type,
        total = summary.total,
        converged = summary.converged,
        with_violations = summary.with_violations,
        "contingency analysis finished"
    );

    Ok(ContingencyReport {
        contingency_type: options.contingency_type,
        outcomes,
        summary,
    })
}
