//! Console reporting: one [BackendReport] per backend, printed probe by
//! probe with right-aligned labels.

use serde::{Deserialize, Serialize};
use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::error::SensolError;
use crate::harness::first_order::{
    adjoint, finite_difference, forward, forward_stepwise, simulate, AdjointSensitivity,
    Sensitivity, Simulation,
};
use crate::harness::second_order::{
    adjoint_difference, forward_difference, quadrature_difference, SecondOrder,
};
use crate::harness::{Backend, Scenario, SolverSettings};
use crate::model::Dynamics;

/// Every probe outcome for one backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendReport {
    pub backend: Backend,
    pub nominal: Simulation,
    pub finite_difference: Sensitivity,
    pub forward: Sensitivity,
    pub forward_stepwise: Sensitivity,
    pub adjoint: AdjointSensitivity,
    pub adjoint_difference: SecondOrder,
    pub forward_difference: SecondOrder,
    pub quadrature_difference: SecondOrder,
}

/// Run the full probe battery against one backend.
///
/// The second-order probes target the first quadrature of the model.
pub fn run_battery(
    model: &impl Dynamics,
    scenario: &Scenario,
    settings: &SolverSettings,
) -> Result<BackendReport, SensolError> {
    Ok(BackendReport {
        backend: settings.backend,
        nominal: simulate(model, scenario, settings)?,
        finite_difference: finite_difference(model, scenario, settings)?,
        forward: forward(model, scenario, settings)?,
        forward_stepwise: forward_stepwise(model, scenario, settings)?,
        adjoint: adjoint(model, scenario, settings)?,
        adjoint_difference: adjoint_difference(model, scenario, settings, 0)?,
        forward_difference: forward_difference(model, scenario, settings, 0)?,
        quadrature_difference: quadrature_difference(model, scenario, settings, 0)?,
    })
}

fn fmt_vec(v: &DVector<f64>) -> String {
    let entries: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", entries.join(", "))
}

fn fmt_mat(m: &DMatrix<f64>) -> String {
    let rows: Vec<String> = m
        .row_iter()
        .map(|row| {
            let entries: Vec<String> = row.iter().map(|x| format!("{x:.6}")).collect();
            format!("[{}]", entries.join(", "))
        })
        .collect();
    format!("[{}]", rows.join(", "))
}

impl fmt::Display for BackendReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:=<72}", "")?;
        writeln!(f, "Integrator: {}", self.backend)?;
        writeln!(f, "{:=<72}", "")?;
        writeln!(
            f,
            "{:>34}: xf = {}, qf = {}",
            "Unperturbed solution",
            fmt_vec(&self.nominal.xf),
            fmt_vec(&self.nominal.qf)
        )?;
        writeln!(
            f,
            "{:>34}: d(xf)/d(p) = {}, d(qf)/d(p) = {}",
            "Finite differences",
            fmt_mat(&self.finite_difference.dxf_dp),
            fmt_mat(&self.finite_difference.dqf_dp)
        )?;
        writeln!(
            f,
            "{:>34}: d(xf)/d(p) = {}, d(qf)/d(p) = {}",
            "Forward sensitivities",
            fmt_mat(&self.forward.dxf_dp),
            fmt_mat(&self.forward.dqf_dp)
        )?;
        writeln!(
            f,
            "{:>34}: d(xf)/d(p) = {}, d(qf)/d(p) = {}",
            "Forward sensitivities, stepwise",
            fmt_mat(&self.forward_stepwise.dxf_dp),
            fmt_mat(&self.forward_stepwise.dqf_dp)
        )?;
        writeln!(
            f,
            "{:>34}: d(qf)/d(x0) = {}, d(qf)/d(p) = {}",
            "Adjoint sensitivities",
            fmt_mat(&self.adjoint.dqf_dx0),
            fmt_mat(&self.adjoint.dqf_dp)
        )?;
        writeln!(
            f,
            "{:>34}: d2(qf)/d(x0)d(p) = {}, d2(qf)/d(p)d(p) = {}",
            "FD of adjoint",
            fmt_mat(&self.adjoint_difference.wrt_x0_p),
            fmt_mat(&self.adjoint_difference.wrt_p_p)
        )?;
        writeln!(
            f,
            "{:>34}: d2(qf)/d(x0)d(p) = {}, d2(qf)/d(p)d(p) = {}",
            "FD of forward",
            fmt_mat(&self.forward_difference.wrt_x0_p),
            fmt_mat(&self.forward_difference.wrt_p_p)
        )?;
        writeln!(
            f,
            "{:>34}: d2(qf)/d(x0)d(p) = {}, d2(qf)/d(p)d(p) = {}",
            "Second differences",
            fmt_mat(&self.quadrature_difference.wrt_x0_p),
            fmt_mat(&self.quadrature_difference.wrt_p_p)
        )?;
        Ok(())
    }
}
