//! Second-order probes.
//!
//! The engine propagates first-order sensitivities only, so the Hessian
//! blocks of a quadrature value are estimated three independent ways:
//! differencing adjoint gradients, differencing forward sensitivities, and
//! second differences of the nominal value. Agreement between the three is
//! the cross-check the harness exists for.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::SensolError;
use crate::harness::first_order::{adjoint, forward, simulate};
use crate::harness::{Scenario, SolverSettings};
use crate::model::Dynamics;

/// Hessian blocks of one quadrature value `Q(tf)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondOrder {
    /// `d2(qf)/d(x0)d(p)`, `nstates x nparams`
    pub wrt_x0_p: DMatrix<f64>,
    /// `d2(qf)/d(p)d(p)`, `nparams x nparams`
    pub wrt_p_p: DMatrix<f64>,
}

fn check_quad_index(model: &impl Dynamics, quad_index: usize) -> Result<(), SensolError> {
    if quad_index >= model.nquad() {
        return Err(SensolError::QuadratureIndex {
            index: quad_index,
            nquad: model.nquad(),
        });
    }
    Ok(())
}

/// Finite difference of adjoint gradients under parameter perturbation.
///
/// One adjoint pass at the scenario and one per shifted parameter give both
/// Hessian blocks in `nparams + 1` passes.
pub fn adjoint_difference(
    model: &impl Dynamics,
    scenario: &Scenario,
    settings: &SolverSettings,
    quad_index: usize,
) -> Result<SecondOrder, SensolError> {
    check_quad_index(model, quad_index)?;
    let base = adjoint(model, scenario, settings)?;
    let h = scenario.fd_step();
    let nstates = model.nstates();
    let nparams = model.nparams();

    let mut wrt_x0_p = DMatrix::zeros(nstates, nparams);
    let mut wrt_p_p = DMatrix::zeros(nparams, nparams);
    for j in 0..nparams {
        let perturbed = adjoint(model, &scenario.with_param_shift(j, h), settings)?;
        for i in 0..nstates {
            wrt_x0_p[(i, j)] =
                (perturbed.dqf_dx0[(quad_index, i)] - base.dqf_dx0[(quad_index, i)]) / h;
        }
        for i in 0..nparams {
            wrt_p_p[(i, j)] = (perturbed.dqf_dp[(quad_index, i)] - base.dqf_dp[(quad_index, i)]) / h;
        }
    }
    Ok(SecondOrder { wrt_x0_p, wrt_p_p })
}

/// Finite difference of forward sensitivities under parameter and
/// initial-state perturbation.
pub fn forward_difference(
    model: &impl Dynamics,
    scenario: &Scenario,
    settings: &SolverSettings,
    quad_index: usize,
) -> Result<SecondOrder, SensolError> {
    check_quad_index(model, quad_index)?;
    let base = forward(model, scenario, settings)?;
    let h = scenario.fd_step();
    let nstates = model.nstates();
    let nparams = model.nparams();

    let mut wrt_p_p = DMatrix::zeros(nparams, nparams);
    for j in 0..nparams {
        let perturbed = forward(model, &scenario.with_param_shift(j, h), settings)?;
        for i in 0..nparams {
            wrt_p_p[(i, j)] = (perturbed.dqf_dp[(quad_index, i)] - base.dqf_dp[(quad_index, i)]) / h;
        }
    }

    let mut wrt_x0_p = DMatrix::zeros(nstates, nparams);
    for i in 0..nstates {
        let perturbed = forward(model, &scenario.with_state_shift(i, h), settings)?;
        for j in 0..nparams {
            wrt_x0_p[(i, j)] = (perturbed.dqf_dp[(quad_index, j)] - base.dqf_dp[(quad_index, j)]) / h;
        }
    }
    Ok(SecondOrder { wrt_x0_p, wrt_p_p })
}

/// Central second differences of the nominal quadrature value: three-point
/// stencils on the diagonal, four-point stencils for the cross terms.
pub fn quadrature_difference(
    model: &impl Dynamics,
    scenario: &Scenario,
    settings: &SolverSettings,
    quad_index: usize,
) -> Result<SecondOrder, SensolError> {
    check_quad_index(model, quad_index)?;
    let h = scenario.fd_step();
    let nstates = model.nstates();
    let nparams = model.nparams();
    let q0 = simulate(model, scenario, settings)?.qf[quad_index];

    let value = |s: &Scenario| -> Result<f64, SensolError> {
        Ok(simulate(model, s, settings)?.qf[quad_index])
    };

    let mut wrt_p_p = DMatrix::zeros(nparams, nparams);
    for j in 0..nparams {
        let qp = value(&scenario.with_param_shift(j, h))?;
        let qm = value(&scenario.with_param_shift(j, -h))?;
        wrt_p_p[(j, j)] = (qp - 2.0 * q0 + qm) / (h * h);
        for i in (j + 1)..nparams {
            let qpp = value(&scenario.with_param_shift(j, h).with_param_shift(i, h))?;
            let qpm = value(&scenario.with_param_shift(j, h).with_param_shift(i, -h))?;
            let qmp = value(&scenario.with_param_shift(j, -h).with_param_shift(i, h))?;
            let qmm = value(&scenario.with_param_shift(j, -h).with_param_shift(i, -h))?;
            let cross = (qpp - qpm - qmp + qmm) / (4.0 * h * h);
            wrt_p_p[(i, j)] = cross;
            wrt_p_p[(j, i)] = cross;
        }
    }

    let mut wrt_x0_p = DMatrix::zeros(nstates, nparams);
    for i in 0..nstates {
        for j in 0..nparams {
            let qpp = value(&scenario.with_state_shift(i, h).with_param_shift(j, h))?;
            let qpm = value(&scenario.with_state_shift(i, h).with_param_shift(j, -h))?;
            let qmp = value(&scenario.with_state_shift(i, -h).with_param_shift(j, h))?;
            let qmm = value(&scenario.with_state_shift(i, -h).with_param_shift(j, -h))?;
            wrt_x0_p[(i, j)] = (qpp - qpm - qmp + qmm) / (4.0 * h * h);
        }
    }
    Ok(SecondOrder { wrt_x0_p, wrt_p_p })
}
