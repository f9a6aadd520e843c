//! First-order probes: nominal integration, finite differences, forward
//! sensitivity propagation and the adjoint pass.

use diffsol::{
    AdjointOdeSolverMethod, DenseMatrix, OdeBuilder, OdeEquations, OdeEquationsImplicitSens,
    OdeSolverMethod, OdeSolverState, OdeSolverStopReason, SensitivitiesOdeSolverMethod, StateRef,
    VectorHost, VectorView,
};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::SensolError;
use crate::harness::{Backend, Scenario, SolverSettings, C, LS, M, T, V};
use crate::model::Dynamics;

/// Terminal state and quadrature values of a nominal integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    /// State at the horizon
    pub xf: DVector<f64>,
    /// Quadrature values at the horizon
    pub qf: DVector<f64>,
}

/// First-order sensitivities with respect to the parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensitivity {
    /// `d(xf)/d(p)`, `nstates x nparams`
    pub dxf_dp: DMatrix<f64>,
    /// `d(qf)/d(p)`, `nquad x nparams`
    pub dqf_dp: DMatrix<f64>,
}

/// Gradients of the quadrature values from one adjoint pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjointSensitivity {
    /// `d(qf)/d(x0)`, `nquad x nstates`
    pub dqf_dx0: DMatrix<f64>,
    /// `d(qf)/d(p)`, `nquad x nparams`
    pub dqf_dp: DMatrix<f64>,
}

/// Integrate the scenario to its horizon and report the terminal state and
/// quadrature values.
pub fn simulate(
    model: &impl Dynamics,
    scenario: &Scenario,
    settings: &SolverSettings,
) -> Result<Simulation, SensolError> {
    scenario.check_model(model)?;
    let nstates = model.nstates();
    let nquad = model.nquad();
    let x0: Vec<f64> = scenario.x0().iter().copied().collect();

    let problem = OdeBuilder::<M>::new()
        .t0(0.0)
        .h0(settings.h0)
        .rtol(settings.rtol)
        .atol([settings.atol])
        .p(scenario.p().iter().copied().collect::<Vec<f64>>())
        .use_coloring(settings.use_coloring)
        .integrate_out(true)
        .rhs_implicit(
            |x: &V, p: &V, t: T, dx: &mut V| {
                model.rhs(x.as_slice(), p.as_slice(), t, dx.as_mut_slice())
            },
            |x: &V, p: &V, t: T, v: &V, y: &mut V| {
                model.rhs_jac_mul(x.as_slice(), p.as_slice(), t, v.as_slice(), y.as_mut_slice())
            },
        )
        .init(
            move |_p: &V, _t: T, y: &mut V| y.as_mut_slice().copy_from_slice(&x0),
            nstates,
        )
        .out_implicit(
            |x: &V, p: &V, t: T, q: &mut V| {
                model.quad(x.as_slice(), p.as_slice(), t, q.as_mut_slice())
            },
            |x: &V, p: &V, t: T, v: &V, y: &mut V| {
                model.quad_jac_mul(x.as_slice(), p.as_slice(), t, v.as_slice(), y.as_mut_slice())
            },
            nquad,
        )
        .build()?;

    let tf = scenario.horizon();
    match settings.backend {
        Backend::Bdf => run_nominal(problem.bdf::<LS>()?, tf),
        Backend::TrBdf2 => run_nominal(problem.tr_bdf2::<LS>()?, tf),
        Backend::Esdirk34 => run_nominal(problem.esdirk34::<LS>()?, tf),
        Backend::Tsit45 => run_nominal(problem.tsit45()?, tf),
    }
}

/// One-sided finite-difference approximation of the forward sensitivities,
/// using the scenario's `fd_step` and one extra nominal run per parameter.
pub fn finite_difference(
    model: &impl Dynamics,
    scenario: &Scenario,
    settings: &SolverSettings,
) -> Result<Sensitivity, SensolError> {
    let base = simulate(model, scenario, settings)?;
    let h = scenario.fd_step();
    let nstates = model.nstates();
    let nparams = model.nparams();
    let nquad = model.nquad();

    let mut dxf_dp = DMatrix::zeros(nstates, nparams);
    let mut dqf_dp = DMatrix::zeros(nquad, nparams);
    for j in 0..nparams {
        let perturbed = simulate(model, &scenario.with_param_shift(j, h), settings)?;
        for i in 0..nstates {
            dxf_dp[(i, j)] = (perturbed.xf[i] - base.xf[i]) / h;
        }
        for i in 0..nquad {
            dqf_dp[(i, j)] = (perturbed.qf[i] - base.qf[i]) / h;
        }
    }
    Ok(Sensitivity { dxf_dp, dqf_dp })
}

/// Forward sensitivity propagation, one seed per parameter.
///
/// The quadratures ride along as augmented states so their sensitivities are
/// propagated by the engine rather than differenced.
pub fn forward(
    model: &impl Dynamics,
    scenario: &Scenario,
    settings: &SolverSettings,
) -> Result<Sensitivity, SensolError> {
    forward_impl(model, scenario, settings, false)
}

/// The same directional derivatives as [forward], read back through the
/// engine's stepping interface instead of the dense solve call.
pub fn forward_stepwise(
    model: &impl Dynamics,
    scenario: &Scenario,
    settings: &SolverSettings,
) -> Result<Sensitivity, SensolError> {
    forward_impl(model, scenario, settings, true)
}

fn forward_impl(
    model: &impl Dynamics,
    scenario: &Scenario,
    settings: &SolverSettings,
    stepwise: bool,
) -> Result<Sensitivity, SensolError> {
    scenario.check_model(model)?;
    let nstates = model.nstates();
    let nparams = model.nparams();
    let nquad = model.nquad();
    let naug = nstates + nquad;

    // augmented initial state: model states followed by zeroed quadratures
    let mut x0 = vec![0.0; naug];
    x0[..nstates].copy_from_slice(scenario.x0().as_slice());

    let problem = OdeBuilder::<M>::new()
        .t0(0.0)
        .h0(settings.h0)
        .rtol(settings.rtol)
        .atol([settings.atol])
        .p(scenario.p().iter().copied().collect::<Vec<f64>>())
        .use_coloring(settings.use_coloring)
        .rhs_sens_implicit(
            |x: &V, p: &V, t: T, dx: &mut V| {
                let (xs, _) = x.as_slice().split_at(nstates);
                let (dxs, dq) = dx.as_mut_slice().split_at_mut(nstates);
                model.rhs(xs, p.as_slice(), t, dxs);
                model.quad(xs, p.as_slice(), t, dq);
            },
            |x: &V, p: &V, t: T, v: &V, y: &mut V| {
                let (xs, _) = x.as_slice().split_at(nstates);
                let (vs, _) = v.as_slice().split_at(nstates);
                let (ys, yq) = y.as_mut_slice().split_at_mut(nstates);
                model.rhs_jac_mul(xs, p.as_slice(), t, vs, ys);
                model.quad_jac_mul(xs, p.as_slice(), t, vs, yq);
            },
            |x: &V, p: &V, t: T, v: &V, y: &mut V| {
                let (xs, _) = x.as_slice().split_at(nstates);
                let (ys, yq) = y.as_mut_slice().split_at_mut(nstates);
                model.rhs_sens_mul(xs, p.as_slice(), t, v.as_slice(), ys);
                model.quad_sens_mul(xs, p.as_slice(), t, v.as_slice(), yq);
            },
        )
        .init_sens(
            move |_p: &V, _t: T, y: &mut V| y.as_mut_slice().copy_from_slice(&x0),
            |_p: &V, _t: T, _v: &V, y: &mut V| y.as_mut_slice().fill(0.0),
            naug,
        )
        .build()?;

    let tf = scenario.horizon();
    match settings.backend {
        Backend::Bdf => {
            let solver = problem.bdf_sens::<LS>()?;
            collect_forward(solver, tf, stepwise, nstates, nparams, nquad)
        }
        Backend::TrBdf2 => {
            let solver = problem.tr_bdf2_sens::<LS>()?;
            collect_forward(solver, tf, stepwise, nstates, nparams, nquad)
        }
        Backend::Esdirk34 => {
            let solver = problem.esdirk34_sens::<LS>()?;
            collect_forward(solver, tf, stepwise, nstates, nparams, nquad)
        }
        Backend::Tsit45 => {
            let solver = problem.tsit45_sens()?;
            collect_forward(solver, tf, stepwise, nstates, nparams, nquad)
        }
    }
}

/// Adjoint sensitivity propagation: a checkpointed forward pass followed by
/// one backwards pass seeding each quadrature in turn.
pub fn adjoint(
    model: &impl Dynamics,
    scenario: &Scenario,
    settings: &SolverSettings,
) -> Result<AdjointSensitivity, SensolError> {
    scenario.check_model(model)?;
    let nstates = model.nstates();
    let nparams = model.nparams();
    let nquad = model.nquad();
    let x0: Vec<f64> = scenario.x0().iter().copied().collect();

    let problem = OdeBuilder::<M>::new()
        .t0(0.0)
        .h0(settings.h0)
        .rtol(settings.rtol)
        .atol([settings.atol])
        .p(scenario.p().iter().copied().collect::<Vec<f64>>())
        .use_coloring(settings.use_coloring)
        .integrate_out(true)
        .rhs_adjoint_implicit(
            |x: &V, p: &V, t: T, dx: &mut V| {
                model.rhs(x.as_slice(), p.as_slice(), t, dx.as_mut_slice())
            },
            |x: &V, p: &V, t: T, v: &V, y: &mut V| {
                model.rhs_jac_mul(x.as_slice(), p.as_slice(), t, v.as_slice(), y.as_mut_slice())
            },
            |x: &V, p: &V, t: T, w: &V, y: &mut V| {
                model.rhs_adj_mul(x.as_slice(), p.as_slice(), t, w.as_slice(), y.as_mut_slice())
            },
            |x: &V, p: &V, t: T, w: &V, y: &mut V| {
                model.rhs_sens_adj_mul(x.as_slice(), p.as_slice(), t, w.as_slice(), y.as_mut_slice())
            },
        )
        .init_adjoint(
            move |_p: &V, _t: T, y: &mut V| y.as_mut_slice().copy_from_slice(&x0),
            // the initial state does not depend on the parameters
            |_p: &V, _t: T, _v: &V, y: &mut V| y.as_mut_slice().fill(0.0),
            nstates,
        )
        .out_adjoint_implicit(
            |x: &V, p: &V, t: T, q: &mut V| {
                model.quad(x.as_slice(), p.as_slice(), t, q.as_mut_slice())
            },
            |x: &V, p: &V, t: T, v: &V, y: &mut V| {
                model.quad_jac_mul(x.as_slice(), p.as_slice(), t, v.as_slice(), y.as_mut_slice())
            },
            |x: &V, p: &V, t: T, w: &V, y: &mut V| {
                model.quad_adj_mul(x.as_slice(), p.as_slice(), t, w.as_slice(), y.as_mut_slice())
            },
            |x: &V, p: &V, t: T, w: &V, y: &mut V| {
                model.quad_sens_adj_mul(
                    x.as_slice(),
                    p.as_slice(),
                    t,
                    w.as_slice(),
                    y.as_mut_slice(),
                )
            },
            nquad,
        )
        .build()?;

    let tf = scenario.horizon();
    let interval = settings.checkpoint_interval;
    match settings.backend {
        Backend::Bdf => {
            let mut fwd = problem.bdf::<LS>()?;
            let (checkpointer, _ys, _ts) = fwd.solve_with_checkpointing(tf, interval)?;
            let solver = problem.bdf_solver_adjoint::<LS, _>(checkpointer, None)?;
            let state = solver.solve_adjoint_backwards_pass(&[], &[])?;
            Ok(collect_adjoint(state.as_ref(), nstates, nparams, nquad))
        }
        Backend::TrBdf2 => {
            let mut fwd = problem.tr_bdf2::<LS>()?;
            let (checkpointer, _ys, _ts) = fwd.solve_with_checkpointing(tf, interval)?;
            let solver = problem.tr_bdf2_solver_adjoint::<LS, _>(checkpointer, None)?;
            let state = solver.solve_adjoint_backwards_pass(&[], &[])?;
            Ok(collect_adjoint(state.as_ref(), nstates, nparams, nquad))
        }
        Backend::Esdirk34 => {
            let mut fwd = problem.esdirk34::<LS>()?;
            let (checkpointer, _ys, _ts) = fwd.solve_with_checkpointing(tf, interval)?;
            let solver = problem.esdirk34_solver_adjoint::<LS, _>(checkpointer, None)?;
            let state = solver.solve_adjoint_backwards_pass(&[], &[])?;
            Ok(collect_adjoint(state.as_ref(), nstates, nparams, nquad))
        }
        Backend::Tsit45 => {
            let mut fwd = problem.tsit45()?;
            let (checkpointer, _ys, _ts) = fwd.solve_with_checkpointing(tf, interval)?;
            let solver = problem.tsit45_solver_adjoint(checkpointer, None)?;
            let state = solver.solve_adjoint_backwards_pass(&[], &[])?;
            Ok(collect_adjoint(state.as_ref(), nstates, nparams, nquad))
        }
    }
}

/// Drive a solver to `tf` with an explicit stop time, stepping until the
/// engine reports the stop was reached.
fn advance_to<'a, Eqn, S>(solver: &mut S, tf: f64) -> Result<(), SensolError>
where
    Eqn: OdeEquations<M = M, V = V, T = T, C = C> + 'a,
    S: OdeSolverMethod<'a, Eqn>,
{
    solver.set_stop_time(tf)?;
    loop {
        match solver.step()? {
            OdeSolverStopReason::InternalTimestep => continue,
            OdeSolverStopReason::TstopReached => return Ok(()),
            // no root function is ever configured by the harness
            OdeSolverStopReason::RootFound(_) => unreachable!("root found without root function"),
        }
    }
}

fn run_nominal<'a, Eqn, S>(mut solver: S, tf: f64) -> Result<Simulation, SensolError>
where
    Eqn: OdeEquations<M = M, V = V, T = T, C = C> + 'a,
    S: OdeSolverMethod<'a, Eqn>,
{
    advance_to(&mut solver, tf)?;
    let state = solver.state();
    Ok(Simulation {
        xf: DVector::from_column_slice(state.y.as_slice()),
        qf: DVector::from_column_slice(state.g.as_slice()),
    })
}

fn collect_forward<'a, Eqn, S>(
    mut solver: S,
    tf: f64,
    stepwise: bool,
    nstates: usize,
    nparams: usize,
    nquad: usize,
) -> Result<Sensitivity, SensolError>
where
    Eqn: OdeEquationsImplicitSens<M = M, V = V, T = T, C = C> + 'a,
    S: SensitivitiesOdeSolverMethod<'a, Eqn>,
{
    let mut dxf_dp = DMatrix::zeros(nstates, nparams);
    let mut dqf_dp = DMatrix::zeros(nquad, nparams);

    if stepwise {
        advance_to(&mut solver, tf)?;
        let state = solver.state();
        for (j, sj) in state.s.iter().enumerate() {
            let s = sj.as_slice();
            for i in 0..nstates {
                dxf_dp[(i, j)] = s[i];
            }
            for i in 0..nquad {
                dqf_dp[(i, j)] = s[nstates + i];
            }
        }
    } else {
        let (_y, sens) = solver.solve_dense_sensitivities(&[tf])?;
        for (j, sj) in sens.iter().enumerate() {
            let col = sj.column(0).into_owned();
            let s = col.as_slice();
            for i in 0..nstates {
                dxf_dp[(i, j)] = s[i];
            }
            for i in 0..nquad {
                dqf_dp[(i, j)] = s[nstates + i];
            }
        }
    }
    Ok(Sensitivity { dxf_dp, dqf_dp })
}

fn collect_adjoint(
    state: StateRef<'_, V>,
    nstates: usize,
    nparams: usize,
    nquad: usize,
) -> AdjointSensitivity {
    let mut dqf_dx0 = DMatrix::zeros(nquad, nstates);
    let mut dqf_dp = DMatrix::zeros(nquad, nparams);
    for j in 0..nquad {
        // s[j] holds the adjoint variables at t0, sg[j] the parameter gradient
        let lambda = state.s[j].as_slice();
        for i in 0..nstates {
            dqf_dx0[(j, i)] = lambda[i];
        }
        let grad = state.sg[j].as_slice();
        for i in 0..nparams {
            dqf_dp[(j, i)] = grad[i];
        }
    }
    AdjointSensitivity { dqf_dx0, dqf_dp }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExponentialDecay;
    use approx::assert_relative_eq;
    use nalgebra::dvector;

    fn decay_scenario() -> Scenario {
        Scenario::new(dvector![1.2], dvector![0.8], 1.0, 1e-4).unwrap()
    }

    #[test]
    fn nominal_matches_closed_form() {
        let scenario = decay_scenario();
        let outcome = simulate(&ExponentialDecay, &scenario, &SolverSettings::default()).unwrap();
        assert_relative_eq!(
            outcome.xf[0],
            ExponentialDecay::solution(1.2, 0.8, 1.0),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            outcome.qf[0],
            ExponentialDecay::quad_value(1.2, 0.8, 1.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn forward_matches_closed_form_gradient() {
        let scenario = decay_scenario();
        let outcome = forward(&ExponentialDecay, &scenario, &SolverSettings::default()).unwrap();
        assert_relative_eq!(
            outcome.dqf_dp[(0, 0)],
            ExponentialDecay::quad_grad_k(1.2, 0.8, 1.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn adjoint_matches_closed_form_gradients() {
        let scenario = decay_scenario();
        let outcome = adjoint(&ExponentialDecay, &scenario, &SolverSettings::default()).unwrap();
        assert_relative_eq!(
            outcome.dqf_dp[(0, 0)],
            ExponentialDecay::quad_grad_k(1.2, 0.8, 1.0),
            epsilon = 1e-5
        );
        assert_relative_eq!(
            outcome.dqf_dx0[(0, 0)],
            ExponentialDecay::quad_grad_y0(0.8, 1.0),
            epsilon = 1e-5
        );
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let scenario = Scenario::new(dvector![1.2, 0.0], dvector![0.8], 1.0, 1e-4).unwrap();
        let result = simulate(&ExponentialDecay, &scenario, &SolverSettings::default());
        assert!(matches!(
            result,
            Err(SensolError::DimensionMismatch { expected: 1, .. })
        ));
    }
}
