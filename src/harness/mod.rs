pub mod backend;
pub mod first_order;
pub mod second_order;

pub use backend::{Backend, SolverSettings};
pub use first_order::{
    adjoint, finite_difference, forward, forward_stepwise, simulate, AdjointSensitivity,
    Sensitivity, Simulation,
};
pub use second_order::{
    adjoint_difference, forward_difference, quadrature_difference, SecondOrder,
};

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::SensolError;
use crate::model::Dynamics;

/// Scalar type used by the engine
pub type T = f64;
/// Vector type used by the engine
pub type V = diffsol::NalgebraVec<f64>;
/// Matrix type used by the engine
pub type M = diffsol::NalgebraMat<f64>;
/// Linear solver used to factor the implicit backends
pub type LS = diffsol::NalgebraLU<f64>;
/// Engine context tied to the vector and matrix types
pub type C = diffsol::NalgebraContext;

/// An immutable description of one evaluation: initial state, parameter
/// values, integration horizon and the step used by the difference probes.
///
/// Every probe takes a scenario by reference and returns an owned outcome,
/// so probes can run in any order and never observe each other's effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    x0: DVector<f64>,
    p: DVector<f64>,
    horizon: f64,
    fd_step: f64,
}

impl Scenario {
    /// Create a scenario, validating the horizon and the perturbation step.
    pub fn new(
        x0: DVector<f64>,
        p: DVector<f64>,
        horizon: f64,
        fd_step: f64,
    ) -> Result<Self, SensolError> {
        if !(horizon > 0.0) {
            return Err(SensolError::NonPositiveHorizon(horizon));
        }
        if !(fd_step > 0.0) {
            return Err(SensolError::NonPositiveStep(fd_step));
        }
        Ok(Self {
            x0,
            p,
            horizon,
            fd_step,
        })
    }

    /// Initial state
    pub fn x0(&self) -> &DVector<f64> {
        &self.x0
    }

    /// Parameter values
    pub fn p(&self) -> &DVector<f64> {
        &self.p
    }

    /// Integration horizon `tf`
    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    /// Step used by the finite-difference probes
    pub fn fd_step(&self) -> f64 {
        self.fd_step
    }

    /// A copy of this scenario with parameter `j` shifted by `delta`
    pub fn with_param_shift(&self, j: usize, delta: f64) -> Self {
        let mut shifted = self.clone();
        shifted.p[j] += delta;
        shifted
    }

    /// A copy of this scenario with initial state `i` shifted by `delta`
    pub fn with_state_shift(&self, i: usize, delta: f64) -> Self {
        let mut shifted = self.clone();
        shifted.x0[i] += delta;
        shifted
    }

    pub(crate) fn check_model(&self, model: &impl Dynamics) -> Result<(), SensolError> {
        if self.x0.len() != model.nstates() {
            return Err(SensolError::DimensionMismatch {
                context: "initial state".to_string(),
                expected: model.nstates(),
                actual: self.x0.len(),
            });
        }
        if self.p.len() != model.nparams() {
            return Err(SensolError::DimensionMismatch {
                context: "parameter vector".to_string(),
                expected: model.nparams(),
                actual: self.p.len(),
            });
        }
        Ok(())
    }
}
