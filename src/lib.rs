//! Cross-checking sensitivities of ODE integrations.
//!
//! `sensol` drives a black-box integration engine ([diffsol]) through a
//! battery of sensitivity probes and reports the results side by side:
//!
//! - a nominal integration of the model over a fixed horizon,
//! - a finite-difference approximation of the parameter sensitivities,
//! - forward sensitivity propagation, through the dense solve call and
//!   again through the engine's stepping interface,
//! - an adjoint pass for the gradients of the quadrature values,
//! - three independent estimates of the quadrature Hessian blocks.
//!
//! All of these are pure functions of a model, an immutable [Scenario] and
//! the [SolverSettings] selecting the integrator backend, so disagreement
//! between any two probes points at the model derivatives or the engine
//! rather than at shared mutable state.
//!
//! ```no_run
//! use sensol::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let model = RocketCar::default();
//!     let scenario = Scenario::new(dvector![0.0, 0.0, 1.0], dvector![0.4], 0.5, 1e-3)?;
//!     for backend in Backend::ALL {
//!         let report = run_battery(&model, &scenario, &SolverSettings::for_backend(backend))?;
//!         println!("{report}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod harness;
pub mod model;
pub mod report;

pub use error::SensolError;
pub use harness::backend::{Backend, SolverSettings};
pub use harness::first_order::{
    adjoint, finite_difference, forward, forward_stepwise, simulate, AdjointSensitivity,
    Sensitivity, Simulation,
};
pub use harness::second_order::{
    adjoint_difference, forward_difference, quadrature_difference, SecondOrder,
};
pub use harness::Scenario;
pub use model::{Dynamics, ExponentialDecay, RocketCar};
pub use report::{run_battery, BackendReport};

pub use nalgebra::{dmatrix, dvector, DMatrix, DVector};

pub mod prelude {
    pub mod harness {
        pub use crate::harness::{
            adjoint, adjoint_difference, finite_difference, forward, forward_difference,
            forward_stepwise, quadrature_difference, simulate, Backend, Scenario, SolverSettings,
        };
    }
    pub mod model {
        pub use crate::model::{Dynamics, ExponentialDecay, RocketCar};
    }
    pub mod report {
        pub use crate::report::{run_battery, BackendReport};
    }

    pub use crate::error::SensolError;
    pub use crate::harness::{
        AdjointSensitivity, Backend, Scenario, SecondOrder, Sensitivity, Simulation,
        SolverSettings,
    };
    pub use crate::model::Dynamics;
    pub use crate::report::run_battery;
}
