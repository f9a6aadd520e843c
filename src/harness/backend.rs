use serde::{Deserialize, Serialize};
use std::fmt;

/// The integrator backends the harness can drive.
///
/// The implicit backends embed a Newton iteration and factor with dense LU;
/// `Tsit45` is explicit and suits the non-stiff end of the spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    /// Variable-order backward differentiation formulae
    Bdf,
    /// TR-BDF2, a second-order SDIRK method
    TrBdf2,
    /// A fourth-order ESDIRK method
    Esdirk34,
    /// Tsitouras 4(5) explicit Runge-Kutta
    Tsit45,
}

impl Backend {
    /// All backends, in the order the demo battery runs them
    pub const ALL: [Backend; 4] = [
        Backend::Bdf,
        Backend::TrBdf2,
        Backend::Esdirk34,
        Backend::Tsit45,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Bdf => "bdf",
            Backend::TrBdf2 => "tr-bdf2",
            Backend::Esdirk34 => "esdirk34",
            Backend::Tsit45 => "tsit45",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Solver options shared by every probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Integrator backend
    pub backend: Backend,
    /// Relative tolerance
    pub rtol: f64,
    /// Absolute tolerance
    pub atol: f64,
    /// Initial step size
    pub h0: f64,
    /// Precompute the Jacobian sparsity structure up front
    pub use_coloring: bool,
    /// Solver steps between checkpoints on the adjoint forward pass;
    /// `None` uses the engine default
    pub checkpoint_interval: Option<usize>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Bdf,
            rtol: 1e-8,
            atol: 1e-8,
            h0: 1e-3,
            use_coloring: false,
            checkpoint_interval: None,
        }
    }
}

impl SolverSettings {
    /// Default settings on the given backend
    pub fn for_backend(backend: Backend) -> Self {
        Self {
            backend,
            ..Default::default()
        }
    }
}
