use thiserror::Error;

/// Errors that can occur while building or evaluating a sensitivity probe
#[derive(Error, Debug)]
pub enum SensolError {
    /// An error propagated from the integration engine
    #[error(transparent)]
    Solver(#[from] diffsol::error::DiffsolError),

    /// A scenario vector does not match the model dimensions
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// The integration horizon must be strictly positive
    #[error("Integration horizon must be positive, got {0}")]
    NonPositiveHorizon(f64),

    /// The perturbation step must be strictly positive
    #[error("Perturbation step must be positive, got {0}")]
    NonPositiveStep(f64),

    /// A quadrature index outside the model's quadrature range
    #[error("Quadrature index {index} out of range for a model with {nquad} quadratures")]
    QuadratureIndex { index: usize, nquad: usize },
}
