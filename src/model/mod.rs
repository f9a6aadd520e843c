pub mod decay;
pub mod rocket;

pub use decay::ExponentialDecay;
pub use rocket::RocketCar;

/// Trait for ODE models with quadrature outputs.
///
/// A model describes the dynamics `x' = f(x, p, t)` together with a set of
/// quadrature integrands `g(x, p, t)`; the harness reports the quadrature
/// values `Q(tf) = integral of g over [0, tf]`.
///
/// All functions operate on plain `f64` slices so model code stays free of
/// engine types. Besides the raw functions, a model supplies the directional
/// derivative products the engine consumes for forward and adjoint
/// sensitivity propagation. The adjoint products carry the engine's sign
/// convention: they return the *negated* transposed products.
pub trait Dynamics {
    /// Number of state variables
    fn nstates(&self) -> usize;
    /// Number of model parameters
    fn nparams(&self) -> usize;
    /// Number of quadrature integrands
    fn nquad(&self) -> usize;

    /// State derivative `dx = f(x, p, t)`
    fn rhs(&self, x: &[f64], p: &[f64], t: f64, dx: &mut [f64]);

    /// Jacobian product `y = (df/dx) v`
    fn rhs_jac_mul(&self, x: &[f64], p: &[f64], t: f64, v: &[f64], y: &mut [f64]);

    /// Parameter sensitivity product `y = (df/dp) v`, `v` has length [Self::nparams]
    fn rhs_sens_mul(&self, x: &[f64], p: &[f64], t: f64, v: &[f64], y: &mut [f64]);

    /// Adjoint product `y = -(df/dx)^T w`
    fn rhs_adj_mul(&self, x: &[f64], p: &[f64], t: f64, w: &[f64], y: &mut [f64]);

    /// Adjoint parameter product `y = -(df/dp)^T w`, `y` has length [Self::nparams]
    fn rhs_sens_adj_mul(&self, x: &[f64], p: &[f64], t: f64, w: &[f64], y: &mut [f64]);

    /// Quadrature integrand `q = g(x, p, t)`
    fn quad(&self, x: &[f64], p: &[f64], t: f64, q: &mut [f64]);

    /// Quadrature Jacobian product `y = (dg/dx) v`
    fn quad_jac_mul(&self, x: &[f64], p: &[f64], t: f64, v: &[f64], y: &mut [f64]);

    /// Quadrature parameter product `y = (dg/dp) v`, `v` has length [Self::nparams]
    fn quad_sens_mul(&self, x: &[f64], p: &[f64], t: f64, v: &[f64], y: &mut [f64]);

    /// Quadrature adjoint product `y = -(dg/dx)^T w`
    fn quad_adj_mul(&self, x: &[f64], p: &[f64], t: f64, w: &[f64], y: &mut [f64]);

    /// Quadrature adjoint parameter product `y = -(dg/dp)^T w`, `y` has length [Self::nparams]
    fn quad_sens_adj_mul(&self, x: &[f64], p: &[f64], t: f64, w: &[f64], y: &mut [f64]);
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Dynamics;

    const FD_STEP: f64 = 1e-6;
    const FD_TOL: f64 = 1e-4;

    /// Check every directional derivative product of a model against finite
    /// differences of its raw functions at one evaluation point.
    pub fn check_products(model: &impl Dynamics, x: &[f64], p: &[f64], t: f64) {
        let ns = model.nstates();
        let np = model.nparams();
        let nq = model.nquad();

        let jac = |f: &dyn Fn(&[f64], &[f64], &mut [f64]), base: &[f64], wrt_p: bool, nout: usize| {
            let n = if wrt_p { np } else { ns };
            let mut cols = vec![vec![0.0; nout]; n];
            let mut f0 = vec![0.0; nout];
            if wrt_p {
                f(x, base, &mut f0);
            } else {
                f(base, p, &mut f0);
            }
            for (j, col) in cols.iter_mut().enumerate() {
                let mut shifted = base.to_vec();
                shifted[j] += FD_STEP;
                let mut f1 = vec![0.0; nout];
                if wrt_p {
                    f(x, &shifted, &mut f1);
                } else {
                    f(&shifted, p, &mut f1);
                }
                for i in 0..nout {
                    col[i] = (f1[i] - f0[i]) / FD_STEP;
                }
            }
            cols
        };

        let rhs = |x: &[f64], p: &[f64], y: &mut [f64]| model.rhs(x, p, t, y);
        let quad = |x: &[f64], p: &[f64], y: &mut [f64]| model.quad(x, p, t, y);

        let dfdx = jac(&rhs, x, false, ns);
        let dfdp = jac(&rhs, p, true, ns);
        let dgdx = jac(&quad, x, false, nq);
        let dgdp = jac(&quad, p, true, nq);

        // forward products, seeded one direction at a time
        for j in 0..ns {
            let mut v = vec![0.0; ns];
            v[j] = 1.0;
            let mut y = vec![0.0; ns];
            model.rhs_jac_mul(x, p, t, &v, &mut y);
            for i in 0..ns {
                assert!(
                    (y[i] - dfdx[j][i]).abs() < FD_TOL,
                    "rhs_jac_mul[{i}] column {j}: {} vs fd {}",
                    y[i],
                    dfdx[j][i]
                );
            }
            let mut yq = vec![0.0; nq];
            model.quad_jac_mul(x, p, t, &v, &mut yq);
            for i in 0..nq {
                assert!(
                    (yq[i] - dgdx[j][i]).abs() < FD_TOL,
                    "quad_jac_mul[{i}] column {j}: {} vs fd {}",
                    yq[i],
                    dgdx[j][i]
                );
            }
        }
        for j in 0..np {
            let mut v = vec![0.0; np];
            v[j] = 1.0;
            let mut y = vec![0.0; ns];
            model.rhs_sens_mul(x, p, t, &v, &mut y);
            for i in 0..ns {
                assert!(
                    (y[i] - dfdp[j][i]).abs() < FD_TOL,
                    "rhs_sens_mul[{i}] column {j}: {} vs fd {}",
                    y[i],
                    dfdp[j][i]
                );
            }
            let mut yq = vec![0.0; nq];
            model.quad_sens_mul(x, p, t, &v, &mut yq);
            for i in 0..nq {
                assert!(
                    (yq[i] - dgdp[j][i]).abs() < FD_TOL,
                    "quad_sens_mul[{i}] column {j}: {} vs fd {}",
                    yq[i],
                    dgdp[j][i]
                );
            }
        }

        // adjoint products against the negated transposes
        for j in 0..ns {
            let mut w = vec![0.0; ns];
            w[j] = 1.0;
            let mut y = vec![0.0; ns];
            model.rhs_adj_mul(x, p, t, &w, &mut y);
            for i in 0..ns {
                assert!(
                    (y[i] + dfdx[i][j]).abs() < FD_TOL,
                    "rhs_adj_mul[{i}] row {j}: {} vs fd {}",
                    y[i],
                    -dfdx[i][j]
                );
            }
            let mut yp = vec![0.0; np];
            model.rhs_sens_adj_mul(x, p, t, &w, &mut yp);
            for i in 0..np {
                assert!(
                    (yp[i] + dfdp[i][j]).abs() < FD_TOL,
                    "rhs_sens_adj_mul[{i}] row {j}: {} vs fd {}",
                    yp[i],
                    -dfdp[i][j]
                );
            }
        }
        for j in 0..nq {
            let mut w = vec![0.0; nq];
            w[j] = 1.0;
            let mut y = vec![0.0; ns];
            model.quad_adj_mul(x, p, t, &w, &mut y);
            for i in 0..ns {
                assert!(
                    (y[i] + dgdx[i][j]).abs() < FD_TOL,
                    "quad_adj_mul[{i}] row {j}: {} vs fd {}",
                    y[i],
                    -dgdx[i][j]
                );
            }
            let mut yp = vec![0.0; np];
            model.quad_sens_adj_mul(x, p, t, &w, &mut yp);
            for i in 0..np {
                assert!(
                    (yp[i] + dgdp[i][j]).abs() < FD_TOL,
                    "quad_sens_adj_mul[{i}] row {j}: {} vs fd {}",
                    yp[i],
                    -dgdp[i][j]
                );
            }
        }
    }
}
