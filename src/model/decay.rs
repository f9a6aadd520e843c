use super::Dynamics;

/// Exponential decay `y' = -k y` with the state itself as quadrature
/// integrand, so `Q(tf) = y0 (1 - e^{-k tf}) / k`.
///
/// Everything the harness can compute for this model has a closed form,
/// which makes it the accuracy anchor of the test suite.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExponentialDecay;

impl ExponentialDecay {
    /// `y(t)`
    pub fn solution(y0: f64, k: f64, t: f64) -> f64 {
        y0 * (-k * t).exp()
    }

    /// `Q(t)`
    pub fn quad_value(y0: f64, k: f64, t: f64) -> f64 {
        y0 * (1.0 - (-k * t).exp()) / k
    }

    /// `dQ/dy0`
    pub fn quad_grad_y0(k: f64, t: f64) -> f64 {
        (1.0 - (-k * t).exp()) / k
    }

    /// `dQ/dk`
    pub fn quad_grad_k(y0: f64, k: f64, t: f64) -> f64 {
        let e = (-k * t).exp();
        y0 * ((k * t + 1.0) * e - 1.0) / (k * k)
    }

    /// `d2Q/dk2`
    pub fn quad_hess_kk(y0: f64, k: f64, t: f64) -> f64 {
        let e = (-k * t).exp();
        y0 * (2.0 - e * (k * k * t * t + 2.0 * k * t + 2.0)) / (k * k * k)
    }

    /// `d2Q/dy0 dk`
    pub fn quad_hess_y0k(k: f64, t: f64) -> f64 {
        let e = (-k * t).exp();
        ((k * t + 1.0) * e - 1.0) / (k * k)
    }
}

impl Dynamics for ExponentialDecay {
    fn nstates(&self) -> usize {
        1
    }

    fn nparams(&self) -> usize {
        1
    }

    fn nquad(&self) -> usize {
        1
    }

    fn rhs(&self, x: &[f64], p: &[f64], _t: f64, dx: &mut [f64]) {
        dx[0] = -p[0] * x[0];
    }

    fn rhs_jac_mul(&self, _x: &[f64], p: &[f64], _t: f64, v: &[f64], y: &mut [f64]) {
        y[0] = -p[0] * v[0];
    }

    fn rhs_sens_mul(&self, x: &[f64], _p: &[f64], _t: f64, v: &[f64], y: &mut [f64]) {
        y[0] = -x[0] * v[0];
    }

    fn rhs_adj_mul(&self, _x: &[f64], p: &[f64], _t: f64, w: &[f64], y: &mut [f64]) {
        y[0] = p[0] * w[0];
    }

    fn rhs_sens_adj_mul(&self, x: &[f64], _p: &[f64], _t: f64, w: &[f64], y: &mut [f64]) {
        y[0] = x[0] * w[0];
    }

    fn quad(&self, x: &[f64], _p: &[f64], _t: f64, q: &mut [f64]) {
        q[0] = x[0];
    }

    fn quad_jac_mul(&self, _x: &[f64], _p: &[f64], _t: f64, v: &[f64], y: &mut [f64]) {
        y[0] = v[0];
    }

    fn quad_sens_mul(&self, _x: &[f64], _p: &[f64], _t: f64, _v: &[f64], y: &mut [f64]) {
        y[0] = 0.0;
    }

    fn quad_adj_mul(&self, _x: &[f64], _p: &[f64], _t: f64, w: &[f64], y: &mut [f64]) {
        y[0] = -w[0];
    }

    fn quad_sens_adj_mul(&self, _x: &[f64], _p: &[f64], _t: f64, _w: &[f64], y: &mut [f64]) {
        y[0] = 0.0;
    }
}
