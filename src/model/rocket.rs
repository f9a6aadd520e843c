use super::Dynamics;

/// A rocket car driven along a track by a thrust control.
///
/// States are position `s`, speed `v` and mass `m`; the single parameter is
/// the thrust `u`. Thrust accelerates the car and burns fuel, while
/// aerodynamic friction opposes the motion:
///
/// ```text
/// s' = v
/// v' = (u - friction * v^2) / m
/// m' = -fuel_burn * u^2
/// ```
///
/// The quadrature integrand tracks a running cost that penalises speed and
/// the mismatch between the thrust and a time-varying reference:
///
/// ```text
/// g = v^3 + ((3 - sin t) - u)^2
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RocketCar {
    /// Aerodynamic friction coefficient
    pub friction: f64,
    /// Fuel consumption coefficient
    pub fuel_burn: f64,
}

impl Default for RocketCar {
    fn default() -> Self {
        Self {
            friction: 0.05,
            fuel_burn: 0.1,
        }
    }
}

impl Dynamics for RocketCar {
    fn nstates(&self) -> usize {
        3
    }

    fn nparams(&self) -> usize {
        1
    }

    fn nquad(&self) -> usize {
        1
    }

    fn rhs(&self, x: &[f64], p: &[f64], _t: f64, dx: &mut [f64]) {
        let (v, m) = (x[1], x[2]);
        let u = p[0];
        dx[0] = v;
        dx[1] = (u - self.friction * v * v) / m;
        dx[2] = -self.fuel_burn * u * u;
    }

    fn rhs_jac_mul(&self, x: &[f64], p: &[f64], _t: f64, v: &[f64], y: &mut [f64]) {
        let (speed, m) = (x[1], x[2]);
        let u = p[0];
        let accel = (u - self.friction * speed * speed) / m;
        y[0] = v[1];
        y[1] = (-2.0 * self.friction * speed / m) * v[1] - (accel / m) * v[2];
        y[2] = 0.0;
    }

    fn rhs_sens_mul(&self, x: &[f64], p: &[f64], _t: f64, v: &[f64], y: &mut [f64]) {
        let m = x[2];
        let u = p[0];
        y[0] = 0.0;
        y[1] = v[0] / m;
        y[2] = -2.0 * self.fuel_burn * u * v[0];
    }

    fn rhs_adj_mul(&self, x: &[f64], p: &[f64], _t: f64, w: &[f64], y: &mut [f64]) {
        let (speed, m) = (x[1], x[2]);
        let u = p[0];
        let accel = (u - self.friction * speed * speed) / m;
        y[0] = 0.0;
        y[1] = -w[0] + (2.0 * self.friction * speed / m) * w[1];
        y[2] = (accel / m) * w[1];
    }

    fn rhs_sens_adj_mul(&self, x: &[f64], p: &[f64], _t: f64, w: &[f64], y: &mut [f64]) {
        let m = x[2];
        let u = p[0];
        y[0] = -w[1] / m + 2.0 * self.fuel_burn * u * w[2];
    }

    fn quad(&self, x: &[f64], p: &[f64], t: f64, q: &mut [f64]) {
        let v = x[1];
        let u = p[0];
        let mismatch = (3.0 - t.sin()) - u;
        q[0] = v * v * v + mismatch * mismatch;
    }

    fn quad_jac_mul(&self, x: &[f64], _p: &[f64], _t: f64, v: &[f64], y: &mut [f64]) {
        let speed = x[1];
        y[0] = 3.0 * speed * speed * v[1];
    }

    fn quad_sens_mul(&self, _x: &[f64], p: &[f64], t: f64, v: &[f64], y: &mut [f64]) {
        let u = p[0];
        let mismatch = (3.0 - t.sin()) - u;
        y[0] = -2.0 * mismatch * v[0];
    }

    fn quad_adj_mul(&self, x: &[f64], _p: &[f64], _t: f64, w: &[f64], y: &mut [f64]) {
        let speed = x[1];
        y[0] = 0.0;
        y[1] = -3.0 * speed * speed * w[0];
        y[2] = 0.0;
    }

    fn quad_sens_adj_mul(&self, _x: &[f64], p: &[f64], t: f64, w: &[f64], y: &mut [f64]) {
        let u = p[0];
        let mismatch = (3.0 - t.sin()) - u;
        y[0] = 2.0 * mismatch * w[0];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::check_products;

    #[test]
    fn derivative_products_match_finite_differences() {
        let model = RocketCar::default();
        check_products(&model, &[0.3, 1.2, 0.9], &[0.4], 0.25);
        check_products(&model, &[0.0, 0.0, 1.0], &[0.4], 0.0);
    }
}
