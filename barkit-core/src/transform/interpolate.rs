//! Interpolation backends for interior gaps.
//!
//! A series is a slice of `f64` indexed by row position; `NaN` marks a gap.
//! Backends only fill gaps that sit between two known values. Leading and
//! trailing gaps are never extrapolated.

use super::fill::FillMethod;

/// Numerical capability the gap filler needs for `linear` and `spline`.
pub trait Interpolator: Send + Sync {
    fn name(&self) -> &str;

    fn supports(&self, method: FillMethod) -> bool;

    /// Fill interior gaps of `values` in place.
    ///
    /// Only called with a method for which [`supports`](Self::supports)
    /// returned true.
    fn fill_interior(&self, method: FillMethod, values: &mut [f64]);
}

/// Built-in backend: piecewise linear and natural cubic spline.
///
/// The spline is fit through every known point of the series with zero
/// second derivative at both ends (the "natural" boundary condition), and
/// evaluated only inside the known range. With two known points it reduces
/// to a straight line.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalSpline;

impl Interpolator for NaturalSpline {
    fn name(&self) -> &str {
        "natural_spline"
    }

    fn supports(&self, method: FillMethod) -> bool {
        matches!(method, FillMethod::Linear | FillMethod::Spline)
    }

    fn fill_interior(&self, method: FillMethod, values: &mut [f64]) {
        match method {
            FillMethod::Linear => linear(values),
            FillMethod::Spline => cubic_spline(values),
            FillMethod::Forward | FillMethod::Backward => {}
        }
    }
}

/// Positions of the known (non-NaN) values.
fn known_points(values: &[f64]) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .map(|(i, _)| i)
        .collect()
}

fn linear(values: &mut [f64]) {
    let known = known_points(values);
    for pair in known.windows(2) {
        let (i0, i1) = (pair[0], pair[1]);
        if i1 - i0 < 2 {
            continue;
        }
        let (v0, v1) = (values[i0], values[i1]);
        let span = (i1 - i0) as f64;
        for i in (i0 + 1)..i1 {
            let t = (i - i0) as f64 / span;
            values[i] = v0 + (v1 - v0) * t;
        }
    }
}

fn cubic_spline(values: &mut [f64]) {
    let known = known_points(values);
    let n = known.len();
    if n < 2 || known[n - 1] - known[0] + 1 == n {
        return;
    }

    let x: Vec<f64> = known.iter().map(|&i| i as f64).collect();
    let y: Vec<f64> = known.iter().map(|&i| values[i]).collect();
    let m = second_derivatives(&x, &y);

    for k in 0..n - 1 {
        let (i0, i1) = (known[k], known[k + 1]);
        let h = x[k + 1] - x[k];
        for i in (i0 + 1)..i1 {
            let xi = i as f64;
            let a = (x[k + 1] - xi) / h;
            let b = (xi - x[k]) / h;
            values[i] = a * y[k]
                + b * y[k + 1]
                + ((a * a * a - a) * m[k] + (b * b * b - b) * m[k + 1]) * h * h / 6.0;
        }
    }
}

/// Second derivatives at the knots of a natural cubic spline, solved with
/// the Thomas algorithm on the tridiagonal system.
fn second_derivatives(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let mut m = vec![0.0; n];
    if n < 3 {
        return m;
    }

    let mut c_prime = vec![0.0; n];
    let mut d_prime = vec![0.0; n];
    for i in 1..n - 1 {
        let h0 = x[i] - x[i - 1];
        let h1 = x[i + 1] - x[i];
        let sub = h0;
        let diag = 2.0 * (h0 + h1);
        let sup = h1;
        let rhs = 6.0 * ((y[i + 1] - y[i]) / h1 - (y[i] - y[i - 1]) / h0);

        let denom = diag - sub * c_prime[i - 1];
        c_prime[i] = sup / denom;
        d_prime[i] = (rhs - sub * d_prime[i - 1]) / denom;
    }

    for i in (1..n - 1).rev() {
        m[i] = d_prime[i] - c_prime[i] * m[i + 1];
    }
    m
}
