//! One-dimensional quadrature rules for the reference interval `[0, 1]`.
//!
//! The tensor-product kernels only ever consume a 1D rule; points and weights along each
//! reference axis are combined multiplicatively inside the kernels themselves.

use crate::Real;
use std::f64::consts::PI;

/// Recurrence relation for Legendre polynomials.
///
/// The derivative formula is undefined at |x| == 1, so it is only suitable for evaluation in
/// the open interval (-1, 1).
#[derive(Debug, Default)]
struct LegendreRecurrence {
    n: usize,
    x: f64,
    // The current value, i.e. p_n(x)
    p1: f64,
    // The previous value in the recurrence, i.e. p_{n - 1}(x)
    p2: f64,
}

impl LegendreRecurrence {
    fn evaluate(n: usize, x: f64) -> Self {
        // m P_m(x) = (2m - 1) x P_{m - 1}(x) - (m - 1) P_{m - 2}(x)
        let mut p1 = 1.0;
        let mut p2 = 0.0;
        let mut p3;
        for m in 1..=n {
            let m = m as f64;
            p3 = p2;
            p2 = p1;
            p1 = ((2.0 * m - 1.0) * x * p2 - (m - 1.0) * p3) / m;
        }
        Self { n, x, p1, p2 }
    }

    fn value_and_derivative(&self) -> (f64, f64) {
        let Self { n, x, p1, p2 } = &self;
        let n = *n as f64;
        // dp_n/dx (x) = n (x p_n(x) - p_{n - 1}(x)) / (x^2 - 1)
        (*p1, n * (x * p1 - p2) / (x * x - 1.0))
    }
}

/// A 1D quadrature rule on the reference interval `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationRule<T> {
    points: Vec<T>,
    weights: Vec<T>,
}

impl<T: Real> IntegrationRule<T> {
    /// The Gauss–Legendre rule with the given number of points, mapped to `[0, 1]`.
    ///
    /// Given `n` points, the rule integrates polynomials of order up to `2n - 1` exactly.
    /// Roots are found by Newton's method on the Legendre recurrence.
    ///
    /// # Panics
    ///
    /// Panics if zero points are requested.
    pub fn gauss(num_points: usize) -> Self {
        let n = num_points;
        assert!(n > 0, "number of points must be positive");

        // Only find the first (n + 1)/2 roots; the rest follow by symmetry.
        let m = (n + 1) / 2;
        let mut points = vec![0.0; n];
        let mut weights = vec![0.0; n];

        for i in 0..m {
            // Fairly accurate initial guess
            let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
            let (mut p, mut dp) = LegendreRecurrence::evaluate(n, x).value_and_derivative();

            loop {
                let dx = -p / dp;
                x += dx;
                let (p_new, dp_new) = LegendreRecurrence::evaluate(n, x).value_and_derivative();
                p = p_new;
                dp = dp_new;
                if dx.abs() <= 1e-15 {
                    break;
                }
            }

            // With the root known, the weight follows from the standard formula
            let w = 2.0 / ((1.0 - x * x) * dp * dp);

            points[i] = x;
            weights[i] = w;
            points[n - i - 1] = -x;
            weights[n - i - 1] = w;
        }

        // Map [-1, 1] to [0, 1]
        let convert = |v: f64| T::from_f64(v).expect("rule data must fit in T");
        Self {
            points: points.iter().map(|&x| convert(0.5 * (x + 1.0))).collect(),
            weights: weights.iter().map(|&w| convert(0.5 * w)).collect(),
        }
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[T] {
        &self.points
    }

    pub fn weights(&self) -> &[T] {
        &self.weights
    }
}
