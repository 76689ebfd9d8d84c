//! Evaluation of the 1D nodal basis at quadrature points.
//!
//! Tensor-product elements are fully described by two small matrices shared across the whole
//! mesh: the values `B` and derivatives `G` of the 1D Lagrange basis at the 1D quadrature
//! points. The kernels in [`crate::kernels`] contract against these one axis at a time.

use crate::quadrature::IntegrationRule;
use crate::Real;
use nalgebra::DMatrix;

/// Values and derivatives of the 1D nodal basis at the points of a 1D quadrature rule.
///
/// Both matrices have shape (#quadrature-points-1D × #dofs-1D). The nodes are the equispaced
/// Lagrange nodes on `[0, 1]`, in lexicographic (left-to-right) order, matching the
/// lexicographic degree-of-freedom ordering required by the element restriction.
#[derive(Debug, Clone, PartialEq)]
pub struct DofToQuad<T> {
    b: DMatrix<T>,
    g: DMatrix<T>,
}

impl<T: Real> DofToQuad<T> {
    /// Evaluate the degree `d1d - 1` Lagrange basis at the points of `rule`.
    ///
    /// # Panics
    ///
    /// Panics if `d1d < 2`; a tensor-product element needs at least two nodes per axis for its
    /// Jacobian to be defined.
    pub fn tensor(d1d: usize, rule: &IntegrationRule<T>) -> Self {
        assert!(d1d >= 2, "at least two 1D dofs are required, got {}", d1d);
        let q1d = rule.num_points();
        let nodes: Vec<T> = (0..d1d)
            .map(|k| {
                let k = T::from_usize(k).expect("node index must fit in T");
                k / T::from_usize(d1d - 1).expect("node count must fit in T")
            })
            .collect();

        let mut b = DMatrix::zeros(q1d, d1d);
        let mut g = DMatrix::zeros(q1d, d1d);
        for (q, &x) in rule.points().iter().enumerate() {
            for k in 0..d1d {
                let denom: T = (0..d1d)
                    .filter(|&m| m != k)
                    .map(|m| nodes[k] - nodes[m])
                    .fold(T::one(), |acc, d| acc * d);

                let num: T = (0..d1d)
                    .filter(|&m| m != k)
                    .map(|m| x - nodes[m])
                    .fold(T::one(), |acc, d| acc * d);
                b[(q, k)] = num / denom;

                // l_k'(x) = sum over n != k of the product over m != k, n of (x - x_m),
                // divided by the common denominator.
                let mut dnum = T::zero();
                for n in 0..d1d {
                    if n == k {
                        continue;
                    }
                    let partial: T = (0..d1d)
                        .filter(|&m| m != k && m != n)
                        .map(|m| x - nodes[m])
                        .fold(T::one(), |acc, d| acc * d);
                    dnum += partial;
                }
                g[(q, k)] = dnum / denom;
            }
        }
        Self { b, g }
    }

    /// The number of 1D dofs.
    pub fn dofs_1d(&self) -> usize {
        self.b.ncols()
    }

    /// The number of 1D quadrature points.
    pub fn quad_points_1d(&self) -> usize {
        self.b.nrows()
    }

    /// Basis values, (q1d × d1d).
    pub fn b(&self) -> &DMatrix<T> {
        &self.b
    }

    /// Basis derivatives, (q1d × d1d).
    pub fn g(&self) -> &DMatrix<T> {
        &self.g
    }
}
