//! Sum-factorized element kernels for tensor-product elements.
//!
//! All kernels share the same three-stage structure: a forward pass contracting the element dof
//! tensor one axis at a time against the 1D basis matrices `B`/`G` to obtain Jacobians at
//! quadrature points, a pointwise pass applying the metric (or the frozen Hessian tensor) at
//! each point, and for the derivative kernels a backward pass contracting against the
//! transposed basis matrices, accumulating into the element output.
//!
//! Each kernel is generic over compile-time tile capacities `MD1`/`MQ1` and dispatched from the
//! runtime `(d1d, q1d)` pair: common small sizes get fully specialized instantiations, anything
//! else up to [`MAX_D1D`]/[`MAX_Q1D`] runs through a generic fallback variant (bitwise-identical
//! results, larger stack tiles). Sizes past the maximum are a configuration error and panic
//! before any output buffer is touched.
//!
//! Element loops run either sequentially or over a rayon pool as selected by
//! [`ExecutionPolicy`]; every element owns a disjoint chunk of the output buffer, so the
//! parallel loop needs no synchronization.

use crate::Real;
use nalgebra::{Matrix2, Matrix3};
use serde::{Deserialize, Serialize};

pub mod dim2;
pub mod dim3;

/// Largest number of 1D dofs the stack-allocated kernel tiles can hold.
pub const MAX_D1D: usize = 6;
/// Largest number of 1D quadrature points the stack-allocated kernel tiles can hold.
pub const MAX_Q1D: usize = 6;

/// How the per-element kernel loops are executed.
///
/// The policy is explicit operator configuration rather than ambient global state, so two
/// operators in the same process can run under different policies.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionPolicy {
    /// A plain sequential loop over elements.
    Sequential,
    /// Elements distributed over the global rayon thread pool.
    #[default]
    Parallel,
}

/// Closed-form inverse of a 2×2 matrix through its adjugate.
pub(crate) fn cofactor_inverse2<T: Real>(m: &Matrix2<T>) -> Matrix2<T> {
    let det = m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)];
    Matrix2::new(m[(1, 1)], -m[(0, 1)], -m[(1, 0)], m[(0, 0)]) / det
}

/// Closed-form inverse of a 3×3 matrix through its adjugate.
pub(crate) fn cofactor_inverse3<T: Real>(m: &Matrix3<T>) -> Matrix3<T> {
    let det = m[(0, 0)] * (m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)])
        - m[(0, 1)] * (m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)])
        + m[(0, 2)] * (m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)]);
    let adj = Matrix3::new(
        m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)],
        m[(0, 2)] * m[(2, 1)] - m[(0, 1)] * m[(2, 2)],
        m[(0, 1)] * m[(1, 2)] - m[(0, 2)] * m[(1, 1)],
        m[(1, 2)] * m[(2, 0)] - m[(1, 0)] * m[(2, 2)],
        m[(0, 0)] * m[(2, 2)] - m[(0, 2)] * m[(2, 0)],
        m[(0, 2)] * m[(1, 0)] - m[(0, 0)] * m[(1, 2)],
        m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)],
        m[(0, 1)] * m[(2, 0)] - m[(0, 0)] * m[(2, 1)],
        m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)],
    );
    adj / det
}

/// Instantiate a kernel runner for the given runtime `(d1d, q1d)` pair.
///
/// Specialized arms cover the element orders in common use; other admissible sizes fall back to
/// the maximum-capacity variant with a warning. Inadmissible sizes panic here, before the
/// runner sees any buffer.
macro_rules! dispatch_tensor_kernel {
    ($run:ident, $d1d:expr, $q1d:expr, ($($arg:expr),* $(,)?)) => {
        match ($d1d, $q1d) {
            (2, 2) => $run::<T, 2, 2>($($arg),*),
            (2, 3) => $run::<T, 2, 3>($($arg),*),
            (3, 3) => $run::<T, 3, 3>($($arg),*),
            (3, 4) => $run::<T, 3, 4>($($arg),*),
            (4, 4) => $run::<T, 4, 4>($($arg),*),
            (4, 5) => $run::<T, 4, 5>($($arg),*),
            (5, 5) => $run::<T, 5, 5>($($arg),*),
            (5, 6) => $run::<T, 5, 6>($($arg),*),
            (d1d, q1d) => {
                assert!(
                    d1d <= $crate::kernels::MAX_D1D && q1d <= $crate::kernels::MAX_Q1D,
                    "tensor-product kernels support at most {} dofs and {} quadrature points \
                     per axis, got d1d = {}, q1d = {}",
                    $crate::kernels::MAX_D1D,
                    $crate::kernels::MAX_Q1D,
                    d1d,
                    q1d
                );
                log::warn!(
                    "no specialized kernel for d1d = {}, q1d = {}, \
                     falling back to the generic variant",
                    d1d,
                    q1d
                );
                $run::<T, { $crate::kernels::MAX_D1D }, { $crate::kernels::MAX_Q1D }>($($arg),*)
            }
        }
    };
}

pub(crate) use dispatch_tensor_kernel;
