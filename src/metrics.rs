//! Mesh-quality metric strategies.
//!
//! A quality metric measures how far a local perturbation Jacobian `Jpt` (the composition of
//! the physical Jacobian with the inverse of the target Jacobian) deviates from the ideal
//! shape/size encoded by the target. A metric is a triple of functions: an energy density,
//! its gradient tensor P (dim×dim) and its Hessian (dim⁴, exposed slice-wise), all expressed
//! through the invariant evaluators of [`crate::invariants`].
//!
//! The assembler and kernels are generic over the strategy; the metrics shipped here cover the
//! common shape and size families, and downstream crates can plug in their own by implementing
//! [`QualityMetric2d`] or [`QualityMetric3d`].

use crate::invariants::{InvariantsEvaluator2d, InvariantsEvaluator3d};
use crate::Real;
use nalgebra::{Matrix2, Matrix3};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A quality metric for two-dimensional meshes.
///
/// All three members are deterministic pure functions of `jpt`; implementations must be safe to
/// call concurrently from parallel element loops.
pub trait QualityMetric2d<T: Real>: Debug + Send + Sync {
    /// The energy density W(Jpt).
    fn energy(&self, jpt: &Matrix2<T>) -> T;

    /// The gradient tensor P = ∂W/∂Jpt.
    fn gradient(&self, jpt: &Matrix2<T>) -> Matrix2<T>;

    /// The (k, l) slice of the fourth-order Hessian ∂²W/∂Jpt² at fixed (i, j).
    fn hessian_component(&self, jpt: &Matrix2<T>, i: usize, j: usize) -> Matrix2<T>;
}

/// A quality metric for three-dimensional meshes.
pub trait QualityMetric3d<T: Real>: Debug + Send + Sync {
    /// The energy density W(Jpt).
    fn energy(&self, jpt: &Matrix3<T>) -> T;

    /// The gradient tensor P = ∂W/∂Jpt.
    fn gradient(&self, jpt: &Matrix3<T>) -> Matrix3<T>;

    /// The (k, l) slice of the fourth-order Hessian ∂²W/∂Jpt² at fixed (i, j).
    fn hessian_component(&self, jpt: &Matrix3<T>, i: usize, j: usize) -> Matrix3<T>;
}

/// The 2D shape metric $W = I_{1b}/2 - 1$.
///
/// Scale-invariant; zero exactly when `Jpt` is a rotation of a scaled identity, i.e. when the
/// element has the target's shape regardless of its size.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeMetric2d;

#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
impl<T: Real> QualityMetric2d<T> for ShapeMetric2d {
    fn energy(&self, jpt: &Matrix2<T>) -> T {
        let ie = InvariantsEvaluator2d::new(jpt);
        0.5 * ie.i1b() - 1.0
    }

    fn gradient(&self, jpt: &Matrix2<T>) -> Matrix2<T> {
        let ie = InvariantsEvaluator2d::new(jpt);
        ie.di1b() * 0.5
    }

    fn hessian_component(&self, jpt: &Matrix2<T>, i: usize, j: usize) -> Matrix2<T> {
        let ie = InvariantsEvaluator2d::new(jpt);
        ie.ddi1b(i, j) * 0.5
    }
}

/// The 2D size metric $W = (I_{2b} - 1)^2$.
///
/// Penalizes deviation of the local volume ratio from the target's; indifferent to shape.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeMetric2d;

#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
impl<T: Real> QualityMetric2d<T> for SizeMetric2d {
    fn energy(&self, jpt: &Matrix2<T>) -> T {
        let ie = InvariantsEvaluator2d::new(jpt);
        let r = ie.i2b() - 1.0;
        r * r
    }

    fn gradient(&self, jpt: &Matrix2<T>) -> Matrix2<T> {
        let ie = InvariantsEvaluator2d::new(jpt);
        ie.di2b() * (2.0 * (ie.i2b() - 1.0))
    }

    fn hessian_component(&self, jpt: &Matrix2<T>, i: usize, j: usize) -> Matrix2<T> {
        let ie = InvariantsEvaluator2d::new(jpt);
        let di2b = ie.di2b();
        di2b * (2.0 * di2b[(i, j)]) + ie.ddi2b(i, j) * (2.0 * (ie.i2b() - 1.0))
    }
}

/// The 3D shape metric $W = I_{1b} I_{2b} / 9 - 1$.
///
/// Uses both scale-invariant invariants; this is the workhorse metric for shape optimization of
/// hexahedral meshes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeMetric3d;

#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
impl<T: Real> QualityMetric3d<T> for ShapeMetric3d {
    fn energy(&self, jpt: &Matrix3<T>) -> T {
        let ie = InvariantsEvaluator3d::new(jpt);
        ie.i1b() * ie.i2b() / 9.0 - 1.0
    }

    fn gradient(&self, jpt: &Matrix3<T>) -> Matrix3<T> {
        let ie = InvariantsEvaluator3d::new(jpt);
        (ie.di1b() * ie.i2b() + ie.di2b() * ie.i1b()) / 9.0
    }

    fn hessian_component(&self, jpt: &Matrix3<T>, i: usize, j: usize) -> Matrix3<T> {
        let ie = InvariantsEvaluator3d::new(jpt);
        let di1b = ie.di1b();
        let di2b = ie.di2b();
        (ie.ddi1b(i, j) * ie.i2b()
            + di2b * di1b[(i, j)]
            + di1b * di2b[(i, j)]
            + ie.ddi2b(i, j) * ie.i1b())
            / 9.0
    }
}

/// The 3D shape metric $W = I_{1b}/3 - 1$, based on the Frobenius norm alone.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrobeniusShapeMetric3d;

#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
impl<T: Real> QualityMetric3d<T> for FrobeniusShapeMetric3d {
    fn energy(&self, jpt: &Matrix3<T>) -> T {
        let ie = InvariantsEvaluator3d::new(jpt);
        ie.i1b() / 3.0 - 1.0
    }

    fn gradient(&self, jpt: &Matrix3<T>) -> Matrix3<T> {
        let ie = InvariantsEvaluator3d::new(jpt);
        ie.di1b() / 3.0
    }

    fn hessian_component(&self, jpt: &Matrix3<T>, i: usize, j: usize) -> Matrix3<T> {
        let ie = InvariantsEvaluator3d::new(jpt);
        ie.ddi1b(i, j) / 3.0
    }
}

/// The 3D size metric $W = (I_{3b} - 1)^2$.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeMetric3d;

#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
impl<T: Real> QualityMetric3d<T> for SizeMetric3d {
    fn energy(&self, jpt: &Matrix3<T>) -> T {
        let ie = InvariantsEvaluator3d::new(jpt);
        let r = ie.i3b() - 1.0;
        r * r
    }

    fn gradient(&self, jpt: &Matrix3<T>) -> Matrix3<T> {
        let ie = InvariantsEvaluator3d::new(jpt);
        ie.di3b() * (2.0 * (ie.i3b() - 1.0))
    }

    fn hessian_component(&self, jpt: &Matrix3<T>, i: usize, j: usize) -> Matrix3<T> {
        let ie = InvariantsEvaluator3d::new(jpt);
        let di3b = ie.di3b();
        di3b * (2.0 * di3b[(i, j)]) + ie.ddi3b(i, j) * (2.0 * (ie.i3b() - 1.0))
    }
}
