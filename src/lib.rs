//! Matrix-free mesh-quality operators for high-order finite elements.
//!
//! `gleipnir` evaluates the energy, gradient (residual action) and Hessian action of a
//! mesh-quality functional on high-order tensor-product meshes without ever forming a global
//! sparse matrix. The building blocks are:
//!
//! - [`invariants`]: analytic evaluation of the scalar invariants of a small (2×2 or 3×3)
//!   Jacobian-like matrix, together with their first and second derivatives in closed form.
//! - [`metrics`]: pluggable quality-metric strategies that combine invariant derivatives into an
//!   energy density, its gradient tensor P and its dim⁴ Hessian tensor.
//! - [`kernels`]: sum-factorized contraction kernels that apply the per-quadrature-point local
//!   operators to an entire element batch, with compile-time-specialized fast paths for small
//!   degree pairs and a bounded runtime-sized fallback.
//! - [`operator`]: the [`MeshQualityOperator`](operator::MeshQualityOperator) facade that owns
//!   the partially assembled state and dispatches on spatial dimension and degree pair.
//!
//! Degenerate (inverted) elements are deliberately *not* errors: every invariant formula is
//! sign-corrected so that it stays finite when the local determinant is negative, which lets a
//! mesh-optimization driver use the resulting (possibly extreme) derivatives to untangle the
//! mesh. Configuration mistakes (a missing integration rule, an unsupported degree-of-freedom
//! ordering, a spatial dimension outside {2, 3} or a degree pair beyond the compiled maximum)
//! panic with a diagnostic instead, before any output buffer is touched.

use nalgebra::RealField;

pub mod basis;
pub mod invariants;
pub mod kernels;
pub mod metrics;
pub mod operator;
pub mod quadrature;
pub mod space;

pub extern crate nalgebra;

/// A real scalar suitable for the contraction kernels.
///
/// The kernels store intermediate tiles in plain arrays, hence the `Copy` requirement on top of
/// `RealField`.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}
