//! Analytic invariants of small Jacobian-like matrices and their derivatives.
//!
//! The evaluators compute, for a single 2×2 or 3×3 matrix $J$, the scalar invariants used by
//! mesh-quality metrics together with their first derivatives (dim×dim matrices) and second
//! derivatives (dim⁴ tensors, exposed as dim×dim slices for a fixed index pair). All formulas
//! are closed form; there is no numerical differentiation anywhere.
//!
//! The determinant-based invariants are *sign-corrected*: fractional powers of the determinant
//! are evaluated as `sign · |det|^p`, so every accessor stays finite and well-defined on a
//! tangled element with `det(J) < 0`. See the module-level discussion in the crate docs.
//!
//! Evaluators are plain value types without heap allocation, so one can be instantiated per
//! quadrature point inside parallel element loops.

pub mod dim2;
pub mod dim3;

pub use dim2::InvariantsEvaluator2d;
pub use dim3::InvariantsEvaluator3d;
