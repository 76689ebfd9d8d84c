use crate::unit_tests::{
    fd_matrix_derivative_2d, fd_matrix_derivative_3d, fd_scalar_derivative_2d, fd_scalar_derivative_3d,
    inverted_jacobian_2d, inverted_jacobian_3d, well_conditioned_matrix2, well_conditioned_matrix3,
};
use gleipnir::metrics::{
    FrobeniusShapeMetric3d, QualityMetric2d, QualityMetric3d, ShapeMetric2d, ShapeMetric3d,
    SizeMetric2d, SizeMetric3d,
};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{Matrix2, Matrix3};
use proptest::prelude::*;

/// Check that the gradient is the derivative of the energy and that each Hessian slice is the
/// derivative of the gradient.
fn check_derivatives_2d(metric: &dyn QualityMetric2d<f64>, j: &Matrix2<f64>) {
    let grad_fd = fd_scalar_derivative_2d(|j| metric.energy(j), j, 1e-5);
    let grad = metric.gradient(j);
    assert_matrix_eq!(grad, grad_fd, comp = abs, tol = 1e-3 * (1.0 + grad.amax()));
    for i in 0..2 {
        for jc in 0..2 {
            let hess_fd = fd_matrix_derivative_2d(|j| metric.gradient(j), j, i, jc, 1e-5);
            let hess = metric.hessian_component(j, i, jc);
            assert_matrix_eq!(hess, hess_fd, comp = abs, tol = 1e-3 * (1.0 + hess.amax()));
        }
    }
}

fn check_derivatives_3d(metric: &dyn QualityMetric3d<f64>, j: &Matrix3<f64>) {
    let grad_fd = fd_scalar_derivative_3d(|j| metric.energy(j), j, 1e-5);
    let grad = metric.gradient(j);
    assert_matrix_eq!(grad, grad_fd, comp = abs, tol = 1e-3 * (1.0 + grad.amax()));
    for i in 0..3 {
        for jc in 0..3 {
            let hess_fd = fd_matrix_derivative_3d(|j| metric.gradient(j), j, i, jc, 1e-5);
            let hess = metric.hessian_component(j, i, jc);
            assert_matrix_eq!(hess, hess_fd, comp = abs, tol = 1e-3 * (1.0 + hess.amax()));
        }
    }
}

#[test]
fn metrics_vanish_at_identity() {
    let id2 = Matrix2::<f64>::identity();
    let id3 = Matrix3::<f64>::identity();
    assert_scalar_eq!(ShapeMetric2d.energy(&id2), 0.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(SizeMetric2d.energy(&id2), 0.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(ShapeMetric3d.energy(&id3), 0.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(FrobeniusShapeMetric3d.energy(&id3), 0.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(SizeMetric3d.energy(&id3), 0.0, comp = abs, tol = 1e-14);
}

#[test]
fn metrics_remain_finite_for_inverted_jacobian() {
    let j2 = inverted_jacobian_2d();
    let j3 = inverted_jacobian_3d();
    assert!(ShapeMetric2d.energy(&j2).is_finite());
    assert!(SizeMetric2d.energy(&j2).is_finite());
    assert!(ShapeMetric2d.gradient(&j2).iter().all(|x| x.is_finite()));
    assert!(ShapeMetric3d.energy(&j3).is_finite());
    assert!(FrobeniusShapeMetric3d.energy(&j3).is_finite());
    assert!(SizeMetric3d.energy(&j3).is_finite());
    assert!(ShapeMetric3d.gradient(&j3).iter().all(|x| x.is_finite()));
}

proptest! {
    #[test]
    fn shape_metric_2d_derivatives(j in well_conditioned_matrix2()) {
        check_derivatives_2d(&ShapeMetric2d, &j);
    }

    #[test]
    fn size_metric_2d_derivatives(j in well_conditioned_matrix2()) {
        check_derivatives_2d(&SizeMetric2d, &j);
    }

    #[test]
    fn shape_metric_3d_derivatives(j in well_conditioned_matrix3()) {
        check_derivatives_3d(&ShapeMetric3d, &j);
    }

    #[test]
    fn frobenius_shape_metric_3d_derivatives(j in well_conditioned_matrix3()) {
        check_derivatives_3d(&FrobeniusShapeMetric3d, &j);
    }

    #[test]
    fn size_metric_3d_derivatives(j in well_conditioned_matrix3()) {
        check_derivatives_3d(&SizeMetric3d, &j);
    }

    /// Shape metrics only see the shape: scaling the Jacobian leaves the energy unchanged.
    #[test]
    fn shape_metrics_are_scale_invariant(
        j2 in well_conditioned_matrix2(),
        j3 in well_conditioned_matrix3(),
        s in 0.5..2.0f64,
    ) {
        assert_scalar_eq!(
            ShapeMetric2d.energy(&(j2 * s)),
            ShapeMetric2d.energy(&j2),
            comp = abs,
            tol = 1e-10
        );
        assert_scalar_eq!(
            ShapeMetric3d.energy(&(j3 * s)),
            ShapeMetric3d.energy(&j3),
            comp = abs,
            tol = 1e-10
        );
        assert_scalar_eq!(
            FrobeniusShapeMetric3d.energy(&(j3 * s)),
            FrobeniusShapeMetric3d.energy(&j3),
            comp = abs,
            tol = 1e-10
        );
    }
}
