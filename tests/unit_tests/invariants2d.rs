use crate::unit_tests::{
    fd_matrix_derivative_2d, fd_scalar_derivative_2d, inverted_jacobian_2d, jacobian_2d,
    well_conditioned_matrix2,
};
use gleipnir::invariants::InvariantsEvaluator2d;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::Matrix2;
use proptest::prelude::*;

#[test]
fn invariants_at_identity() {
    let ie = InvariantsEvaluator2d::new(&Matrix2::<f64>::identity());
    assert_scalar_eq!(ie.i1(), 2.0, comp = float);
    assert_scalar_eq!(ie.i1b(), 2.0, comp = float);
    assert_scalar_eq!(ie.i2(), 1.0, comp = float);
    assert_scalar_eq!(ie.i2b(), 1.0, comp = float);
}

#[test]
fn i2_is_square_of_i2b() {
    for j in [jacobian_2d(), inverted_jacobian_2d()] {
        let ie = InvariantsEvaluator2d::new(&j);
        assert_scalar_eq!(ie.i2(), ie.i2b() * ie.i2b(), comp = float);
    }
}

#[test]
fn fractional_power_carries_the_orientation_sign() {
    let ie = InvariantsEvaluator2d::new(&inverted_jacobian_2d());
    assert!(ie.i2b() > 0.0);
    let (i2b, sign) = ie.i2b_sign();
    assert_scalar_eq!(i2b, ie.i2b(), comp = float);
    assert_scalar_eq!(sign, -1.0, comp = float);
    assert!(ie.i2b_p() < 0.0);
}

#[test]
fn invariants_remain_finite_for_inverted_jacobian() {
    let j = inverted_jacobian_2d();
    let ie = InvariantsEvaluator2d::new(&j);
    for value in [ie.i1(), ie.i1b(), ie.i2(), ie.i2b(), ie.i2b_p()] {
        assert!(value.is_finite());
    }
    for matrix in [ie.di1(), ie.di1b(), ie.di2(), ie.di2b()] {
        assert!(matrix.iter().all(|x| x.is_finite()));
    }
    for i in 0..2 {
        for jc in 0..2 {
            for matrix in [ie.ddi1(i, jc), ie.ddi1b(i, jc), ie.ddi2(i, jc), ie.ddi2b(i, jc)] {
                assert!(matrix.iter().all(|x| x.is_finite()));
            }
        }
    }
}

proptest! {
    #[test]
    fn di1_is_derivative_of_i1(j in well_conditioned_matrix2()) {
        let fd = fd_scalar_derivative_2d(|j| InvariantsEvaluator2d::new(j).i1(), &j, 1e-5);
        let an = InvariantsEvaluator2d::new(&j).di1();
        assert_matrix_eq!(an, fd, comp = abs, tol = 1e-3 * (1.0 + an.amax()));
    }

    #[test]
    fn di1b_is_derivative_of_i1b(j in well_conditioned_matrix2()) {
        let fd = fd_scalar_derivative_2d(|j| InvariantsEvaluator2d::new(j).i1b(), &j, 1e-5);
        let an = InvariantsEvaluator2d::new(&j).di1b();
        assert_matrix_eq!(an, fd, comp = abs, tol = 1e-3 * (1.0 + an.amax()));
    }

    #[test]
    fn di2_is_derivative_of_i2(j in well_conditioned_matrix2()) {
        let fd = fd_scalar_derivative_2d(|j| InvariantsEvaluator2d::new(j).i2(), &j, 1e-5);
        let an = InvariantsEvaluator2d::new(&j).di2();
        assert_matrix_eq!(an, fd, comp = abs, tol = 1e-3 * (1.0 + an.amax()));
    }

    #[test]
    fn di2b_is_derivative_of_i2b(j in well_conditioned_matrix2()) {
        let fd = fd_scalar_derivative_2d(|j| InvariantsEvaluator2d::new(j).i2b(), &j, 1e-5);
        let an = InvariantsEvaluator2d::new(&j).di2b();
        assert_matrix_eq!(an, fd, comp = abs, tol = 1e-3 * (1.0 + an.amax()));
    }

    #[test]
    fn ddi1_is_derivative_of_di1(
        j in well_conditioned_matrix2(),
        i in 0usize..2,
        jc in 0usize..2,
    ) {
        let fd = fd_matrix_derivative_2d(|j| InvariantsEvaluator2d::new(j).di1(), &j, i, jc, 1e-5);
        let an = InvariantsEvaluator2d::new(&j).ddi1(i, jc);
        assert_matrix_eq!(an, fd, comp = abs, tol = 1e-3 * (1.0 + an.amax()));
    }

    #[test]
    fn ddi1b_is_derivative_of_di1b(
        j in well_conditioned_matrix2(),
        i in 0usize..2,
        jc in 0usize..2,
    ) {
        let fd = fd_matrix_derivative_2d(|j| InvariantsEvaluator2d::new(j).di1b(), &j, i, jc, 1e-5);
        let an = InvariantsEvaluator2d::new(&j).ddi1b(i, jc);
        assert_matrix_eq!(an, fd, comp = abs, tol = 1e-3 * (1.0 + an.amax()));
    }

    #[test]
    fn ddi2_is_derivative_of_di2(
        j in well_conditioned_matrix2(),
        i in 0usize..2,
        jc in 0usize..2,
    ) {
        let fd = fd_matrix_derivative_2d(|j| InvariantsEvaluator2d::new(j).di2(), &j, i, jc, 1e-5);
        let an = InvariantsEvaluator2d::new(&j).ddi2(i, jc);
        assert_matrix_eq!(an, fd, comp = abs, tol = 1e-3 * (1.0 + an.amax()));
    }

    #[test]
    fn ddi2b_is_derivative_of_di2b(
        j in well_conditioned_matrix2(),
        i in 0usize..2,
        jc in 0usize..2,
    ) {
        let fd = fd_matrix_derivative_2d(|j| InvariantsEvaluator2d::new(j).di2b(), &j, i, jc, 1e-5);
        let an = InvariantsEvaluator2d::new(&j).ddi2b(i, jc);
        assert_matrix_eq!(an, fd, comp = abs, tol = 1e-3 * (1.0 + an.amax()));
    }
}
