use gleipnir::kernels::ExecutionPolicy;
use gleipnir::metrics::{ShapeMetric3d, SizeMetric2d, SizeMetric3d};
use gleipnir::operator::MeshQualityOperator;
use gleipnir::quadrature::IntegrationRule;
use gleipnir::space::{single_hex_space, single_quad_space, DofOrdering, LexicographicRestriction, TensorProductSpace};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DVector, Matrix2, Matrix3};

fn quad_operator(d1d: usize, q1d: usize) -> (MeshQualityOperator<f64>, DVector<f64>) {
    let (mut space, coords) = single_quad_space::<f64>(d1d);
    space.set_integration_rule(IntegrationRule::gauss(q1d));
    let mut op = MeshQualityOperator::new_2d(space, Box::new(SizeMetric2d), Matrix2::identity());
    op.set_execution_policy(ExecutionPolicy::Sequential);
    op.setup();
    (op, DVector::from_vec(coords))
}

fn hex_operator(d1d: usize, q1d: usize) -> (MeshQualityOperator<f64>, DVector<f64>) {
    let (mut space, coords) = single_hex_space::<f64>(d1d);
    space.set_integration_rule(IntegrationRule::gauss(q1d));
    let mut op = MeshQualityOperator::new_3d(space, Box::new(SizeMetric3d), Matrix3::identity());
    op.set_execution_policy(ExecutionPolicy::Sequential);
    op.setup();
    (op, DVector::from_vec(coords))
}

/// A fixed, reproducible perturbation that bends the element without inverting it.
fn perturbed(x: &DVector<f64>) -> DVector<f64> {
    DVector::from_iterator(
        x.len(),
        x.iter()
            .enumerate()
            .map(|(i, v)| v + 0.05 * ((i * 37 % 11) as f64 / 11.0 - 0.5)),
    )
}

/// The reference element with an identity target is already optimal: zero energy and zero
/// gradient.
#[test]
fn reference_hex_with_identity_target_is_in_equilibrium() {
    let (mut space, coords) = single_hex_space::<f64>(2);
    space.set_integration_rule(IntegrationRule::gauss(2));
    let mut op = MeshQualityOperator::new_3d(space, Box::new(ShapeMetric3d), Matrix3::identity());
    op.setup();
    let x = DVector::from_vec(coords);

    assert_scalar_eq!(op.energy(&x), 0.0, comp = abs, tol = 1e-14);

    let mut g = DVector::zeros(x.len());
    op.apply_gradient(&x, &mut g);
    assert_matrix_eq!(g, DVector::zeros(x.len()), comp = abs, tol = 1e-13);
}

#[test]
fn gradient_matches_finite_difference_of_energy() {
    let (mut op, coords) = quad_operator(3, 3);
    let x = perturbed(&coords);

    let mut g = DVector::zeros(x.len());
    op.apply_gradient(&x, &mut g);

    let h = 1e-6;
    let mut fd = DVector::zeros(x.len());
    for i in 0..x.len() {
        let mut xp = x.clone();
        let mut xm = x.clone();
        xp[i] += h;
        xm[i] -= h;
        fd[i] = (op.energy(&xp) - op.energy(&xm)) / (2.0 * h);
    }
    assert_matrix_eq!(g, fd, comp = abs, tol = 1e-5);
}

#[test]
fn hessian_action_matches_finite_difference_of_gradient() {
    let (mut op, coords) = hex_operator(2, 2);
    let x = perturbed(&coords);
    op.assemble_hessian(&x);
    assert!(op.hessian_ready());

    let r = DVector::from_iterator(
        x.len(),
        (0..x.len()).map(|i| ((i * 23 % 7) as f64 / 7.0) - 0.5),
    );
    let mut hr = DVector::zeros(x.len());
    op.apply_hessian(&r, &mut hr);

    let h = 1e-6;
    let mut gp = DVector::zeros(x.len());
    let mut gm = DVector::zeros(x.len());
    op.apply_gradient(&(&x + &r * h), &mut gp);
    op.apply_gradient(&(&x - &r * h), &mut gm);
    let fd = (gp - gm) / (2.0 * h);

    assert_matrix_eq!(hr, fd, comp = abs, tol = 1e-5);
}

#[test]
fn parallel_policy_matches_sequential() {
    let (mut op_seq, coords) = quad_operator(3, 3);
    let (mut op_par, _) = quad_operator(3, 3);
    op_par.set_execution_policy(ExecutionPolicy::Parallel);
    let x = perturbed(&coords);

    assert_scalar_eq!(op_seq.energy(&x), op_par.energy(&x), comp = float);

    let mut g_seq = DVector::zeros(x.len());
    let mut g_par = DVector::zeros(x.len());
    op_seq.apply_gradient(&x, &mut g_seq);
    op_par.apply_gradient(&x, &mut g_par);
    assert_matrix_eq!(g_seq, g_par, comp = float);
}

/// A second assembly at the same mesh state is skipped; marking the mesh updated forces a
/// recompute at the new state.
#[test]
fn hessian_assembly_is_idempotent_per_mesh_state() {
    let (mut op, coords) = hex_operator(2, 2);
    let x1 = perturbed(&coords);
    let x2 = &x1 * 1.1;
    let r = DVector::from_iterator(
        coords.len(),
        (0..coords.len()).map(|i| ((i * 13 % 5) as f64 / 5.0) - 0.5),
    );

    op.assemble_hessian(&x1);
    let mut hr1 = DVector::zeros(coords.len());
    op.apply_hessian(&r, &mut hr1);

    // Without mark_mesh_updated the frozen tensor from x1 is reused.
    op.assemble_hessian(&x2);
    let mut hr_stale = DVector::zeros(coords.len());
    op.apply_hessian(&r, &mut hr_stale);
    assert_matrix_eq!(hr_stale, hr1, comp = float);

    op.mark_mesh_updated();
    op.assemble_hessian(&x2);
    let mut hr2 = DVector::zeros(coords.len());
    op.apply_hessian(&r, &mut hr2);

    // A freshly constructed operator assembled at x2 must agree with the re-assembly.
    let (mut fresh, _) = hex_operator(2, 2);
    fresh.assemble_hessian(&x2);
    let mut hr_fresh = DVector::zeros(coords.len());
    fresh.apply_hessian(&r, &mut hr_fresh);
    assert_matrix_eq!(hr2, hr_fresh, comp = float);
}

#[test]
#[should_panic(expected = "assemble_hessian must be called before apply_hessian")]
fn hessian_application_requires_assembly() {
    let (mut op, coords) = hex_operator(2, 2);
    let r = DVector::zeros(coords.len());
    let mut y = DVector::zeros(coords.len());
    op.apply_hessian(&r, &mut y);
}

#[test]
#[should_panic(expected = "setup must be called before applying the operator")]
fn energy_requires_setup() {
    let (mut space, coords) = single_quad_space::<f64>(2);
    space.set_integration_rule(IntegrationRule::gauss(2));
    let mut op = MeshQualityOperator::new_2d(space, Box::new(SizeMetric2d), Matrix2::identity());
    op.energy(&DVector::from_vec(coords));
}

#[test]
#[should_panic(expected = "setup must be called before applying the operator")]
fn gradient_requires_setup() {
    let (mut space, coords) = single_quad_space::<f64>(2);
    space.set_integration_rule(IntegrationRule::gauss(2));
    let mut op = MeshQualityOperator::new_2d(space, Box::new(SizeMetric2d), Matrix2::identity());
    let x = DVector::from_vec(coords);
    let mut g = DVector::zeros(x.len());
    op.apply_gradient(&x, &mut g);
}

#[test]
#[should_panic(expected = "setup must be called before applying the operator")]
fn hessian_assembly_requires_setup() {
    let (mut space, coords) = single_quad_space::<f64>(2);
    space.set_integration_rule(IntegrationRule::gauss(2));
    let mut op = MeshQualityOperator::new_2d(space, Box::new(SizeMetric2d), Matrix2::identity());
    op.assemble_hessian(&DVector::from_vec(coords));
}

#[test]
#[should_panic(expected = "integration rule must be set")]
fn setup_requires_an_integration_rule() {
    let (space, _) = single_quad_space::<f64>(2);
    let mut op = MeshQualityOperator::new_2d(space, Box::new(SizeMetric2d), Matrix2::identity());
    op.setup();
}

#[test]
#[should_panic(expected = "one contiguous block of components per node")]
fn setup_rejects_component_blocked_ordering() {
    let ndof = 4;
    let restriction = LexicographicRestriction::new((0..ndof).collect(), ndof, ndof, 2);
    let mut space = TensorProductSpace::<f64>::new(2, 2, restriction, DofOrdering::ByComponent);
    space.set_integration_rule(IntegrationRule::gauss(2));
    let mut op = MeshQualityOperator::new_2d(space, Box::new(SizeMetric2d), Matrix2::identity());
    op.setup();
}

#[test]
#[should_panic(expected = "at most")]
fn setup_rejects_orders_past_the_kernel_maximum() {
    let d1d = 7;
    let ndof = d1d * d1d;
    let restriction = LexicographicRestriction::new((0..ndof).collect(), ndof, ndof, 2);
    let mut space = TensorProductSpace::<f64>::new(2, d1d, restriction, DofOrdering::ByNode);
    space.set_integration_rule(IntegrationRule::gauss(2));
    let mut op = MeshQualityOperator::new_2d(space, Box::new(SizeMetric2d), Matrix2::identity());
    op.setup();
}

#[test]
#[should_panic(expected = "unsupported spatial dimension")]
fn spaces_outside_two_or_three_dimensions_are_rejected() {
    let restriction = LexicographicRestriction::new(vec![0, 1], 2, 2, 1);
    let _ = TensorProductSpace::<f64>::new(1, 2, restriction, DofOrdering::ByNode);
}

#[test]
#[should_panic(expected = "a 2D operator requires a 2D space")]
fn operator_dimension_must_match_the_space() {
    let (space, _) = single_hex_space::<f64>(2);
    let _ = MeshQualityOperator::new_2d(space, Box::new(SizeMetric2d), Matrix2::identity());
}
