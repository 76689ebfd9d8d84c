use gleipnir::space::{single_quad_space, ElementRestriction, LexicographicRestriction};
use matrixcompare::assert_matrix_eq;
use nalgebra::DVector;

/// Two unit quads side by side sharing one edge: 6 nodes, the shared ones being 1 and 4.
///
/// ```text
/// 3 - 4 - 5
/// |   |   |
/// 0 - 1 - 2
/// ```
fn two_quad_restriction() -> LexicographicRestriction {
    LexicographicRestriction::new(vec![0, 1, 3, 4, 1, 2, 4, 5], 4, 6, 2)
}

#[test]
fn gather_blocks_components_per_element() {
    let restriction = two_quad_restriction();
    // Node-blocked global vector: (x, y) per node, x = 10·node, y = 10·node + 1.
    let global: Vec<f64> = (0..6).flat_map(|n| [10.0 * n as f64, 10.0 * n as f64 + 1.0]).collect();
    let mut evec = vec![0.0; 2 * 2 * 4];
    restriction.gather(&global, &mut evec);

    // Element 0: x of nodes [0, 1, 3, 4], then y of the same nodes; then element 1.
    let expected = [
        0.0, 10.0, 30.0, 40.0, 1.0, 11.0, 31.0, 41.0, // element 0
        10.0, 20.0, 40.0, 50.0, 11.0, 21.0, 41.0, 51.0, // element 1
    ];
    assert_eq!(evec, expected);
}

#[test]
fn scatter_accumulates_shared_nodes() {
    let restriction = two_quad_restriction();
    let evec = vec![1.0; 2 * 2 * 4];
    let mut global = vec![0.0; 12];
    restriction.scatter_add(&evec, &mut global);

    // Nodes 1 and 4 belong to both elements and receive two contributions per component.
    let expected = DVector::from_vec(vec![
        1.0, 1.0, 2.0, 2.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 1.0, 1.0,
    ]);
    assert_matrix_eq!(DVector::from_vec(global), expected, comp = float);

    // Scatter is additive on top of existing content.
    let mut global = vec![1.0; 12];
    restriction.scatter_add(&evec, &mut global);
    assert_eq!(global[2], 3.0);
    assert_eq!(global[0], 2.0);
}

#[test]
fn scatter_is_the_transpose_of_gather() {
    let restriction = two_quad_restriction();
    // <R x, e> == <x, Rᵀ e> for arbitrary x and e.
    let x: Vec<f64> = (0..12).map(|i| (i as f64).sin()).collect();
    let e: Vec<f64> = (0..16).map(|i| (i as f64).cos()).collect();

    let mut rx = vec![0.0; 16];
    restriction.gather(&x, &mut rx);
    let lhs: f64 = rx.iter().zip(&e).map(|(a, b)| a * b).sum();

    let mut rte = vec![0.0; 12];
    restriction.scatter_add(&e, &mut rte);
    let rhs: f64 = rte.iter().zip(&x).map(|(a, b)| a * b).sum();

    assert!((lhs - rhs).abs() <= 1e-12 * lhs.abs().max(rhs.abs()).max(1.0));
}

#[test]
fn single_quad_space_nodes_are_lexicographic() {
    let (space, coords) = single_quad_space::<f64>(3);
    assert_eq!(space.num_elements(), 1);
    assert_eq!(space.dofs_1d(), 3);
    // Node 5 is (dx, dy) = (2, 1) on the 3×3 grid of the unit square.
    assert_eq!(coords[2 * 5], 1.0);
    assert_eq!(coords[2 * 5 + 1], 0.5);
}
