//! The finite-element-space collaborators consumed by the quality operator.
//!
//! The operator core does not own a mesh. It consumes a [`TensorProductSpace`], which bundles
//! the element topology (element count, 1D dof count, spatial dimension), the configured
//! integration rule, the degree-of-freedom ordering convention and an element restriction that
//! maps between a global dof vector and per-element lexicographically-ordered local arrays.
//!
//! The restriction's scatter is *additive*; how cross-element write conflicts are resolved
//! (coloring, atomics or serialization) is the restriction implementor's concern, not the
//! kernels'.

use crate::quadrature::IntegrationRule;
use crate::Real;
use serde::{Deserialize, Serialize};

/// Ordering convention of a vector-valued global dof vector.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DofOrdering {
    /// One contiguous block of `dim` components per node: `x0 y0 z0 x1 y1 z1 ...`.
    ///
    /// This is the only ordering the partially-assembled operators support.
    ByNode,
    /// One contiguous block per component: `x0 x1 ... y0 y1 ...`.
    ByComponent,
}

/// Maps between a global dof vector and per-element local arrays in lexicographic order.
///
/// The local (E-vector) layout is `(dof, component, element)` with the lexicographic node index
/// fastest: `evec[dof + ndof * (component + dim * element)]`.
pub trait ElementRestriction<T: Real> {
    fn num_elements(&self) -> usize;

    /// Scalar dofs per element (d1d^dim).
    fn element_dofs(&self) -> usize;

    /// Length of the global dof vector (dim × #nodes).
    fn global_len(&self) -> usize;

    /// Copy global dof values into the per-element local array.
    fn gather(&self, global: &[T], evec: &mut [T]);

    /// Accumulate (`+=`) per-element local values into the global dof vector.
    fn scatter_add(&self, evec: &[T], global: &mut [T]);
}

/// The reference restriction for node-block ([`DofOrdering::ByNode`]) global vectors.
///
/// Stores, for every element, the global node index of each lexicographically-ordered local
/// node. Shared nodes between elements are accumulated serially during scatter.
#[derive(Debug, Clone)]
pub struct LexicographicRestriction {
    element_nodes: Vec<usize>,
    num_nodes: usize,
    ndof: usize,
    dim: usize,
}

impl LexicographicRestriction {
    /// Create a restriction from the flat per-element node lists.
    ///
    /// `element_nodes` holds `ne * ndof` global node indices, the `ndof` lexicographic local
    /// nodes of element 0 first.
    pub fn new(element_nodes: Vec<usize>, ndof: usize, num_nodes: usize, dim: usize) -> Self {
        assert_eq!(element_nodes.len() % ndof, 0, "element node list length mismatch");
        assert!(
            element_nodes.iter().all(|&n| n < num_nodes),
            "element node index out of bounds"
        );
        Self {
            element_nodes,
            num_nodes,
            ndof,
            dim,
        }
    }
}

impl<T: Real> ElementRestriction<T> for LexicographicRestriction {
    fn num_elements(&self) -> usize {
        self.element_nodes.len() / self.ndof
    }

    fn element_dofs(&self) -> usize {
        self.ndof
    }

    fn global_len(&self) -> usize {
        self.dim * self.num_nodes
    }

    fn gather(&self, global: &[T], evec: &mut [T]) {
        let ne = ElementRestriction::<T>::num_elements(self);
        assert_eq!(global.len(), self.dim * self.num_nodes, "global vector length mismatch");
        assert_eq!(evec.len(), ne * self.dim * self.ndof, "element vector length mismatch");
        for e in 0..ne {
            let nodes = &self.element_nodes[e * self.ndof..(e + 1) * self.ndof];
            for c in 0..self.dim {
                let block = &mut evec[self.ndof * (c + self.dim * e)..][..self.ndof];
                for (local, &node) in nodes.iter().enumerate() {
                    block[local] = global[self.dim * node + c];
                }
            }
        }
    }

    fn scatter_add(&self, evec: &[T], global: &mut [T]) {
        let ne = ElementRestriction::<T>::num_elements(self);
        assert_eq!(global.len(), self.dim * self.num_nodes, "global vector length mismatch");
        assert_eq!(evec.len(), ne * self.dim * self.ndof, "element vector length mismatch");
        for e in 0..ne {
            let nodes = &self.element_nodes[e * self.ndof..(e + 1) * self.ndof];
            for c in 0..self.dim {
                let block = &evec[self.ndof * (c + self.dim * e)..][..self.ndof];
                for (local, &node) in nodes.iter().enumerate() {
                    global[self.dim * node + c] += block[local];
                }
            }
        }
    }
}

/// A tensor-product finite-element space: topology, ordering and integration rule.
#[derive(Debug, Clone)]
pub struct TensorProductSpace<T: Real> {
    dim: usize,
    d1d: usize,
    restriction: LexicographicRestriction,
    ordering: DofOrdering,
    rule: Option<IntegrationRule<T>>,
}

impl<T: Real> TensorProductSpace<T> {
    /// # Panics
    ///
    /// Panics if the spatial dimension is outside {2, 3} or the restriction disagrees with
    /// `dim`/`d1d` on the per-element dof count.
    pub fn new(
        dim: usize,
        d1d: usize,
        restriction: LexicographicRestriction,
        ordering: DofOrdering,
    ) -> Self {
        assert!(dim == 2 || dim == 3, "unsupported spatial dimension {}", dim);
        assert_eq!(
            restriction.ndof,
            d1d.pow(dim as u32),
            "restriction dof count does not match d1d^dim"
        );
        Self {
            dim,
            d1d,
            restriction,
            ordering,
            rule: None,
        }
    }

    /// The integration rule must be set before the operator's `setup`.
    pub fn set_integration_rule(&mut self, rule: IntegrationRule<T>) {
        self.rule = Some(rule);
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn dofs_1d(&self) -> usize {
        self.d1d
    }

    pub fn num_elements(&self) -> usize {
        ElementRestriction::<T>::num_elements(&self.restriction)
    }

    pub fn ordering(&self) -> DofOrdering {
        self.ordering
    }

    pub fn integration_rule(&self) -> Option<&IntegrationRule<T>> {
        self.rule.as_ref()
    }

    pub fn restriction(&self) -> &LexicographicRestriction {
        &self.restriction
    }
}

/// A single reference quadrilateral `[0, 1]²` with `d1d` nodes per axis.
///
/// Returns the space and the node coordinates as a `ByNode` global vector (the identity map),
/// handy for tests and as a starting mesh state.
pub fn single_quad_space<T: Real>(d1d: usize) -> (TensorProductSpace<T>, Vec<T>) {
    let ndof = d1d * d1d;
    let restriction = LexicographicRestriction::new((0..ndof).collect(), ndof, ndof, 2);
    let space = TensorProductSpace::new(2, d1d, restriction, DofOrdering::ByNode);
    let h = T::one() / T::from_usize(d1d - 1).expect("node count must fit in T");
    let mut coords = vec![T::zero(); 2 * ndof];
    for dy in 0..d1d {
        for dx in 0..d1d {
            let node = dx + d1d * dy;
            coords[2 * node] = T::from_usize(dx).expect("node index must fit in T") * h;
            coords[2 * node + 1] = T::from_usize(dy).expect("node index must fit in T") * h;
        }
    }
    (space, coords)
}

/// A single reference hexahedron `[0, 1]³` with `d1d` nodes per axis.
pub fn single_hex_space<T: Real>(d1d: usize) -> (TensorProductSpace<T>, Vec<T>) {
    let ndof = d1d * d1d * d1d;
    let restriction = LexicographicRestriction::new((0..ndof).collect(), ndof, ndof, 3);
    let space = TensorProductSpace::new(3, d1d, restriction, DofOrdering::ByNode);
    let h = T::one() / T::from_usize(d1d - 1).expect("node count must fit in T");
    let mut coords = vec![T::zero(); 3 * ndof];
    for dz in 0..d1d {
        for dy in 0..d1d {
            for dx in 0..d1d {
                let node = dx + d1d * (dy + d1d * dz);
                coords[3 * node] = T::from_usize(dx).expect("node index must fit in T") * h;
                coords[3 * node + 1] = T::from_usize(dy).expect("node index must fit in T") * h;
                coords[3 * node + 2] = T::from_usize(dz).expect("node index must fit in T") * h;
            }
        }
    }
    (space, coords)
}
