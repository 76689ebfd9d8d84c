//! The partially assembled mesh-quality operator.
//!
//! [`MeshQualityOperator`] is the user-facing facade over the element kernels in
//! [`crate::kernels`]. Partial assembly never forms a global matrix: setup precomputes only the
//! small per-quadrature-point data (the weight buffer `O`, and on demand the frozen Hessian
//! tensor `A`), and every operator application streams through the elements with sum-factorized
//! contractions.
//!
//! Mis-configuration (a missing integration rule, the wrong dof ordering, an element order
//! past the kernel maximum) is a programming error and panics before any output is touched.
//! Degenerate or inverted elements are *not* errors: the metric formulas remain finite for
//! negative Jacobian determinants so that optimization can recover tangled meshes.

use crate::basis::DofToQuad;
use crate::kernels::{self, cofactor_inverse2, cofactor_inverse3, ExecutionPolicy};
use crate::metrics::{QualityMetric2d, QualityMetric3d};
use crate::space::{DofOrdering, ElementRestriction, TensorProductSpace};
use crate::Real;
use itertools::izip;
use nalgebra::{DVector, Matrix2, Matrix3};

/// Dimension-specific state: the metric strategy and the constant target Jacobian `Jtr`
/// together with its precomputed inverse `Jrt`.
enum MetricState<T: Real> {
    TwoD {
        metric: Box<dyn QualityMetric2d<T>>,
        jtr: Matrix2<T>,
        jrt: Matrix2<T>,
    },
    ThreeD {
        metric: Box<dyn QualityMetric3d<T>>,
        jtr: Matrix3<T>,
        jrt: Matrix3<T>,
    },
}

impl<T: Real> MetricState<T> {
    fn det_jtr(&self) -> T {
        match self {
            MetricState::TwoD { jtr, .. } => jtr[(0, 0)] * jtr[(1, 1)] - jtr[(0, 1)] * jtr[(1, 0)],
            MetricState::ThreeD { jtr, .. } => {
                jtr[(0, 0)] * (jtr[(1, 1)] * jtr[(2, 2)] - jtr[(1, 2)] * jtr[(2, 1)])
                    - jtr[(0, 1)] * (jtr[(1, 0)] * jtr[(2, 2)] - jtr[(1, 2)] * jtr[(2, 0)])
                    + jtr[(0, 2)] * (jtr[(1, 0)] * jtr[(2, 1)] - jtr[(1, 1)] * jtr[(2, 0)])
            }
        }
    }
}

/// A matrix-free mesh-quality operator over a tensor-product finite-element space.
///
/// The operator exposes the three actions an optimization loop needs: the total quality
/// energy, the energy gradient and products with the energy Hessian frozen at a linearization
/// point. Gradient and Hessian applications *accumulate* into the output vector.
pub struct MeshQualityOperator<T: Real> {
    space: TensorProductSpace<T>,
    state: MetricState<T>,
    policy: ExecutionPolicy,
    maps: Option<DofToQuad<T>>,
    /// Quadrature weights times det(Jtr), `(q, element)`.
    o: Vec<T>,
    /// Energy densities at quadrature points, `(q, element)`.
    e: Vec<T>,
    /// Metric gradient tensor P at quadrature points, `(i, j, q, element)`.
    p: Vec<T>,
    /// Frozen metric Hessian tensor A at quadrature points, `(i, j, r, c, q, element)`.
    a: Vec<T>,
    x_evec: Vec<T>,
    r_evec: Vec<T>,
    y_evec: Vec<T>,
    hessian_ready: bool,
    generation: u64,
    assembled_generation: u64,
}

impl<T: Real> MeshQualityOperator<T> {
    /// Create a 2D operator from a space, a metric strategy and a constant target Jacobian.
    ///
    /// # Panics
    ///
    /// Panics if the space is not two-dimensional.
    pub fn new_2d(
        space: TensorProductSpace<T>,
        metric: Box<dyn QualityMetric2d<T>>,
        jtr: Matrix2<T>,
    ) -> Self {
        assert_eq!(space.dimension(), 2, "a 2D operator requires a 2D space");
        let jrt = cofactor_inverse2(&jtr);
        Self::with_state(space, MetricState::TwoD { metric, jtr, jrt })
    }

    /// Create a 3D operator from a space, a metric strategy and a constant target Jacobian.
    ///
    /// # Panics
    ///
    /// Panics if the space is not three-dimensional.
    pub fn new_3d(
        space: TensorProductSpace<T>,
        metric: Box<dyn QualityMetric3d<T>>,
        jtr: Matrix3<T>,
    ) -> Self {
        assert_eq!(space.dimension(), 3, "a 3D operator requires a 3D space");
        let jrt = cofactor_inverse3(&jtr);
        Self::with_state(space, MetricState::ThreeD { metric, jtr, jrt })
    }

    fn with_state(space: TensorProductSpace<T>, state: MetricState<T>) -> Self {
        Self {
            space,
            state,
            policy: ExecutionPolicy::default(),
            maps: None,
            o: Vec::new(),
            e: Vec::new(),
            p: Vec::new(),
            a: Vec::new(),
            x_evec: Vec::new(),
            r_evec: Vec::new(),
            y_evec: Vec::new(),
            hessian_ready: false,
            generation: 0,
            assembled_generation: 0,
        }
    }

    pub fn set_execution_policy(&mut self, policy: ExecutionPolicy) {
        self.policy = policy;
    }

    pub fn execution_policy(&self) -> ExecutionPolicy {
        self.policy
    }

    pub fn space(&self) -> &TensorProductSpace<T> {
        &self.space
    }

    /// Whether [`Self::assemble_hessian`] has produced a usable frozen Hessian tensor.
    pub fn hessian_ready(&self) -> bool {
        self.hessian_ready
    }

    /// Precompute the dof-to-quadrature maps and the weight buffer, and size the work buffers.
    ///
    /// Must be called once before any operator action, and again is harmless (the maps are
    /// rebuilt from the current integration rule).
    ///
    /// # Panics
    ///
    /// Panics if no integration rule has been set on the space, if the dof ordering is not
    /// [`DofOrdering::ByNode`], or if the element order exceeds the kernel maximum.
    pub fn setup(&mut self) {
        let rule = self
            .space
            .integration_rule()
            .expect("an integration rule must be set on the space before setup");
        assert_eq!(
            self.space.ordering(),
            DofOrdering::ByNode,
            "dof vectors must store one contiguous block of components per node"
        );
        let dim = self.space.dimension();
        let d1d = self.space.dofs_1d();
        assert!(
            d1d <= kernels::MAX_D1D && rule.num_points() <= kernels::MAX_Q1D,
            "tensor-product kernels support at most {} dofs and {} quadrature points per axis, \
             got d1d = {}, q1d = {}",
            kernels::MAX_D1D,
            kernels::MAX_Q1D,
            d1d,
            rule.num_points()
        );

        let maps = DofToQuad::tensor(d1d, rule);
        let ne = self.space.num_elements();
        let q1d = rule.num_points();
        let nq = q1d.pow(dim as u32);
        let nd = dim * d1d.pow(dim as u32);

        // O is constant per setup: tensor-product quadrature weights scaled by det(Jtr).
        let det_jtr = self.state.det_jtr();
        let w = rule.weights();
        let mut o = vec![T::zero(); ne * nq];
        for e in 0..ne {
            let chunk = &mut o[e * nq..(e + 1) * nq];
            match dim {
                2 => {
                    for qy in 0..q1d {
                        for qx in 0..q1d {
                            chunk[qx + q1d * qy] = w[qx] * w[qy] * det_jtr;
                        }
                    }
                }
                _ => {
                    for qz in 0..q1d {
                        for qy in 0..q1d {
                            for qx in 0..q1d {
                                chunk[qx + q1d * (qy + q1d * qz)] = w[qx] * w[qy] * w[qz] * det_jtr;
                            }
                        }
                    }
                }
            }
        }

        self.o = o;
        self.e = vec![T::zero(); ne * nq];
        self.p = vec![T::zero(); ne * dim * dim * nq];
        self.a = vec![T::zero(); ne * dim * dim * dim * dim * nq];
        self.x_evec = vec![T::zero(); ne * nd];
        self.r_evec = vec![T::zero(); ne * nd];
        self.y_evec = vec![T::zero(); ne * nd];
        self.maps = Some(maps);
        self.hessian_ready = false;
        log::debug!(
            "mesh-quality operator set up: dim = {}, elements = {}, d1d = {}, q1d = {}",
            dim,
            ne,
            d1d,
            q1d
        );
    }

    /// Total quality energy of the mesh state `x`.
    pub fn energy(&mut self, x: &DVector<T>) -> T {
        let ne = self.space.num_elements();
        let maps = self
            .maps
            .as_ref()
            .expect("setup must be called before applying the operator");
        self.space.restriction().gather(x.as_slice(), &mut self.x_evec);
        match &self.state {
            MetricState::TwoD { metric, jrt, .. } => kernels::dim2::energy(
                ne,
                metric.as_ref(),
                jrt,
                maps,
                &self.x_evec,
                &mut self.e,
                self.policy,
            ),
            MetricState::ThreeD { metric, jrt, .. } => kernels::dim3::energy(
                ne,
                metric.as_ref(),
                jrt,
                maps,
                &self.x_evec,
                &mut self.e,
                self.policy,
            ),
        }
        izip!(&self.e, &self.o).fold(T::zero(), |acc, (&e, &o)| acc + e * o)
    }

    /// Accumulate the energy gradient at the mesh state `x` into `y`.
    pub fn apply_gradient(&mut self, x: &DVector<T>, y: &mut DVector<T>) {
        let ne = self.space.num_elements();
        let maps = self
            .maps
            .as_ref()
            .expect("setup must be called before applying the operator");
        self.space.restriction().gather(x.as_slice(), &mut self.x_evec);
        self.y_evec.fill(T::zero());
        match &self.state {
            MetricState::TwoD { metric, jrt, .. } => kernels::dim2::apply_gradient(
                ne,
                metric.as_ref(),
                jrt,
                maps,
                &self.o,
                &self.x_evec,
                &mut self.p,
                &mut self.y_evec,
                self.policy,
            ),
            MetricState::ThreeD { metric, jrt, .. } => kernels::dim3::apply_gradient(
                ne,
                metric.as_ref(),
                jrt,
                maps,
                &self.o,
                &self.x_evec,
                &mut self.p,
                &mut self.y_evec,
                self.policy,
            ),
        }
        self.space
            .restriction()
            .scatter_add(&self.y_evec, y.as_mut_slice());
    }

    /// Freeze the metric Hessian tensor at the linearization point `x`.
    ///
    /// Idempotent per mesh state: a second call without an intervening
    /// [`Self::mark_mesh_updated`] or [`Self::invalidate_hessian`] reuses the stored tensor.
    pub fn assemble_hessian(&mut self, x: &DVector<T>) {
        if self.hessian_ready && self.assembled_generation == self.generation {
            log::debug!("Hessian tensor already assembled for the current mesh state, skipping");
            return;
        }
        let ne = self.space.num_elements();
        let maps = self
            .maps
            .as_ref()
            .expect("setup must be called before applying the operator");
        self.space.restriction().gather(x.as_slice(), &mut self.x_evec);
        match &self.state {
            MetricState::TwoD { metric, jrt, .. } => kernels::dim2::assemble_hessian(
                ne,
                metric.as_ref(),
                jrt,
                maps,
                &self.o,
                &self.x_evec,
                &mut self.a,
                self.policy,
            ),
            MetricState::ThreeD { metric, jrt, .. } => kernels::dim3::assemble_hessian(
                ne,
                metric.as_ref(),
                jrt,
                maps,
                &self.o,
                &self.x_evec,
                &mut self.a,
                self.policy,
            ),
        }
        self.hessian_ready = true;
        self.assembled_generation = self.generation;
    }

    /// Accumulate the product of the frozen Hessian with the direction `r` into `y`.
    ///
    /// Linear in `r`; the linearization point only enters through the tensor frozen by
    /// [`Self::assemble_hessian`].
    ///
    /// # Panics
    ///
    /// Panics if no Hessian tensor is ready.
    pub fn apply_hessian(&mut self, r: &DVector<T>, y: &mut DVector<T>) {
        assert!(
            self.hessian_ready,
            "assemble_hessian must be called before apply_hessian"
        );
        let ne = self.space.num_elements();
        let maps = self
            .maps
            .as_ref()
            .expect("setup must be called before applying the operator");
        self.space.restriction().gather(r.as_slice(), &mut self.r_evec);
        self.y_evec.fill(T::zero());
        match &self.state {
            MetricState::TwoD { jrt, .. } => kernels::dim2::apply_hessian(
                ne,
                jrt,
                maps,
                &self.a,
                &self.r_evec,
                &mut self.y_evec,
                self.policy,
            ),
            MetricState::ThreeD { jrt, .. } => kernels::dim3::apply_hessian(
                ne,
                jrt,
                maps,
                &self.a,
                &self.r_evec,
                &mut self.y_evec,
                self.policy,
            ),
        }
        self.space
            .restriction()
            .scatter_add(&self.y_evec, y.as_mut_slice());
    }

    /// Record that the mesh coordinates have changed since the last Hessian assembly.
    ///
    /// The next [`Self::assemble_hessian`] call will recompute the tensor instead of reusing
    /// it.
    pub fn mark_mesh_updated(&mut self) {
        self.generation += 1;
    }

    /// Drop the frozen Hessian tensor outright.
    pub fn invalidate_hessian(&mut self) {
        self.hessian_ready = false;
    }
}
