//! Sum-factorized kernels for hexahedral (3D tensor-product) elements.
//!
//! Element dof fields are laid out `(dof-x, dof-y, dof-z, component, element)` with the x index
//! fastest; quadrature fields are `(qx, qy, qz, element)`. The frozen Hessian tensor `A` is
//! `(i, j, r, c, qx, qy, qz, element)` with `i` fastest.

use crate::basis::DofToQuad;
use crate::kernels::{dispatch_tensor_kernel, ExecutionPolicy};
use crate::metrics::QualityMetric3d;
use crate::Real;
use nalgebra::Matrix3;
use rayon::prelude::*;

/// Reference-space gradients of a vector field at the quadrature points of one element,
/// indexed `[component][axis][qz][qy][qx]`.
type Grad3<T, const MQ1: usize> = [[[[[T; MQ1]; MQ1]; MQ1]; 3]; 3];

/// Forward pass: contract the element dof tensor of each component against `G`/`B` one axis at
/// a time, producing all nine entries of the reference-space Jacobian at every quadrature
/// point.
fn eval_grad<T: Real, const MD1: usize, const MQ1: usize>(
    d1d: usize,
    q1d: usize,
    maps: &DofToQuad<T>,
    x: &[T],
    jac: &mut Grad3<T, MQ1>,
) {
    let b = maps.b();
    let g = maps.g();
    let ndof = d1d * d1d * d1d;
    for c in 0..3 {
        let comp = &x[c * ndof..(c + 1) * ndof];

        // x axis: one derivative stream and one value stream.
        let mut xg = [[[T::zero(); MQ1]; MD1]; MD1];
        let mut xb = [[[T::zero(); MQ1]; MD1]; MD1];
        for dz in 0..d1d {
            for dy in 0..d1d {
                for qx in 0..q1d {
                    let mut u = T::zero();
                    let mut v = T::zero();
                    for dx in 0..d1d {
                        let s = comp[dx + d1d * (dy + d1d * dz)];
                        u += g[(qx, dx)] * s;
                        v += b[(qx, dx)] * s;
                    }
                    xg[dz][dy][qx] = u;
                    xb[dz][dy][qx] = v;
                }
            }
        }

        // y axis: the two streams fan out to three, one per reference axis.
        let mut gb = [[[T::zero(); MQ1]; MQ1]; MD1];
        let mut bg = [[[T::zero(); MQ1]; MQ1]; MD1];
        let mut bb = [[[T::zero(); MQ1]; MQ1]; MD1];
        for dz in 0..d1d {
            for qy in 0..q1d {
                for qx in 0..q1d {
                    let mut u = T::zero();
                    let mut v = T::zero();
                    let mut w = T::zero();
                    for dy in 0..d1d {
                        u += b[(qy, dy)] * xg[dz][dy][qx];
                        v += g[(qy, dy)] * xb[dz][dy][qx];
                        w += b[(qy, dy)] * xb[dz][dy][qx];
                    }
                    gb[dz][qy][qx] = u;
                    bg[dz][qy][qx] = v;
                    bb[dz][qy][qx] = w;
                }
            }
        }

        // z axis.
        for qz in 0..q1d {
            for qy in 0..q1d {
                for qx in 0..q1d {
                    let mut u = T::zero();
                    let mut v = T::zero();
                    let mut w = T::zero();
                    for dz in 0..d1d {
                        u += b[(qz, dz)] * gb[dz][qy][qx];
                        v += b[(qz, dz)] * bg[dz][qy][qx];
                        w += g[(qz, dz)] * bb[dz][qy][qx];
                    }
                    jac[c][0][qz][qy][qx] = u;
                    jac[c][1][qz][qy][qx] = v;
                    jac[c][2][qz][qy][qx] = w;
                }
            }
        }
    }
}

/// Backward pass: contract the per-quadrature-point tiles against the transposed basis
/// matrices and accumulate (`+=`) into the element dof tensor.
fn apply_grad_transpose<T: Real, const MD1: usize, const MQ1: usize>(
    d1d: usize,
    q1d: usize,
    maps: &DofToQuad<T>,
    s: &Grad3<T, MQ1>,
    y: &mut [T],
) {
    let b = maps.b();
    let g = maps.g();
    let ndof = d1d * d1d * d1d;
    for c in 0..3 {
        // z axis.
        let mut u = [[[T::zero(); MQ1]; MQ1]; MD1];
        let mut v = [[[T::zero(); MQ1]; MQ1]; MD1];
        let mut w = [[[T::zero(); MQ1]; MQ1]; MD1];
        for dz in 0..d1d {
            for qy in 0..q1d {
                for qx in 0..q1d {
                    let mut uu = T::zero();
                    let mut vv = T::zero();
                    let mut ww = T::zero();
                    for qz in 0..q1d {
                        uu += b[(qz, dz)] * s[c][0][qz][qy][qx];
                        vv += b[(qz, dz)] * s[c][1][qz][qy][qx];
                        ww += g[(qz, dz)] * s[c][2][qz][qy][qx];
                    }
                    u[dz][qy][qx] = uu;
                    v[dz][qy][qx] = vv;
                    w[dz][qy][qx] = ww;
                }
            }
        }

        // y axis.
        let mut u2 = [[[T::zero(); MQ1]; MD1]; MD1];
        let mut v2 = [[[T::zero(); MQ1]; MD1]; MD1];
        let mut w2 = [[[T::zero(); MQ1]; MD1]; MD1];
        for dz in 0..d1d {
            for dy in 0..d1d {
                for qx in 0..q1d {
                    let mut uu = T::zero();
                    let mut vv = T::zero();
                    let mut ww = T::zero();
                    for qy in 0..q1d {
                        uu += b[(qy, dy)] * u[dz][qy][qx];
                        vv += g[(qy, dy)] * v[dz][qy][qx];
                        ww += b[(qy, dy)] * w[dz][qy][qx];
                    }
                    u2[dz][dy][qx] = uu;
                    v2[dz][dy][qx] = vv;
                    w2[dz][dy][qx] = ww;
                }
            }
        }

        // x axis, summing the three streams into the output.
        for dz in 0..d1d {
            for dy in 0..d1d {
                for dx in 0..d1d {
                    let mut acc = T::zero();
                    for qx in 0..q1d {
                        acc += g[(qx, dx)] * u2[dz][dy][qx]
                            + b[(qx, dx)] * (v2[dz][dy][qx] + w2[dz][dy][qx]);
                    }
                    y[c * ndof + dx + d1d * (dy + d1d * dz)] += acc;
                }
            }
        }
    }
}

fn energy_element<T: Real, const MD1: usize, const MQ1: usize>(
    d1d: usize,
    q1d: usize,
    metric: &dyn QualityMetric3d<T>,
    jrt: &Matrix3<T>,
    maps: &DofToQuad<T>,
    x: &[T],
    e_out: &mut [T],
) {
    let mut jac = [[[[[T::zero(); MQ1]; MQ1]; MQ1]; 3]; 3];
    eval_grad::<T, MD1, MQ1>(d1d, q1d, maps, x, &mut jac);
    for qz in 0..q1d {
        for qy in 0..q1d {
            for qx in 0..q1d {
                let jpr = Matrix3::from_fn(|c, d| jac[c][d][qz][qy][qx]);
                let jpt = jpr * jrt;
                e_out[qx + q1d * (qy + q1d * qz)] = metric.energy(&jpt);
            }
        }
    }
}

fn gradient_element<T: Real, const MD1: usize, const MQ1: usize>(
    d1d: usize,
    q1d: usize,
    metric: &dyn QualityMetric3d<T>,
    jrt: &Matrix3<T>,
    maps: &DofToQuad<T>,
    o: &[T],
    x: &[T],
    p_out: &mut [T],
    y: &mut [T],
) {
    let mut jac = [[[[[T::zero(); MQ1]; MQ1]; MQ1]; 3]; 3];
    eval_grad::<T, MD1, MQ1>(d1d, q1d, maps, x, &mut jac);
    for qz in 0..q1d {
        for qy in 0..q1d {
            for qx in 0..q1d {
                let q = qx + q1d * (qy + q1d * qz);
                let jpr = Matrix3::from_fn(|c, d| jac[c][d][qz][qy][qx]);
                let jpt = jpr * jrt;
                let p = metric.gradient(&jpt) * o[q];
                for j in 0..3 {
                    for i in 0..3 {
                        p_out[i + 3 * (j + 3 * q)] = p[(i, j)];
                    }
                }
                // Y += DSh · (Jrt · Pᵀ); the tiles are overwritten in place since every
                // quadrature point is visited exactly once.
                let z = jrt * p.transpose();
                for c in 0..3 {
                    for d in 0..3 {
                        jac[c][d][qz][qy][qx] = z[(d, c)];
                    }
                }
            }
        }
    }
    apply_grad_transpose::<T, MD1, MQ1>(d1d, q1d, maps, &jac, y);
}

fn assemble_hessian_element<T: Real, const MD1: usize, const MQ1: usize>(
    d1d: usize,
    q1d: usize,
    metric: &dyn QualityMetric3d<T>,
    jrt: &Matrix3<T>,
    maps: &DofToQuad<T>,
    o: &[T],
    x: &[T],
    a_out: &mut [T],
) {
    let mut jac = [[[[[T::zero(); MQ1]; MQ1]; MQ1]; 3]; 3];
    eval_grad::<T, MD1, MQ1>(d1d, q1d, maps, x, &mut jac);
    for qz in 0..q1d {
        for qy in 0..q1d {
            for qx in 0..q1d {
                let q = qx + q1d * (qy + q1d * qz);
                let jpr = Matrix3::from_fn(|c, d| jac[c][d][qz][qy][qx]);
                let jpt = jpr * jrt;
                for j in 0..3 {
                    for i in 0..3 {
                        let h = metric.hessian_component(&jpt, i, j) * o[q];
                        for cc in 0..3 {
                            for r in 0..3 {
                                a_out[i + 3 * j + 9 * r + 27 * cc + 81 * q] = h[(r, cc)];
                            }
                        }
                    }
                }
            }
        }
    }
}

fn apply_hessian_element<T: Real, const MD1: usize, const MQ1: usize>(
    d1d: usize,
    q1d: usize,
    jrt: &Matrix3<T>,
    maps: &DofToQuad<T>,
    a: &[T],
    r_dofs: &[T],
    y: &mut [T],
) {
    let mut jac = [[[[[T::zero(); MQ1]; MQ1]; MQ1]; 3]; 3];
    eval_grad::<T, MD1, MQ1>(d1d, q1d, maps, r_dofs, &mut jac);
    for qz in 0..q1d {
        for qy in 0..q1d {
            for qx in 0..q1d {
                let q = qx + q1d * (qy + q1d * qz);
                let jpr = Matrix3::from_fn(|c, d| jac[c][d][qz][qy][qx]);
                let jpt = jpr * jrt;
                // M[r][c] = Σ_{i,j} A(i,j,r,c,q) · Jpt[i][j].
                let mut m = Matrix3::zeros();
                for cc in 0..3 {
                    for r in 0..3 {
                        let mut acc = T::zero();
                        for j in 0..3 {
                            for i in 0..3 {
                                acc += a[i + 3 * j + 9 * r + 27 * cc + 81 * q] * jpt[(i, j)];
                            }
                        }
                        m[(r, cc)] = acc;
                    }
                }
                let z = jrt * m.transpose();
                for c in 0..3 {
                    for d in 0..3 {
                        jac[c][d][qz][qy][qx] = z[(d, c)];
                    }
                }
            }
        }
    }
    apply_grad_transpose::<T, MD1, MQ1>(d1d, q1d, maps, &jac, y);
}

fn energy_run<T: Real, const MD1: usize, const MQ1: usize>(
    ne: usize,
    metric: &dyn QualityMetric3d<T>,
    jrt: &Matrix3<T>,
    maps: &DofToQuad<T>,
    x_evec: &[T],
    e_out: &mut [T],
    policy: ExecutionPolicy,
) {
    let d1d = maps.dofs_1d();
    let q1d = maps.quad_points_1d();
    let nq = q1d * q1d * q1d;
    let nd = 3 * d1d * d1d * d1d;
    assert_eq!(x_evec.len(), ne * nd, "element coordinate vector length mismatch");
    assert_eq!(e_out.len(), ne * nq, "energy buffer length mismatch");
    let body = |e: usize, e_chunk: &mut [T]| {
        energy_element::<T, MD1, MQ1>(d1d, q1d, metric, jrt, maps, &x_evec[e * nd..(e + 1) * nd], e_chunk);
    };
    match policy {
        ExecutionPolicy::Sequential => e_out
            .chunks_exact_mut(nq)
            .enumerate()
            .for_each(|(e, chunk)| body(e, chunk)),
        ExecutionPolicy::Parallel => e_out
            .par_chunks_exact_mut(nq)
            .enumerate()
            .for_each(|(e, chunk)| body(e, chunk)),
    }
}

fn gradient_run<T: Real, const MD1: usize, const MQ1: usize>(
    ne: usize,
    metric: &dyn QualityMetric3d<T>,
    jrt: &Matrix3<T>,
    maps: &DofToQuad<T>,
    o: &[T],
    x_evec: &[T],
    p_out: &mut [T],
    y_evec: &mut [T],
    policy: ExecutionPolicy,
) {
    let d1d = maps.dofs_1d();
    let q1d = maps.quad_points_1d();
    let nq = q1d * q1d * q1d;
    let nd = 3 * d1d * d1d * d1d;
    assert_eq!(x_evec.len(), ne * nd, "element coordinate vector length mismatch");
    assert_eq!(o.len(), ne * nq, "weight buffer length mismatch");
    assert_eq!(p_out.len(), ne * 9 * nq, "gradient tensor buffer length mismatch");
    assert_eq!(y_evec.len(), ne * nd, "element output vector length mismatch");
    let body = |e: usize, p_chunk: &mut [T], y_chunk: &mut [T]| {
        gradient_element::<T, MD1, MQ1>(
            d1d,
            q1d,
            metric,
            jrt,
            maps,
            &o[e * nq..(e + 1) * nq],
            &x_evec[e * nd..(e + 1) * nd],
            p_chunk,
            y_chunk,
        );
    };
    match policy {
        ExecutionPolicy::Sequential => p_out
            .chunks_exact_mut(9 * nq)
            .zip(y_evec.chunks_exact_mut(nd))
            .enumerate()
            .for_each(|(e, (p_chunk, y_chunk))| body(e, p_chunk, y_chunk)),
        ExecutionPolicy::Parallel => p_out
            .par_chunks_exact_mut(9 * nq)
            .zip(y_evec.par_chunks_exact_mut(nd))
            .enumerate()
            .for_each(|(e, (p_chunk, y_chunk))| body(e, p_chunk, y_chunk)),
    }
}

fn assemble_hessian_run<T: Real, const MD1: usize, const MQ1: usize>(
    ne: usize,
    metric: &dyn QualityMetric3d<T>,
    jrt: &Matrix3<T>,
    maps: &DofToQuad<T>,
    o: &[T],
    x_evec: &[T],
    a_out: &mut [T],
    policy: ExecutionPolicy,
) {
    let d1d = maps.dofs_1d();
    let q1d = maps.quad_points_1d();
    let nq = q1d * q1d * q1d;
    let nd = 3 * d1d * d1d * d1d;
    assert_eq!(x_evec.len(), ne * nd, "element coordinate vector length mismatch");
    assert_eq!(o.len(), ne * nq, "weight buffer length mismatch");
    assert_eq!(a_out.len(), ne * 81 * nq, "Hessian tensor buffer length mismatch");
    let body = |e: usize, a_chunk: &mut [T]| {
        assemble_hessian_element::<T, MD1, MQ1>(
            d1d,
            q1d,
            metric,
            jrt,
            maps,
            &o[e * nq..(e + 1) * nq],
            &x_evec[e * nd..(e + 1) * nd],
            a_chunk,
        );
    };
    match policy {
        ExecutionPolicy::Sequential => a_out
            .chunks_exact_mut(81 * nq)
            .enumerate()
            .for_each(|(e, chunk)| body(e, chunk)),
        ExecutionPolicy::Parallel => a_out
            .par_chunks_exact_mut(81 * nq)
            .enumerate()
            .for_each(|(e, chunk)| body(e, chunk)),
    }
}

fn apply_hessian_run<T: Real, const MD1: usize, const MQ1: usize>(
    ne: usize,
    jrt: &Matrix3<T>,
    maps: &DofToQuad<T>,
    a: &[T],
    r_evec: &[T],
    y_evec: &mut [T],
    policy: ExecutionPolicy,
) {
    let d1d = maps.dofs_1d();
    let q1d = maps.quad_points_1d();
    let nq = q1d * q1d * q1d;
    let nd = 3 * d1d * d1d * d1d;
    assert_eq!(r_evec.len(), ne * nd, "element direction vector length mismatch");
    assert_eq!(a.len(), ne * 81 * nq, "Hessian tensor buffer length mismatch");
    assert_eq!(y_evec.len(), ne * nd, "element output vector length mismatch");
    let body = |e: usize, y_chunk: &mut [T]| {
        apply_hessian_element::<T, MD1, MQ1>(
            d1d,
            q1d,
            jrt,
            maps,
            &a[e * 81 * nq..(e + 1) * 81 * nq],
            &r_evec[e * nd..(e + 1) * nd],
            y_chunk,
        );
    };
    match policy {
        ExecutionPolicy::Sequential => y_evec
            .chunks_exact_mut(nd)
            .enumerate()
            .for_each(|(e, chunk)| body(e, chunk)),
        ExecutionPolicy::Parallel => y_evec
            .par_chunks_exact_mut(nd)
            .enumerate()
            .for_each(|(e, chunk)| body(e, chunk)),
    }
}

/// Evaluate the metric energy density at every quadrature point of every element.
pub fn energy<T: Real>(
    ne: usize,
    metric: &dyn QualityMetric3d<T>,
    jrt: &Matrix3<T>,
    maps: &DofToQuad<T>,
    x_evec: &[T],
    e_out: &mut [T],
    policy: ExecutionPolicy,
) {
    let (d1d, q1d) = (maps.dofs_1d(), maps.quad_points_1d());
    dispatch_tensor_kernel!(energy_run, d1d, q1d, (ne, metric, jrt, maps, x_evec, e_out, policy))
}

/// Evaluate the weighted metric gradient tensor `P` at every quadrature point and accumulate
/// its action on the test space into the element output vector.
pub fn apply_gradient<T: Real>(
    ne: usize,
    metric: &dyn QualityMetric3d<T>,
    jrt: &Matrix3<T>,
    maps: &DofToQuad<T>,
    o: &[T],
    x_evec: &[T],
    p_out: &mut [T],
    y_evec: &mut [T],
    policy: ExecutionPolicy,
) {
    let (d1d, q1d) = (maps.dofs_1d(), maps.quad_points_1d());
    dispatch_tensor_kernel!(
        gradient_run,
        d1d,
        q1d,
        (ne, metric, jrt, maps, o, x_evec, p_out, y_evec, policy)
    )
}

/// Freeze the weighted metric Hessian tensor `A` at every quadrature point.
pub fn assemble_hessian<T: Real>(
    ne: usize,
    metric: &dyn QualityMetric3d<T>,
    jrt: &Matrix3<T>,
    maps: &DofToQuad<T>,
    o: &[T],
    x_evec: &[T],
    a_out: &mut [T],
    policy: ExecutionPolicy,
) {
    let (d1d, q1d) = (maps.dofs_1d(), maps.quad_points_1d());
    dispatch_tensor_kernel!(
        assemble_hessian_run,
        d1d,
        q1d,
        (ne, metric, jrt, maps, o, x_evec, a_out, policy)
    )
}

/// Accumulate the action of the frozen Hessian tensor on a direction into the element output
/// vector. Linear in the direction; the mesh coordinates only enter through `a`.
pub fn apply_hessian<T: Real>(
    ne: usize,
    jrt: &Matrix3<T>,
    maps: &DofToQuad<T>,
    a: &[T],
    r_evec: &[T],
    y_evec: &mut [T],
    policy: ExecutionPolicy,
) {
    let (d1d, q1d) = (maps.dofs_1d(), maps.quad_points_1d());
    dispatch_tensor_kernel!(
        apply_hessian_run,
        d1d,
        q1d,
        (ne, jrt, maps, a, r_evec, y_evec, policy)
    )
}
