//! Sum-factorized kernels for quadrilateral (2D tensor-product) elements.
//!
//! Same stage structure and buffer layouts as [`crate::kernels::dim3`] with one contraction
//! axis fewer: dof fields are `(dof-x, dof-y, component, element)`, quadrature fields
//! `(qx, qy, element)` and the frozen Hessian tensor `(i, j, r, c, qx, qy, element)`.

use crate::basis::DofToQuad;
use crate::kernels::{dispatch_tensor_kernel, ExecutionPolicy};
use crate::metrics::QualityMetric2d;
use crate::Real;
use nalgebra::Matrix2;
use rayon::prelude::*;

/// Reference-space gradients at the quadrature points of one element,
/// indexed `[component][axis][qy][qx]`.
type Grad2<T, const MQ1: usize> = [[[[T; MQ1]; MQ1]; 2]; 2];

fn eval_grad<T: Real, const MD1: usize, const MQ1: usize>(
    d1d: usize,
    q1d: usize,
    maps: &DofToQuad<T>,
    x: &[T],
    jac: &mut Grad2<T, MQ1>,
) {
    let b = maps.b();
    let g = maps.g();
    let ndof = d1d * d1d;
    for c in 0..2 {
        let comp = &x[c * ndof..(c + 1) * ndof];

        let mut xg = [[T::zero(); MQ1]; MD1];
        let mut xb = [[T::zero(); MQ1]; MD1];
        for dy in 0..d1d {
            for qx in 0..q1d {
                let mut u = T::zero();
                let mut v = T::zero();
                for dx in 0..d1d {
                    let s = comp[dx + d1d * dy];
                    u += g[(qx, dx)] * s;
                    v += b[(qx, dx)] * s;
                }
                xg[dy][qx] = u;
                xb[dy][qx] = v;
            }
        }

        for qy in 0..q1d {
            for qx in 0..q1d {
                let mut u = T::zero();
                let mut v = T::zero();
                for dy in 0..d1d {
                    u += b[(qy, dy)] * xg[dy][qx];
                    v += g[(qy, dy)] * xb[dy][qx];
                }
                jac[c][0][qy][qx] = u;
                jac[c][1][qy][qx] = v;
            }
        }
    }
}

fn apply_grad_transpose<T: Real, const MD1: usize, const MQ1: usize>(
    d1d: usize,
    q1d: usize,
    maps: &DofToQuad<T>,
    s: &Grad2<T, MQ1>,
    y: &mut [T],
) {
    let b = maps.b();
    let g = maps.g();
    let ndof = d1d * d1d;
    for c in 0..2 {
        // y axis.
        let mut u = [[T::zero(); MQ1]; MD1];
        let mut v = [[T::zero(); MQ1]; MD1];
        for dy in 0..d1d {
            for qx in 0..q1d {
                let mut uu = T::zero();
                let mut vv = T::zero();
                for qy in 0..q1d {
                    uu += b[(qy, dy)] * s[c][0][qy][qx];
                    vv += g[(qy, dy)] * s[c][1][qy][qx];
                }
                u[dy][qx] = uu;
                v[dy][qx] = vv;
            }
        }

        // x axis, summing the two streams into the output.
        for dy in 0..d1d {
            for dx in 0..d1d {
                let mut acc = T::zero();
                for qx in 0..q1d {
                    acc += g[(qx, dx)] * u[dy][qx] + b[(qx, dx)] * v[dy][qx];
                }
                y[c * ndof + dx + d1d * dy] += acc;
            }
        }
    }
}

fn energy_element<T: Real, const MD1: usize, const MQ1: usize>(
    d1d: usize,
    q1d: usize,
    metric: &dyn QualityMetric2d<T>,
    jrt: &Matrix2<T>,
    maps: &DofToQuad<T>,
    x: &[T],
    e_out: &mut [T],
) {
    let mut jac = [[[[T::zero(); MQ1]; MQ1]; 2]; 2];
    eval_grad::<T, MD1, MQ1>(d1d, q1d, maps, x, &mut jac);
    for qy in 0..q1d {
        for qx in 0..q1d {
            let jpr = Matrix2::from_fn(|c, d| jac[c][d][qy][qx]);
            let jpt = jpr * jrt;
            e_out[qx + q1d * qy] = metric.energy(&jpt);
        }
    }
}

fn gradient_element<T: Real, const MD1: usize, const MQ1: usize>(
    d1d: usize,
    q1d: usize,
    metric: &dyn QualityMetric2d<T>,
    jrt: &Matrix2<T>,
    maps: &DofToQuad<T>,
    o: &[T],
    x: &[T],
    p_out: &mut [T],
    y: &mut [T],
) {
    let mut jac = [[[[T::zero(); MQ1]; MQ1]; 2]; 2];
    eval_grad::<T, MD1, MQ1>(d1d, q1d, maps, x, &mut jac);
    for qy in 0..q1d {
        for qx in 0..q1d {
            let q = qx + q1d * qy;
            let jpr = Matrix2::from_fn(|c, d| jac[c][d][qy][qx]);
            let jpt = jpr * jrt;
            let p = metric.gradient(&jpt) * o[q];
            for j in 0..2 {
                for i in 0..2 {
                    p_out[i + 2 * (j + 2 * q)] = p[(i, j)];
                }
            }
            let z = jrt * p.transpose();
            for c in 0..2 {
                for d in 0..2 {
                    jac[c][d][qy][qx] = z[(d, c)];
                }
            }
        }
    }
    apply_grad_transpose::<T, MD1, MQ1>(d1d, q1d, maps, &jac, y);
}

fn assemble_hessian_element<T: Real, const MD1: usize, const MQ1: usize>(
    d1d: usize,
    q1d: usize,
    metric: &dyn QualityMetric2d<T>,
    jrt: &Matrix2<T>,
    maps: &DofToQuad<T>,
    o: &[T],
    x: &[T],
    a_out: &mut [T],
) {
    let mut jac = [[[[T::zero(); MQ1]; MQ1]; 2]; 2];
    eval_grad::<T, MD1, MQ1>(d1d, q1d, maps, x, &mut jac);
    for qy in 0..q1d {
        for qx in 0..q1d {
            let q = qx + q1d * qy;
            let jpr = Matrix2::from_fn(|c, d| jac[c][d][qy][qx]);
            let jpt = jpr * jrt;
            for j in 0..2 {
                for i in 0..2 {
                    let h = metric.hessian_component(&jpt, i, j) * o[q];
                    for cc in 0..2 {
                        for r in 0..2 {
                            a_out[i + 2 * j + 4 * r + 8 * cc + 16 * q] = h[(r, cc)];
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
    jrt: &Matrix2<T>,
    maps: &DofToQuad<T>,
    a: &[T],
    r_dofs: &[T],
    y: &mut [T],
) {
    let mut jac = [[[[T::zero(); MQ1]; MQ1]; 2]; 2];
    eval_grad::<T, MD1, MQ1>(d1d, q1d, maps, r_dofs, &mut jac);
    for qy in 0..q1d {
        for qx in 0..q1d {
            let q = qx + q1d * qy;
            let jpr = Matrix2::from_fn(|c, d| jac[c][d][qy][qx]);
            let jpt = jpr * jrt;
            let mut m = Matrix2::zeros();
            for cc in 0..2 {
                for r in 0..2 {
                    let mut acc = T::zero();
                    for j in 0..2 {
                        for i in 0..2 {
                            acc += a[i + 2 * j + 4 * r + 8 * cc + 16 * q] * jpt[(i, j)];
                        }
                    }
                    m[(r, cc)] = acc;
                }
            }
            let z = jrt * m.transpose();
            for c in 0..2 {
                for d in 0..2 {
                    jac[c][d][qy][qx] = z[(d, c)];
                }
            }
        }
    }
    apply_grad_transpose::<T, MD1, MQ1>(d1d, q1d, maps, &jac, y);
}

fn energy_run<T: Real, const MD1: usize, const MQ1: usize>(
    ne: usize,
    metric: &dyn QualityMetric2d<T>,
    jrt: &Matrix2<T>,
    maps: &DofToQuad<T>,
    x_evec: &[T],
    e_out: &mut [T],
    policy: ExecutionPolicy,
) {
    let d1d = maps.dofs_1d();
    let q1d = maps.quad_points_1d();
    let nq = q1d * q1d;
    let nd = 2 * d1d * d1d;
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
    metric: &dyn QualityMetric2d<T>,
    jrt: &Matrix2<T>,
    maps: &DofToQuad<T>,
    o: &[T],
    x_evec: &[T],
    p_out: &mut [T],
    y_evec: &mut [T],
    policy: ExecutionPolicy,
) {
    let d1d = maps.dofs_1d();
    let q1d = maps.quad_points_1d();
    let nq = q1d * q1d;
    let nd = 2 * d1d * d1d;
    assert_eq!(x_evec.len(), ne * nd, "element coordinate vector length mismatch");
    assert_eq!(o.len(), ne * nq, "weight buffer length mismatch");
    assert_eq!(p_out.len(), ne * 4 * nq, "gradient tensor buffer length mismatch");
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
            .chunks_exact_mut(4 * nq)
            .zip(y_evec.chunks_exact_mut(nd))
            .enumerate()
            .for_each(|(e, (p_chunk, y_chunk))| body(e, p_chunk, y_chunk)),
        ExecutionPolicy::Parallel => p_out
            .par_chunks_exact_mut(4 * nq)
            .zip(y_evec.par_chunks_exact_mut(nd))
            .enumerate()
            .for_each(|(e, (p_chunk, y_chunk))| body(e, p_chunk, y_chunk)),
    }
}

fn assemble_hessian_run<T: Real, const MD1: usize, const MQ1: usize>(
    ne: usize,
    metric: &dyn QualityMetric2d<T>,
    jrt: &Matrix2<T>,
    maps: &DofToQuad<T>,
    o: &[T],
    x_evec: &[T],
    a_out: &mut [T],
    policy: ExecutionPolicy,
) {
    let d1d = maps.dofs_1d();
    let q1d = maps.quad_points_1d();
    let nq = q1d * q1d;
    let nd = 2 * d1d * d1d;
    assert_eq!(x_evec.len(), ne * nd, "element coordinate vector length mismatch");
    assert_eq!(o.len(), ne * nq, "weight buffer length mismatch");
    assert_eq!(a_out.len(), ne * 16 * nq, "Hessian tensor buffer length mismatch");
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
            .chunks_exact_mut(16 * nq)
            .enumerate()
            .for_each(|(e, chunk)| body(e, chunk)),
        ExecutionPolicy::Parallel => a_out
            .par_chunks_exact_mut(16 * nq)
            .enumerate()
            .for_each(|(e, chunk)| body(e, chunk)),
    }
}

fn apply_hessian_run<T: Real, const MD1: usize, const MQ1: usize>(
    ne: usize,
    jrt: &Matrix2<T>,
    maps: &DofToQuad<T>,
    a: &[T],
    r_evec: &[T],
    y_evec: &mut [T],
    policy: ExecutionPolicy,
) {
    let d1d = maps.dofs_1d();
    let q1d = maps.quad_points_1d();
    let nq = q1d * q1d;
    let nd = 2 * d1d * d1d;
    assert_eq!(r_evec.len(), ne * nd, "element direction vector length mismatch");
    assert_eq!(a.len(), ne * 16 * nq, "Hessian tensor buffer length mismatch");
    assert_eq!(y_evec.len(), ne * nd, "element output vector length mismatch");
    let body = |e: usize, y_chunk: &mut [T]| {
        apply_hessian_element::<T, MD1, MQ1>(
            d1d,
            q1d,
            jrt,
            maps,
            &a[e * 16 * nq..(e + 1) * 16 * nq],
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
    metric: &dyn QualityMetric2d<T>,
    jrt: &Matrix2<T>,
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
    metric: &dyn QualityMetric2d<T>,
    jrt: &Matrix2<T>,
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
    metric: &dyn QualityMetric2d<T>,
    jrt: &Matrix2<T>,
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
/// vector.
pub fn apply_hessian<T: Real>(
    ne: usize,
    jrt: &Matrix2<T>,
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
