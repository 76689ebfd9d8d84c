use crate::Real;
use nalgebra::Matrix3;
use numeric_literals::replace_float_literals;

/// Evaluator for the invariants of a 3×3 matrix and their first and second derivatives.
///
/// The invariants are defined through the Gram matrix $B = J J^T$:
///
/// $$ I_1 = \operatorname{tr} B, \qquad I_2 = \tfrac{1}{2}\big((\operatorname{tr} B)^2 -
///    \operatorname{tr} B^2\big), \qquad I_3 = \det B, \qquad I_{3b} = |\det J|, $$
///
/// together with the scale-invariant combinations $I_{1b} = I_1 \cdot I_{3b}^{-2/3}$ and
/// $I_{2b} = I_2 \cdot I_{3b}^{-4/3}$. The fractional powers are taken of $|\det J|$, with
/// the orientation sign attached to [`i3b_p`](InvariantsEvaluator3d::i3b_p) and to the
/// derivative matrices, so every accessor stays finite on an inverted element and the
/// derivative accessors remain exact on either orientation.
///
/// Second-derivative accessors return the $(k, l)$ slice of the corresponding fourth-order
/// tensor for a fixed index pair $(i, j)$, so the full $3^4$ object is never materialized.
#[derive(Debug, Clone, Copy)]
pub struct InvariantsEvaluator3d<T: Real> {
    j: Matrix3<T>,
}

#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
impl<T: Real> InvariantsEvaluator3d<T> {
    pub fn new(j: &Matrix3<T>) -> Self {
        Self { j: *j }
    }

    /// det(J) with its sign intact.
    fn det(&self) -> T {
        let j = self.j.as_slice();
        j[0] * (j[4] * j[8] - j[7] * j[5]) - j[1] * (j[3] * j[8] - j[5] * j[6])
            + j[2] * (j[3] * j[7] - j[4] * j[6])
    }

    /// (I3b, sign) = (|det(J)|, ±1), with sign = +1 if det(J) ≥ 0 and −1 otherwise.
    pub fn i3b_sign(&self) -> (T, T) {
        let det = self.det();
        let sign = if det >= T::zero() { 1.0 } else { -1.0 };
        (sign * det, sign)
    }

    /// I3b = |det(J)|. The orientation sign travels with the fractional power
    /// [`i3b_p`](Self::i3b_p) and the derivative matrices instead, so that the derivative
    /// accessors are exact on either orientation.
    pub fn i3b(&self) -> T {
        self.i3b_sign().0
    }

    /// I3 = det(J)².
    pub fn i3(&self) -> T {
        let det = self.det();
        det * det
    }

    /// sign · |det(J)|^(−2/3), the fractional power entering I1b and I2b.
    pub fn i3b_p(&self) -> T {
        let (i3b, sign) = self.i3b_sign();
        sign * i3b.powf(-2.0 / 3.0)
    }

    /// Diagonal of the Gram matrix B = J Jᵀ.
    fn gram_diag(&self) -> [T; 3] {
        let j = self.j.as_slice();
        [
            j[0] * j[0] + j[3] * j[3] + j[6] * j[6],
            j[1] * j[1] + j[4] * j[4] + j[7] * j[7],
            j[2] * j[2] + j[5] * j[5] + j[8] * j[8],
        ]
    }

    /// Off-diagonal entries B(0,1), B(0,2), B(1,2) of the Gram matrix.
    fn gram_offd(&self) -> [T; 3] {
        let j = self.j.as_slice();
        [
            j[0] * j[1] + j[3] * j[4] + j[6] * j[7],
            j[0] * j[2] + j[3] * j[5] + j[6] * j[8],
            j[1] * j[2] + j[4] * j[5] + j[7] * j[8],
        ]
    }

    fn gram(&self) -> Matrix3<T> {
        let d = self.gram_diag();
        let o = self.gram_offd();
        Matrix3::new(d[0], o[0], o[1], o[0], d[1], o[2], o[1], o[2], d[2])
    }

    /// I1 = ‖J‖²_F = tr(J Jᵀ).
    pub fn i1(&self) -> T {
        let d = self.gram_diag();
        d[0] + d[1] + d[2]
    }

    /// I1b = I1 · I3b^(−2/3).
    pub fn i1b(&self) -> T {
        self.i1() * self.i3b_p()
    }

    /// I2 = ((tr B)² − tr B²) / 2.
    pub fn i2(&self) -> T {
        let d = self.gram_diag();
        let o = self.gram_offd();
        let i1 = d[0] + d[1] + d[2];
        let b_fro2 =
            d[0] * d[0] + d[1] * d[1] + d[2] * d[2] + 2.0 * (o[0] * o[0] + o[1] * o[1] + o[2] * o[2]);
        (i1 * i1 - b_fro2) / 2.0
    }

    /// I2b = I2 · I3b^(−4/3).
    pub fn i2b(&self) -> T {
        let i3b_p = self.i3b_p();
        self.i2() * i3b_p * i3b_p
    }

    /// dI1 = 2 J.
    pub fn di1(&self) -> Matrix3<T> {
        self.j * 2.0
    }

    /// dI3b = sign · adj(J)ᵀ, the derivative of |det(J)| on either orientation.
    pub fn di3b(&self) -> Matrix3<T> {
        let (_, sign) = self.i3b_sign();
        let j = self.j.as_slice();
        Matrix3::from_column_slice(&[
            sign * (j[4] * j[8] - j[5] * j[7]),
            sign * (j[5] * j[6] - j[3] * j[8]),
            sign * (j[3] * j[7] - j[4] * j[6]),
            sign * (j[2] * j[7] - j[1] * j[8]),
            sign * (j[0] * j[8] - j[2] * j[6]),
            sign * (j[1] * j[6] - j[0] * j[7]),
            sign * (j[1] * j[5] - j[2] * j[4]),
            sign * (j[2] * j[3] - j[0] * j[5]),
            sign * (j[0] * j[4] - j[1] * j[3]),
        ])
    }

    /// dI1b = 2 I3b^(−2/3) (J − (I1 / (3 I3b)) dI3b).
    pub fn di1b(&self) -> Matrix3<T> {
        let (i3b, _) = self.i3b_sign();
        let c1 = 2.0 * self.i3b_p();
        let c2 = self.i1() / (3.0 * i3b);
        (self.j - self.di3b() * c2) * c1
    }

    /// dI2 = 2 I1 J − 2 (J Jᵀ) J = 2 (I1 I − B) J.
    pub fn di2(&self) -> Matrix3<T> {
        let i1 = self.i1();
        let b = self.gram();
        (Matrix3::from_diagonal_element(i1) - b) * self.j * 2.0
    }

    /// dI2b = I3b^(−4/3) (dI2 − (4 I2 / (3 I3b)) dI3b).
    pub fn di2b(&self) -> Matrix3<T> {
        let (i3b, _) = self.i3b_sign();
        let i3b_p = self.i3b_p();
        let c1 = i3b_p * i3b_p;
        let c2 = 4.0 * self.i2() / (3.0 * i3b);
        (self.di2() - self.di3b() * c2) * c1
    }

    /// ddI1_ijkl = 2 δ_ik δ_jl; slice over (k, l) for fixed (i, j).
    pub fn ddi1(&self, i: usize, j: usize) -> Matrix3<T> {
        let mut out = Matrix3::zeros();
        out[(i, j)] = 2.0;
        out
    }

    /// ddI1b = X1 + X2 + X3, where
    /// X1_ijkl = (2/3 I1b / I3) (2/3 dI3b_ij dI3b_kl + dI3b_kj dI3b_il),
    /// X2_ijkl = I3b^(−2/3) ddI1_ijkl,
    /// X3_ijkl = −(4/3) (I3b^(−2/3) / I3b) (J_ij dI3b_kl + dI3b_ij J_kl).
    pub fn ddi1b(&self, i: usize, j: usize) -> Matrix3<T> {
        let (i3b, _) = self.i3b_sign();
        let di3b = self.di3b();
        let alpha = 2.0 / 3.0 * self.i1b() / self.i3();
        let beta = self.i3b_p();
        let gamma = -(4.0 / 3.0) * self.i3b_p() / i3b;
        let mut out = Matrix3::zeros();
        for k in 0..3 {
            for l in 0..3 {
                let x1 = alpha * (2.0 / 3.0 * di3b[(i, j)] * di3b[(k, l)] + di3b[(k, j)] * di3b[(i, l)]);
                let x2 = if i == k && j == l { 2.0 * beta } else { T::zero() };
                let x3 = gamma * (self.j[(i, j)] * di3b[(k, l)] + di3b[(i, j)] * self.j[(k, l)]);
                out[(k, l)] = x1 + x2 + x3;
            }
        }
        out
    }

    /// ddI2 = x1 + x2 + x3, where
    /// x1_ijkl = 2 I1 δ_ik δ_jl,
    /// x2_ijkl = 2 (2 δ_ku δ_iv − δ_ik δ_uv − δ_kv δ_iu) J_vj J_ul,
    /// x3_ijkl = −2 (J Jᵀ)_ik δ_jl.
    pub fn ddi2(&self, i: usize, j: usize) -> Matrix3<T> {
        let i1 = self.i1();
        let b = self.gram();
        let mut out = Matrix3::zeros();
        for k in 0..3 {
            for l in 0..3 {
                let x1 = if i == k && j == l { 2.0 * i1 } else { T::zero() };
                let mut x2 = T::zero();
                for u in 0..3 {
                    for v in 0..3 {
                        let ku_iv = if k == u && i == v { 1.0 } else { T::zero() };
                        let ik_uv = if i == k && u == v { 1.0 } else { T::zero() };
                        let kv_iu = if k == v && i == u { 1.0 } else { T::zero() };
                        x2 += 2.0 * (2.0 * ku_iv - ik_uv - kv_iu) * self.j[(v, j)] * self.j[(u, l)];
                    }
                }
                let x3 = if j == l { -2.0 * b[(i, k)] } else { T::zero() };
                out[(k, l)] = x1 + x2 + x3;
            }
        }
        out
    }

    /// ddI2b = X1 + X2 + X3, where
    /// X1_ijkl = (16/9) |I3b|^(−10/3) I2 dI3b_ij dI3b_kl + (4/3) |I3b|^(−10/3) I2 dI3b_il dI3b_kj,
    /// X2_ijkl = −(4/3) |I3b|^(−7/3) (dI2_ij dI3b_kl + dI2_kl dI3b_ij),
    /// X3_ijkl = |I3b|^(−4/3) ddI2_ijkl.
    pub fn ddi2b(&self, i: usize, j: usize) -> Matrix3<T> {
        let (i3b, _) = self.i3b_sign();
        let i3b_p = self.i3b_p();
        let i2 = self.i2();
        let di2 = self.di2();
        let di3b = self.di3b();
        let ddi2 = self.ddi2(i, j);
        let p43 = i3b_p * i3b_p;
        let p73 = i3b_p * i3b_p / i3b;
        let p103 = i3b_p * i3b_p / (i3b * i3b);
        let mut out = Matrix3::zeros();
        for k in 0..3 {
            for l in 0..3 {
                let x1 = 16.0 / 9.0 * p103 * i2 * di3b[(i, j)] * di3b[(k, l)]
                    + 4.0 / 3.0 * p103 * i2 * di3b[(i, l)] * di3b[(k, j)];
                let x2 = -(4.0 / 3.0) * p73 * (di2[(i, j)] * di3b[(k, l)] + di2[(k, l)] * di3b[(i, j)]);
                let x3 = p43 * ddi2[(k, l)];
                out[(k, l)] = x1 + x2 + x3;
            }
        }
        out
    }

    /// ddI3b_ijkl = (1 / I3b) (δ_ks δ_it − δ_kt δ_si) dI3b_tj dI3b_sl.
    pub fn ddi3b(&self, i: usize, j: usize) -> Matrix3<T> {
        let (i3b, _) = self.i3b_sign();
        let c1 = 1.0 / i3b;
        let di3b = self.di3b();
        let mut out = Matrix3::zeros();
        for k in 0..3 {
            for l in 0..3 {
                let mut sum = T::zero();
                for s in 0..3 {
                    for t in 0..3 {
                        let ks_it = if k == s && i == t { 1.0 } else { T::zero() };
                        let kt_si = if k == t && s == i { 1.0 } else { T::zero() };
                        sum += c1 * (ks_it - kt_si) * di3b[(t, j)] * di3b[(s, l)];
                    }
                }
                out[(k, l)] = sum;
            }
        }
        out
    }
}
