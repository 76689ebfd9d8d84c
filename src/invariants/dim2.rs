use crate::Real;
use nalgebra::Matrix2;
use numeric_literals::replace_float_literals;

/// Evaluator for the invariants of a 2×2 matrix and their first and second derivatives.
///
/// In two dimensions the invariant family reduces to
///
/// $$ I_1 = \|J\|^2_F, \qquad I_{2b} = |\det J|, \qquad I_2 = (\det J)^2, \qquad
///    I_{1b} = I_1 / \det J, $$
///
/// with the reciprocal determinant computed as $\mathrm{sign} \cdot I_{2b}^{-1}$ and the
/// orientation sign attached to [`i2b_p`](InvariantsEvaluator2d::i2b_p) and the derivative
/// matrices, so every accessor stays finite on an inverted element and the derivative
/// accessors remain exact on either orientation. The second-derivative accessors return the
/// $(k, l)$ slice of the fourth-order tensor for a fixed $(i, j)$, like their 3D counterparts.
#[derive(Debug, Clone, Copy)]
pub struct InvariantsEvaluator2d<T: Real> {
    j: Matrix2<T>,
}

/// 2D Levi-Civita symbol ε_ij.
#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
fn eps<T: Real>(i: usize, j: usize) -> T {
    match (i, j) {
        (0, 1) => 1.0,
        (1, 0) => -1.0,
        _ => T::zero(),
    }
}

#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
impl<T: Real> InvariantsEvaluator2d<T> {
    pub fn new(j: &Matrix2<T>) -> Self {
        Self { j: *j }
    }

    /// det(J) with its sign intact.
    fn det(&self) -> T {
        let j = self.j.as_slice();
        j[0] * j[3] - j[2] * j[1]
    }

    /// (I2b, sign) = (|det(J)|, ±1), with sign = +1 if det(J) ≥ 0 and −1 otherwise.
    pub fn i2b_sign(&self) -> (T, T) {
        let det = self.det();
        let sign = if det >= T::zero() { 1.0 } else { -1.0 };
        (sign * det, sign)
    }

    /// I2b = |det(J)|. The orientation sign travels with [`i2b_p`](Self::i2b_p) and the
    /// derivative matrices instead.
    pub fn i2b(&self) -> T {
        self.i2b_sign().0
    }

    /// I2 = det(J)².
    pub fn i2(&self) -> T {
        let det = self.det();
        det * det
    }

    /// sign · |det(J)|^(−1), the 2D analogue of the 3D fractional power I3b^(−2/3).
    pub fn i2b_p(&self) -> T {
        let (i2b, sign) = self.i2b_sign();
        sign / i2b
    }

    /// I1 = ‖J‖²_F.
    pub fn i1(&self) -> T {
        let j = self.j.as_slice();
        j[0] * j[0] + j[1] * j[1] + j[2] * j[2] + j[3] * j[3]
    }

    /// I1b = I1 · I2b^(−1).
    pub fn i1b(&self) -> T {
        self.i1() * self.i2b_p()
    }

    /// dI1 = 2 J.
    pub fn di1(&self) -> Matrix2<T> {
        self.j * 2.0
    }

    /// dI2b = sign · adj(J)ᵀ, the derivative of |det(J)| on either orientation.
    pub fn di2b(&self) -> Matrix2<T> {
        let (_, sign) = self.i2b_sign();
        let j = self.j.as_slice();
        Matrix2::from_column_slice(&[sign * j[3], -sign * j[2], -sign * j[1], sign * j[0]])
    }

    /// dI2 = 2 det(J) · adj(J)ᵀ.
    pub fn di2(&self) -> Matrix2<T> {
        let det = self.det();
        let j = self.j.as_slice();
        Matrix2::from_column_slice(&[j[3], -j[2], -j[1], j[0]]) * (2.0 * det)
    }

    /// dI1b = 2 I2b^(−1) (J − (I1 / (2 I2b)) dI2b).
    pub fn di1b(&self) -> Matrix2<T> {
        let (i2b, _) = self.i2b_sign();
        let c1 = 2.0 * self.i2b_p();
        let c2 = self.i1() / (2.0 * i2b);
        (self.j - self.di2b() * c2) * c1
    }

    /// ddI1_ijkl = 2 δ_ik δ_jl; slice over (k, l) for fixed (i, j).
    pub fn ddi1(&self, i: usize, j: usize) -> Matrix2<T> {
        let mut out = Matrix2::zeros();
        out[(i, j)] = 2.0;
        out
    }

    /// ddI2b_ijkl = sign · ε_ik ε_jl (the second derivative of the determinant is constant
    /// in two dimensions).
    pub fn ddi2b(&self, i: usize, j: usize) -> Matrix2<T> {
        let (_, sign) = self.i2b_sign();
        let mut out = Matrix2::zeros();
        for k in 0..2 {
            for l in 0..2 {
                out[(k, l)] = sign * eps::<T>(i, k) * eps::<T>(j, l);
            }
        }
        out
    }

    /// ddI2_ijkl = 2 d(det)_ij d(det)_kl + 2 det(J) ε_ik ε_jl.
    pub fn ddi2(&self, i: usize, j: usize) -> Matrix2<T> {
        let det = self.det();
        let jv = self.j.as_slice();
        let ddet = Matrix2::from_column_slice(&[jv[3], -jv[2], -jv[1], jv[0]]);
        let mut out = Matrix2::zeros();
        for k in 0..2 {
            for l in 0..2 {
                out[(k, l)] = 2.0 * ddet[(i, j)] * ddet[(k, l)] + 2.0 * det * eps::<T>(i, k) * eps::<T>(j, l);
            }
        }
        out
    }

    /// ddI1b by the quotient rule on I1b = I1 / det(J):
    /// ddI1b_ijkl = (2/det) δ_ik δ_jl − (2/det²)(J_ij d(det)_kl + J_kl d(det)_ij)
    ///              + (2 I1 / det³) d(det)_ij d(det)_kl − (I1 / det²) ε_ik ε_jl.
    pub fn ddi1b(&self, i: usize, j: usize) -> Matrix2<T> {
        let det = self.det();
        let i1 = self.i1();
        let jv = self.j.as_slice();
        let ddet = Matrix2::from_column_slice(&[jv[3], -jv[2], -jv[1], jv[0]]);
        let det2 = det * det;
        let mut out = Matrix2::zeros();
        for k in 0..2 {
            for l in 0..2 {
                let x1 = if i == k && j == l { 2.0 / det } else { T::zero() };
                let x2 = -(2.0 / det2) * (self.j[(i, j)] * ddet[(k, l)] + self.j[(k, l)] * ddet[(i, j)]);
                let x3 = 2.0 * i1 / (det2 * det) * ddet[(i, j)] * ddet[(k, l)];
                let x4 = -(i1 / det2) * eps::<T>(i, k) * eps::<T>(j, l);
                out[(k, l)] = x1 + x2 + x3 + x4;
            }
        }
        out
    }
}
