//! Arithmetic in GF(2^8) with the Rijndael polynomial x^8 + x^4 + x^3 + x + 1.
//!
//! Multiplication is branchless: no data-dependent branches or table lookups
//! are performed on secret-derived values.

use std::ops::{Add, Mul, Sub};
use zeroize::Zeroize;

/// Low byte of the reduction polynomial (the x^8 term is implicit).
const REDUCTION: u8 = 0x1b;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroize)]
pub struct Gf256(u8);

impl Gf256 {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1);

    pub fn new(value: u8) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Multiplicative inverse via `a^254`. The inverse of zero is defined as zero.
    pub fn invert(self) -> Self {
        // 254 = 0b1111_1110
        let mut result = Self::ONE;
        let mut base = self;
        let mut exp: u8 = 254;
        for _ in 0..8 {
            let bit = exp & 1;
            let product = result * base;
            result = Self::select(bit, product, result);
            base = base * base;
            exp >>= 1;
        }
        result
    }

    /// `a` when `bit == 1`, `b` when `bit == 0`, without branching.
    fn select(bit: u8, a: Self, b: Self) -> Self {
        let mask = 0u8.wrapping_sub(bit & 1);
        Self((a.0 & mask) | (b.0 & !mask))
    }
}

impl Add for Gf256 {
    type Output = Self;

    #[allow(clippy::suspicious_arithmetic_impl)]
    fn add(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl Sub for Gf256 {
    type Output = Self;

    #[allow(clippy::suspicious_arithmetic_impl)]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl Mul for Gf256 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let mut a = self.0;
        let mut b = rhs.0;
        let mut product = 0u8;
        for _ in 0..8 {
            product ^= a & 0u8.wrapping_sub(b & 1);
            let carry = a >> 7;
            a = (a << 1) ^ (REDUCTION & 0u8.wrapping_sub(carry));
            b >>= 1;
        }
        Self(product)
    }
}

/// Evaluate the polynomial with `coefficients[0]` as the constant term at `x` (Horner).
pub fn eval_polynomial(coefficients: &[Gf256], x: Gf256) -> Gf256 {
    coefficients
        .iter()
        .rev()
        .fold(Gf256::ZERO, |acc, &c| acc * x + c)
}

/// Lagrange interpolation through `(xs[i], ys[i])`, evaluated at zero.
///
/// The x-coordinates must be distinct and non-zero; the caller guarantees this.
pub fn interpolate_at_zero(xs: &[Gf256], ys: &[Gf256]) -> Gf256 {
    let mut acc = Gf256::ZERO;
    for (i, (&xi, &yi)) in xs.iter().zip(ys.iter()).enumerate() {
        let mut numerator = Gf256::ONE;
        let mut denominator = Gf256::ONE;
        for (j, &xj) in xs.iter().enumerate() {
            if i == j {
                continue;
            }
            // basis term: (0 - xj) / (xi - xj); subtraction is xor in GF(2^8)
            numerator = numerator * xj;
            denominator = denominator * (xi - xj);
        }
        acc = acc + yi * numerator * denominator.invert();
    }
    acc
}
