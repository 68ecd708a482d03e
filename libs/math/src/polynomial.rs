//! Polynomials over `F_p`.

use crate::modular::ModularNumber;
use rand::Rng;

/// A polynomial as its coefficient sequence, index 0 being the constant term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polynomial {
    coefficients: Vec<ModularNumber>,
}

impl Polynomial {
    /// Creates a polynomial from its coefficients.
    pub fn new(coefficients: Vec<ModularNumber>) -> Self {
        Self { coefficients }
    }

    /// Samples a polynomial of the given degree with a fixed constant term.
    ///
    /// The non-constant coefficients are uniform; the leading coefficient may
    /// be zero, which keeps the induced share distribution uniform as well.
    pub fn gen_random<R: Rng>(degree: usize, constant: ModularNumber, rng: &mut R) -> Self {
        let mut coefficients = Vec::with_capacity(degree + 1);
        coefficients.push(constant);
        for _ in 0..degree {
            coefficients.push(ModularNumber::gen_random(rng));
        }
        Self { coefficients }
    }

    /// The polynomial degree. The zero polynomial reports degree 0.
    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    /// The coefficient sequence.
    pub fn coefficients(&self) -> &[ModularNumber] {
        &self.coefficients
    }

    /// Evaluates at `x` using Horner's method.
    pub fn eval(&self, x: &ModularNumber) -> ModularNumber {
        let mut result = ModularNumber::ZERO;
        for coefficient in self.coefficients.iter().rev() {
            result = result * x + coefficient;
        }
        result
    }
}

/// A point on a polynomial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    /// The abscissa.
    pub x: ModularNumber,

    /// The evaluation at `x`.
    pub y: ModularNumber,
}

impl Point {
    /// Creates a new point.
    pub fn new(x: ModularNumber, y: ModularNumber) -> Self {
        Self { x, y }
    }
}
