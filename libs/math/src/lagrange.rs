//! Lagrange interpolation at zero.

use crate::{
    errors::InterpolationError,
    modular::ModularNumber,
    polynomial::{Point, Polynomial},
};

/// Precomputed Lagrange coefficients for interpolation at zero over a fixed
/// abscissa set.
///
/// Building the table is O(n^2); every interpolation afterwards is O(n).
#[derive(Debug, Clone)]
pub struct Lagrange {
    coefficients: Vec<(ModularNumber, ModularNumber)>,
}

impl Lagrange {
    /// Precomputes the coefficients for the given abscissas.
    ///
    /// Fails if an abscissa is repeated.
    pub fn new(abscissas: &[ModularNumber]) -> Result<Self, InterpolationError> {
        let mut coefficients = Vec::with_capacity(abscissas.len());
        for (i, xi) in abscissas.iter().enumerate() {
            let mut numerator = ModularNumber::ONE;
            let mut denominator = ModularNumber::ONE;
            for (j, xj) in abscissas.iter().enumerate() {
                if i == j {
                    continue;
                }
                if xi == xj {
                    return Err(InterpolationError::DuplicateAbscissa);
                }
                numerator = numerator * xj;
                denominator = denominator * &(*xj - xi);
            }
            let coefficient = numerator * &denominator.inv()?;
            coefficients.push((*xi, coefficient));
        }
        Ok(Self { coefficients })
    }

    /// The coefficient that weighs the ordinate at `x` in the value at zero.
    pub fn coefficient(&self, x: &ModularNumber) -> Result<ModularNumber, InterpolationError> {
        self.coefficients
            .iter()
            .find(|(abscissa, _)| abscissa == x)
            .map(|(_, coefficient)| *coefficient)
            .ok_or(InterpolationError::UnknownAbscissa)
    }

    /// Interpolates the value at zero from one point per abscissa.
    pub fn interpolate(&self, points: &[Point]) -> Result<ModularNumber, InterpolationError> {
        if points.len() != self.coefficients.len() {
            return Err(InterpolationError::UnknownAbscissa);
        }
        let mut result = ModularNumber::ZERO;
        for point in points {
            result = result + &(self.coefficient(&point.x)? * &point.y);
        }
        Ok(result)
    }
}

/// One-shot interpolation at zero for an ad-hoc point set.
pub fn lagrange_at_zero(points: &[Point]) -> Result<ModularNumber, InterpolationError> {
    let abscissas: Vec<_> = points.iter().map(|point| point.x).collect();
    Lagrange::new(&abscissas)?.interpolate(points)
}

/// Reconstructs the unique polynomial of degree `points.len() - 1` through
/// the given points, O(n^3).
pub fn lagrange_polynomial(points: &[Point]) -> Result<Polynomial, InterpolationError> {
    let mut result = vec![ModularNumber::ZERO; points.len()];
    for (i, pi) in points.iter().enumerate() {
        // The i-th basis polynomial, built up one linear factor at a time.
        let mut basis = vec![ModularNumber::ONE];
        let mut denominator = ModularNumber::ONE;
        for (j, pj) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            if pi.x == pj.x {
                return Err(InterpolationError::DuplicateAbscissa);
            }
            denominator = denominator * &(pi.x - pj.x);
            // basis *= (x - x_j)
            let mut next = vec![ModularNumber::ZERO; basis.len() + 1];
            for (k, coefficient) in basis.iter().enumerate() {
                next[k] = next[k] - &(*coefficient * &pj.x);
                next[k + 1] = next[k + 1] + coefficient;
            }
            basis = next;
        }
        let scale = pi.y * &denominator.inv()?;
        for (k, coefficient) in basis.into_iter().enumerate() {
            result[k] = result[k] + &(coefficient * &scale);
        }
    }
    Ok(Polynomial::new(result))
}

#[allow(clippy::arithmetic_side_effects)]
#[cfg(test)]
mod test {
    use super::*;
    use crate::polynomial::Polynomial;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn eval_points(polynomial: &Polynomial, xs: &[u32]) -> Vec<Point> {
        xs.iter()
            .map(|x| {
                let x = ModularNumber::from_u32(*x);
                Point::new(x, polynomial.eval(&x))
            })
            .collect()
    }

    #[test]
    fn recovers_constant_term() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let constant = ModularNumber::from_u64(987654321);
        let polynomial = Polynomial::gen_random(2, constant, &mut rng);
        let points = eval_points(&polynomial, &[1, 2, 3]);
        assert_eq!(lagrange_at_zero(&points).unwrap(), constant);
    }

    #[test]
    fn any_subset_of_points_agrees() {
        let mut rng = ChaCha20Rng::seed_from_u64(12);
        let constant = ModularNumber::from_u64(5);
        let polynomial = Polynomial::gen_random(1, constant, &mut rng);
        let points = eval_points(&polynomial, &[1, 2, 3, 4]);
        for pair in [[0usize, 1], [0, 3], [2, 3]] {
            let subset = [points[pair[0]], points[pair[1]]];
            assert_eq!(lagrange_at_zero(&subset).unwrap(), constant);
        }
    }

    #[test]
    fn polynomial_reconstruction() {
        let mut rng = ChaCha20Rng::seed_from_u64(13);
        let polynomial = Polynomial::gen_random(2, ModularNumber::from_u32(77), &mut rng);
        let points = eval_points(&polynomial, &[1, 2, 3]);
        let recovered = lagrange_polynomial(&points).unwrap();
        for x in [4u32, 5, 6] {
            let x = ModularNumber::from_u32(x);
            assert_eq!(recovered.eval(&x), polynomial.eval(&x));
        }
    }

    #[test]
    fn duplicate_abscissas_are_rejected() {
        let xs = [ModularNumber::from_u32(1), ModularNumber::from_u32(1)];
        assert_eq!(Lagrange::new(&xs).unwrap_err(), InterpolationError::DuplicateAbscissa);
    }

    #[test]
    fn unknown_abscissa_is_rejected() {
        let xs = [ModularNumber::from_u32(1), ModularNumber::from_u32(2)];
        let lagrange = Lagrange::new(&xs).unwrap();
        assert_eq!(
            lagrange.coefficient(&ModularNumber::from_u32(9)).unwrap_err(),
            InterpolationError::UnknownAbscissa
        );
    }
}
