//! Lagrange interpolation over any `Field`.

use std::iter::zip;

use crate::error::{Error, Result};
use crate::field::Field;

/// Returns the Lagrange weights of the given x values at the point `at`.
///
/// The i-th weight is defined as:
/// ```text
///     L_i(at) = \prod_{j=0,j≠i}^n (at - x_j) / (x_i - x_j)
/// ```
/// so that the value of the interpolating polynomial at `at` is `\sum_i y_i * L_i(at)`.
///
/// Fails with [`Error::SingularInterpolation`] when two x values coincide, which is exactly
/// when a denominator vanishes.
pub fn lagrange_weights<F: Field>(xs: &[F], at: F) -> Result<Vec<F>> {
    if xs.is_empty() {
        return Err(Error::InvalidParameters("no interpolation points".to_string()));
    }

    xs.iter()
        .enumerate()
        .map(|(i, &xi)| {
            let mut nom = F::ONE;
            let mut denom = F::ONE;
            for (j, &xj) in xs.iter().enumerate() {
                if i == j {
                    continue;
                }
                nom = nom * (at - xj);
                denom = denom * (xi - xj);
            }
            let denom_inv = denom.invert().ok_or(Error::SingularInterpolation)?;
            Ok(nom * denom_inv)
        })
        .collect()
}

/// Evaluates at `at` the unique polynomial of degree below `xs.len()` passing through the
/// points `(xs[i], ys[i])`.
pub fn interpolate_at<F: Field>(xs: &[F], ys: &[F], at: F) -> Result<F> {
    if xs.len() != ys.len() {
        return Err(Error::InvalidParameters(format!(
            "{} x values but {} y values",
            xs.len(),
            ys.len()
        )));
    }

    let weights = lagrange_weights(xs, at)?;
    Ok(apply_weights(&weights, ys))
}

/// Combines precomputed weights with a matching set of y values.
pub(crate) fn apply_weights<F: Field>(weights: &[F], ys: &[F]) -> F {
    zip(weights, ys).fold(F::ZERO, |acc, (&w, &y)| acc + w * y)
}
