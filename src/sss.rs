use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::gf256::{self, Gf256};
use crate::interpolate::{apply_weights, lagrange_weights};

/// The largest number of shares a single split can produce: X is a byte and 0 is reserved.
pub const MAX_SHARES: usize = 255;

/// A single share of a secret.
///
/// `x` is the evaluation point and is never 0, since the secret itself lives at 0. `y` holds one
/// polynomial value per byte of the secret.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Share {
    pub x: u8,
    pub y: Vec<u8>,
}

impl Share {
    pub fn new(x: u8, y: Vec<u8>) -> Self {
        Share { x, y }
    }
}

/// Represents a polynomial over GF(2^8) that encodes one byte of a secret.
///
/// Coefficients are stored lowest degree first, so `coefficients[0]` is the secret byte. A
/// polynomial only lives for the duration of a split; it is reseeded for every byte position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polynomial {
    pub coefficients: Vec<u8>,
}

impl Polynomial {
    /// Creates the zero polynomial of the given degree.
    pub fn with_degree(degree: usize) -> Self {
        Polynomial {
            coefficients: vec![0; degree + 1],
        }
    }

    /// Sets the constant term and draws every other coefficient from `rng`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Randomness`] if the source cannot supply enough bytes.
    pub fn reseed<R: RngCore + ?Sized>(&mut self, constant: u8, rng: &mut R) -> Result<()> {
        self.coefficients[0] = constant;
        rng.try_fill_bytes(&mut self.coefficients[1..])?;
        Ok(())
    }

    /// Evaluates the polynomial at `x` by accumulating successive powers of `x`.
    pub fn evaluate(&self, x: u8) -> u8 {
        let mut y = self.coefficients[0];
        let mut power = 1u8;

        for &c in &self.coefficients[1..] {
            power = gf256::mul(power, x);
            y = gf256::add(y, gf256::mul(c, power));
        }

        y
    }
}

/// Splits a secret into `shares` shares, any `threshold` of which reconstruct it.
///
/// Every byte of the secret gets its own polynomial of degree `threshold - 1`, with fresh
/// coefficients drawn from `rng`. Shares are numbered `1..=shares`.
///
/// # Errors
///
/// * [`Error::InvalidParameters`] if `threshold < 2`, `shares < threshold`, `shares > 255` or the
///   secret is empty.
/// * [`Error::Randomness`] if `rng` fails; no shares are returned in that case.
///
/// # Examples
///
/// ```rust
/// use shamir::sss::{combine_shares, split_secret};
///
/// let secret = b"hello world";
/// let shares = split_secret(secret, 3, 5, &mut rand::thread_rng()).unwrap();
/// assert_eq!(shares.len(), 5);
///
/// let recovered = combine_shares(&shares[1..4]).unwrap();
/// assert_eq!(recovered, secret);
/// ```
pub fn split_secret<R: RngCore + ?Sized>(
    secret: &[u8],
    threshold: usize,
    shares: usize,
    rng: &mut R,
) -> Result<Vec<Share>> {
    if threshold < 2 {
        return Err(Error::InvalidParameters(format!(
            "threshold must be at least 2, got {threshold}"
        )));
    }
    if shares < threshold {
        return Err(Error::InvalidParameters(format!(
            "share count {shares} is below threshold {threshold}"
        )));
    }
    if shares > MAX_SHARES {
        return Err(Error::InvalidParameters(format!(
            "share count {shares} exceeds {MAX_SHARES}"
        )));
    }
    if secret.is_empty() {
        return Err(Error::InvalidParameters("secret must not be empty".to_string()));
    }

    debug!(
        "splitting {} byte secret into {} shares, threshold {}",
        secret.len(),
        shares,
        threshold
    );

    let mut out: Vec<Share> = (1..=shares as u8)
        .map(|x| Share::new(x, vec![0; secret.len()]))
        .collect();

    let mut poly = Polynomial::with_degree(threshold - 1);
    for (idx, &byte) in secret.iter().enumerate() {
        poly.reseed(byte, rng)?;
        for share in out.iter_mut() {
            share.y[idx] = poly.evaluate(share.x);
        }
    }

    Ok(out)
}

/// Reconstructs a secret from a set of shares by interpolating at zero.
///
/// The order of the shares does not matter. Passing fewer shares than the threshold used at split
/// time is not detected: the result is simply a wrong secret.
///
/// # Errors
///
/// * [`Error::InsufficientShares`] if fewer than two shares are given.
/// * [`Error::InconsistentShareLengths`] if the shares differ in length.
/// * [`Error::SingularInterpolation`] if two shares have the same `x`.
pub fn combine_shares(shares: &[Share]) -> Result<Vec<u8>> {
    if shares.len() < 2 {
        return Err(Error::InsufficientShares);
    }

    let secret_length = shares[0].y.len();
    if shares.iter().any(|s| s.y.len() != secret_length) {
        return Err(Error::InconsistentShareLengths);
    }

    debug!(
        "combining {} shares of {} bytes",
        shares.len(),
        secret_length
    );

    let xs: Vec<Gf256> = shares.iter().map(|s| Gf256(s.x)).collect();
    let weights = lagrange_weights(&xs, Gf256::ZERO)?;

    let mut ys = Vec::with_capacity(shares.len());
    let secret: Vec<u8> = (0..secret_length)
        .map(|idx| {
            ys.clear();
            ys.extend(shares.iter().map(|s| Gf256(s.y[idx])));
            u8::from(apply_weights(&weights, &ys))
        })
        .collect();

    Ok(secret)
}
