//! # Shamir Secret Sharing over GF(256)
//!
//! This library splits a secret byte string into `n` shares such that any `k` of them
//! reconstruct it exactly, while fewer than `k` reveal nothing about it. It is meant for
//! distributed custody of sensitive material: key escrow, backup recovery, multi-party
//! authorization.
//!
//! ## Shamir's Secret Sharing (SSS)
//!
//! Shamir's Secret Sharing is a cryptographic algorithm created by Adi Shamir. For every byte `S`
//! of the secret, the algorithm chooses a random polynomial of degree `k-1` over GF(2^8):
//!
//! ```ignore
//! f(x) = a0 + a1*x + a2*x^2 + ... + a(k-1)*x^(k-1)
//! ```
//!
//! where `a0 = S` and `a1, ..., a(k-1)` are drawn from a randomness source. Share `i` holds the
//! point `(i, f(i))` for every byte. With at least `k` points the polynomial, and hence `f(0)`, can
//! be recovered with Lagrange interpolation.
//!
//! The field is GF(2^8) defined by the irreducible polynomial x^8 + x^4 + x^3 + x + 1, the one
//! AES uses. Addition is XOR; multiplication goes through log/exp tables built once per process.
//! The table lookups are not constant time.
//!
//! ### Example: Splitting and Combining a Secret
//!
//! ```rust
//! use shamir::sss::{combine_shares, split_secret};
//!
//! let secret = b"correct horse battery staple";
//! let shares = split_secret(secret, 3, 5, &mut rand::thread_rng()).unwrap();
//!
//! // Any three shares, in any order, are enough.
//! let subset = vec![shares[4].clone(), shares[2].clone(), shares[0].clone()];
//! assert_eq!(combine_shares(&subset).unwrap(), secret);
//! ```
//!
//! ### Example: Moving Shares Around
//!
//! ```rust
//! use shamir::encoding::{marshal_text, unmarshal_text};
//! use shamir::sss::split_secret;
//!
//! let shares = split_secret(b"key material", 2, 3, &mut rand::thread_rng()).unwrap();
//! let line = marshal_text(&shares[0]).unwrap();
//! assert!(line.starts_with("shamir1:"));
//! assert_eq!(unmarshal_text(&line).unwrap(), shares[0]);
//! ```
//!
//! ## Modules
//!
//! - `gf256`: Field arithmetic over GF(2^8).
//! - `field`: The field contract the interpolation code is generic over.
//! - `interpolate`: Lagrange interpolation at an arbitrary point.
//! - `sss`: Splitting and combining secrets.
//! - `encoding`: TLV and text encodings of a share.
//! - `format`: The checksummed `SHAM` share container.
//! - `verify`: Structured verification reports for share sets.
//! - `operations`: Staged split and verify-then-reconstruct under an explicit session context.
//! - `config`: Configuration for the command line tool.
//! - `error`: Error types.

/// The `gf256` module implements the 256-element finite field every other module computes in.
/// Lookup tables are built once per process and shared read-only between threads.
pub mod gf256;

/// The `field` module defines the `Field` trait, which lets interpolation be written once for any
/// finite field.
pub mod field;

/// The `interpolate` module holds the one Lagrange interpolation routine used by combination and
/// verification alike.
pub mod interpolate;

/// The `sss` (Shamir's Secret Sharing) module is the core of the library. It splits secrets into
/// shares and combines shares back into secrets.
pub mod sss;

/// The `encoding` module converts shares to and from their TLV binary and `shamir1:` text forms.
pub mod encoding;

/// The `format` module implements the self-describing share container with CRC32 integrity and an
/// optional HMAC-SHA256 trailer.
pub mod format;

/// The `verify` module checks a share set against a threshold and reports every problem found.
pub mod verify;

/// The `operations` module runs split and reconstruction as auditable stages of a session, each
/// reporting its own result.
pub mod operations;

pub mod config;

pub mod error;

pub use error::{EncodingError, Error, Result};
pub use sss::{combine_shares, split_secret, Share};
