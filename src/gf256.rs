use core::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, MulAssign, Sub, SubAssign};

use lazy_static::lazy_static;

use crate::error::{Error, Result};
use crate::field::Field;

/// Low byte of the irreducible polynomial x^8 + x^4 + x^3 + x + 1 (0x11B).
const REDUCTION: u8 = 0x1b;

/// The element x + 1, a generator of the multiplicative group.
const GENERATOR: u8 = 0x03;

/// Discrete-log and exponential tables for the multiplicative group.
///
/// `exp` is stored twice over so that the sum (or offset difference) of two logarithms can
/// index it directly, without reducing modulo 255.
struct Tables {
    exp: [u8; 510],
    log: [u8; 256],
}

impl Tables {
    fn build() -> Self {
        let mut exp = [0u8; 510];
        let mut log = [0u8; 256];

        let mut x: u8 = 1;
        for i in 0..255 {
            exp[i] = x;
            log[x as usize] = i as u8;
            x = mul_no_table(x, GENERATOR);
        }
        for i in 255..510 {
            exp[i] = exp[i - 255];
        }

        Tables { exp, log }
    }
}

lazy_static! {
    static ref TABLES: Tables = Tables::build();
}

/// Forces construction of the lookup tables.
///
/// Every arithmetic call builds them on first use anyway; calling this at startup moves the
/// one-time cost out of the first split or combine.
pub fn init() {
    lazy_static::initialize(&TABLES);
}

/// Shift-and-add multiplication, only used to bootstrap the tables.
fn mul_no_table(mut a: u8, mut b: u8) -> u8 {
    let mut p = 0u8;
    for _ in 0..8 {
        if b & 1 != 0 {
            p ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= REDUCTION;
        }
        b >>= 1;
    }
    p
}

/// Returns `a + b`.
#[inline]
pub fn add(a: u8, b: u8) -> u8 {
    a ^ b
}

/// Returns `a - b`, which in characteristic 2 is the same as addition.
#[inline]
pub fn sub(a: u8, b: u8) -> u8 {
    a ^ b
}

/// Returns `a * b`.
#[inline]
pub fn mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let t = &*TABLES;
    t.exp[t.log[a as usize] as usize + t.log[b as usize] as usize]
}

/// Returns the multiplicative inverse of `a`, failing for zero.
#[inline]
pub fn inv(a: u8) -> Result<u8> {
    if a == 0 {
        return Err(Error::DivisionByZero);
    }
    let t = &*TABLES;
    Ok(t.exp[255 - t.log[a as usize] as usize])
}

/// Returns `a / b`, failing when `b` is zero.
#[inline]
pub fn div(a: u8, b: u8) -> Result<u8> {
    if b == 0 {
        return Err(Error::DivisionByZero);
    }
    if a == 0 {
        return Ok(0);
    }
    let t = &*TABLES;
    Ok(t.exp[t.log[a as usize] as usize + 255 - t.log[b as usize] as usize])
}

/// An element of GF(2^8) under the AES reduction polynomial.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Gf256(pub u8);

impl Gf256 {
    pub const ZERO: Gf256 = Gf256(0);
    pub const ONE: Gf256 = Gf256(1);

    pub const fn new(value: u8) -> Self {
        Gf256(value)
    }

    pub const fn value(self) -> u8 {
        self.0
    }
}

impl From<u8> for Gf256 {
    fn from(value: u8) -> Self {
        Gf256(value)
    }
}

impl From<Gf256> for u8 {
    fn from(value: Gf256) -> Self {
        value.0
    }
}

impl fmt::Display for Gf256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

impl Add for Gf256 {
    type Output = Gf256;

    fn add(self, rhs: Gf256) -> Gf256 {
        Gf256(add(self.0, rhs.0))
    }
}

impl AddAssign for Gf256 {
    fn add_assign(&mut self, rhs: Gf256) {
        *self = *self + rhs;
    }
}

impl Sub for Gf256 {
    type Output = Gf256;

    fn sub(self, rhs: Gf256) -> Gf256 {
        Gf256(sub(self.0, rhs.0))
    }
}

impl SubAssign for Gf256 {
    fn sub_assign(&mut self, rhs: Gf256) {
        *self = *self - rhs;
    }
}

impl Mul for Gf256 {
    type Output = Gf256;

    fn mul(self, rhs: Gf256) -> Gf256 {
        Gf256(mul(self.0, rhs.0))
    }
}

impl MulAssign for Gf256 {
    fn mul_assign(&mut self, rhs: Gf256) {
        *self = *self * rhs;
    }
}

impl Sum for Gf256 {
    fn sum<I: Iterator<Item = Gf256>>(iter: I) -> Gf256 {
        iter.fold(Gf256::ZERO, |acc, x| acc + x)
    }
}

impl Field for Gf256 {
    const ZERO: Self = Gf256::ZERO;
    const ONE: Self = Gf256::ONE;

    fn invert(self) -> Option<Self> {
        inv(self.0).ok().map(Gf256)
    }

    fn checked_div(self, rhs: Self) -> Option<Self> {
        div(self.0, rhs.0).ok().map(Gf256)
    }
}
