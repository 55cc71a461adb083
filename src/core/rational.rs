//! Exact Rational Arithmetic
//! =========================
//!
//! Fraction type used by the flow solver:
//! - Always stored in lowest terms with the sign on the numerator
//! - Denominator 0 encodes +infinity (1/0), -infinity (-1/0) and NaN (0/0)
//! - Infinities dominate finite values, NaN absorbs everything
//! - Checked operations report overflow instead of wrapping
//!
//! The operator impls (`+ - * /`) collapse an overflow into NaN so the value
//! stays well-formed; the simplex tableau uses the `checked_*` variants.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Canonical fraction `num / den`
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct Rational {
    num: i64,
    den: i64,
}

fn gcd(mut m: i128, mut n: i128) -> i128 {
    m = m.abs();
    n = n.abs();
    while n > 0 {
        let r = m % n;
        m = n;
        n = r;
    }
    m
}

impl Rational {
    pub const ZERO: Rational = Rational { num: 0, den: 1 };
    pub const ONE: Rational = Rational { num: 1, den: 1 };
    pub const INFINITY: Rational = Rational { num: 1, den: 0 };
    pub const NEG_INFINITY: Rational = Rational { num: -1, den: 0 };
    pub const NAN: Rational = Rational { num: 0, den: 0 };

    /// Build `num / den` and normalize it
    pub fn new(num: i64, den: i64) -> Self {
        Self::from_wide(num as i128, den as i128).unwrap_or(Self::NAN)
    }

    pub fn from_integer(n: i64) -> Self {
        Self { num: n, den: 1 }
    }

    /// Canonicalize a wide fraction, `None` if the reduced form does not fit
    fn from_wide(num: i128, den: i128) -> Option<Self> {
        if den == 0 {
            return Some(Self {
                num: num.signum() as i64,
                den: 0,
            });
        }
        if num == 0 {
            return Some(Self::ZERO);
        }
        let sign = num.signum() * den.signum();
        let d = gcd(num, den);
        let num = sign * (num.abs() / d);
        let den = den.abs() / d;
        Some(Self {
            num: i64::try_from(num).ok()?,
            den: i64::try_from(den).ok()?,
        })
    }

    pub fn numer(&self) -> i64 {
        self.num
    }

    pub fn denom(&self) -> i64 {
        self.den
    }

    pub fn is_nan(&self) -> bool {
        self.den == 0 && self.num == 0
    }

    pub fn is_infinite(&self) -> bool {
        self.den == 0 && self.num != 0
    }

    pub fn is_finite(&self) -> bool {
        self.den != 0
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0 && self.den == 1
    }

    /// Sign of the value; NaN reports 0
    pub fn signum(&self) -> i64 {
        self.num.signum()
    }

    pub fn checked_add(&self, other: &Rational) -> Option<Rational> {
        self.add_signed(other, 1)
    }

    pub fn checked_sub(&self, other: &Rational) -> Option<Rational> {
        self.add_signed(other, -1)
    }

    fn add_signed(&self, other: &Rational, sign: i128) -> Option<Rational> {
        let (a, b) = (self.num as i128, self.den as i128);
        let (c, d) = (sign * other.num as i128, other.den as i128);
        if b == 0 || d == 0 {
            if b == 0 && d == 0 {
                if a == 0 || c == 0 {
                    return Some(Self::NAN);
                }
                return Self::from_wide(a + c, 0);
            }
            return Self::from_wide(a * d + b * c, 0);
        }
        let g = gcd(b, d);
        let (bs, ds) = (b / g, d / g);
        let num = a.checked_mul(ds)?.checked_add(c.checked_mul(bs)?)?;
        let den = b.checked_mul(ds)?;
        Self::from_wide(num, den)
    }

    pub fn checked_mul(&self, other: &Rational) -> Option<Rational> {
        let num = (self.num as i128).checked_mul(other.num as i128)?;
        let den = (self.den as i128).checked_mul(other.den as i128)?;
        Self::from_wide(num, den)
    }

    pub fn checked_div(&self, other: &Rational) -> Option<Rational> {
        let num = (self.num as i128).checked_mul(other.den as i128)?;
        let den = (self.den as i128).checked_mul(other.num as i128)?;
        Self::from_wide(num, den)
    }

    /// Largest integer not above the value; `None` for NaN and infinities
    pub fn floor(&self) -> Option<i64> {
        if !self.is_finite() {
            return None;
        }
        Some(self.num.div_euclid(self.den))
    }

    pub fn to_f64(&self) -> f64 {
        match (self.num, self.den) {
            (0, 0) => f64::NAN,
            (n, 0) if n > 0 => f64::INFINITY,
            (_, 0) => f64::NEG_INFINITY,
            (n, d) => n as f64 / d as f64,
        }
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<i64> for Rational {
    fn from(n: i64) -> Self {
        Self::from_integer(n)
    }
}

impl From<i32> for Rational {
    fn from(n: i32) -> Self {
        Self::from_integer(n as i64)
    }
}

impl PartialEq for Rational {
    fn eq(&self, other: &Self) -> bool {
        !self.is_nan() && !other.is_nan() && self.num == other.num && self.den == other.den
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.is_nan() || other.is_nan() {
            return None;
        }
        if self.den == 0 && other.den == 0 {
            return Some(self.num.cmp(&other.num));
        }
        let lhs = self.num as i128 * other.den as i128;
        let rhs = self.den as i128 * other.num as i128;
        Some(lhs.cmp(&rhs))
    }
}

impl PartialEq<i64> for Rational {
    fn eq(&self, other: &i64) -> bool {
        self.den == 1 && self.num == *other
    }
}

impl PartialOrd<i64> for Rational {
    fn partial_cmp(&self, other: &i64) -> Option<Ordering> {
        self.partial_cmp(&Rational::from_integer(*other))
    }
}

impl Neg for Rational {
    type Output = Rational;

    fn neg(self) -> Rational {
        self.num.checked_neg().map_or(Rational::NAN, |num| Rational {
            num,
            den: self.den,
        })
    }
}

impl Add for Rational {
    type Output = Rational;

    fn add(self, rhs: Rational) -> Rational {
        self.checked_add(&rhs).unwrap_or(Rational::NAN)
    }
}

impl Sub for Rational {
    type Output = Rational;

    fn sub(self, rhs: Rational) -> Rational {
        self.checked_sub(&rhs).unwrap_or(Rational::NAN)
    }
}

impl Mul for Rational {
    type Output = Rational;

    fn mul(self, rhs: Rational) -> Rational {
        self.checked_mul(&rhs).unwrap_or(Rational::NAN)
    }
}

impl Div for Rational {
    type Output = Rational;

    fn div(self, rhs: Rational) -> Rational {
        self.checked_div(&rhs).unwrap_or(Rational::NAN)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.num, self.den) {
            (0, 0) => write!(f, "NaN"),
            (n, 0) if n > 0 => write!(f, "+inf"),
            (_, 0) => write!(f, "-inf"),
            (n, 1) => write!(f, "{}", n),
            (n, d) => write!(f, "{}/{}", n, d),
        }
    }
}
