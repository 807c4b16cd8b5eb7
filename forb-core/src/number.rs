//! Arbitrary precision decimals on dashu
//!
//! Rates, currency amounts and expression arguments all flow through
//! `Number`. It wraps dashu-float's `DBig` (base-10), so values such as
//! `0.1` are exact and transcendentals are available at any precision.

use dashu_float::ops::{Abs, SquareRoot};
use dashu_float::DBig;
use dashu_int::ops::BitTest;
use dashu_int::IBig;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::num::IntErrorKind;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumberError {
    #[error("Invalid number format: {0}")]
    ParseError(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Domain error: {0}")]
    DomainError(String),

    #[error("Overflow: result too large")]
    Overflow,
}

/// Significant decimal digits used unless a caller asks for more
pub const DEFAULT_PRECISION: u32 = 50;

/// Largest decimal exponent accepted when parsing, and the point past which
/// values print in scientific notation instead of positional digits.
pub const MAX_EXPONENT: usize = 4096;

const PI_DIGITS: &str = "3.14159265358979323846264338327950288419716939937510582097494459230781640628620899862803482534211706798214808651328230664709384460955058223172535940812848111745028410270193852110555964462294895493038196442881097566593344612847564823378678316527120190914564856692346034861045432664821339360726024914127372458700660631558817488152092096282925409171536436789259036001133053054882046652138414695194151160943305727036575959195309218611738193261179310511854807446237996274956735188575272489122793818301194912";

/// Arbitrary precision base-10 number. Fallible operations return `Result`.
#[derive(Debug, Clone)]
pub struct Number {
    inner: DBig,
}

impl Number {
    fn working(val: DBig, precision: u32) -> DBig {
        val.with_precision(precision as usize).value()
    }

    fn wrap(val: DBig) -> Self {
        Self { inner: Self::working(val, DEFAULT_PRECISION) }
    }

    /// Like `wrap`, but never rounds away digits that were written out.
    fn wrap_digits(val: DBig, digits: usize) -> Self {
        let precision = (digits as u32).max(DEFAULT_PRECISION);
        Self { inner: Self::working(val, precision) }
    }

    /// Parse a decimal string.
    /// Supports: "123", "-42", "3.14", "1/3", "1.5e10", "602214076e15"
    pub fn from_str(s: &str) -> Result<Self, NumberError> {
        let s = s.trim();
        let parse_err = || NumberError::ParseError(s.to_string());
        let digits = s.chars().filter(char::is_ascii_digit).count();

        if let Some((num, den)) = s.split_once('/') {
            let num: DBig = num.trim().parse().map_err(|_| parse_err())?;
            let den: DBig = den.trim().parse().map_err(|_| parse_err())?;
            if den == DBig::ZERO {
                return Err(NumberError::DivisionByZero);
            }
            return Ok(Self { inner: Self::wrap(num).inner / Self::wrap(den).inner });
        }

        let lower = s.to_ascii_lowercase();
        if let Some((mantissa, exp)) = lower.split_once('e') {
            let exp: isize = exp.parse().map_err(|e: std::num::ParseIntError| match e.kind() {
                IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => NumberError::Overflow,
                _ => parse_err(),
            })?;
            if exp.unsigned_abs() > MAX_EXPONENT {
                return Err(NumberError::Overflow);
            }
            // Integer mantissa with exponent keeps every digit: "602214076e15"
            if !mantissa.contains('.') {
                let mantissa: IBig = mantissa.parse().map_err(|_| parse_err())?;
                return Ok(Self::wrap_digits(DBig::from_parts(mantissa, exp), digits));
            }
        }

        let inner: DBig = s.parse().map_err(|_| parse_err())?;
        Ok(Self::wrap_digits(inner, digits))
    }

    pub fn from_i64(n: i64) -> Self {
        Self::wrap(DBig::from(n))
    }

    /// Exact conversion from a big integer. Precision grows with the digit
    /// count so that large factorials are not rounded.
    pub fn from_ibig(n: IBig) -> Self {
        let digits = n.to_string().trim_start_matches('-').len();
        Self::wrap_digits(DBig::from_parts(n, 0), digits)
    }

    pub fn from_i128(n: i128) -> Self {
        Self::from_ibig(IBig::from(n))
    }

    /// Create from f64. NaN and infinities map to zero.
    pub fn from_f64(f: f64) -> Self {
        if !f.is_finite() {
            return Self::from_i64(0);
        }
        // Shortest round-trip representation keeps 0.1 as 0.1
        Self::from_str(&format!("{:e}", f)).unwrap_or_else(|_| Self::from_i64(0))
    }

    pub fn is_zero(&self) -> bool {
        self.inner == DBig::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.inner < DBig::ZERO
    }

    pub fn is_integer(&self) -> bool {
        self.inner == self.inner.clone().floor()
    }

    pub fn add(&self, other: &Self) -> Self {
        Self { inner: &self.inner + &other.inner }
    }

    pub fn mul(&self, other: &Self) -> Self {
        Self { inner: &self.inner * &other.inner }
    }

    pub fn checked_div(&self, other: &Self) -> Result<Self, NumberError> {
        if other.is_zero() {
            return Err(NumberError::DivisionByZero);
        }
        Ok(Self { inner: &self.inner / &other.inner })
    }

    pub fn abs(&self) -> Self {
        Self { inner: Abs::abs(self.inner.clone()) }
    }

    /// Drop the fractional part, rounding toward zero (`-2.7 → -2`).
    pub fn trunc(&self) -> Self {
        Self { inner: self.inner.clone().trunc() }
    }

    pub fn sqrt(&self, precision: u32) -> Result<Self, NumberError> {
        if self.is_negative() {
            return Err(NumberError::DomainError("square root of negative number".to_string()));
        }
        if self.is_zero() {
            return Ok(Self::from_i64(0));
        }
        Ok(Self { inner: Self::working(self.inner.clone(), precision).sqrt() })
    }

    /// Natural logarithm
    pub fn ln(&self, precision: u32) -> Result<Self, NumberError> {
        if self.inner <= DBig::ZERO {
            return Err(NumberError::DomainError("logarithm of non-positive number".to_string()));
        }
        Ok(Self { inner: Self::working(self.inner.clone(), precision).ln() })
    }

    pub fn log10(&self, precision: u32) -> Result<Self, NumberError> {
        let ln_x = self.ln(precision + 5)?;
        let ln_10 = Self::from_i64(10).ln(precision + 5)?;
        ln_x.checked_div(&ln_10)
    }

    pub fn exp(&self, precision: u32) -> Self {
        Self { inner: Self::working(self.inner.clone(), precision).exp() }
    }

    /// Reduce an angle into [-π, π] so the Taylor series converges quickly.
    fn reduce_angle(&self, precision: u32) -> DBig {
        let x = Self::working(self.inner.clone(), precision + 10);
        let tau = Self::tau(precision + 10).inner;
        let turns = (&x / &tau).round();
        x - turns * tau
    }

    pub fn sin(&self, precision: u32) -> Self {
        let x = self.reduce_angle(precision);
        let x2 = &x * &x;
        let mut term = x.clone();
        let mut sum = x;
        for k in 1..Self::series_terms(precision) {
            term = -&term * &x2 / DBig::from((2 * k) * (2 * k + 1));
            sum = &sum + &term;
        }
        Self::wrap(sum)
    }

    pub fn cos(&self, precision: u32) -> Self {
        let x = self.reduce_angle(precision);
        let x2 = &x * &x;
        let one = Self::working(DBig::ONE, precision + 10);
        let mut term = one.clone();
        let mut sum = one;
        for k in 1..Self::series_terms(precision) {
            term = -&term * &x2 / DBig::from((2 * k - 1) * (2 * k));
            sum = &sum + &term;
        }
        Self::wrap(sum)
    }

    pub fn tan(&self, precision: u32) -> Result<Self, NumberError> {
        let cos_x = self.cos(precision);
        // cos never lands on exact zero in decimal; treat a vanishing value as the pole
        if cos_x.abs().to_f64().map_or(true, |c| c < 1e-30) {
            return Err(NumberError::DomainError("tan undefined at odd multiples of π/2".to_string()));
        }
        self.sin(precision).checked_div(&cos_x)
    }

    fn series_terms(precision: u32) -> i64 {
        (precision / 2).clamp(16, 60) as i64
    }

    pub fn pi(precision: u32) -> Self {
        let end = (precision as usize + 2).min(PI_DIGITS.len());
        Self::from_str(&PI_DIGITS[..end]).unwrap_or_else(|_| Self::from_f64(std::f64::consts::PI))
    }

    pub fn tau(precision: u32) -> Self {
        Self::pi(precision).mul(&Self::from_i64(2))
    }

    pub fn e(precision: u32) -> Self {
        Self::from_i64(1).exp(precision)
    }

    /// Golden ratio φ = (1 + √5) / 2
    pub fn phi(precision: u32) -> Self {
        let sqrt5 = Self::from_i64(5)
            .sqrt(precision + 10)
            .unwrap_or_else(|_| Self::from_f64(5f64.sqrt()));
        Self { inner: (DBig::ONE + sqrt5.inner) / DBig::from(2) }
    }

    /// Decimal exponent of the stored representation
    fn exponent(&self) -> isize {
        self.inner.repr().exponent()
    }

    /// Past `MAX_EXPONENT`, positional rendering would be unbounded.
    fn is_extreme(&self) -> bool {
        !self.is_zero() && self.exponent().unsigned_abs() > MAX_EXPONENT
    }

    /// `d.ddde±x` with every significant digit kept
    fn scientific(&self) -> String {
        let (significand, exponent) = self.inner.clone().into_repr().into_parts();
        let text = significand.to_string();
        let (sign, digits) = match text.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", text.as_str()),
        };
        let digits = digits.trim_end_matches('0');
        let trailing = text.len() - sign.len() - digits.len();
        let power = exponent + trailing as isize + digits.len() as isize - 1;
        let (head, tail) = digits.split_at(1.min(digits.len()));
        if tail.is_empty() {
            format!("{}{}e{}", sign, head, power)
        } else {
            format!("{}{}.{}e{}", sign, head, tail, power)
        }
    }

    /// Exact integer value, if this number has no fractional part and its
    /// digits can be written out.
    pub fn to_ibig(&self) -> Option<IBig> {
        if self.is_extreme() || !self.is_integer() {
            return None;
        }
        let (significand, exponent) = self.inner.clone().into_repr().into_parts();
        let scale = IBig::from(10u8).pow(exponent.unsigned_abs());
        if exponent >= 0 {
            Some(significand * scale)
        } else {
            Some(significand / scale)
        }
    }

    pub fn to_i64(&self) -> Option<i64> {
        self.to_ibig()?.try_into().ok()
    }

    /// Nearest `f64`; lossy
    pub fn to_f64(&self) -> Option<f64> {
        let (significand, exponent) = self.inner.clone().into_repr().into_parts();

        // Keep the top 53 bits of the significand; the rest cannot survive in an f64 anyway
        let shift = significand.bit_len().saturating_sub(53);
        let top: i64 = (&significand >> shift).try_into().ok()?;
        let mantissa = top as f64 * 2f64.powi(shift as i32);

        if exponent.unsigned_abs() > 400 {
            return None;
        }
        let result = mantissa * 10f64.powi(exponent as i32);
        result.is_finite().then_some(result)
    }

    /// Render with a fixed number of decimal places.
    pub fn as_decimal(&self, places: u32) -> String {
        if self.is_extreme() {
            return self.scientific();
        }
        if self.is_integer() {
            if let Some(i) = self.to_ibig() {
                return if places == 0 {
                    i.to_string()
                } else {
                    format!("{}.{}", i, "0".repeat(places as usize))
                };
            }
        }
        match self.to_f64() {
            Some(f) => format!("{:.prec$}", f, prec = places as usize),
            None => self.inner.to_string(),
        }
    }
}

impl std::fmt::Display for Number {
    /// Integers print exactly; fractions print with up to 10 places, trailing zeros trimmed.
    /// Extreme magnitudes print in scientific notation.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_extreme() {
            return write!(f, "{}", self.scientific());
        }
        if let Some(i) = self.to_ibig() {
            return write!(f, "{}", i);
        }
        let s = self.as_decimal(10);
        if s.contains('.') {
            write!(f, "{}", s.trim_end_matches('0').trim_end_matches('.'))
        } else {
            write!(f, "{}", s)
        }
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Int(i64),
            Float(f64),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Text(s) => Self::from_str(&s).map_err(serde::de::Error::custom),
            Repr::Int(i) => Ok(Self::from_i64(i)),
            Repr::Float(f) => Ok(Self::from_f64(f)),
        }
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Self::from_i64(n)
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.inner.partial_cmp(&other.inner).unwrap_or(std::cmp::Ordering::Equal)
    }
}
