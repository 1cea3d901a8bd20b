//! Unsigned fixed point numbers with exactly 18 decimals and explicit
//! rounding direction on every lossy operation. This is the numeric unit all
//! balances and fee fractions are normalized to before any invariant math
//! runs; amounts in native token precision are upscaled into it at the
//! reserve boundary and downscaled back out on the way to the ledger.

pub mod logexpmath;

use {
    crate::error::Error,
    primitive_types::U256,
    serde::{Deserialize, Deserializer, Serialize, Serializer, de},
    std::{
        fmt::{self, Debug, Display, Formatter},
        str::FromStr,
        sync::LazyLock,
    },
    thiserror::Error as ThisError,
};

static ONE_18: LazyLock<U256> = LazyLock::new(|| U256::exp10(18));

/// Upper bound on the relative error of [`logexpmath::pow`], in 1e-18 units.
/// `pow_up` and `pow_down` widen the raw result by this margin so that the
/// rounding direction of the whole expression stays trustworthy.
static MAX_POW_RELATIVE_ERROR: LazyLock<U256> = LazyLock::new(|| U256::from(10_000));

/// An unsigned fixed point number with 18 decimals of precision, stored as
/// its scaled integer representation ("wei").
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Bfp(U256);

impl Bfp {
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    pub fn one() -> Self {
        Self(*ONE_18)
    }

    /// Wraps an already scaled integer amount.
    pub fn from_wei(wei: U256) -> Self {
        Self(wei)
    }

    /// The number `10^exponent`, e.g. `exp10(0)` is one. Scaling factors for
    /// tokens with `d` native decimals are `exp10(18 - d)`.
    pub fn exp10(exponent: usize) -> Self {
        Self(U256::exp10(exponent + 18))
    }

    pub fn as_uint256(self) -> U256 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn add(self, other: Self) -> Result<Self, Error> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(Error::AddOverflow)
    }

    pub fn sub(self, other: Self) -> Result<Self, Error> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(Error::SubOverflow)
    }

    pub fn mul_down(self, other: Self) -> Result<Self, Error> {
        let product = self
            .0
            .checked_mul(other.0)
            .ok_or(Error::MulOverflow)?;
        Ok(Self(product / *ONE_18))
    }

    pub fn mul_up(self, other: Self) -> Result<Self, Error> {
        let product = self
            .0
            .checked_mul(other.0)
            .ok_or(Error::MulOverflow)?;
        if product.is_zero() {
            return Ok(Self::zero());
        }
        Ok(Self((product - 1) / *ONE_18 + 1))
    }

    pub fn div_down(self, other: Self) -> Result<Self, Error> {
        if other.0.is_zero() {
            return Err(Error::ZeroDivision);
        }
        let inflated = self
            .0
            .checked_mul(*ONE_18)
            .ok_or(Error::DivInternal)?;
        Ok(Self(inflated / other.0))
    }

    pub fn div_up(self, other: Self) -> Result<Self, Error> {
        if other.0.is_zero() {
            return Err(Error::ZeroDivision);
        }
        if self.0.is_zero() {
            return Ok(Self::zero());
        }
        let inflated = self
            .0
            .checked_mul(*ONE_18)
            .ok_or(Error::DivInternal)?;
        Ok(Self((inflated - 1) / other.0 + 1))
    }

    /// `max(1 - self, 0)`.
    pub fn complement(self) -> Self {
        if self.0 >= *ONE_18 {
            Self::zero()
        } else {
            Self(*ONE_18 - self.0)
        }
    }

    /// `self^exponent`, rounded down past the worst-case relative error of
    /// the underlying power approximation.
    pub fn pow_down(self, exponent: Self) -> Result<Self, Error> {
        let raw = Self(logexpmath::pow(self.0, exponent.0)?);
        let max_error = raw.mul_up(Self(*MAX_POW_RELATIVE_ERROR))?.add(Self(U256::one()))?;
        if raw < max_error {
            Ok(Self::zero())
        } else {
            raw.sub(max_error)
        }
    }

    /// `self^exponent`, rounded up past the worst-case relative error of the
    /// underlying power approximation.
    pub fn pow_up(self, exponent: Self) -> Result<Self, Error> {
        let raw = Self(logexpmath::pow(self.0, exponent.0)?);
        let max_error = raw.mul_up(Self(*MAX_POW_RELATIVE_ERROR))?.add(Self(U256::one()))?;
        raw.add(max_error)
    }
}

/// Shorthand for specifying a fixed point number as a decimal literal,
/// panicking on malformed input. Intended for constants and tests.
#[macro_export]
macro_rules! bfp {
    ($x:expr) => {
        $x.parse::<$crate::fixed_point::Bfp>().unwrap()
    };
}

#[derive(Debug, ThisError)]
#[error("invalid 18-decimal fixed point literal")]
pub struct ParseBfpError;

impl FromStr for Bfp {
    type Err = ParseBfpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (integer, fraction) = match s.split_once('.') {
            Some((integer, fraction)) => (integer, fraction),
            None => (s, ""),
        };
        if integer.is_empty() || fraction.len() > 18 || fraction.contains(|c: char| !c.is_ascii_digit())
        {
            return Err(ParseBfpError);
        }
        let integer = U256::from_dec_str(integer).map_err(|_| ParseBfpError)?;
        let mut padded = fraction.to_owned();
        padded.push_str(&"0".repeat(18 - fraction.len()));
        let fraction = U256::from_dec_str(&padded).map_err(|_| ParseBfpError)?;
        integer
            .checked_mul(*ONE_18)
            .and_then(|scaled| scaled.checked_add(fraction))
            .map(Bfp)
            .ok_or(ParseBfpError)
    }
}

impl Display for Bfp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}.{:018}", self.0 / *ONE_18, (self.0 % *ONE_18).low_u64())
    }
}

impl Debug for Bfp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Bfp({self})")
    }
}

impl Serialize for Bfp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Bfp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = String::deserialize(deserializer)?;
        repr.parse().map_err(de::Error::custom)
    }
}
