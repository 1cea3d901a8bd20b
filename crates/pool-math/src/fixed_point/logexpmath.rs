//! Natural logarithm, exponential and power over the 18-decimal fixed point
//! representation, evaluated in signed arbitrary precision with 20 internal
//! decimals. All series are truncated below the last internal decimal, so
//! every result is a deterministic integer independent of platform floating
//! point behavior.
//!
//! `exp` splits its argument into a multiple of ln 2 plus a remainder in
//! [0, ln 2) and sums the Taylor series on the remainder; `ln` normalizes its
//! argument into [1, 2) by powers of two and sums the atanh series on the
//! mantissa; `pow` is `exp(y·ln x)`, with whole exponents short-circuited to
//! square-and-multiply so integer powers stay exact.

use {
    crate::error::Error,
    num::{BigInt, ToPrimitive, bigint::Sign},
    primitive_types::U256,
    std::sync::LazyLock,
};

static ONE_18: LazyLock<BigInt> = LazyLock::new(|| BigInt::from(10).pow(18));
static ONE_20: LazyLock<BigInt> = LazyLock::new(|| BigInt::from(10).pow(20));
static ONE_36: LazyLock<BigInt> = LazyLock::new(|| BigInt::from(10).pow(36));

/// ln 2 scaled by 1e20, rounded to nearest.
static LN_2_20: LazyLock<BigInt> = LazyLock::new(|| BigInt::from(69_314_718_055_994_530_942_u128));

/// Bounds on the natural exponent, in 18 decimals. e^130 scaled by 1e18 still
/// fits 256 unsigned bits; e^-41 is the last magnitude that does not round to
/// zero at 18 decimals.
static MAX_NATURAL_EXPONENT: LazyLock<BigInt> =
    LazyLock::new(|| BigInt::from(130) * &*ONE_18);
static MIN_NATURAL_EXPONENT: LazyLock<BigInt> =
    LazyLock::new(|| BigInt::from(-41) * &*ONE_18);

/// `e^x` for a signed 18-decimal `x` within the natural exponent bounds.
pub fn exp(x: &BigInt) -> Result<BigInt, Error> {
    if x < &*MIN_NATURAL_EXPONENT || x > &*MAX_NATURAL_EXPONENT {
        return Err(Error::InvalidExponent);
    }
    if x.sign() == Sign::Minus {
        // e^-x = 1 / e^x, inverted at 36 decimals to keep the floor tight
        let positive = exp(&-x)?;
        return Ok(&*ONE_36 / positive);
    }

    let x20 = x * 100;
    let k: BigInt = &x20 / &*LN_2_20;
    let r = &x20 - &k * &*LN_2_20;

    let mut term = ONE_20.clone();
    let mut sum = ONE_20.clone();
    for n in 1..=40 {
        term = &term * &r / &*ONE_20 / BigInt::from(n);
        if term.sign() == Sign::NoSign {
            break;
        }
        sum += &term;
    }

    // e^x = 2^k · e^r; k ≤ 130 / ln 2
    let k = k.to_usize().ok_or(Error::InvalidExponent)?;
    Ok((sum << k) / 100)
}

/// `ln a` for a strictly positive 18-decimal `a`.
pub fn ln(a: &BigInt) -> Result<BigInt, Error> {
    if a.sign() != Sign::Plus {
        return Err(Error::XOutOfBounds);
    }

    let two_20: BigInt = &*ONE_20 + &*ONE_20;
    let mut mantissa = a * 100;
    let mut exponent = 0i64;
    while mantissa >= two_20 {
        mantissa >>= 1;
        exponent += 1;
    }
    while mantissa < *ONE_20 {
        mantissa <<= 1;
        exponent -= 1;
    }

    // ln m = 2 atanh z = 2 (z + z³/3 + z⁵/5 + …) with z = (m-1)/(m+1) ≤ 1/3
    let z: BigInt = (&mantissa - &*ONE_20) * &*ONE_20 / (&mantissa + &*ONE_20);
    let z_squared = &z * &z / &*ONE_20;
    let mut term = z.clone();
    let mut sum = z;
    let mut n = 3u32;
    while n <= 61 {
        term = &term * &z_squared / &*ONE_20;
        if term.sign() == Sign::NoSign {
            break;
        }
        sum += &term / BigInt::from(n);
        n += 2;
    }

    Ok((BigInt::from(exponent) * &*LN_2_20 + sum * 2) / 100)
}

/// `x^y` for unsigned 18-decimal operands. `pow(0, 0)` is one by
/// convention; a zero base is only defined for whole exponents, where the
/// result is zero.
pub fn pow(x: U256, y: U256) -> Result<U256, Error> {
    if y.is_zero() {
        return Ok(U256::exp10(18));
    }
    if x.is_zero() {
        return if (y % U256::exp10(18)).is_zero() {
            Ok(U256::zero())
        } else {
            Err(Error::XOutOfBounds)
        };
    }

    let base = to_bigint(x);
    let exponent = to_bigint(y);
    let whole = &exponent / &*ONE_18;
    let frac = &exponent % &*ONE_18;
    if frac.sign() == Sign::NoSign && whole <= BigInt::from(512) {
        let n = whole.to_u64().ok_or(Error::YOutOfBounds)?;
        return from_bigint(&pow_whole(&base, n));
    }

    let log = ln(&base)?;
    let arg = &log * &exponent / &*ONE_18;
    if arg < *MIN_NATURAL_EXPONENT || arg > *MAX_NATURAL_EXPONENT {
        return Err(Error::ProductOutOfBounds);
    }
    from_bigint(&exp(&arg)?)
}

fn pow_whole(base: &BigInt, mut n: u64) -> BigInt {
    let mut result = if n % 2 == 1 {
        base.clone()
    } else {
        ONE_18.clone()
    };
    let mut square = base.clone();
    n /= 2;
    while n > 0 {
        square = &square * &square / &*ONE_18;
        if n % 2 == 1 {
            result = &result * &square / &*ONE_18;
        }
        n /= 2;
    }
    result
}

fn to_bigint(value: U256) -> BigInt {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    BigInt::from_bytes_be(Sign::Plus, &bytes)
}

fn from_bigint(value: &BigInt) -> Result<U256, Error> {
    let (sign, bytes) = value.to_bytes_be();
    if sign == Sign::Minus {
        return Err(Error::DivInternal);
    }
    if bytes.len() > 32 {
        return Err(Error::ProductOutOfBounds);
    }
    Ok(U256::from_big_endian(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wei(value: u128) -> BigInt {
        BigInt::from(value)
    }

    fn assert_close(actual: &BigInt, expected: &BigInt, tolerance: u64) {
        let diff = (actual - expected).magnitude().clone();
        assert!(
            diff <= tolerance.into(),
            "{actual} not within {tolerance} of {expected}"
        );
    }

    #[test]
    fn exp_of_zero_is_one() {
        assert_eq!(exp(&BigInt::from(0)).unwrap(), wei(1_000_000_000_000_000_000));
    }

    #[test]
    fn exp_of_one_is_eulers_number() {
        // e = 2.718281828459045235…
        assert_close(
            &exp(&wei(1_000_000_000_000_000_000)).unwrap(),
            &wei(2_718_281_828_459_045_235),
            2,
        );
    }

    #[test]
    fn exp_of_negative_one_is_the_reciprocal() {
        // 1/e = 0.367879441171442321…
        assert_close(
            &exp(&-wei(1_000_000_000_000_000_000)).unwrap(),
            &wei(367_879_441_171_442_321),
            2,
        );
    }

    #[test]
    fn exp_rejects_arguments_outside_the_envelope() {
        assert_eq!(
            exp(&wei(131_000_000_000_000_000_000)).unwrap_err(),
            Error::InvalidExponent
        );
        assert_eq!(
            exp(&-wei(42_000_000_000_000_000_000)).unwrap_err(),
            Error::InvalidExponent
        );
    }

    #[test]
    fn ln_of_one_is_zero() {
        assert_eq!(ln(&wei(1_000_000_000_000_000_000)).unwrap(), BigInt::from(0));
    }

    #[test]
    fn ln_of_two() {
        // ln 2 = 0.693147180559945309…
        assert_eq!(
            ln(&wei(2_000_000_000_000_000_000)).unwrap(),
            wei(693_147_180_559_945_309)
        );
    }

    #[test]
    fn ln_of_eulers_number_is_one() {
        assert_close(
            &ln(&wei(2_718_281_828_459_045_235)).unwrap(),
            &wei(1_000_000_000_000_000_000),
            2,
        );
    }

    #[test]
    fn ln_rejects_non_positive_arguments() {
        assert_eq!(ln(&BigInt::from(0)).unwrap_err(), Error::XOutOfBounds);
        assert_eq!(ln(&BigInt::from(-1)).unwrap_err(), Error::XOutOfBounds);
    }

    #[test]
    fn exp_inverts_ln_across_the_swap_domain() {
        for value in [
            wei(1_000_000_000_000),             // 1e-6
            wei(40_000_000_000_000_000),        // 0.04
            wei(1_000_000_000_000_000_000),     // 1
            wei(4_000_000_000_000_000_000),     // 4
            wei(1_000_000_000_000_000_000_000_000), // 1e6
        ] {
            let round_trip = exp(&ln(&value).unwrap()).unwrap();
            // tolerance of 1e-11 relative, far tighter than the 1e-9 target
            let tolerance = (&value / BigInt::from(100_000_000_000_u64)) + 2;
            let diff = (&round_trip - &value).magnitude().clone();
            assert!(
                BigInt::from(diff) <= tolerance,
                "{round_trip} too far from {value}"
            );
        }
    }

    #[test]
    fn pow_handles_the_trivial_bases_and_exponents() {
        let one = U256::exp10(18);
        assert_eq!(pow(U256::zero(), U256::zero()).unwrap(), one);
        assert_eq!(pow(U256::zero(), one).unwrap(), U256::zero());
        assert_eq!(pow(one, one).unwrap(), one);
        // a zero base under a fractional exponent is out of domain
        assert_eq!(
            pow(U256::zero(), U256::exp10(17) * 5).unwrap_err(),
            Error::XOutOfBounds
        );
    }

    #[test]
    fn whole_powers_are_exact() {
        let two = U256::exp10(18) * 2;
        assert_eq!(pow(two, U256::exp10(18) * 2).unwrap(), U256::exp10(18) * 4);
        assert_eq!(pow(two, U256::exp10(18) * 10).unwrap(), U256::exp10(18) * 1024);
    }

    #[test]
    fn square_root_via_pow() {
        let four = U256::exp10(18) * 4;
        let half = U256::exp10(17) * 5;
        let root = pow(four, half).unwrap();
        let two = U256::exp10(18) * 2;
        let diff = if root > two { root - two } else { two - root };
        assert!(diff <= U256::from(2), "4^0.5 = {root}");
    }

    #[test]
    fn pow_rejects_results_outside_the_representable_range() {
        let two = U256::exp10(18) * 2;
        assert_eq!(
            pow(two, U256::exp10(18) * 300).unwrap_err(),
            Error::ProductOutOfBounds
        );
    }
}
