//! Pure calculations for weighted constant-value pools.
//!
//! Every function works on balances already upscaled to 18-decimal fixed
//! point and preserves the weighted geometric invariant `Π balanceᵢ^wᵢ` up
//! to the explicitly charged fee. Rounding directions always favor the pool:
//! amounts paid out are rounded down, amounts charged are rounded up.
//!
//! Single-sided join/exit calculations take the token's denormalized weight
//! together with the pool's total weight, so they stay correct for pools
//! holding more than two tokens.

use {
    crate::{bfp, error::Error, fixed_point::Bfp},
    primitive_types::U256,
    std::sync::LazyLock,
};

/// No swap may take in more than half of a reserve's balance in one call.
pub static MAX_IN_RATIO: LazyLock<Bfp> = LazyLock::new(|| bfp!("0.5"));

/// No swap may pay out more than a third of a reserve's balance in one call.
pub static MAX_OUT_RATIO: LazyLock<Bfp> =
    LazyLock::new(|| Bfp::from_wei(U256::exp10(18) / 3 + 1));

/// Instantaneous price of the in-token denominated in the out-token,
/// including the swap fee markup.
pub fn calc_spot_price(
    balance_in: Bfp,
    weight_in: Bfp,
    balance_out: Bfp,
    weight_out: Bfp,
    swap_fee: Bfp,
) -> Result<Bfp, Error> {
    let numerator = balance_in.div_down(weight_in)?;
    let denominator = balance_out.div_down(weight_out)?;
    let ratio = numerator.div_down(denominator)?;
    let scale = Bfp::one().div_up(swap_fee.complement())?;
    ratio.mul_down(scale)
}

/// Output amount for an exact input, with the swap fee discounted from the
/// input before it feeds the invariant.
pub fn calc_out_given_in(
    balance_in: Bfp,
    weight_in: Bfp,
    balance_out: Bfp,
    weight_out: Bfp,
    amount_in: Bfp,
    swap_fee: Bfp,
) -> Result<Bfp, Error> {
    if amount_in > balance_in.mul_down(*MAX_IN_RATIO)? {
        return Err(Error::MaxInRatio);
    }
    let amount_in_less_fee = amount_in.mul_down(swap_fee.complement())?;
    let denominator = balance_in.add(amount_in_less_fee)?;
    let base = balance_in.div_up(denominator)?;
    let exponent = weight_in.div_down(weight_out)?;
    let power = base.pow_up(exponent)?;
    balance_out.mul_down(power.complement())
}

/// Input amount for an exact output, grossed up by the swap fee.
pub fn calc_in_given_out(
    balance_in: Bfp,
    weight_in: Bfp,
    balance_out: Bfp,
    weight_out: Bfp,
    amount_out: Bfp,
    swap_fee: Bfp,
) -> Result<Bfp, Error> {
    if amount_out > balance_out.mul_down(*MAX_OUT_RATIO)? {
        return Err(Error::MaxOutRatio);
    }
    let base = balance_out.div_up(balance_out.sub(amount_out)?)?;
    let exponent = weight_out.div_up(weight_in)?;
    let power = base.pow_up(exponent)?;
    let ratio = power.sub(Bfp::one())?;
    let amount_in_less_fee = balance_in.mul_up(ratio)?;
    amount_in_less_fee.div_up(swap_fee.complement())
}

/// Shares minted for an exact single-token deposit. The swap fee applies
/// only to the portion of the deposit that is not covered by the token's
/// normalized weight.
pub fn calc_pool_out_given_single_in(
    balance_in: Bfp,
    weight_in: Bfp,
    pool_supply: Bfp,
    total_weight: Bfp,
    amount_in: Bfp,
    swap_fee: Bfp,
) -> Result<Bfp, Error> {
    if amount_in > balance_in.mul_down(*MAX_IN_RATIO)? {
        return Err(Error::MaxInRatio);
    }
    let normalized_weight = weight_in.div_down(total_weight)?;
    let fee_on_surplus = normalized_weight.complement().mul_down(swap_fee)?;
    let amount_in_less_fee = amount_in.mul_down(fee_on_surplus.complement())?;
    let balance_ratio = balance_in.add(amount_in_less_fee)?.div_down(balance_in)?;
    let share_ratio = balance_ratio.pow_down(normalized_weight)?;
    let new_supply = share_ratio.mul_down(pool_supply)?;
    new_supply.sub(pool_supply)
}

/// Single-token deposit required to mint an exact number of shares.
pub fn calc_single_in_given_pool_out(
    balance_in: Bfp,
    weight_in: Bfp,
    pool_supply: Bfp,
    total_weight: Bfp,
    shares_out: Bfp,
    swap_fee: Bfp,
) -> Result<Bfp, Error> {
    let normalized_weight = weight_in.div_down(total_weight)?;
    let new_supply = pool_supply.add(shares_out)?;
    let share_ratio = new_supply.div_up(pool_supply)?;
    let balance_ratio = share_ratio.pow_up(Bfp::one().div_up(normalized_weight)?)?;
    let new_balance = balance_in.mul_up(balance_ratio)?;
    let amount_in_less_fee = new_balance.sub(balance_in)?;
    let fee_on_surplus = normalized_weight.complement().mul_down(swap_fee)?;
    let amount_in = amount_in_less_fee.div_up(fee_on_surplus.complement())?;
    if amount_in > balance_in.mul_down(*MAX_IN_RATIO)? {
        return Err(Error::MaxInRatio);
    }
    Ok(amount_in)
}

/// Single-token withdrawal paid for an exact number of shares burned.
pub fn calc_single_out_given_pool_in(
    balance_out: Bfp,
    weight_out: Bfp,
    pool_supply: Bfp,
    total_weight: Bfp,
    shares_in: Bfp,
    swap_fee: Bfp,
) -> Result<Bfp, Error> {
    let normalized_weight = weight_out.div_down(total_weight)?;
    let new_supply = pool_supply.sub(shares_in)?;
    let share_ratio = new_supply.div_up(pool_supply)?;
    let balance_ratio = share_ratio.pow_up(Bfp::one().div_down(normalized_weight)?)?;
    let new_balance = balance_out.mul_up(balance_ratio)?;
    let amount_out_before_fee = balance_out.sub(new_balance)?;
    let fee_on_surplus = normalized_weight.complement().mul_up(swap_fee)?;
    let amount_out = amount_out_before_fee.mul_down(fee_on_surplus.complement())?;
    if amount_out > balance_out.mul_down(*MAX_OUT_RATIO)? {
        return Err(Error::MaxOutRatio);
    }
    Ok(amount_out)
}

/// Shares to burn for an exact single-token withdrawal.
pub fn calc_pool_in_given_single_out(
    balance_out: Bfp,
    weight_out: Bfp,
    pool_supply: Bfp,
    total_weight: Bfp,
    amount_out: Bfp,
    swap_fee: Bfp,
) -> Result<Bfp, Error> {
    if amount_out > balance_out.mul_down(*MAX_OUT_RATIO)? {
        return Err(Error::MaxOutRatio);
    }
    let normalized_weight = weight_out.div_down(total_weight)?;
    let fee_on_surplus = normalized_weight.complement().mul_up(swap_fee)?;
    let amount_out_before_fee = amount_out.div_up(fee_on_surplus.complement())?;
    let balance_ratio = balance_out.sub(amount_out_before_fee)?.div_down(balance_out)?;
    let share_ratio = balance_ratio.pow_down(normalized_weight)?;
    let new_supply = share_ratio.mul_down(pool_supply)?;
    pool_supply.sub(new_supply)
}

/// The weighted geometric invariant `Π balanceᵢ^(wᵢ/Σw)`.
pub fn calc_invariant(reserves: &[(Bfp, Bfp)], total_weight: Bfp) -> Result<Bfp, Error> {
    let mut invariant = Bfp::one();
    for (balance, weight) in reserves {
        let normalized_weight = weight.div_down(total_weight)?;
        invariant = invariant.mul_down(balance.pow_down(normalized_weight)?)?;
    }
    Ok(invariant)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(actual: Bfp, expected: Bfp, tolerance: Bfp) {
        let diff = if actual > expected {
            actual.sub(expected).unwrap()
        } else {
            expected.sub(actual).unwrap()
        };
        assert!(diff <= tolerance, "{actual:?} not within {tolerance:?} of {expected:?}");
    }

    #[test]
    fn spot_price_of_a_balanced_pool_is_the_fee_markup() {
        let price = calc_spot_price(bfp!("2000"), bfp!("5"), bfp!("2000"), bfp!("5"), Bfp::zero())
            .unwrap();
        assert_eq!(price, Bfp::one());

        let price = calc_spot_price(bfp!("2000"), bfp!("5"), bfp!("2000"), bfp!("5"), bfp!("0.001"))
            .unwrap();
        assert_eq!(price, bfp!("1.001001001001001002"));
    }

    #[test]
    fn swap_output_on_a_balanced_pool() {
        // 2000/2000 reserves, equal weights, 0.1% fee, 10 in: the invariant
        // bounds the output at 2000·(1 − 2000/2009.99) ≈ 9.94035
        let out = calc_out_given_in(
            bfp!("2000"),
            bfp!("5"),
            bfp!("2000"),
            bfp!("5"),
            bfp!("10"),
            bfp!("0.001"),
        )
        .unwrap();
        assert!(out < bfp!("10"));
        assert!(out > bfp!("9.94"));
        assert!(out < bfp!("9.941"));
    }

    #[test]
    fn swap_output_without_fee_tracks_the_invariant_exactly() {
        // 2000·10/2010 = 9.950248756…
        let out = calc_out_given_in(
            bfp!("2000"),
            bfp!("5"),
            bfp!("2000"),
            bfp!("5"),
            bfp!("10"),
            Bfp::zero(),
        )
        .unwrap();
        assert!(out > bfp!("9.9502"));
        assert!(out < bfp!("9.9503"));
    }

    #[test]
    fn swap_directions_round_trip() {
        let out = calc_out_given_in(
            bfp!("100"),
            bfp!("5"),
            bfp!("100"),
            bfp!("5"),
            bfp!("10"),
            Bfp::zero(),
        )
        .unwrap();
        let back = calc_in_given_out(
            bfp!("100"),
            bfp!("5"),
            bfp!("100"),
            bfp!("5"),
            out,
            Bfp::zero(),
        )
        .unwrap();
        assert_approx(back, bfp!("10"), bfp!("0.00000000001"));
    }

    #[test]
    fn swaps_never_decrease_the_invariant() {
        let total_weight = bfp!("10");
        let before = calc_invariant(&[(bfp!("1000"), bfp!("7")), (bfp!("5000"), bfp!("3"))], total_weight)
            .unwrap();
        let out = calc_out_given_in(
            bfp!("1000"),
            bfp!("7"),
            bfp!("5000"),
            bfp!("3"),
            bfp!("100"),
            bfp!("0.003"),
        )
        .unwrap();
        let after = calc_invariant(
            &[
                (bfp!("1100"), bfp!("7")),
                (bfp!("5000").sub(out).unwrap(), bfp!("3")),
            ],
            total_weight,
        )
        .unwrap();
        assert!(after >= before, "{after:?} < {before:?}");
    }

    #[test]
    fn ratio_guards_reject_oversized_swaps() {
        assert_eq!(
            calc_out_given_in(
                bfp!("1000"),
                bfp!("5"),
                bfp!("1000"),
                bfp!("5"),
                bfp!("501"),
                Bfp::zero(),
            )
            .unwrap_err(),
            Error::MaxInRatio
        );
        assert_eq!(
            calc_in_given_out(
                bfp!("1000"),
                bfp!("5"),
                bfp!("1000"),
                bfp!("5"),
                bfp!("334"),
                Bfp::zero(),
            )
            .unwrap_err(),
            Error::MaxOutRatio
        );
    }

    #[test]
    fn single_sided_join_directions_round_trip() {
        let shares = calc_pool_out_given_single_in(
            bfp!("2000"),
            bfp!("5"),
            bfp!("100"),
            bfp!("10"),
            bfp!("100"),
            bfp!("0.001"),
        )
        .unwrap();
        assert!(!shares.is_zero());
        let amount_in = calc_single_in_given_pool_out(
            bfp!("2000"),
            bfp!("5"),
            bfp!("100"),
            bfp!("10"),
            shares,
            bfp!("0.001"),
        )
        .unwrap();
        assert_approx(amount_in, bfp!("100"), bfp!("0.0000001"));
    }

    #[test]
    fn single_sided_exit_directions_round_trip() {
        let amount_out = calc_single_out_given_pool_in(
            bfp!("2000"),
            bfp!("5"),
            bfp!("100"),
            bfp!("10"),
            bfp!("1"),
            bfp!("0.001"),
        )
        .unwrap();
        assert!(!amount_out.is_zero());
        let shares_in = calc_pool_in_given_single_out(
            bfp!("2000"),
            bfp!("5"),
            bfp!("100"),
            bfp!("10"),
            amount_out,
            bfp!("0.001"),
        )
        .unwrap();
        assert_approx(shares_in, bfp!("1"), bfp!("0.0000001"));
    }

    #[test]
    fn single_sided_join_charges_the_fee_on_the_surplus_only() {
        // joining 100 into a 50%-weight reserve is half proportional, so the
        // minted shares must sit between the all-fee and no-fee bounds
        let no_fee = calc_pool_out_given_single_in(
            bfp!("2000"),
            bfp!("5"),
            bfp!("100"),
            bfp!("10"),
            bfp!("100"),
            Bfp::zero(),
        )
        .unwrap();
        let with_fee = calc_pool_out_given_single_in(
            bfp!("2000"),
            bfp!("5"),
            bfp!("100"),
            bfp!("10"),
            bfp!("100"),
            bfp!("0.01"),
        )
        .unwrap();
        let full_fee_in = bfp!("100").mul_down(bfp!("0.99")).unwrap();
        let all_fee = calc_pool_out_given_single_in(
            bfp!("2000"),
            bfp!("5"),
            bfp!("100"),
            bfp!("10"),
            full_fee_in,
            Bfp::zero(),
        )
        .unwrap();
        assert!(with_fee < no_fee);
        assert!(with_fee > all_fee);
    }
}
