//! The weighted pool state machine and its operations.
//!
//! A pool starts unbound, accepts tokens one at a time while binding, and
//! only serves swaps and liquidity operations once finalized. Binding is a
//! deployment-time affair: there is no way back out of the finalized stage
//! and no re-weighting after it.
//!
//! Reserve balances are tracked in native token units and upscaled to the
//! engine's 18-decimal fixed point at the boundary of every calculation.
//! Accrued protocol and market fees sit in pool custody but outside the
//! reserve balances, so at any point
//! `custody == reserve balance + accrued protocol + accrued market` per
//! token. Every operation validates and computes first and mutates last;
//! a failed operation leaves no partial state behind.

use {
    crate::{
        error::Error,
        fees::{FeeClass, FeeConfig, FeeLedger},
        ledger::{ExemptionList, ValueLedger},
    },
    pool_math::{Bfp, bfp, weighted_math},
    primitive_types::{H160, U256},
    serde::{Deserialize, Serialize},
    std::{collections::BTreeMap, sync::LazyLock},
    tracing::debug,
};

pub const MIN_BOUND_TOKENS: usize = 2;
pub const MAX_BOUND_TOKENS: usize = 8;

static MIN_WEIGHT: LazyLock<Bfp> = LazyLock::new(|| bfp!("1"));
static MAX_WEIGHT: LazyLock<Bfp> = LazyLock::new(|| bfp!("50"));
static MAX_TOTAL_WEIGHT: LazyLock<Bfp> = LazyLock::new(|| bfp!("50"));
static MIN_SWAP_FEE: LazyLock<Bfp> = LazyLock::new(|| bfp!("0.000001"));
static MAX_SWAP_FEE: LazyLock<Bfp> = LazyLock::new(|| bfp!("0.1"));
static MIN_BALANCE: LazyLock<Bfp> = LazyLock::new(|| bfp!("0.000001"));

/// Shares minted to the controller when a pool is finalized.
static INITIAL_SHARE_SUPPLY: LazyLock<U256> = LazyLock::new(|| U256::exp10(20));

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Ledger account holding the pool's token custody.
    pub address: H160,
    /// The only account allowed to bind tokens and finalize.
    pub controller: H160,
    pub fees: FeeConfig,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Unbound,
    Binding,
    Finalized,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reserve {
    balance: U256,
    denorm: Bfp,
    scaling_factor: Bfp,
}

impl Reserve {
    /// Balance in native token units, excluding accrued fees in custody.
    pub fn balance(&self) -> U256 {
        self.balance
    }

    pub fn denorm(&self) -> Bfp {
        self.denorm
    }

    fn upscaled_balance(&self) -> Result<Bfp, Error> {
        self.upscale(self.balance)
    }

    fn upscale(&self, amount: U256) -> Result<Bfp, Error> {
        Ok(Bfp::from_wei(amount).mul_down(self.scaling_factor)?)
    }

    fn downscale_down(&self, amount: Bfp) -> Result<U256, Error> {
        Ok(amount.div_down(self.scaling_factor)?.as_uint256())
    }

    fn downscale_up(&self, amount: Bfp) -> Result<U256, Error> {
        Ok(amount.div_up(self.scaling_factor)?.as_uint256())
    }
}

fn scaling_factor(decimals: u8) -> Result<Bfp, Error> {
    let exponent = 18_usize
        .checked_sub(usize::from(decimals))
        .ok_or(Error::UnsupportedDecimals)?;
    Ok(Bfp::exp10(exponent))
}

/// Result of one swap leg: the counterpart amount (out for exact-in, in for
/// exact-out) and the fees deducted from the trader, all in native units of
/// the respective token.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SwapOutcome {
    pub amount: U256,
    pub protocol_fee: U256,
    pub market_fee: U256,
}

pub struct Pool {
    config: PoolConfig,
    stage: Stage,
    reserves: BTreeMap<H160, Reserve>,
    tokens: Vec<H160>,
    total_weight: Bfp,
    shares: BTreeMap<H160, U256>,
    total_shares: U256,
    fees: FeeLedger,
}

impl Pool {
    pub fn new(config: PoolConfig) -> Result<Self, Error> {
        if config.fees.swap_fee < *MIN_SWAP_FEE || config.fees.swap_fee > *MAX_SWAP_FEE {
            return Err(Error::InvalidSwapFee);
        }
        if config.fees.protocol_fee.add(config.fees.market_fee)? >= Bfp::one() {
            return Err(Error::FeeAboveMax);
        }
        Ok(Self {
            config,
            stage: Stage::Unbound,
            reserves: BTreeMap::new(),
            tokens: Vec::new(),
            total_weight: Bfp::zero(),
            shares: BTreeMap::new(),
            total_shares: U256::zero(),
            fees: FeeLedger::default(),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Bound tokens in bind order; per-token bounds arrays follow it.
    pub fn tokens(&self) -> &[H160] {
        &self.tokens
    }

    pub fn total_weight(&self) -> Bfp {
        self.total_weight
    }

    pub fn total_shares(&self) -> U256 {
        self.total_shares
    }

    pub fn share_balance_of(&self, account: H160) -> U256 {
        self.shares.get(&account).copied().unwrap_or_default()
    }

    pub fn balance(&self, token: H160) -> Result<U256, Error> {
        Ok(self.reserve(token)?.balance)
    }

    pub fn reserve(&self, token: H160) -> Result<&Reserve, Error> {
        self.reserves.get(&token).ok_or(Error::NotBound)
    }

    fn reserve_mut(&mut self, token: H160) -> Result<&mut Reserve, Error> {
        self.reserves.get_mut(&token).ok_or(Error::NotBound)
    }

    pub fn accrued_fees(&self, token: H160, class: FeeClass) -> U256 {
        self.fees.accrued(token, class)
    }

    /// Registers a token during deployment, pulling the initial balance from
    /// `source` into pool custody.
    #[allow(clippy::too_many_arguments)]
    pub fn bind(
        &mut self,
        caller: H160,
        source: H160,
        token: H160,
        amount: U256,
        denorm: Bfp,
        decimals: u8,
        ledger: &dyn ValueLedger,
    ) -> Result<(), Error> {
        if caller != self.config.controller {
            return Err(Error::NotController);
        }
        if self.stage == Stage::Finalized {
            return Err(Error::AlreadyFinalized);
        }
        if self.reserves.contains_key(&token) {
            return Err(Error::AlreadyBound);
        }
        if self.reserves.len() >= MAX_BOUND_TOKENS {
            return Err(Error::MaxTokens);
        }
        if denorm < *MIN_WEIGHT {
            return Err(Error::MinWeight);
        }
        if denorm > *MAX_WEIGHT {
            return Err(Error::MaxWeight);
        }
        let total_weight = self.total_weight.add(denorm)?;
        if total_weight > *MAX_TOTAL_WEIGHT {
            return Err(Error::MaxTotalWeight);
        }
        let reserve = Reserve {
            balance: amount,
            denorm,
            scaling_factor: scaling_factor(decimals)?,
        };
        if reserve.upscaled_balance()? < *MIN_BALANCE {
            return Err(Error::MinBalance);
        }

        ledger.transfer(token, source, self.config.address, amount)?;
        self.total_weight = total_weight;
        self.reserves.insert(token, reserve);
        self.tokens.push(token);
        self.stage = Stage::Binding;
        debug!(?token, %amount, weight = ?denorm, "token bound");
        Ok(())
    }

    /// Closes the binding stage and mints the initial share supply to the
    /// controller. Irreversible.
    pub fn finalize(&mut self, caller: H160) -> Result<(), Error> {
        if caller != self.config.controller {
            return Err(Error::NotController);
        }
        if self.stage == Stage::Finalized {
            return Err(Error::AlreadyFinalized);
        }
        if self.reserves.len() < MIN_BOUND_TOKENS {
            return Err(Error::MinTokens);
        }
        self.stage = Stage::Finalized;
        self.mint(caller, *INITIAL_SHARE_SUPPLY);
        debug!(pool = ?self.config.address, "pool finalized");
        Ok(())
    }

    /// Instantaneous in-token price denominated in the out-token, including
    /// the swap fee markup.
    pub fn spot_price(&self, token_in: H160, token_out: H160) -> Result<Bfp, Error> {
        let reserve_in = self.reserve(token_in)?;
        let reserve_out = self.reserve(token_out)?;
        Ok(weighted_math::calc_spot_price(
            reserve_in.upscaled_balance()?,
            reserve_in.denorm,
            reserve_out.upscaled_balance()?,
            reserve_out.denorm,
            self.config.fees.swap_fee,
        )?)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn swap_exact_amount_in(
        &mut self,
        caller: H160,
        token_in: H160,
        amount_in: U256,
        token_out: H160,
        min_amount_out: U256,
        max_price: Bfp,
        ledger: &dyn ValueLedger,
        exemptions: &dyn ExemptionList,
    ) -> Result<SwapOutcome, Error> {
        self.ensure_finalized()?;
        if token_in == token_out {
            return Err(Error::IdenticalTokens);
        }
        let reserve_in = self.reserve(token_in)?.clone();
        let reserve_out = self.reserve(token_out)?.clone();
        let swap_fee = self.config.fees.swap_fee;

        let gross = reserve_in.upscale(amount_in)?;
        let (protocol_fee, market_fee) = self.fee_fractions(token_in, exemptions)?;
        let protocol_amount = gross.mul_down(protocol_fee)?;
        let market_amount = gross.mul_down(market_fee)?;
        let net_in = gross.sub(protocol_amount)?.sub(market_amount)?;

        let balance_in = reserve_in.upscaled_balance()?;
        let balance_out = reserve_out.upscaled_balance()?;
        let spot_before = weighted_math::calc_spot_price(
            balance_in,
            reserve_in.denorm,
            balance_out,
            reserve_out.denorm,
            swap_fee,
        )?;
        if spot_before > max_price {
            return Err(Error::LimitPrice);
        }

        let amount_out = weighted_math::calc_out_given_in(
            balance_in,
            reserve_in.denorm,
            balance_out,
            reserve_out.denorm,
            net_in,
            swap_fee,
        )?;
        let amount_out_native = reserve_out.downscale_down(amount_out)?;
        if amount_out_native < min_amount_out {
            return Err(Error::LimitOut);
        }
        if amount_out_native.is_zero() {
            return Err(Error::NegligibleAmount);
        }

        let protocol_native = reserve_in.downscale_down(protocol_amount)?;
        let market_native = reserve_in.downscale_down(market_amount)?;
        let invariant_in_native = amount_in
            .checked_sub(protocol_native.saturating_add(market_native))
            .ok_or(Error::Math(pool_math::Error::SubOverflow))?;

        self.check_post_swap_price(
            &reserve_in,
            invariant_in_native,
            &reserve_out,
            amount_out_native,
            spot_before,
            max_price,
            gross,
            amount_out,
        )?;

        ledger.transfer(token_in, caller, self.config.address, amount_in)?;
        ledger.transfer(token_out, self.config.address, caller, amount_out_native)?;

        let swap_fee_native = reserve_in.downscale_down(gross.mul_down(swap_fee)?)?;
        self.fees.record_swap_fee(token_in, swap_fee_native);
        self.fees.record_fees(token_in, protocol_native, market_native);
        self.reserve_mut(token_in)?.balance = reserve_in.balance.saturating_add(invariant_in_native);
        self.reserve_mut(token_out)?.balance = reserve_out.balance.saturating_sub(amount_out_native);

        debug!(
            ?token_in, ?token_out, %amount_in, amount_out = %amount_out_native,
            protocol = %protocol_native, market = %market_native, "swap exact in"
        );
        Ok(SwapOutcome {
            amount: amount_out_native,
            protocol_fee: protocol_native,
            market_fee: market_native,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn swap_exact_amount_out(
        &mut self,
        caller: H160,
        token_in: H160,
        max_amount_in: U256,
        token_out: H160,
        amount_out: U256,
        max_price: Bfp,
        ledger: &dyn ValueLedger,
        exemptions: &dyn ExemptionList,
    ) -> Result<SwapOutcome, Error> {
        self.ensure_finalized()?;
        if token_in == token_out {
            return Err(Error::IdenticalTokens);
        }
        let reserve_in = self.reserve(token_in)?.clone();
        let reserve_out = self.reserve(token_out)?.clone();
        let swap_fee = self.config.fees.swap_fee;

        let balance_in = reserve_in.upscaled_balance()?;
        let balance_out = reserve_out.upscaled_balance()?;
        let spot_before = weighted_math::calc_spot_price(
            balance_in,
            reserve_in.denorm,
            balance_out,
            reserve_out.denorm,
            swap_fee,
        )?;
        if spot_before > max_price {
            return Err(Error::LimitPrice);
        }

        let amount_out_up = reserve_out.upscale(amount_out)?;
        let net_in = weighted_math::calc_in_given_out(
            balance_in,
            reserve_in.denorm,
            balance_out,
            reserve_out.denorm,
            amount_out_up,
            swap_fee,
        )?;

        // gross the invariant-side input up so the protocol and market cut
        // are exact fractions of the trader-visible amount
        let (protocol_fee, market_fee) = self.fee_fractions(token_in, exemptions)?;
        let gross = net_in.div_up(protocol_fee.add(market_fee)?.complement())?;
        let protocol_amount = gross.mul_down(protocol_fee)?;
        let market_amount = gross.mul_down(market_fee)?;

        let amount_in_native = reserve_in.downscale_up(gross)?;
        if amount_in_native > max_amount_in {
            return Err(Error::LimitIn);
        }
        if amount_in_native.is_zero() {
            return Err(Error::NegligibleAmount);
        }

        let protocol_native = reserve_in.downscale_down(protocol_amount)?;
        let market_native = reserve_in.downscale_down(market_amount)?;
        let invariant_in_native = amount_in_native
            .checked_sub(protocol_native.saturating_add(market_native))
            .ok_or(Error::Math(pool_math::Error::SubOverflow))?;

        self.check_post_swap_price(
            &reserve_in,
            invariant_in_native,
            &reserve_out,
            amount_out,
            spot_before,
            max_price,
            gross,
            amount_out_up,
        )?;

        ledger.transfer(token_in, caller, self.config.address, amount_in_native)?;
        ledger.transfer(token_out, self.config.address, caller, amount_out)?;

        let swap_fee_native = reserve_in.downscale_down(gross.mul_down(swap_fee)?)?;
        self.fees.record_swap_fee(token_in, swap_fee_native);
        self.fees.record_fees(token_in, protocol_native, market_native);
        self.reserve_mut(token_in)?.balance = reserve_in.balance.saturating_add(invariant_in_native);
        self.reserve_mut(token_out)?.balance = reserve_out.balance.saturating_sub(amount_out);

        debug!(
            ?token_in, ?token_out, amount_in = %amount_in_native, %amount_out,
            protocol = %protocol_native, market = %market_native, "swap exact out"
        );
        Ok(SwapOutcome {
            amount: amount_in_native,
            protocol_fee: protocol_native,
            market_fee: market_native,
        })
    }

    /// Proportional join: deposits a slice of every reserve for an exact
    /// number of shares. No swap fee applies since the pool ratio is
    /// preserved. Returns the deposited amounts in bind order.
    pub fn join_pool(
        &mut self,
        caller: H160,
        shares_out: U256,
        max_amounts_in: &[U256],
        ledger: &dyn ValueLedger,
    ) -> Result<Vec<U256>, Error> {
        self.ensure_finalized()?;
        if max_amounts_in.len() != self.tokens.len() {
            return Err(Error::AmountsLengthMismatch);
        }
        let ratio = Bfp::from_wei(shares_out).div_up(Bfp::from_wei(self.total_shares))?;
        if ratio.is_zero() {
            return Err(Error::NegligibleAmount);
        }

        let mut amounts = Vec::with_capacity(self.tokens.len());
        for (token, max_amount_in) in self.tokens.iter().zip(max_amounts_in) {
            let reserve = self.reserves.get(token).ok_or(Error::NotBound)?;
            let amount_in = Bfp::from_wei(reserve.balance).mul_up(ratio)?.as_uint256();
            if amount_in.is_zero() {
                return Err(Error::NegligibleAmount);
            }
            if amount_in > *max_amount_in {
                return Err(Error::LimitIn);
            }
            amounts.push(amount_in);
        }

        for (index, amount_in) in amounts.iter().enumerate() {
            let token = self.tokens[index];
            ledger.transfer(token, caller, self.config.address, *amount_in)?;
            let reserve = self.reserve_mut(token)?;
            reserve.balance = reserve.balance.saturating_add(*amount_in);
        }
        self.mint(caller, shares_out);
        debug!(?caller, %shares_out, "proportional join");
        Ok(amounts)
    }

    /// Proportional exit: burns an exact number of shares for a slice of
    /// every reserve. Returns the withdrawn amounts in bind order.
    pub fn exit_pool(
        &mut self,
        caller: H160,
        shares_in: U256,
        min_amounts_out: &[U256],
        ledger: &dyn ValueLedger,
    ) -> Result<Vec<U256>, Error> {
        self.ensure_finalized()?;
        if min_amounts_out.len() != self.tokens.len() {
            return Err(Error::AmountsLengthMismatch);
        }
        if self.share_balance_of(caller) < shares_in {
            return Err(Error::InsufficientShares);
        }
        let ratio = Bfp::from_wei(shares_in).div_down(Bfp::from_wei(self.total_shares))?;
        if ratio.is_zero() {
            return Err(Error::NegligibleAmount);
        }

        let mut amounts = Vec::with_capacity(self.tokens.len());
        for (token, min_amount_out) in self.tokens.iter().zip(min_amounts_out) {
            let reserve = self.reserves.get(token).ok_or(Error::NotBound)?;
            let amount_out = Bfp::from_wei(reserve.balance).mul_down(ratio)?.as_uint256();
            if amount_out.is_zero() {
                return Err(Error::NegligibleAmount);
            }
            if amount_out < *min_amount_out {
                return Err(Error::LimitOut);
            }
            amounts.push(amount_out);
        }

        self.burn(caller, shares_in)?;
        for (index, amount_out) in amounts.iter().enumerate() {
            let token = self.tokens[index];
            ledger.transfer(token, self.config.address, caller, *amount_out)?;
            let reserve = self.reserve_mut(token)?;
            reserve.balance = reserve.balance.saturating_sub(*amount_out);
        }
        debug!(?caller, %shares_in, "proportional exit");
        Ok(amounts)
    }

    /// Single-sided join with an exact token deposit.
    pub fn join_swap_extern_amount_in(
        &mut self,
        caller: H160,
        token_in: H160,
        amount_in: U256,
        min_shares_out: U256,
        ledger: &dyn ValueLedger,
    ) -> Result<U256, Error> {
        self.ensure_finalized()?;
        let reserve = self.reserve(token_in)?.clone();
        let shares_out = weighted_math::calc_pool_out_given_single_in(
            reserve.upscaled_balance()?,
            reserve.denorm,
            Bfp::from_wei(self.total_shares),
            self.total_weight,
            reserve.upscale(amount_in)?,
            self.config.fees.swap_fee,
        )?
        .as_uint256();
        if shares_out < min_shares_out {
            return Err(Error::LimitOut);
        }
        if shares_out.is_zero() {
            return Err(Error::NegligibleAmount);
        }

        ledger.transfer(token_in, caller, self.config.address, amount_in)?;
        self.reserve_mut(token_in)?.balance = reserve.balance.saturating_add(amount_in);
        self.mint(caller, shares_out);
        debug!(?caller, ?token_in, %amount_in, %shares_out, "single sided join");
        Ok(shares_out)
    }

    /// The single-sided deposit that minting `shares_out` against `token_in`
    /// would cost right now. Read-only companion of
    /// [`Pool::join_swap_pool_amount_out`].
    pub fn single_in_given_shares_out(
        &self,
        token_in: H160,
        shares_out: U256,
    ) -> Result<U256, Error> {
        self.ensure_finalized()?;
        let reserve = self.reserve(token_in)?;
        reserve.downscale_up(weighted_math::calc_single_in_given_pool_out(
            reserve.upscaled_balance()?,
            reserve.denorm,
            Bfp::from_wei(self.total_shares),
            self.total_weight,
            Bfp::from_wei(shares_out),
            self.config.fees.swap_fee,
        )?)
    }

    /// Single-sided join minting an exact number of shares.
    pub fn join_swap_pool_amount_out(
        &mut self,
        caller: H160,
        token_in: H160,
        shares_out: U256,
        max_amount_in: U256,
        ledger: &dyn ValueLedger,
    ) -> Result<U256, Error> {
        self.ensure_finalized()?;
        let reserve = self.reserve(token_in)?.clone();
        let amount_in = self.single_in_given_shares_out(token_in, shares_out)?;
        if amount_in.is_zero() {
            return Err(Error::NegligibleAmount);
        }
        if amount_in > max_amount_in {
            return Err(Error::LimitIn);
        }

        ledger.transfer(token_in, caller, self.config.address, amount_in)?;
        self.reserve_mut(token_in)?.balance = reserve.balance.saturating_add(amount_in);
        self.mint(caller, shares_out);
        debug!(?caller, ?token_in, %amount_in, %shares_out, "single sided join for shares");
        Ok(amount_in)
    }

    /// Single-sided exit burning an exact number of shares.
    pub fn exit_swap_pool_amount_in(
        &mut self,
        caller: H160,
        token_out: H160,
        shares_in: U256,
        min_amount_out: U256,
        ledger: &dyn ValueLedger,
    ) -> Result<U256, Error> {
        self.ensure_finalized()?;
        if self.share_balance_of(caller) < shares_in {
            return Err(Error::InsufficientShares);
        }
        let reserve = self.reserve(token_out)?.clone();
        let amount_out = reserve.downscale_down(weighted_math::calc_single_out_given_pool_in(
            reserve.upscaled_balance()?,
            reserve.denorm,
            Bfp::from_wei(self.total_shares),
            self.total_weight,
            Bfp::from_wei(shares_in),
            self.config.fees.swap_fee,
        )?)?;
        if amount_out < min_amount_out {
            return Err(Error::LimitOut);
        }
        if amount_out.is_zero() {
            return Err(Error::NegligibleAmount);
        }

        self.burn(caller, shares_in)?;
        ledger.transfer(token_out, self.config.address, caller, amount_out)?;
        self.reserve_mut(token_out)?.balance = reserve.balance.saturating_sub(amount_out);
        debug!(?caller, ?token_out, %shares_in, %amount_out, "single sided exit");
        Ok(amount_out)
    }

    /// Single-sided exit with an exact token withdrawal.
    pub fn exit_swap_extern_amount_out(
        &mut self,
        caller: H160,
        token_out: H160,
        amount_out: U256,
        max_shares_in: U256,
        ledger: &dyn ValueLedger,
    ) -> Result<U256, Error> {
        self.ensure_finalized()?;
        let reserve = self.reserve(token_out)?.clone();
        let shares_in = weighted_math::calc_pool_in_given_single_out(
            reserve.upscaled_balance()?,
            reserve.denorm,
            Bfp::from_wei(self.total_shares),
            self.total_weight,
            reserve.upscale(amount_out)?,
            self.config.fees.swap_fee,
        )?
        .as_uint256();
        if shares_in > max_shares_in {
            return Err(Error::LimitIn);
        }
        if shares_in.is_zero() {
            return Err(Error::NegligibleAmount);
        }
        if self.share_balance_of(caller) < shares_in {
            return Err(Error::InsufficientShares);
        }

        self.burn(caller, shares_in)?;
        ledger.transfer(token_out, self.config.address, caller, amount_out)?;
        self.reserve_mut(token_out)?.balance = reserve.balance.saturating_sub(amount_out);
        debug!(?caller, ?token_out, %amount_out, %shares_in, "single sided exit for amount");
        Ok(shares_in)
    }

    /// Pays all accrued protocol fees for `token` to the configured
    /// collector. Callable by anyone.
    pub fn withdraw_protocol_fees(
        &mut self,
        token: H160,
        ledger: &dyn ValueLedger,
    ) -> Result<U256, Error> {
        self.fees
            .withdraw_protocol_fees(token, self.config.address, &self.config.fees, ledger)
    }

    /// Pays all accrued market fees for `token` to the configured collector.
    /// Callable by anyone.
    pub fn withdraw_market_fees(
        &mut self,
        token: H160,
        ledger: &dyn ValueLedger,
    ) -> Result<U256, Error> {
        self.fees
            .withdraw_market_fees(token, self.config.address, &self.config.fees, ledger)
    }

    fn ensure_finalized(&self) -> Result<(), Error> {
        if self.stage != Stage::Finalized {
            return Err(Error::NotFinalized);
        }
        Ok(())
    }

    /// Protocol and market fractions applying to a leg paying in `token_in`;
    /// recognized reserve assets are exempt from the protocol cut.
    fn fee_fractions(
        &self,
        token_in: H160,
        exemptions: &dyn ExemptionList,
    ) -> Result<(Bfp, Bfp), Error> {
        let protocol_fee = if exemptions.is_exempt(token_in) {
            Bfp::zero()
        } else {
            self.config.fees.protocol_fee
        };
        let market_fee = self.config.fees.market_fee;
        if protocol_fee.add(market_fee)? >= Bfp::one() {
            return Err(Error::FeeAboveMax);
        }
        Ok((protocol_fee, market_fee))
    }

    #[allow(clippy::too_many_arguments)]
    fn check_post_swap_price(
        &self,
        reserve_in: &Reserve,
        invariant_in_native: U256,
        reserve_out: &Reserve,
        amount_out_native: U256,
        spot_before: Bfp,
        max_price: Bfp,
        gross_in: Bfp,
        amount_out: Bfp,
    ) -> Result<(), Error> {
        let spot_after = weighted_math::calc_spot_price(
            reserve_in.upscale(reserve_in.balance.saturating_add(invariant_in_native))?,
            reserve_in.denorm,
            reserve_out.upscale(reserve_out.balance.saturating_sub(amount_out_native))?,
            reserve_out.denorm,
            self.config.fees.swap_fee,
        )?;
        if spot_after < spot_before {
            return Err(Error::PriceDiverged);
        }
        if spot_after > max_price {
            return Err(Error::LimitPrice);
        }
        if spot_before > gross_in.div_down(amount_out)? {
            return Err(Error::PriceDiverged);
        }
        Ok(())
    }

    fn mint(&mut self, account: H160, amount: U256) {
        let entry = self.shares.entry(account).or_default();
        *entry = entry.saturating_add(amount);
        self.total_shares = self.total_shares.saturating_add(amount);
    }

    fn burn(&mut self, account: H160, amount: U256) -> Result<(), Error> {
        let entry = self.shares.entry(account).or_default();
        if *entry < amount {
            return Err(Error::InsufficientShares);
        }
        *entry -= amount;
        self.total_shares -= amount;
        Ok(())
    }
}
