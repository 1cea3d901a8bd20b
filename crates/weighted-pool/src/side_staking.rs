//! Automatic counter-liquidity from the token issuer's own supply.
//!
//! The rebalancer custodies the issuer token supply that did not seed the
//! pool, with a vesting schedule reserving part of it for the issuer. When
//! an outside liquidity provider joins or exits on the reserve-asset side,
//! the rebalancer mirrors the change with a token-side leg of the same share
//! quantity, keeping the pool two-sided without the issuer pre-funding the
//! counter asset.
//!
//! The mirror is strictly best-effort: a leg that would dip into
//! vesting-reserved supply, exceed a ratio guard, or round to nothing is
//! skipped in full, and the outside join simply stays single-sided. Skips
//! are logged, never surfaced as errors.

use {
    crate::{
        error::Error,
        ledger::ValueLedger,
        pool::Pool,
        vesting::VestingSchedule,
    },
    primitive_types::{H160, U256},
    tracing::debug,
};

pub struct SideStakingRebalancer {
    address: H160,
    issuer: H160,
    token: H160,
    reserve_token: H160,
    vesting: VestingSchedule,
}

impl SideStakingRebalancer {
    pub fn new(
        address: H160,
        issuer: H160,
        token: H160,
        reserve_token: H160,
        vesting: VestingSchedule,
    ) -> Self {
        Self {
            address,
            issuer,
            token,
            reserve_token,
            vesting,
        }
    }

    /// Ledger account custodying the issuer token and the staked shares.
    pub fn address(&self) -> H160 {
        self.address
    }

    pub fn token(&self) -> H160 {
        self.token
    }

    pub fn reserve_token(&self) -> H160 {
        self.reserve_token
    }

    pub fn vesting(&self) -> &VestingSchedule {
        &self.vesting
    }

    /// Whether liquidity changes by `caller` get a mirrored token-side leg.
    /// The issuer provides its own counter-liquidity, and the rebalancer
    /// must not mirror itself.
    pub fn mirrors_for(&self, caller: H160) -> bool {
        caller != self.address && caller != self.issuer
    }

    /// Custody not reserved by vesting, the hard ceiling on any stake.
    pub fn available_for_staking(&self, ledger: &dyn ValueLedger, tick: u64) -> U256 {
        ledger
            .balance_of(self.token, self.address)
            .saturating_sub(self.vesting.locked(tick))
    }

    /// Transfers any newly unlocked vesting amount to the issuer. Returns
    /// zero when no further amount has unlocked since the last release.
    pub fn release_vested(
        &mut self,
        ledger: &dyn ValueLedger,
        tick: u64,
    ) -> Result<U256, Error> {
        let delta = self
            .vesting
            .unlocked(tick)
            .saturating_sub(self.vesting.amount_released());
        if delta.is_zero() {
            return Ok(delta);
        }
        ledger.transfer(self.token, self.address, self.issuer, delta)?;
        self.vesting.release(tick);
        Ok(delta)
    }

    /// Mirrors an outside reserve-side join that minted `shares_out` with a
    /// token-side deposit of the same share quantity. Returns the staked
    /// token amount, or `None` when the leg was skipped.
    pub fn mirror_join(
        &self,
        pool: &mut Pool,
        ledger: &dyn ValueLedger,
        shares_out: U256,
        tick: u64,
    ) -> Result<Option<U256>, Error> {
        if shares_out.is_zero() {
            return Ok(None);
        }
        let required = match pool.single_in_given_shares_out(self.token, shares_out) {
            Ok(required) => required,
            Err(Error::Math(pool_math::Error::MaxInRatio)) => {
                debug!(%shares_out, "stake skipped, ratio guard");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let available = self.available_for_staking(ledger, tick);
        if required.is_zero() {
            return Ok(None);
        }
        if required > available {
            debug!(%required, %available, "stake skipped, vesting-reserved supply");
            return Ok(None);
        }
        pool.join_swap_pool_amount_out(self.address, self.token, shares_out, required, ledger)?;
        debug!(%required, %shares_out, "mirrored join staked");
        Ok(Some(required))
    }

    /// Mirrors an outside reserve-side exit that burned `shares_in` by
    /// burning the same share quantity for tokens, which return to custody
    /// and become stakeable again. Returns the unstaked token amount, or
    /// `None` when the leg was skipped.
    pub fn mirror_exit(
        &self,
        pool: &mut Pool,
        ledger: &dyn ValueLedger,
        shares_in: U256,
    ) -> Result<Option<U256>, Error> {
        if shares_in.is_zero() || pool.share_balance_of(self.address) < shares_in {
            debug!(%shares_in, "unstake skipped, not enough staked shares");
            return Ok(None);
        }
        match pool.exit_swap_pool_amount_in(self.address, self.token, shares_in, U256::zero(), ledger)
        {
            Ok(amount) => {
                debug!(%amount, %shares_in, "mirrored exit unstaked");
                Ok(Some(amount))
            }
            Err(Error::Math(pool_math::Error::MaxOutRatio)) | Err(Error::NegligibleAmount) => {
                debug!(%shares_in, "unstake skipped, ratio guard");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
