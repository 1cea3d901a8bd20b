//! Call-style entry point tying the pool, the side-staking rebalancer and
//! the external collaborators together.
//!
//! The venue owns exactly one pool pairing an issued data-access token with
//! a reserve asset. Caller operations dispatch to the pool; reserve-side
//! single-asset liquidity changes by outside callers are followed by the
//! rebalancer's mirrored token-side leg, so the pool stays two-sided without
//! the issuer pre-funding the counter asset.

use {
    crate::{
        error::Error,
        fees::FeeClass,
        ledger::{ExemptionList, TickSource, ValueLedger},
        pool::{Pool, PoolConfig, SwapOutcome},
        side_staking::SideStakingRebalancer,
        vesting::{VestingConfig, VestingSchedule},
    },
    pool_math::Bfp,
    primitive_types::{H160, U256},
    serde::{Deserialize, Serialize},
    std::sync::Arc,
    tracing::debug,
};

/// One side of the initial pool deployment.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TokenBinding {
    pub token: H160,
    pub decimals: u8,
    pub amount: U256,
    pub denorm: Bfp,
    /// Account funding the initial balance.
    pub source: H160,
}

pub struct Venue {
    pool: Pool,
    rebalancer: SideStakingRebalancer,
    ledger: Arc<dyn ValueLedger>,
    clock: Arc<dyn TickSource>,
    exemptions: Arc<dyn ExemptionList>,
}

impl Venue {
    /// Deploys the pool: binds the issued token and the reserve asset,
    /// finalizes (the initial shares land in rebalancer custody, which is
    /// the pool controller), and arms the vesting schedule.
    pub fn bootstrap(
        config: PoolConfig,
        issued: TokenBinding,
        reserve: TokenBinding,
        issuer: H160,
        vesting: VestingConfig,
        ledger: Arc<dyn ValueLedger>,
        clock: Arc<dyn TickSource>,
        exemptions: Arc<dyn ExemptionList>,
    ) -> Result<Self, Error> {
        let staking = config.controller;
        let mut pool = Pool::new(config)?;
        pool.bind(
            staking,
            issued.source,
            issued.token,
            issued.amount,
            issued.denorm,
            issued.decimals,
            &*ledger,
        )?;
        pool.bind(
            staking,
            reserve.source,
            reserve.token,
            reserve.amount,
            reserve.denorm,
            reserve.decimals,
            &*ledger,
        )?;
        pool.finalize(staking)?;
        let rebalancer = SideStakingRebalancer::new(
            staking,
            issuer,
            issued.token,
            reserve.token,
            VestingSchedule::new(vesting),
        );
        debug!(pool = ?pool.config().address, ?issuer, "venue deployed");
        Ok(Self {
            pool,
            rebalancer,
            ledger,
            clock,
            exemptions,
        })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn rebalancer(&self) -> &SideStakingRebalancer {
        &self.rebalancer
    }

    pub fn swap_exact_amount_in(
        &mut self,
        caller: H160,
        token_in: H160,
        amount_in: U256,
        token_out: H160,
        min_amount_out: U256,
        max_price: Bfp,
    ) -> Result<SwapOutcome, Error> {
        self.pool.swap_exact_amount_in(
            caller,
            token_in,
            amount_in,
            token_out,
            min_amount_out,
            max_price,
            &*self.ledger,
            &*self.exemptions,
        )
    }

    pub fn swap_exact_amount_out(
        &mut self,
        caller: H160,
        token_in: H160,
        max_amount_in: U256,
        token_out: H160,
        amount_out: U256,
        max_price: Bfp,
    ) -> Result<SwapOutcome, Error> {
        self.pool.swap_exact_amount_out(
            caller,
            token_in,
            max_amount_in,
            token_out,
            amount_out,
            max_price,
            &*self.ledger,
            &*self.exemptions,
        )
    }

    /// Proportional join across every reserve; no mirror leg is needed
    /// because the pool ratio is preserved.
    pub fn join_pool(
        &mut self,
        caller: H160,
        shares_out: U256,
        max_amounts_in: &[U256],
    ) -> Result<Vec<U256>, Error> {
        self.pool
            .join_pool(caller, shares_out, max_amounts_in, &*self.ledger)
    }

    /// Proportional exit across every reserve.
    pub fn exit_pool(
        &mut self,
        caller: H160,
        shares_in: U256,
        min_amounts_out: &[U256],
    ) -> Result<Vec<U256>, Error> {
        self.pool
            .exit_pool(caller, shares_in, min_amounts_out, &*self.ledger)
    }

    /// Single-sided join with an exact deposit. An outside deposit of the
    /// reserve asset is mirrored by the rebalancer when its ceiling allows.
    pub fn join_swap_extern_amount_in(
        &mut self,
        caller: H160,
        token_in: H160,
        amount_in: U256,
        min_shares_out: U256,
    ) -> Result<U256, Error> {
        let shares_out = self.pool.join_swap_extern_amount_in(
            caller,
            token_in,
            amount_in,
            min_shares_out,
            &*self.ledger,
        )?;
        self.mirror_join(caller, token_in, shares_out)?;
        Ok(shares_out)
    }

    /// Single-sided join minting an exact number of shares.
    pub fn join_swap_pool_amount_out(
        &mut self,
        caller: H160,
        token_in: H160,
        shares_out: U256,
        max_amount_in: U256,
    ) -> Result<U256, Error> {
        let amount_in = self.pool.join_swap_pool_amount_out(
            caller,
            token_in,
            shares_out,
            max_amount_in,
            &*self.ledger,
        )?;
        self.mirror_join(caller, token_in, shares_out)?;
        Ok(amount_in)
    }

    /// Single-sided exit burning an exact number of shares.
    pub fn exit_swap_pool_amount_in(
        &mut self,
        caller: H160,
        token_out: H160,
        shares_in: U256,
        min_amount_out: U256,
    ) -> Result<U256, Error> {
        let amount_out = self.pool.exit_swap_pool_amount_in(
            caller,
            token_out,
            shares_in,
            min_amount_out,
            &*self.ledger,
        )?;
        self.mirror_exit(caller, token_out, shares_in)?;
        Ok(amount_out)
    }

    /// Single-sided exit with an exact withdrawal.
    pub fn exit_swap_extern_amount_out(
        &mut self,
        caller: H160,
        token_out: H160,
        amount_out: U256,
        max_shares_in: U256,
    ) -> Result<U256, Error> {
        let shares_in = self.pool.exit_swap_extern_amount_out(
            caller,
            token_out,
            amount_out,
            max_shares_in,
            &*self.ledger,
        )?;
        self.mirror_exit(caller, token_out, shares_in)?;
        Ok(shares_in)
    }

    pub fn withdraw_protocol_fees(&mut self, token: H160) -> Result<U256, Error> {
        self.pool.withdraw_protocol_fees(token, &*self.ledger)
    }

    pub fn withdraw_market_fees(&mut self, token: H160) -> Result<U256, Error> {
        self.pool.withdraw_market_fees(token, &*self.ledger)
    }

    /// Releases any newly unlocked vesting amount to the issuer.
    pub fn release_vesting(&mut self) -> Result<U256, Error> {
        let tick = self.clock.current_tick();
        self.rebalancer.release_vested(&*self.ledger, tick)
    }

    pub fn get_balance(&self, token: H160) -> Result<U256, Error> {
        self.pool.balance(token)
    }

    pub fn get_spot_price(&self, token_in: H160, token_out: H160) -> Result<Bfp, Error> {
        self.pool.spot_price(token_in, token_out)
    }

    pub fn get_accrued_fees(&self, token: H160, class: FeeClass) -> U256 {
        self.pool.accrued_fees(token, class)
    }

    pub fn get_available_for_staking(&self) -> U256 {
        self.rebalancer
            .available_for_staking(&*self.ledger, self.clock.current_tick())
    }

    fn mirror_join(&mut self, caller: H160, token_in: H160, shares_out: U256) -> Result<(), Error> {
        if token_in != self.rebalancer.reserve_token() || !self.rebalancer.mirrors_for(caller) {
            return Ok(());
        }
        let tick = self.clock.current_tick();
        self.rebalancer
            .mirror_join(&mut self.pool, &*self.ledger, shares_out, tick)?;
        Ok(())
    }

    fn mirror_exit(&mut self, caller: H160, token_out: H160, shares_in: U256) -> Result<(), Error> {
        if token_out != self.rebalancer.reserve_token() || !self.rebalancer.mirrors_for(caller) {
            return Ok(());
        }
        self.rebalancer
            .mirror_exit(&mut self.pool, &*self.ledger, shares_in)?;
        Ok(())
    }
}
