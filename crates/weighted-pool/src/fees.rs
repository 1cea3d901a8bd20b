//! Three-tier fee accounting.
//!
//! The swap fee never leaves the pool: it stays inside the reserve balances
//! and compounds the invariant for liquidity providers, so its accumulator
//! is purely informational. Protocol and market fees are deducted from the
//! trader before the invariant math runs and sit in pool custody until a
//! withdrawal pays the full accumulator to the collector configured at pool
//! creation. Collectors are immutable, so misdirecting a withdrawal is
//! structurally impossible and anyone may trigger one.

use {
    crate::{error::Error, ledger::ValueLedger},
    pool_math::Bfp,
    primitive_types::{H160, U256},
    serde::{Deserialize, Serialize},
    std::collections::BTreeMap,
    tracing::debug,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum FeeClass {
    /// Retained inside the pool balances; not withdrawable.
    Swap,
    /// Routed to the venue operator.
    Protocol,
    /// Routed to the marketplace that listed the asset.
    Market,
}

/// Fee fractions and collector accounts, fixed at pool creation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FeeConfig {
    pub swap_fee: Bfp,
    pub protocol_fee: Bfp,
    pub market_fee: Bfp,
    pub protocol_collector: H160,
    pub market_collector: H160,
}

/// Per-token accumulators of generated but unwithdrawn fees.
#[derive(Debug, Default)]
pub struct FeeLedger {
    accrued: BTreeMap<(H160, FeeClass), U256>,
}

impl FeeLedger {
    /// Books the swap fee charged by a trade leg. Informational only; the
    /// amount itself stays inside the reserve balances.
    pub fn record_swap_fee(&mut self, token: H160, amount: U256) {
        self.record(token, FeeClass::Swap, amount);
    }

    /// Books the protocol and market cut of one completed trade leg. Must be
    /// called exactly once per leg, together with the balance update.
    pub fn record_fees(&mut self, token: H160, protocol: U256, market: U256) {
        self.record(token, FeeClass::Protocol, protocol);
        self.record(token, FeeClass::Market, market);
    }

    fn record(&mut self, token: H160, class: FeeClass, amount: U256) {
        if amount.is_zero() {
            return;
        }
        let entry = self.accrued.entry((token, class)).or_default();
        *entry = entry.saturating_add(amount);
    }

    pub fn accrued(&self, token: H160, class: FeeClass) -> U256 {
        self.accrued
            .get(&(token, class))
            .copied()
            .unwrap_or_default()
    }

    /// Pays the full accrued protocol fee out of pool custody to the
    /// configured collector and zeroes the accumulator.
    pub fn withdraw_protocol_fees(
        &mut self,
        token: H160,
        custodian: H160,
        config: &FeeConfig,
        ledger: &dyn ValueLedger,
    ) -> Result<U256, Error> {
        self.withdraw(token, FeeClass::Protocol, custodian, config.protocol_collector, ledger)
    }

    /// Pays the full accrued market fee out of pool custody to the
    /// configured collector and zeroes the accumulator.
    pub fn withdraw_market_fees(
        &mut self,
        token: H160,
        custodian: H160,
        config: &FeeConfig,
        ledger: &dyn ValueLedger,
    ) -> Result<U256, Error> {
        self.withdraw(token, FeeClass::Market, custodian, config.market_collector, ledger)
    }

    fn withdraw(
        &mut self,
        token: H160,
        class: FeeClass,
        custodian: H160,
        collector: H160,
        ledger: &dyn ValueLedger,
    ) -> Result<U256, Error> {
        let amount = self.accrued(token, class);
        if amount.is_zero() {
            return Ok(amount);
        }
        ledger.transfer(token, custodian, collector, amount)?;
        self.accrued.remove(&(token, class));
        debug!(?class, ?token, ?collector, %amount, "fees withdrawn");
        Ok(amount)
    }
}
