//! In-memory collaborator implementations for tests.

use {
    crate::{
        error::Error,
        ledger::{ExemptionList, TickSource, ValueLedger},
    },
    primitive_types::{H160, U256},
    std::{
        collections::{BTreeMap, BTreeSet},
        sync::{
            RwLock,
            atomic::{AtomicU64, Ordering},
        },
    },
};

/// Initializes test logging once; later calls are no-ops.
#[cfg(test)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A ledger holding balances in a map keyed by `(token, account)`.
#[derive(Default)]
pub struct MemoryLedger {
    balances: RwLock<BTreeMap<(H160, H160), U256>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits an account out of thin air, standing in for the issuance
    /// layer that exists outside the engine.
    pub fn credit(&self, token: H160, account: H160, amount: U256) {
        let mut balances = self.balances.write().unwrap();
        let entry = balances.entry((token, account)).or_default();
        *entry = entry.saturating_add(amount);
    }
}

impl ValueLedger for MemoryLedger {
    fn transfer(&self, token: H160, from: H160, to: H160, amount: U256) -> Result<(), Error> {
        if amount.is_zero() {
            return Ok(());
        }
        let mut balances = self.balances.write().unwrap();
        let source = balances.entry((token, from)).or_default();
        if *source < amount {
            return Err(Error::InsufficientBalance);
        }
        *source -= amount;
        let destination = balances.entry((token, to)).or_default();
        *destination = destination.saturating_add(amount);
        Ok(())
    }

    fn balance_of(&self, token: H160, account: H160) -> U256 {
        self.balances
            .read()
            .unwrap()
            .get(&(token, account))
            .copied()
            .unwrap_or_default()
    }
}

/// A clock advanced by hand.
#[derive(Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn at(tick: u64) -> Self {
        Self(AtomicU64::new(tick))
    }

    pub fn set(&self, tick: u64) {
        self.0.store(tick, Ordering::SeqCst);
    }

    pub fn advance(&self, ticks: u64) {
        self.0.fetch_add(ticks, Ordering::SeqCst);
    }
}

impl TickSource for ManualClock {
    fn current_tick(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// A fixed exemption set.
#[derive(Default)]
pub struct StaticExemptions(BTreeSet<H160>);

impl StaticExemptions {
    pub fn new(tokens: impl IntoIterator<Item = H160>) -> Self {
        Self(tokens.into_iter().collect())
    }
}

impl ExemptionList for StaticExemptions {
    fn is_exempt(&self, token: H160) -> bool {
        self.0.contains(&token)
    }
}
