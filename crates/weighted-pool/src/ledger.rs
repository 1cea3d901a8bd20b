//! Collaborator interfaces the engine consumes but never implements.
//!
//! The host runtime is expected to dispatch every engine operation as one
//! atomic unit of work, so implementations only need interior mutability,
//! not transactional semantics of their own.

use {
    crate::error::Error,
    primitive_types::{H160, U256},
};

/// Moves fungible balances between accounts and reports custodial holdings.
/// The engine both pulls caller funds into pool custody and pays collectors
/// and traders out of it through this single interface.
pub trait ValueLedger: Send + Sync {
    fn transfer(&self, token: H160, from: H160, to: H160, amount: U256) -> Result<(), Error>;

    fn balance_of(&self, token: H160, account: H160) -> U256;
}

/// A monotonically increasing ordinal, e.g. a block height. Vesting progress
/// is a pure function of it.
pub trait TickSource: Send + Sync {
    fn current_tick(&self) -> u64;
}

/// Venue-wide set of recognized reserve assets. Swap legs paying in an
/// exempt token charge no protocol fee; the market fee is unaffected. The
/// engine only ever reads this set.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
pub trait ExemptionList: Send + Sync {
    fn is_exempt(&self, token: H160) -> bool;
}
