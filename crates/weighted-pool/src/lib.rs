//! Automated market-making venue pairing an issued data-access token with a
//! reserve asset.
//!
//! The engine is a weighted constant-value pool with three-tier fee
//! bookkeeping (LP swap fee compounding inside the pool, protocol fee,
//! market fee), a side-staking rebalancer providing the issuer's token as
//! counter-liquidity, and a tick-indexed linear vesting schedule holding
//! part of the issuer supply back.
//!
//! Value transfer, time, and the recognized-reserve-asset set are consumed
//! as injected collaborators (see [`ledger`]); the host runtime dispatches
//! every operation as one atomic unit of work, so the engine is
//! single-threaded per pool and an operation either completes entirely or
//! aborts entirely.

pub mod error;
pub mod fees;
pub mod ledger;
pub mod pool;
pub mod side_staking;
#[cfg(any(test, feature = "test-util"))]
pub mod testutil;
pub mod venue;
pub mod vesting;

pub use self::{error::Error, venue::Venue};
