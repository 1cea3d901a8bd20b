//! Engine error taxonomy.
//!
//! Numeric domain failures bubble up from the math crate unchanged; slippage
//! and state failures are raised here. Every error aborts the operation that
//! raised it before any balance was mutated.

use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Math(#[from] pool_math::Error),

    // slippage: a computed amount violated a caller-supplied bound
    #[error("output amount below the caller's minimum")]
    LimitOut,
    #[error("input amount above the caller's maximum")]
    LimitIn,
    #[error("spot price above the caller's price ceiling")]
    LimitPrice,
    #[error("realized price fell below the pre-trade spot price")]
    PriceDiverged,

    // state: the pool or the caller is not in a position to run the operation
    #[error("pool is not finalized")]
    NotFinalized,
    #[error("pool is already finalized")]
    AlreadyFinalized,
    #[error("caller is not the pool controller")]
    NotController,
    #[error("token is not bound to the pool")]
    NotBound,
    #[error("token is already bound to the pool")]
    AlreadyBound,
    #[error("a swap needs two distinct tokens")]
    IdenticalTokens,
    #[error("a finalized pool needs at least two bound tokens")]
    MinTokens,
    #[error("no more than eight tokens can be bound")]
    MaxTokens,
    #[error("denormalized weight below the minimum")]
    MinWeight,
    #[error("denormalized weight above the maximum")]
    MaxWeight,
    #[error("total denormalized weight above the maximum")]
    MaxTotalWeight,
    #[error("bound balance below the minimum")]
    MinBalance,
    #[error("token precision above eighteen decimals")]
    UnsupportedDecimals,
    #[error("swap fee outside the allowed range")]
    InvalidSwapFee,
    #[error("combined protocol and market fee must stay below one")]
    FeeAboveMax,
    #[error("amounts bounds do not match the bound reserves")]
    AmountsLengthMismatch,
    #[error("computed amount rounds to nothing")]
    NegligibleAmount,
    #[error("caller holds fewer shares than required")]
    InsufficientShares,
    #[error("account balance too low for the transfer")]
    InsufficientBalance,
}
