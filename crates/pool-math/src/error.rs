//! Error type shared by the fixed point and weighted invariant math.

use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum Error {
    #[error("addition overflow")]
    AddOverflow,
    #[error("subtraction underflow")]
    SubOverflow,
    #[error("multiplication overflow")]
    MulOverflow,
    #[error("division by zero")]
    ZeroDivision,
    #[error("internal error during division")]
    DivInternal,
    #[error("base out of bounds")]
    XOutOfBounds,
    #[error("exponent out of bounds")]
    YOutOfBounds,
    #[error("exponent of the natural base out of bounds")]
    InvalidExponent,
    #[error("product out of bounds")]
    ProductOutOfBounds,
    #[error("input amount exceeds the maximum in ratio")]
    MaxInRatio,
    #[error("output amount exceeds the maximum out ratio")]
    MaxOutRatio,
}
