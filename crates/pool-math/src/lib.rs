//! Deterministic fixed point and weighted invariant math for the pool engine.
//!
//! All public entry points operate on unsigned 18-decimal fixed point numbers
//! ([`fixed_point::Bfp`]) and return explicit errors instead of wrapping or
//! saturating. The transcendental core ([`fixed_point::logexpmath`]) runs in
//! arbitrary precision with 20 internal decimals so that rounding is fully
//! reproducible across platforms.

pub mod error;
pub mod fixed_point;
pub mod weighted_math;

pub use self::{error::Error, fixed_point::Bfp};
