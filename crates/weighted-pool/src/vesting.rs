//! Tick-indexed linear vesting of a fixed amount of issuer token supply.
//!
//! The unlocked amount is a pure function of the current tick: zero before
//! the start, the full amount once `total_ticks` have elapsed, and linear
//! (rounded down) in between. The schedule is created once at pool
//! deployment and only ever mutated by [`VestingSchedule::release`], which
//! reports the newly unlocked delta since the previous release.

use {
    primitive_types::{U256, U512},
    serde::{Deserialize, Serialize},
    tracing::debug,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct VestingConfig {
    pub total_amount: U256,
    pub start_tick: u64,
    pub total_ticks: u64,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VestingSchedule {
    config: VestingConfig,
    amount_released: U256,
}

impl VestingSchedule {
    pub fn new(config: VestingConfig) -> Self {
        Self {
            config,
            amount_released: U256::zero(),
        }
    }

    pub fn total_amount(&self) -> U256 {
        self.config.total_amount
    }

    pub fn amount_released(&self) -> U256 {
        self.amount_released
    }

    /// Amount unlocked by `tick`, irrespective of what has been released.
    pub fn unlocked(&self, tick: u64) -> U256 {
        let elapsed = tick
            .saturating_sub(self.config.start_tick)
            .min(self.config.total_ticks);
        if elapsed == self.config.total_ticks {
            return self.config.total_amount;
        }
        let scaled = self.config.total_amount.full_mul(elapsed.into());
        (scaled / U512::from(self.config.total_ticks))
            .try_into()
            .unwrap_or(self.config.total_amount)
    }

    /// Amount still locked at `tick`.
    pub fn locked(&self, tick: u64) -> U256 {
        self.config.total_amount.saturating_sub(self.unlocked(tick))
    }

    /// Marks everything unlocked by `tick` as released and returns the delta
    /// since the last release. Zero when no time has passed; never rolls
    /// back on a stale tick.
    pub fn release(&mut self, tick: u64) -> U256 {
        let unlocked = self.unlocked(tick);
        let delta = unlocked.saturating_sub(self.amount_released);
        if !delta.is_zero() {
            self.amount_released = unlocked;
            debug!(%tick, %delta, total = %self.amount_released, "vesting released");
        }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> VestingSchedule {
        VestingSchedule::new(VestingConfig {
            total_amount: U256::from(200),
            start_tick: 100,
            total_ticks: 500,
        })
    }

    #[test]
    fn unlocks_linearly_between_the_endpoints() {
        let vesting = schedule();
        assert_eq!(vesting.unlocked(0), U256::zero());
        assert_eq!(vesting.unlocked(100), U256::zero());
        assert_eq!(vesting.unlocked(350), U256::from(100));
        assert_eq!(vesting.unlocked(600), U256::from(200));
        assert_eq!(vesting.unlocked(601), U256::from(200));
        assert_eq!(vesting.unlocked(u64::MAX), U256::from(200));
    }

    #[test]
    fn partial_progress_rounds_down() {
        let vesting = VestingSchedule::new(VestingConfig {
            total_amount: U256::from(100),
            start_tick: 0,
            total_ticks: 3,
        });
        assert_eq!(vesting.unlocked(1), U256::from(33));
        assert_eq!(vesting.unlocked(2), U256::from(66));
        assert_eq!(vesting.unlocked(3), U256::from(100));
    }

    #[test]
    fn release_is_idempotent_at_a_constant_tick() {
        let mut vesting = schedule();
        assert_eq!(vesting.release(350), U256::from(100));
        assert_eq!(vesting.release(350), U256::zero());
        assert_eq!(vesting.amount_released(), U256::from(100));
    }

    #[test]
    fn release_never_rolls_back() {
        let mut vesting = schedule();
        assert_eq!(vesting.release(350), U256::from(100));
        assert_eq!(vesting.release(200), U256::zero());
        assert_eq!(vesting.amount_released(), U256::from(100));
        assert_eq!(vesting.release(600), U256::from(100));
        assert_eq!(vesting.amount_released(), U256::from(200));
    }

    #[test]
    fn locked_complements_unlocked() {
        let vesting = schedule();
        assert_eq!(vesting.locked(100), U256::from(200));
        assert_eq!(vesting.locked(350), U256::from(100));
        assert_eq!(vesting.locked(600), U256::zero());
    }

    #[test]
    fn survives_enormous_amounts_without_overflow() {
        let vesting = VestingSchedule::new(VestingConfig {
            total_amount: U256::MAX,
            start_tick: 0,
            total_ticks: u64::MAX,
        });
        assert!(vesting.unlocked(u64::MAX / 2) < U256::MAX);
        assert_eq!(vesting.unlocked(u64::MAX), U256::MAX);
    }
}
