//! Emission schedule and vault vesting.
//!
//! Emission decays exponentially with a fixed half-life measured in effective
//! layers (layers since the first effective genesis layer). The remaining
//! unissued supply after `l` effective layers is `total x q^l` with
//! `q = 2^(-1/half_life)`, evaluated in Q64 fixed point so that results are
//! exact and platform-independent. Per-layer emission is the difference of
//! consecutive remaining values, so sums over any layer range telescope.
//!
//! Independently, a vaulted allocation unlocks linearly between two absolute
//! layers and is fully vested from the end layer onward.

use crate::domain::Epoch;

const ONE_Q64: u128 = 1 << 64;

/// Smallest denomination per coin.
pub const ONE_COIN: u64 = 1_000_000_000;
/// Layers in one year at a five-minute layer duration.
pub const LAYERS_PER_YEAR: u32 = 105_120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsidyParams {
    pub total_subsidy: u64,
    pub half_life_layers: u32,
    pub total_vaulted: u64,
    pub vest_start: u32,
    pub vest_end: u32,
    pub layers_per_epoch: u32,
}

impl Default for SubsidyParams {
    fn default() -> Self {
        Self {
            total_subsidy: 2_400_000_000 * ONE_COIN,
            half_life_layers: 31 * LAYERS_PER_YEAR,
            total_vaulted: 150_000_000 * ONE_COIN,
            vest_start: LAYERS_PER_YEAR,
            vest_end: 4 * LAYERS_PER_YEAR,
            layers_per_epoch: 4032,
        }
    }
}

/// Deterministic per-layer subsidy calculator.
#[derive(Debug, Clone)]
pub struct SubsidySchedule {
    params: SubsidyParams,
    decay_q64: u128,
}

impl SubsidySchedule {
    pub fn new(params: SubsidyParams) -> Self {
        let decay_q64 = decay_factor(params.half_life_layers.max(1));
        Self { params, decay_q64 }
    }

    pub fn params(&self) -> &SubsidyParams {
        &self.params
    }

    /// First layer that carries emission.
    pub fn first_effective_layer(&self) -> u32 {
        self.params.layers_per_epoch.saturating_mul(2).saturating_sub(1)
    }

    /// Unissued emission supply after `effective_layer` effective layers.
    pub fn remaining(&self, effective_layer: u32) -> u64 {
        let factor = pow_q64(self.decay_q64, u64::from(effective_layer));
        ((u128::from(self.params.total_subsidy) * factor) >> 64) as u64
    }

    /// Emission issued in a single effective layer.
    pub fn emission(&self, effective_layer: u32) -> u64 {
        self.remaining(effective_layer)
            .saturating_sub(self.remaining(effective_layer.saturating_add(1)))
    }

    /// Total emission issued over `effective_layers` layers.
    pub fn accumulated_emission(&self, effective_layers: u32) -> u64 {
        self.params.total_subsidy - self.remaining(effective_layers)
    }

    /// Vaulted amount unlocked as of `layer`.
    pub fn vested(&self, layer: u32) -> u64 {
        let SubsidyParams {
            total_vaulted,
            vest_start,
            vest_end,
            ..
        } = self.params;

        if layer < vest_start {
            0
        } else if layer >= vest_end {
            total_vaulted
        } else {
            let elapsed = u128::from(layer - vest_start);
            let window = u128::from(vest_end - vest_start);
            (u128::from(total_vaulted) * elapsed / window) as u64
        }
    }

    /// Subsidy issued at `layer`: emission plus vault unlock for that layer.
    pub fn subsidy_at_layer(&self, layer: u32) -> u64 {
        let emission = layer
            .checked_sub(self.first_effective_layer())
            .map(|effective| self.emission(effective))
            .unwrap_or(0);
        let unlocked = self.vested(layer.saturating_add(1)) - self.vested(layer);
        emission + unlocked
    }

    /// Sum of the per-layer subsidy over every layer of `epoch`.
    pub fn epoch_subsidy(&self, epoch: Epoch) -> u64 {
        let first = epoch.first_layer(self.params.layers_per_epoch).as_u32();
        (0..self.params.layers_per_epoch)
            .map(|offset| self.subsidy_at_layer(first.saturating_add(offset)))
            .fold(0u64, |acc, s| acc.saturating_add(s))
    }
}

impl Default for SubsidySchedule {
    fn default() -> Self {
        Self::new(SubsidyParams::default())
    }
}

fn mul_q64(a: u128, b: u128) -> u128 {
    (a * b) >> 64
}

/// `base^exp` for a Q64 base strictly below one.
fn pow_q64(mut base: u128, mut exp: u64) -> u128 {
    let mut acc = ONE_Q64;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_q64(acc, base);
        }
        exp >>= 1;
        if exp > 0 {
            base = mul_q64(base, base);
        }
    }
    acc
}

/// Largest Q64 `q` with `q^half_life <= 1/2`.
fn decay_factor(half_life: u32) -> u128 {
    let half = ONE_Q64 >> 1;
    let (mut lo, mut hi) = (0u128, ONE_Q64 - 1);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if pow_q64(mid, u64::from(half_life)) <= half {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_schedule() -> SubsidySchedule {
        SubsidySchedule::new(SubsidyParams {
            total_subsidy: 1_000_000_000_000,
            half_life_layers: 100,
            total_vaulted: 1_000_000,
            vest_start: 50,
            vest_end: 150,
            layers_per_epoch: 10,
        })
    }

    #[test]
    fn test_half_life() {
        let schedule = small_schedule();
        let total = schedule.params().total_subsidy;
        assert_eq!(schedule.remaining(0), total);

        let at_half_life = schedule.remaining(100);
        let expected = total / 2;
        let tolerance = total / 1_000_000;
        assert!(
            at_half_life <= expected && expected - at_half_life <= tolerance,
            "remaining after one half-life: {}",
            at_half_life
        );
    }

    #[test]
    fn test_emission_decreases() {
        let schedule = small_schedule();
        let e0 = schedule.emission(0);
        let e50 = schedule.emission(50);
        let e500 = schedule.emission(500);
        assert!(e0 > e50);
        assert!(e50 > e500);
        assert!(e500 > 0);
    }

    #[test]
    fn test_accumulated_emission_matches_sum() {
        let schedule = small_schedule();
        let summed: u64 = (0..250).map(|l| schedule.emission(l)).sum();
        assert_eq!(summed, schedule.accumulated_emission(250));
    }

    #[test]
    fn test_vesting_before_start() {
        let schedule = small_schedule();
        assert_eq!(schedule.vested(0), 0);
        assert_eq!(schedule.vested(49), 0);
        assert_eq!(schedule.vested(50), 0);
    }

    #[test]
    fn test_vesting_after_end() {
        let schedule = small_schedule();
        assert_eq!(schedule.vested(150), 1_000_000);
        assert_eq!(schedule.vested(10_000), 1_000_000);
    }

    #[test]
    fn test_vesting_linear_between() {
        let schedule = small_schedule();
        assert_eq!(schedule.vested(100), 500_000);
        assert_eq!(schedule.vested(75), 250_000);

        let mut previous = 0;
        for layer in 51..150 {
            let v = schedule.vested(layer);
            assert!(v > 0 && v < 1_000_000);
            assert_eq!(v - previous, 10_000);
            previous = v;
        }
    }

    #[test]
    fn test_mainnet_vesting_midpoint() {
        let schedule = SubsidySchedule::default();
        let params = *schedule.params();
        let midpoint = params.vest_start + (params.vest_end - params.vest_start) / 2;
        assert_eq!(schedule.vested(midpoint), params.total_vaulted / 2);
        assert_eq!(schedule.vested(params.vest_start - 1), 0);
        assert_eq!(schedule.vested(params.vest_end), params.total_vaulted);
    }

    #[test]
    fn test_no_emission_before_effective_genesis() {
        let schedule = small_schedule();
        // first effective layer is 2 * 10 - 1 = 19
        assert_eq!(schedule.first_effective_layer(), 19);
        assert_eq!(schedule.subsidy_at_layer(18), 0);
        assert_eq!(schedule.subsidy_at_layer(19), schedule.emission(0));
        assert_eq!(schedule.epoch_subsidy(Epoch(0)), 0);
    }

    #[test]
    fn test_epoch_subsidy_telescopes() {
        let schedule = small_schedule();
        // epoch 6 spans layers 60..70, fully effective and inside the vesting window
        let first = 60;
        let last = 70;
        let genesis = schedule.first_effective_layer();
        let expected = schedule.remaining(first - genesis) - schedule.remaining(last - genesis)
            + schedule.vested(last)
            - schedule.vested(first);
        assert_eq!(schedule.epoch_subsidy(Epoch(6)), expected);
    }

    #[test]
    fn test_mainnet_epoch_subsidy_is_stable() {
        let schedule = SubsidySchedule::default();
        let a = schedule.epoch_subsidy(Epoch(10));
        let b = schedule.epoch_subsidy(Epoch(10));
        assert_eq!(a, b);
        assert!(a > 0);
        assert!(schedule.epoch_subsidy(Epoch(11)) < a + schedule.params().total_vaulted);
    }
}
