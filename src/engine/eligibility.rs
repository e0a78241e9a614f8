//! Eligible-slot allocation and predicted rewards.

use crate::domain::Epoch;

/// Parameters of the proportional slot allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityParams {
    /// Expected proposals per layer.
    pub layer_size: u32,
    pub layers_per_epoch: u32,
    /// Minimal active weight from `min_weight_cutoff_epoch` onward.
    pub min_active_weight: u64,
    /// Minimal active weight before `min_weight_cutoff_epoch`.
    pub min_active_weight_early: u64,
    pub min_weight_cutoff_epoch: u32,
}

impl Default for EligibilityParams {
    fn default() -> Self {
        Self {
            layer_size: 50,
            layers_per_epoch: 4032,
            min_active_weight: 7_879_129_244,
            min_active_weight_early: 107_467_138,
            min_weight_cutoff_epoch: 8,
        }
    }
}

impl EligibilityParams {
    pub fn min_active_weight(&self, epoch: Epoch) -> u64 {
        if epoch.as_u32() < self.min_weight_cutoff_epoch {
            self.min_active_weight_early
        } else {
            self.min_active_weight
        }
    }

    /// Expected eligible slots for `weight` out of `total_weight` in `epoch`.
    ///
    /// Returns `None` when the total weight is zero, since no allocation is
    /// defined. A non-zero weight always gets at least one slot.
    pub fn eligible_slots(&self, weight: u64, total_weight: u64, epoch: Epoch) -> Option<u64> {
        if total_weight == 0 {
            return None;
        }

        let denominator = u128::from(self.min_active_weight(epoch).max(total_weight));
        let numerator = u128::from(weight)
            * u128::from(self.layer_size)
            * u128::from(self.layers_per_epoch);
        let slots = u64::try_from(numerator / denominator).unwrap_or(u64::MAX);

        if slots == 0 && weight > 0 {
            Some(1)
        } else {
            Some(slots)
        }
    }
}

/// Share of `epoch_subsidy` proportional to `weight / total_weight`.
pub fn predicted_rewards(epoch_subsidy: u64, weight: u64, total_weight: u64) -> Option<u64> {
    if total_weight == 0 {
        return None;
    }
    let share = u128::from(epoch_subsidy) * u128::from(weight) / u128::from(total_weight);
    Some(u64::try_from(share).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_total_weight_is_not_applicable() {
        let params = EligibilityParams::default();
        assert_eq!(params.eligible_slots(100, 0, Epoch(10)), None);
        assert_eq!(predicted_rewards(1000, 5, 0), None);
    }

    #[test]
    fn test_whole_network_gets_all_slots() {
        let params = EligibilityParams::default();
        let total = 10_000_000_000_000;
        assert_eq!(
            params.eligible_slots(total, total, Epoch(10)),
            Some(50 * 4032)
        );
    }

    #[test]
    fn test_proportional_share() {
        let params = EligibilityParams::default();
        let total = 20_000_000_000_000;
        assert_eq!(
            params.eligible_slots(total / 4, total, Epoch(10)),
            Some(50 * 4032 / 4)
        );
    }

    #[test]
    fn test_small_weight_gets_one_slot() {
        let params = EligibilityParams::default();
        assert_eq!(params.eligible_slots(1, u64::MAX, Epoch(10)), Some(1));
        assert_eq!(params.eligible_slots(0, u64::MAX, Epoch(10)), Some(0));
    }

    #[test]
    fn test_min_weight_floor_switches_at_cutoff() {
        let params = EligibilityParams::default();
        assert_eq!(params.min_active_weight(Epoch(7)), 107_467_138);
        assert_eq!(params.min_active_weight(Epoch(8)), 7_879_129_244);

        // A tiny network is measured against the floor, not its own total.
        let slots = params.eligible_slots(1_000, 1_000, Epoch(9)).unwrap();
        assert_eq!(slots, 1);
        let early = params.eligible_slots(107_467_138, 1_000, Epoch(2)).unwrap();
        assert_eq!(early, 50 * 4032);
    }

    #[test]
    fn test_predicted_rewards() {
        assert_eq!(predicted_rewards(1_000, 25, 100), Some(250));
        assert_eq!(predicted_rewards(u64::MAX, u64::MAX, u64::MAX), Some(u64::MAX));
    }
}
