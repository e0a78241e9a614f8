//! Pure computation engine: weight, subsidy, eligibility. No I/O.

pub mod eligibility;
pub mod subsidy;
pub mod weight;

pub use eligibility::{predicted_rewards, EligibilityParams};
pub use subsidy::{SubsidyParams, SubsidySchedule, ONE_COIN};
pub use weight::{add_to_total, atx_weight, WeightError};
