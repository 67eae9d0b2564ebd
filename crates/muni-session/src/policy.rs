//! When to renew an access token

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Renew this long before the token expires
    pub lead: Duration,
    /// Never schedule a renewal sooner than this
    pub min_delay: Duration,
    /// At or below this much remaining lifetime, renew right away
    pub immediate_threshold: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPlan {
    Immediate,
    After(Duration),
}

impl RefreshPolicy {
    pub fn plan(&self, time_to_expiry_ms: i64) -> RefreshPlan {
        if time_to_expiry_ms <= millis(self.immediate_threshold) {
            return RefreshPlan::Immediate;
        }

        let delay = (time_to_expiry_ms - millis(self.lead)).max(millis(self.min_delay));
        RefreshPlan::After(Duration::from_millis(delay.max(0) as u64))
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            lead: Duration::from_secs(60),
            min_delay: Duration::from_secs(5),
            immediate_threshold: Duration::from_secs(2),
        }
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
