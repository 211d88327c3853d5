//! Age-tiered refresh cadence.
//!
//! Young posts change rank quickly and are rescored often; older posts are
//! rescored less frequently. An item is due when, for any tier, it is younger
//! than the tier's age threshold and has not been scored within the tier's
//! delay. Items older than every threshold are never refreshed.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTier {
    pub age_threshold: Duration,
    pub refresh_delay: Duration,
}

impl RefreshTier {
    pub const fn new(age_threshold: Duration, refresh_delay: Duration) -> Self {
        Self {
            age_threshold,
            refresh_delay,
        }
    }

    pub fn age_threshold_ms(&self) -> i64 {
        saturating_ms(self.age_threshold)
    }

    pub fn refresh_delay_ms(&self) -> i64 {
        saturating_ms(self.refresh_delay)
    }

    /// `age < threshold AND since_scored >= delay`
    pub fn matches(&self, age_ms: i64, since_scored_ms: i64) -> bool {
        age_ms < self.age_threshold_ms() && since_scored_ms >= self.refresh_delay_ms()
    }
}

/// Milliseconds of `duration`, or `None` when they do not fit an `i64`.
pub fn duration_ms(duration: Duration) -> Option<i64> {
    i64::try_from(duration.as_millis()).ok()
}

/// Milliseconds of `duration`, clamped to `i64::MAX`.
pub fn saturating_ms(duration: Duration) -> i64 {
    duration_ms(duration).unwrap_or(i64::MAX)
}

/// Union over all tiers.
pub fn is_due(tiers: &[RefreshTier], age_ms: i64, since_scored_ms: i64) -> bool {
    tiers.iter().any(|tier| tier.matches(age_ms, since_scored_ms))
}

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;

pub fn default_tiers() -> Vec<RefreshTier> {
    let tier = |age: u64, delay: u64| {
        RefreshTier::new(Duration::from_secs(age), Duration::from_secs(delay))
    };
    vec![
        tier(5 * MINUTE, 5 * MINUTE),
        tier(10 * MINUTE, 10 * MINUTE),
        tier(15 * MINUTE, 15 * MINUTE),
        tier(2 * HOUR, 30 * MINUTE),
        tier(6 * HOUR, HOUR),
        tier(12 * HOUR, 2 * HOUR),
        tier(24 * HOUR, 4 * HOUR),
        tier(48 * HOUR, 8 * HOUR),
    ]
}

/// Parses `"age:delay,age:delay"` with both values in seconds.
pub fn parse_tiers(raw: &str) -> Result<Vec<RefreshTier>, String> {
    let mut tiers = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (age, delay) = entry
            .split_once(':')
            .ok_or_else(|| format!("tier '{}' is not in age:delay form", entry))?;
        let age: u64 = age
            .trim()
            .parse()
            .map_err(|_| format!("invalid age in tier '{}'", entry))?;
        let delay: u64 = delay
            .trim()
            .parse()
            .map_err(|_| format!("invalid delay in tier '{}'", entry))?;
        if age == 0 || delay == 0 {
            return Err(format!("tier '{}' must have positive values", entry));
        }
        let tier = RefreshTier::new(Duration::from_secs(age), Duration::from_secs(delay));
        if duration_ms(tier.age_threshold).is_none() || duration_ms(tier.refresh_delay).is_none() {
            return Err(format!("tier '{}' is out of range", entry));
        }
        tiers.push(tier);
    }
    if tiers.is_empty() {
        return Err("at least one tier is required".to_string());
    }
    Ok(tiers)
}
