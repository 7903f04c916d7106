use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::limits::ConfigurationError;
use crate::config::ComplianceSettings;

pub const DEFAULT_SAFE_HARBOR_TRIGGER_PERCENT: u32 = 140;
pub const DEFAULT_RENT_BURDEN_PERCENT: u32 = 30;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(25);

/// Regulatory dials applied on top of the limit tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompliancePolicy {
    safe_harbor_trigger_percent: Decimal,
    rent_burden_percent: Decimal,
}

impl CompliancePolicy {
    pub fn new(
        safe_harbor_trigger_percent: Decimal,
        rent_burden_percent: Decimal,
    ) -> Result<Self, ConfigurationError> {
        if safe_harbor_trigger_percent < Decimal::ONE_HUNDRED {
            return Err(ConfigurationError::InvalidPolicy {
                reason: format!(
                    "safe harbor trigger {safe_harbor_trigger_percent}% must be at least 100%"
                ),
            });
        }
        if rent_burden_percent <= Decimal::ZERO || rent_burden_percent > Decimal::ONE_HUNDRED {
            return Err(ConfigurationError::InvalidPolicy {
                reason: format!("rent burden {rent_burden_percent}% must be within (0, 100]"),
            });
        }

        Ok(Self {
            safe_harbor_trigger_percent,
            rent_burden_percent,
        })
    }

    pub fn safe_harbor_trigger_percent(&self) -> Decimal {
        self.safe_harbor_trigger_percent
    }

    pub fn rent_burden_percent(&self) -> Decimal {
        self.rent_burden_percent
    }
}

impl Default for CompliancePolicy {
    fn default() -> Self {
        Self {
            safe_harbor_trigger_percent: Decimal::from(DEFAULT_SAFE_HARBOR_TRIGGER_PERCENT),
            rent_burden_percent: Decimal::from(DEFAULT_RENT_BURDEN_PERCENT),
        }
    }
}

/// Bounded retry for the recertification write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// No sleeping between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_backoff: Duration::ZERO,
        }
    }

    /// Backoff before the attempt following `attempt` (1-based), doubling each time.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(1 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BACKOFF,
        }
    }
}

/// Everything the lifecycle service needs besides its collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LifecycleConfig {
    pub policy: CompliancePolicy,
    pub retry: RetryPolicy,
}

impl TryFrom<&ComplianceSettings> for LifecycleConfig {
    type Error = ConfigurationError;

    fn try_from(settings: &ComplianceSettings) -> Result<Self, Self::Error> {
        let policy = CompliancePolicy::new(
            settings.safe_harbor_trigger_percent,
            settings.rent_burden_percent,
        )?;

        Ok(Self {
            policy,
            retry: RetryPolicy {
                max_attempts: settings.recert_max_attempts.max(1),
                base_backoff: Duration::from_millis(settings.recert_backoff_ms),
            },
        })
    }
}
