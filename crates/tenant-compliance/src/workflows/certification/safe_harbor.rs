use rust_decimal::Decimal;
use serde::Serialize;

use super::domain::{HouseholdSize, IncomeCategory};
use super::limits::{AmiLimitTable, ConfigurationError};
use super::policy::CompliancePolicy;

/// Outcome of the over-income test for one recertification.
///
/// `applicable_limit` and `over_income_trigger` are `None` when the tenant was already
/// market rate, in which case the rule does not apply and the flag is always false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SafeHarborOutcome {
    pub applicable_limit: Option<Decimal>,
    pub over_income_trigger: Option<Decimal>,
    pub over_income_flag: bool,
}

impl SafeHarborOutcome {
    const EXEMPT: Self = Self {
        applicable_limit: None,
        over_income_trigger: None,
        over_income_flag: false,
    };
}

/// Tests `new_income` against the limit of the tier the tenant last qualified under.
///
/// `anchor` must be the table the previous classification was computed from and
/// `previous_household_size` the size it was computed for; the tier the new income
/// resolves to plays no part here.
pub fn evaluate(
    previous_category: IncomeCategory,
    anchor: &AmiLimitTable,
    previous_household_size: HouseholdSize,
    new_income: Decimal,
    policy: &CompliancePolicy,
) -> Result<SafeHarborOutcome, ConfigurationError> {
    let previous_limits = anchor.entry(previous_household_size)?;
    let Some(applicable_limit) = previous_limits.limit_for(previous_category) else {
        return Ok(SafeHarborOutcome::EXEMPT);
    };

    let trigger = applicable_limit
        .checked_mul(policy.safe_harbor_trigger_percent())
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .ok_or_else(|| anchor.overflow(previous_household_size, "over-income trigger"))?;

    Ok(SafeHarborOutcome {
        applicable_limit: Some(applicable_limit),
        over_income_trigger: Some(trigger),
        over_income_flag: new_income > trigger,
    })
}
