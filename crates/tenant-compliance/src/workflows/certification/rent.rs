use rust_decimal::{Decimal, RoundingStrategy};

use super::classifier::IncomeError;
use super::domain::{HouseholdSize, IncomeCategory};
use super::limits::AmiLimitTable;
use super::policy::CompliancePolicy;

const MONTHS_PER_YEAR: u32 = 12;

/// Monthly rent ceiling for a qualifying tier, `None` for market rate.
///
/// annual limit × burden% ÷ 12, rounded half-up to whole currency units. The result is
/// a comparison value only; it never adjusts a tenant's contract rent.
pub fn max_rent(
    household_size: HouseholdSize,
    category: IncomeCategory,
    table: &AmiLimitTable,
    policy: &CompliancePolicy,
) -> Result<Option<Decimal>, IncomeError> {
    let entry = table.entry(household_size)?;
    let Some(annual_limit) = entry.limit_for(category) else {
        return Ok(None);
    };

    let divisor = Decimal::ONE_HUNDRED * Decimal::from(MONTHS_PER_YEAR);
    let monthly = annual_limit
        .checked_mul(policy.rent_burden_percent())
        .and_then(|scaled| scaled.checked_div(divisor))
        .ok_or_else(|| table.overflow(household_size, "rent ceiling"))?;
    Ok(Some(monthly.round_dp_with_strategy(
        0,
        RoundingStrategy::MidpointAwayFromZero,
    )))
}

/// Whether the contract rent sits above the ceiling. Market-rate units never exceed.
pub fn exceeds_ceiling(monthly_rent: Decimal, ceiling: Option<Decimal>) -> bool {
    ceiling.is_some_and(|ceiling| monthly_rent > ceiling)
}
