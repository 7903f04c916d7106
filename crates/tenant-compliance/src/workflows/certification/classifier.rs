use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use super::domain::{HouseholdSize, IncomeCategory};
use super::limits::{AmiLimitTable, ConfigurationError};
use super::validation::{non_negative, ValidationError};

/// The only failures a calculator can produce.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IncomeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IncomeLimits {
    pub very_low: Decimal,
    pub low: Decimal,
}

/// Classification of one income against one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IncomeClassification {
    pub category: IncomeCategory,
    pub ami_percentage: u32,
    pub limits: IncomeLimits,
    pub household_size: HouseholdSize,
    pub program_year: u16,
}

/// Inclusive upper bounds: an income equal to a limit qualifies for that tier.
pub fn classify(
    gross_annual_income: Decimal,
    household_size: HouseholdSize,
    table: &AmiLimitTable,
) -> Result<IncomeClassification, IncomeError> {
    let income = non_negative("gross_annual_income", gross_annual_income)?;
    let entry = table.entry(household_size)?;

    let category = if income <= entry.very_low_limit {
        IncomeCategory::VeryLow
    } else if income <= entry.low_limit {
        IncomeCategory::Low
    } else {
        IncomeCategory::MarketRate
    };

    let ami_percentage = ami_percentage(income, entry.median_income)?;

    Ok(IncomeClassification {
        category,
        ami_percentage,
        limits: IncomeLimits {
            very_low: entry.very_low_limit,
            low: entry.low_limit,
        },
        household_size,
        program_year: table.program_year(),
    })
}

fn ami_percentage(income: Decimal, median_income: Decimal) -> Result<u32, ValidationError> {
    let out_of_range = ValidationError::AmountOutOfRange {
        field: "gross_annual_income",
    };

    income
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| scaled.checked_div(median_income))
        .map(|ratio| ratio.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|rounded| rounded.to_u32())
        .ok_or(out_of_range)
}
