use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::domain::{HouseholdSize, NewTenantRequest, PropertyId, RecertificationRequest};

/// Field-level input errors raised before any classification runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("household_size must be between 1 and 8 (found {found})")]
    HouseholdSizeOutOfRange { found: i64 },
    #[error("{field} must not be negative (found {found})")]
    NegativeAmount { field: &'static str, found: Decimal },
    #[error("{field} is outside the supported range")]
    AmountOutOfRange { field: &'static str },
    #[error("{field} is required")]
    MissingField { field: &'static str },
    #[error("certified_on {certified_on} must fall between {earliest} and {latest}")]
    CertificationDateOutOfRange {
        certified_on: NaiveDate,
        earliest: NaiveDate,
        latest: NaiveDate,
    },
    #[error("lease_expiration {lease_expiration} precedes move_in_date {move_in_date}")]
    LeaseEndsBeforeMoveIn {
        move_in_date: NaiveDate,
        lease_expiration: NaiveDate,
    },
}

impl ValidationError {
    /// Name of the offending form field, for field-level correction.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::HouseholdSizeOutOfRange { .. } => "household_size",
            ValidationError::NegativeAmount { field, .. }
            | ValidationError::AmountOutOfRange { field }
            | ValidationError::MissingField { field } => field,
            ValidationError::LeaseEndsBeforeMoveIn { .. } => "lease_expiration",
            ValidationError::CertificationDateOutOfRange { .. } => "certified_on",
        }
    }
}

/// Move-in payload after validation; every field is safe to hand to the calculators.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTenant {
    pub property_id: PropertyId,
    pub unit_number: String,
    pub tenant_name: String,
    pub move_in_date: NaiveDate,
    pub lease_expiration: Option<NaiveDate>,
    pub household_size: HouseholdSize,
    pub gross_annual_income: Decimal,
    pub monthly_rent: Decimal,
    pub utility_allowance: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecertification {
    pub household_size: HouseholdSize,
    pub gross_annual_income: Decimal,
    pub documentation_notes: String,
    pub certified_on: Option<NaiveDate>,
}

/// Guard that turns raw intake payloads into validated inputs.
#[derive(Debug, Clone, Default)]
pub struct IntakeGuard;

impl IntakeGuard {
    pub fn validate_new_tenant(
        &self,
        request: NewTenantRequest,
    ) -> Result<ValidatedTenant, ValidationError> {
        let property_id = required("property_id", request.property_id)?;
        let unit_number = required("unit_number", request.unit_number)?;
        let tenant_name = required("tenant_name", request.tenant_name)?;
        let household_size = HouseholdSize::new(request.household_size)?;
        let gross_annual_income = non_negative("gross_annual_income", request.gross_annual_income)?;
        let monthly_rent = non_negative("monthly_rent", request.monthly_rent)?;
        let utility_allowance = non_negative("utility_allowance", request.utility_allowance)?;

        if let Some(lease_expiration) = request.lease_expiration {
            if lease_expiration < request.move_in_date {
                return Err(ValidationError::LeaseEndsBeforeMoveIn {
                    move_in_date: request.move_in_date,
                    lease_expiration,
                });
            }
        }

        Ok(ValidatedTenant {
            property_id: PropertyId(property_id),
            unit_number,
            tenant_name,
            move_in_date: request.move_in_date,
            lease_expiration: request.lease_expiration,
            household_size,
            gross_annual_income,
            monthly_rent,
            utility_allowance,
        })
    }

    pub fn validate_recertification(
        &self,
        request: RecertificationRequest,
    ) -> Result<ValidatedRecertification, ValidationError> {
        let household_size = HouseholdSize::new(request.household_size)?;
        let gross_annual_income = non_negative("gross_annual_income", request.gross_annual_income)?;
        let documentation_notes = required("documentation_notes", request.documentation_notes)?;

        Ok(ValidatedRecertification {
            household_size,
            gross_annual_income,
            documentation_notes,
            certified_on: request.certified_on,
        })
    }
}

/// A back-dated recertification may not precede move-in or the tenant's current
/// certification, and may not be dated in the future.
pub(crate) fn certification_date_within(
    certified_on: NaiveDate,
    earliest: NaiveDate,
    latest: NaiveDate,
) -> Result<NaiveDate, ValidationError> {
    if certified_on < earliest || certified_on > latest {
        return Err(ValidationError::CertificationDateOutOfRange {
            certified_on,
            earliest,
            latest,
        });
    }
    Ok(certified_on)
}

pub(crate) fn non_negative(field: &'static str, value: Decimal) -> Result<Decimal, ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::NegativeAmount {
            field,
            found: value,
        });
    }
    Ok(value)
}

fn required(field: &'static str, value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    Ok(trimmed.to_string())
}
