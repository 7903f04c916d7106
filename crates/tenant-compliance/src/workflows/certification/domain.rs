use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::ValidationError;

/// Identifier wrapper for tenants under compliance tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier wrapper for ledger entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub String);

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Number of persons in a household, restricted to the range the limit tables publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct HouseholdSize(u8);

impl HouseholdSize {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 8;

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ValidationError::HouseholdSizeOutOfRange { found: value })
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (Self::MIN..=Self::MAX).map(Self)
    }
}

impl TryFrom<i64> for HouseholdSize {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<HouseholdSize> for u8 {
    fn from(value: HouseholdSize) -> Self {
        value.0
    }
}

impl fmt::Display for HouseholdSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Income tier derived from the household's gross annual income.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncomeCategory {
    VeryLow,
    Low,
    MarketRate,
}

impl IncomeCategory {
    pub const fn ordered() -> [Self; 3] {
        [Self::VeryLow, Self::Low, Self::MarketRate]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::VeryLow => "Very Low Income",
            Self::Low => "Low Income",
            Self::MarketRate => "Market Rate",
        }
    }

    /// Whether the tier counts toward an income-restricted set-aside.
    pub const fn is_qualifying(self) -> bool {
        matches!(self, Self::VeryLow | Self::Low)
    }
}

impl fmt::Display for IncomeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Current compliance state for a leased unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub property_id: PropertyId,
    pub unit_number: String,
    pub tenant_name: String,
    pub move_in_date: NaiveDate,
    pub lease_expiration: Option<NaiveDate>,
    pub household_size: HouseholdSize,
    pub gross_annual_income: Decimal,
    pub income_category: IncomeCategory,
    pub ami_percentage: u32,
    pub monthly_rent: Decimal,
    pub utility_allowance: Decimal,
    pub last_certified_at: DateTime<Utc>,
    /// Limit table version the current classification was computed under.
    pub program_year: u16,
    /// Sticky: stays set once any recertification breaches the safe-harbor trigger.
    pub over_income: bool,
}

/// Append-only audit entry written by each recertification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecertificationRecord {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub previous_income: Decimal,
    pub previous_category: IncomeCategory,
    pub previous_household_size: HouseholdSize,
    pub new_income: Decimal,
    pub new_category: IncomeCategory,
    pub new_household_size: HouseholdSize,
    pub new_ami_percentage: u32,
    pub over_income_flag: bool,
    pub applicable_limit: Option<Decimal>,
    pub over_income_trigger: Option<Decimal>,
    pub program_year: u16,
    pub documentation_notes: String,
    pub certified_at: DateTime<Utc>,
}

/// Move-in certification payload as collected by intake forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTenantRequest {
    pub property_id: String,
    pub unit_number: String,
    pub tenant_name: String,
    pub move_in_date: NaiveDate,
    #[serde(default)]
    pub lease_expiration: Option<NaiveDate>,
    pub household_size: i64,
    pub gross_annual_income: Decimal,
    pub monthly_rent: Decimal,
    pub utility_allowance: Decimal,
}

/// Annual (or ad hoc) recertification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecertificationRequest {
    pub gross_annual_income: Decimal,
    pub household_size: i64,
    #[serde(default)]
    pub documentation_notes: String,
    /// Back-dates the certification; the limit table in force on this date applies.
    #[serde(default)]
    pub certified_on: Option<NaiveDate>,
}

/// Result of an initial certification or a tenant lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificationOutcome {
    pub tenant: Tenant,
    pub max_rent: Option<Decimal>,
    pub rent_exceeds_ceiling: bool,
}

/// Both recertification signals travel together: the re-derived category lives on
/// `record.new_category` and the safe-harbor result on `record.over_income_flag`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecertificationOutcome {
    pub tenant: Tenant,
    pub record: RecertificationRecord,
    pub max_rent: Option<Decimal>,
    pub rent_exceeds_ceiling: bool,
}

impl RecertificationOutcome {
    pub fn new_category(&self) -> IncomeCategory {
        self.record.new_category
    }

    pub fn over_income(&self) -> bool {
        self.record.over_income_flag
    }
}

/// Point-in-time unit counts per tier for a single property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyComplianceSummary {
    pub very_low: u32,
    pub low: u32,
    pub market_rate: u32,
    pub over_income: u32,
}

impl PropertyComplianceSummary {
    pub fn total(&self) -> u32 {
        self.very_low + self.low + self.market_rate
    }

    pub fn qualifying(&self) -> u32 {
        self.very_low + self.low
    }

    pub(crate) fn add(&mut self, tenant: &Tenant) {
        match tenant.income_category {
            IncomeCategory::VeryLow => self.very_low += 1,
            IncomeCategory::Low => self.low += 1,
            IncomeCategory::MarketRate => self.market_rate += 1,
        }
        if tenant.over_income {
            self.over_income += 1;
        }
    }

    pub(crate) fn remove(&mut self, tenant: &Tenant) {
        let slot = match tenant.income_category {
            IncomeCategory::VeryLow => &mut self.very_low,
            IncomeCategory::Low => &mut self.low,
            IncomeCategory::MarketRate => &mut self.market_rate,
        };
        *slot = slot.saturating_sub(1);
        if tenant.over_income {
            self.over_income = self.over_income.saturating_sub(1);
        }
    }
}

/// Compliance counts keyed to the property they describe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyComplianceView {
    pub property_id: PropertyId,
    pub counts: PropertyComplianceSummary,
    pub total_units: u32,
    pub qualifying_units: u32,
}

impl PropertyComplianceView {
    pub fn new(property_id: PropertyId, counts: PropertyComplianceSummary) -> Self {
        Self {
            total_units: counts.total(),
            qualifying_units: counts.qualifying(),
            property_id,
            counts,
        }
    }
}
