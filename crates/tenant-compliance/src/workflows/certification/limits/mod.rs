//! Versioned AMI income-limit tables.
//!
//! Each program year publishes one table, effective from a given date. Recertifications
//! resolve the table in force on their certification date, so superseded years stay
//! loaded for as long as a tenant's history can reference them.

mod loader;

pub use loader::{bundled_registry, AmiLimitLoadError, AmiLimitLoader};

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::domain::{HouseholdSize, IncomeCategory};

/// Operator-side defects in the limit configuration. Never a user input problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("AMI limit table {program_year} has no entry for household size {household_size}")]
    MissingEntry {
        program_year: u16,
        household_size: HouseholdSize,
    },
    #[error("no AMI limit table is configured for program year {program_year}")]
    MissingProgramYear { program_year: u16 },
    #[error("no AMI limit table is in force on {date}")]
    NoTableInForce { date: NaiveDate },
    #[error("AMI limit table {program_year}, household size {household_size}: {reason}")]
    InvalidEntry {
        program_year: u16,
        household_size: i64,
        reason: String,
    },
    #[error("AMI limit table {program_year} lists household size {household_size} twice")]
    DuplicateEntry {
        program_year: u16,
        household_size: HouseholdSize,
    },
    #[error("AMI limit table {program_year} is already registered")]
    DuplicateProgramYear { program_year: u16 },
    #[error("AMI limit table {program_year} mixes effective dates {first} and {second}")]
    ConflictingEffectiveDate {
        program_year: u16,
        first: NaiveDate,
        second: NaiveDate,
    },
    #[error("invalid compliance policy: {reason}")]
    InvalidPolicy { reason: String },
}

/// Published limits for one household size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmiLimitEntry {
    /// 100% AMI baseline, used for `ami_percentage`.
    pub median_income: Decimal,
    pub very_low_limit: Decimal,
    pub low_limit: Decimal,
}

impl AmiLimitEntry {
    /// Annual income limit for a qualifying tier; market rate has none.
    pub fn limit_for(&self, category: IncomeCategory) -> Option<Decimal> {
        match category {
            IncomeCategory::VeryLow => Some(self.very_low_limit),
            IncomeCategory::Low => Some(self.low_limit),
            IncomeCategory::MarketRate => None,
        }
    }

    fn check(&self) -> Result<(), String> {
        if self.median_income <= Decimal::ZERO
            || self.very_low_limit <= Decimal::ZERO
            || self.low_limit <= Decimal::ZERO
        {
            return Err("limits must be positive".to_string());
        }
        if self.very_low_limit > self.low_limit {
            return Err(format!(
                "very_low_limit {} exceeds low_limit {}",
                self.very_low_limit, self.low_limit
            ));
        }
        if self.low_limit > self.median_income {
            return Err(format!(
                "low_limit {} exceeds median_income {}",
                self.low_limit, self.median_income
            ));
        }
        Ok(())
    }
}

/// Immutable limits for a single program year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmiLimitTable {
    program_year: u16,
    effective_from: NaiveDate,
    entries: BTreeMap<HouseholdSize, AmiLimitEntry>,
}

impl AmiLimitTable {
    pub fn new<I>(
        program_year: u16,
        effective_from: NaiveDate,
        entries: I,
    ) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (HouseholdSize, AmiLimitEntry)>,
    {
        let mut map = BTreeMap::new();
        for (household_size, entry) in entries {
            entry
                .check()
                .map_err(|reason| ConfigurationError::InvalidEntry {
                    program_year,
                    household_size: i64::from(household_size.get()),
                    reason,
                })?;
            if map.insert(household_size, entry).is_some() {
                return Err(ConfigurationError::DuplicateEntry {
                    program_year,
                    household_size,
                });
            }
        }

        Ok(Self {
            program_year,
            effective_from,
            entries: map,
        })
    }

    pub fn program_year(&self) -> u16 {
        self.program_year
    }

    pub fn effective_from(&self) -> NaiveDate {
        self.effective_from
    }

    /// A miss here is an operator defect: the size itself was already validated.
    pub fn entry(&self, household_size: HouseholdSize) -> Result<&AmiLimitEntry, ConfigurationError> {
        self.entries
            .get(&household_size)
            .ok_or(ConfigurationError::MissingEntry {
                program_year: self.program_year,
                household_size,
            })
    }

    /// A calculation on one of this table's limits left the decimal range.
    pub(crate) fn overflow(
        &self,
        household_size: HouseholdSize,
        calculation: &str,
    ) -> ConfigurationError {
        ConfigurationError::InvalidEntry {
            program_year: self.program_year,
            household_size: i64::from(household_size.get()),
            reason: format!("{calculation} overflows the supported range"),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (HouseholdSize, &AmiLimitEntry)> {
        self.entries.iter().map(|(size, entry)| (*size, entry))
    }
}

/// All loaded program years.
#[derive(Debug, Clone, Default)]
pub struct AmiLimitRegistry {
    tables: BTreeMap<u16, Arc<AmiLimitTable>>,
}

impl AmiLimitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables<I>(tables: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = AmiLimitTable>,
    {
        let mut registry = Self::new();
        for table in tables {
            registry.insert(table)?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, table: AmiLimitTable) -> Result<(), ConfigurationError> {
        let program_year = table.program_year();
        if self.tables.contains_key(&program_year) {
            return Err(ConfigurationError::DuplicateProgramYear { program_year });
        }
        self.tables.insert(program_year, Arc::new(table));
        Ok(())
    }

    pub fn table_for_year(&self, program_year: u16) -> Result<Arc<AmiLimitTable>, ConfigurationError> {
        self.tables
            .get(&program_year)
            .cloned()
            .ok_or(ConfigurationError::MissingProgramYear { program_year })
    }

    /// The table with the latest `effective_from` on or before `date`.
    pub fn table_in_force(&self, date: NaiveDate) -> Result<Arc<AmiLimitTable>, ConfigurationError> {
        self.tables
            .values()
            .filter(|table| table.effective_from() <= date)
            .max_by_key(|table| table.effective_from())
            .cloned()
            .ok_or(ConfigurationError::NoTableInForce { date })
    }

    pub fn program_years(&self) -> Vec<u16> {
        self.tables.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Shared, swappable handle to the active registry.
///
/// Readers take an `Arc` snapshot so a swap never changes limits mid-calculation.
#[derive(Debug, Default)]
pub struct SharedLimits {
    current: RwLock<Arc<AmiLimitRegistry>>,
}

impl SharedLimits {
    pub fn new(registry: AmiLimitRegistry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    pub fn snapshot(&self) -> Arc<AmiLimitRegistry> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, registry: AmiLimitRegistry) {
        let next = Arc::new(registry);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}
