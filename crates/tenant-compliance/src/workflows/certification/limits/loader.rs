use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{AmiLimitEntry, AmiLimitRegistry, AmiLimitTable, ConfigurationError};
use crate::workflows::certification::domain::HouseholdSize;

const BUNDLED_LIMITS: &str = include_str!("../../../../data/ami_limits.csv");

#[derive(Debug)]
pub enum AmiLimitLoadError {
    Io(std::io::Error),
    Csv(csv::Error),
    Configuration(ConfigurationError),
}

impl std::fmt::Display for AmiLimitLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AmiLimitLoadError::Io(err) => write!(f, "failed to read AMI limit file: {}", err),
            AmiLimitLoadError::Csv(err) => write!(f, "invalid AMI limit CSV data: {}", err),
            AmiLimitLoadError::Configuration(err) => {
                write!(f, "AMI limit data rejected: {}", err)
            }
        }
    }
}

impl std::error::Error for AmiLimitLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AmiLimitLoadError::Io(err) => Some(err),
            AmiLimitLoadError::Csv(err) => Some(err),
            AmiLimitLoadError::Configuration(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for AmiLimitLoadError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for AmiLimitLoadError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<ConfigurationError> for AmiLimitLoadError {
    fn from(err: ConfigurationError) -> Self {
        Self::Configuration(err)
    }
}

/// Reads published limits from CSV with the columns
/// `program_year,effective_from,household_size,median_income,very_low_limit,low_limit`.
pub struct AmiLimitLoader;

impl AmiLimitLoader {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<AmiLimitRegistry, AmiLimitLoadError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<AmiLimitRegistry, AmiLimitLoadError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut years: BTreeMap<u16, PendingTable> = BTreeMap::new();
        for row in csv_reader.deserialize::<LimitRow>() {
            let row = row?;
            let program_year = row.program_year;
            let (effective_from, household_size, limits) = row.into_entry()?;

            let pending = years.entry(program_year).or_insert_with(|| PendingTable {
                effective_from,
                entries: Vec::new(),
            });
            if pending.effective_from != effective_from {
                return Err(ConfigurationError::ConflictingEffectiveDate {
                    program_year,
                    first: pending.effective_from,
                    second: effective_from,
                }
                .into());
            }
            pending.entries.push((household_size, limits));
        }

        let mut registry = AmiLimitRegistry::new();
        for (program_year, pending) in years {
            registry.insert(AmiLimitTable::new(
                program_year,
                pending.effective_from,
                pending.entries,
            )?)?;
        }
        Ok(registry)
    }
}

/// Limits shipped with the crate, used when no override file is configured.
pub fn bundled_registry() -> Result<AmiLimitRegistry, AmiLimitLoadError> {
    AmiLimitLoader::from_reader(BUNDLED_LIMITS.as_bytes())
}

struct PendingTable {
    effective_from: NaiveDate,
    entries: Vec<(HouseholdSize, AmiLimitEntry)>,
}

#[derive(Debug, Deserialize)]
struct LimitRow {
    program_year: u16,
    effective_from: NaiveDate,
    household_size: i64,
    median_income: String,
    very_low_limit: String,
    low_limit: String,
}

impl LimitRow {
    fn into_entry(self) -> Result<(NaiveDate, HouseholdSize, AmiLimitEntry), ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidEntry {
            program_year: self.program_year,
            household_size: self.household_size,
            reason,
        };

        let household_size = HouseholdSize::new(self.household_size)
            .map_err(|err| invalid(err.to_string()))?;
        let median_income = parse_amount("median_income", &self.median_income).map_err(invalid)?;
        let very_low_limit =
            parse_amount("very_low_limit", &self.very_low_limit).map_err(invalid)?;
        let low_limit = parse_amount("low_limit", &self.low_limit).map_err(invalid)?;

        Ok((
            self.effective_from,
            household_size,
            AmiLimitEntry {
                median_income,
                very_low_limit,
                low_limit,
            },
        ))
    }
}

fn parse_amount(column: &str, raw: &str) -> Result<Decimal, String> {
    let cleaned = raw.replace([',', '$'], "");
    Decimal::from_str(cleaned.trim()).map_err(|err| format!("{column} '{raw}' is not a number ({err})"))
}
