use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use super::classifier::{self, IncomeClassification, IncomeError};
use super::clock::{Clock, SystemClock};
use super::domain::{
    CertificationOutcome, HouseholdSize, IncomeCategory, NewTenantRequest, PropertyComplianceView,
    PropertyId, RecertificationOutcome, RecertificationRecord, RecertificationRequest, RecordId,
    Tenant, TenantId,
};
use super::limits::{AmiLimitRegistry, ConfigurationError, SharedLimits};
use super::policy::LifecycleConfig;
use super::rent;
use super::repository::{
    ComplianceEvent, ComplianceEventPublisher, OverIncomeNotice, RepositoryError,
    TenantRepository,
};
use super::safe_harbor;
use super::validation::{
    certification_date_within, IntakeGuard, ValidatedRecertification, ValidationError,
};

/// Service composing validation, the calculators, the repository and event hooks.
pub struct TenantLifecycleService<R, P> {
    guard: IntakeGuard,
    limits: Arc<SharedLimits>,
    config: LifecycleConfig,
    repository: Arc<R>,
    events: Arc<P>,
    clock: Arc<dyn Clock>,
}

impl<R, P> TenantLifecycleService<R, P>
where
    R: TenantRepository + 'static,
    P: ComplianceEventPublisher + 'static,
{
    pub fn new(
        repository: Arc<R>,
        events: Arc<P>,
        limits: Arc<SharedLimits>,
        config: LifecycleConfig,
    ) -> Self {
        Self::with_clock(repository, events, limits, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        repository: Arc<R>,
        events: Arc<P>,
        limits: Arc<SharedLimits>,
        config: LifecycleConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            guard: IntakeGuard,
            limits,
            config,
            repository,
            events,
            clock,
        }
    }

    pub fn limits(&self) -> &SharedLimits {
        &self.limits
    }

    /// Live preview against the table in force today.
    pub fn classify_income(
        &self,
        gross_annual_income: Decimal,
        household_size: i64,
    ) -> Result<IncomeClassification, IncomeError> {
        let household_size = HouseholdSize::new(household_size)?;
        let table = self
            .limits
            .snapshot()
            .table_in_force(self.clock.now().date_naive())
            .inspect_err(log_configuration_error)?;
        classifier::classify(gross_annual_income, household_size, &table)
            .inspect_err(log_income_error)
    }

    pub fn classify_income_for_year(
        &self,
        gross_annual_income: Decimal,
        household_size: i64,
        program_year: u16,
    ) -> Result<IncomeClassification, IncomeError> {
        let household_size = HouseholdSize::new(household_size)?;
        let table = self
            .limits
            .snapshot()
            .table_for_year(program_year)
            .inspect_err(log_configuration_error)?;
        classifier::classify(gross_annual_income, household_size, &table)
            .inspect_err(log_income_error)
    }

    /// Rent ceiling preview against the table in force today.
    pub fn compute_max_rent(
        &self,
        household_size: i64,
        category: IncomeCategory,
    ) -> Result<Option<Decimal>, IncomeError> {
        let household_size = HouseholdSize::new(household_size)?;
        let table = self
            .limits
            .snapshot()
            .table_in_force(self.clock.now().date_naive())
            .inspect_err(log_configuration_error)?;
        rent::max_rent(household_size, category, &table, &self.config.policy)
            .inspect_err(log_income_error)
    }

    pub fn compute_max_rent_for_year(
        &self,
        household_size: i64,
        category: IncomeCategory,
        program_year: u16,
    ) -> Result<Option<Decimal>, IncomeError> {
        let household_size = HouseholdSize::new(household_size)?;
        let table = self
            .limits
            .snapshot()
            .table_for_year(program_year)
            .inspect_err(log_configuration_error)?;
        rent::max_rent(household_size, category, &table, &self.config.policy)
            .inspect_err(log_income_error)
    }

    /// Initial certification at move-in. Writes the tenant only; the ledger starts empty.
    pub fn create_tenant(
        &self,
        request: NewTenantRequest,
    ) -> Result<CertificationOutcome, CertificationError> {
        let validated = self
            .guard
            .validate_new_tenant(request)
            .inspect_err(log_validation_error)?;

        let certified_at = self.clock.now();
        let table = self
            .limits
            .snapshot()
            .table_in_force(certified_at.date_naive())
            .inspect_err(log_configuration_error)?;
        let classification = classifier::classify(
            validated.gross_annual_income,
            validated.household_size,
            &table,
        )
        .inspect_err(log_income_error)?;
        let max_rent = rent::max_rent(
            validated.household_size,
            classification.category,
            &table,
            &self.config.policy,
        )
        .inspect_err(log_income_error)?;

        let tenant = Tenant {
            id: TenantId::generate(),
            property_id: validated.property_id,
            unit_number: validated.unit_number,
            tenant_name: validated.tenant_name,
            move_in_date: validated.move_in_date,
            lease_expiration: validated.lease_expiration,
            household_size: validated.household_size,
            gross_annual_income: validated.gross_annual_income,
            income_category: classification.category,
            ami_percentage: classification.ami_percentage,
            monthly_rent: validated.monthly_rent,
            utility_allowance: validated.utility_allowance,
            last_certified_at: certified_at,
            program_year: classification.program_year,
            over_income: false,
        };

        let stored = self
            .repository
            .insert(tenant)
            .map_err(|err| persistence_failure(None, err, 1))?;

        info!(
            tenant_id = %stored.tenant.id,
            property_id = %stored.tenant.property_id,
            unit = %stored.tenant.unit_number,
            category = ?stored.tenant.income_category,
            ami_percentage = stored.tenant.ami_percentage,
            program_year = stored.tenant.program_year,
            "tenant certified at move-in"
        );

        Ok(CertificationOutcome {
            rent_exceeds_ceiling: rent::exceeds_ceiling(stored.tenant.monthly_rent, max_rent),
            max_rent,
            tenant: stored.tenant,
        })
    }

    /// Annual recertification. Re-classifies the new income, evaluates safe harbor
    /// against the previous qualification, and commits tenant + ledger entry together.
    pub fn recertify_tenant(
        &self,
        tenant_id: &TenantId,
        request: RecertificationRequest,
    ) -> Result<RecertificationOutcome, CertificationError> {
        let validated = self
            .guard
            .validate_recertification(request)
            .inspect_err(log_validation_error)?;

        let certified_at = match validated.certified_on {
            Some(date) => date.and_time(NaiveTime::MIN).and_utc(),
            None => self.clock.now(),
        };
        let retry = self.config.retry;
        let mut attempt = 1;

        loop {
            let snapshot = self
                .repository
                .fetch(tenant_id)
                .map_err(|err| persistence_failure(Some(*tenant_id), err, attempt))?
                .ok_or(CertificationError::NotFound(*tenant_id))?;

            let registry = self.limits.snapshot();
            let (updated, record, max_rent) = self.prepare_recertification(
                &registry,
                &snapshot.tenant,
                &validated,
                certified_at,
            )?;

            match self
                .repository
                .commit_recertification(snapshot.version, updated, record.clone())
            {
                Ok(stored) => {
                    return Ok(self.finish_recertification(stored.tenant, record, max_rent));
                }
                Err(err) if attempt < retry.max_attempts && is_retryable(&err) => {
                    warn!(
                        tenant_id = %tenant_id,
                        attempt,
                        error = %err,
                        "recertification write failed; retrying"
                    );
                    std::thread::sleep(retry.backoff_after(attempt));
                    attempt += 1;
                }
                Err(err) => return Err(persistence_failure(Some(*tenant_id), err, attempt)),
            }
        }
    }

    pub fn get_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<CertificationOutcome, CertificationError> {
        let snapshot = self
            .repository
            .fetch(tenant_id)
            .map_err(|err| persistence_failure(Some(*tenant_id), err, 1))?
            .ok_or(CertificationError::NotFound(*tenant_id))?;
        let tenant = snapshot.tenant;

        let table = self
            .limits
            .snapshot()
            .table_for_year(tenant.program_year)
            .inspect_err(log_configuration_error)?;
        let max_rent = rent::max_rent(
            tenant.household_size,
            tenant.income_category,
            &table,
            &self.config.policy,
        )
        .inspect_err(log_income_error)?;

        Ok(CertificationOutcome {
            rent_exceeds_ceiling: rent::exceeds_ceiling(tenant.monthly_rent, max_rent),
            max_rent,
            tenant,
        })
    }

    /// Ledger entries oldest first.
    pub fn recertification_history(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<RecertificationRecord>, CertificationError> {
        match self.repository.history(tenant_id) {
            Ok(history) => Ok(history),
            Err(RepositoryError::NotFound) => Err(CertificationError::NotFound(*tenant_id)),
            Err(err) => Err(persistence_failure(Some(*tenant_id), err, 1)),
        }
    }

    pub fn property_compliance(
        &self,
        property_id: &PropertyId,
    ) -> Result<PropertyComplianceView, CertificationError> {
        let counts = self
            .repository
            .property_summary(property_id)
            .map_err(|err| persistence_failure(None, err, 1))?;
        Ok(PropertyComplianceView::new(property_id.clone(), counts))
    }

    /// Pure part of a recertification attempt: nothing here touches storage.
    fn prepare_recertification(
        &self,
        registry: &AmiLimitRegistry,
        previous: &Tenant,
        validated: &ValidatedRecertification,
        certified_at: DateTime<Utc>,
    ) -> Result<(Tenant, RecertificationRecord, Option<Decimal>), CertificationError> {
        let policy = &self.config.policy;

        if let Some(certified_on) = validated.certified_on {
            let earliest = previous
                .move_in_date
                .max(previous.last_certified_at.date_naive());
            certification_date_within(certified_on, earliest, self.clock.now().date_naive())
                .inspect_err(log_validation_error)?;
        }

        let table = registry
            .table_in_force(certified_at.date_naive())
            .inspect_err(log_configuration_error)?;
        let classification = classifier::classify(
            validated.gross_annual_income,
            validated.household_size,
            &table,
        )
        .inspect_err(log_income_error)?;
        let max_rent = rent::max_rent(
            validated.household_size,
            classification.category,
            &table,
            policy,
        )
        .inspect_err(log_income_error)?;

        let anchor_table = registry
            .table_for_year(previous.program_year)
            .inspect_err(log_configuration_error)?;
        let harbor = safe_harbor::evaluate(
            previous.income_category,
            &anchor_table,
            previous.household_size,
            validated.gross_annual_income,
            policy,
        )
        .inspect_err(log_configuration_error)?;

        let record = RecertificationRecord {
            id: RecordId::generate(),
            tenant_id: previous.id,
            previous_income: previous.gross_annual_income,
            previous_category: previous.income_category,
            previous_household_size: previous.household_size,
            new_income: validated.gross_annual_income,
            new_category: classification.category,
            new_household_size: validated.household_size,
            new_ami_percentage: classification.ami_percentage,
            over_income_flag: harbor.over_income_flag,
            applicable_limit: harbor.applicable_limit,
            over_income_trigger: harbor.over_income_trigger,
            program_year: classification.program_year,
            documentation_notes: validated.documentation_notes.clone(),
            certified_at,
        };

        let updated = Tenant {
            household_size: validated.household_size,
            gross_annual_income: validated.gross_annual_income,
            income_category: classification.category,
            ami_percentage: classification.ami_percentage,
            last_certified_at: certified_at,
            program_year: classification.program_year,
            over_income: previous.over_income || harbor.over_income_flag,
            ..previous.clone()
        };

        Ok((updated, record, max_rent))
    }

    /// Runs after the commit; nothing here can undo or fail the recertification.
    fn finish_recertification(
        &self,
        tenant: Tenant,
        record: RecertificationRecord,
        max_rent: Option<Decimal>,
    ) -> RecertificationOutcome {
        info!(
            tenant_id = %tenant.id,
            record_id = %record.id,
            previous_category = ?record.previous_category,
            new_category = ?record.new_category,
            over_income = record.over_income_flag,
            "tenant recertified"
        );

        if record.over_income_flag {
            if let Some(trigger) = record.over_income_trigger {
                let notice = OverIncomeNotice {
                    tenant_id: tenant.id,
                    property_id: tenant.property_id.clone(),
                    unit_number: tenant.unit_number.clone(),
                    record_id: record.id,
                    new_income: record.new_income,
                    over_income_trigger: trigger,
                    certified_at: record.certified_at,
                };
                if let Err(err) = self.events.publish(ComplianceEvent::OverIncome(notice)) {
                    warn!(
                        tenant_id = %tenant.id,
                        record_id = %record.id,
                        error = %err,
                        "over-income event could not be published"
                    );
                }
            }
        }

        RecertificationOutcome {
            rent_exceeds_ceiling: rent::exceeds_ceiling(tenant.monthly_rent, max_rent),
            max_rent,
            tenant,
            record,
        }
    }
}

/// Error raised by the lifecycle service.
#[derive(Debug, thiserror::Error)]
pub enum CertificationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("tenant {0} not found")]
    NotFound(TenantId),
    #[error("tenant {tenant_id} was updated by another recertification ({attempts} attempt(s)); reload and retry")]
    Conflict { tenant_id: TenantId, attempts: u32 },
    #[error("compliance records could not be saved: {0}")]
    Persistence(RepositoryError),
}

impl From<IncomeError> for CertificationError {
    fn from(value: IncomeError) -> Self {
        match value {
            IncomeError::Validation(err) => Self::Validation(err),
            IncomeError::Configuration(err) => Self::Configuration(err),
        }
    }
}

fn is_retryable(err: &RepositoryError) -> bool {
    matches!(err, RepositoryError::Conflict | RepositoryError::Unavailable(_))
}

fn persistence_failure(
    tenant_id: Option<TenantId>,
    err: RepositoryError,
    attempts: u32,
) -> CertificationError {
    match (tenant_id, err) {
        (Some(tenant_id), RepositoryError::Conflict) => {
            warn!(%tenant_id, attempts, "recertification abandoned after write conflicts");
            CertificationError::Conflict { tenant_id, attempts }
        }
        (Some(tenant_id), RepositoryError::NotFound) => CertificationError::NotFound(tenant_id),
        (_, err) => {
            error!(error = %err, attempts, "tenant repository failure");
            CertificationError::Persistence(err)
        }
    }
}

fn log_validation_error(err: &ValidationError) {
    warn!(field = err.field(), error = %err, "rejected certification input");
}

fn log_configuration_error(err: &ConfigurationError) {
    error!(error = %err, "AMI limit configuration defect");
}

fn log_income_error(err: &IncomeError) {
    match err {
        IncomeError::Validation(err) => log_validation_error(err),
        IncomeError::Configuration(err) => log_configuration_error(err),
    }
}
