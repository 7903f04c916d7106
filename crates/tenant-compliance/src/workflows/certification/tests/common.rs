use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::workflows::certification::domain::{
    HouseholdSize, NewTenantRequest, PropertyComplianceSummary, PropertyId,
    RecertificationRecord, RecertificationRequest, Tenant, TenantId,
};
use crate::workflows::certification::limits::{
    AmiLimitEntry, AmiLimitRegistry, AmiLimitTable, SharedLimits,
};
use crate::workflows::certification::policy::{LifecycleConfig, RetryPolicy};
use crate::workflows::certification::repository::{
    ComplianceEvent, ComplianceEventPublisher, EventError, RepositoryError, TenantRepository,
    TenantSnapshot,
};
use crate::workflows::certification::{FixedClock, InMemoryTenantStore, TenantLifecycleService};

pub(super) const PROPERTY: &str = "MAPLE-COURT";

pub(super) fn amount(value: i64) -> Decimal {
    Decimal::from(value)
}

pub(super) fn size(value: i64) -> HouseholdSize {
    HouseholdSize::new(value).expect("valid household size")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// Median grows 8000 per extra person; very low is 50% and low is 80% of median.
fn entry_for(base_median: i64, household_size: i64) -> AmiLimitEntry {
    let median = base_median + (household_size - 1) * 8000;
    AmiLimitEntry {
        median_income: amount(median),
        very_low_limit: amount(median / 2),
        low_limit: amount(median * 4 / 5),
    }
}

/// 2025 limits: household of 1 is 30000 / 48000, household of 4 is 42000 / 67200.
pub(super) fn table_2025() -> AmiLimitTable {
    AmiLimitTable::new(
        2025,
        date(2025, 1, 1),
        HouseholdSize::all().map(|size| (size, entry_for(60000, i64::from(size.get())))),
    )
    .expect("2025 table is valid")
}

/// 2024 limits: household of 1 is 28000 / 44800.
pub(super) fn table_2024() -> AmiLimitTable {
    AmiLimitTable::new(
        2024,
        date(2024, 1, 1),
        HouseholdSize::all().map(|size| (size, entry_for(56000, i64::from(size.get())))),
    )
    .expect("2024 table is valid")
}

pub(super) fn registry() -> AmiLimitRegistry {
    AmiLimitRegistry::from_tables([table_2024(), table_2025()]).expect("registry builds")
}

pub(super) fn lifecycle_config() -> LifecycleConfig {
    LifecycleConfig {
        retry: RetryPolicy::immediate(3),
        ..LifecycleConfig::default()
    }
}

pub(super) fn clock() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2025, 6, 1, 15, 0, 0).unwrap())
}

pub(super) fn service_with<R>(
    repository: Arc<R>,
) -> (TenantLifecycleService<R, MemoryEvents>, Arc<MemoryEvents>)
where
    R: TenantRepository + 'static,
{
    service_with_clock(repository, clock())
}

pub(super) fn service_with_clock<R>(
    repository: Arc<R>,
    clock: FixedClock,
) -> (TenantLifecycleService<R, MemoryEvents>, Arc<MemoryEvents>)
where
    R: TenantRepository + 'static,
{
    let events = Arc::new(MemoryEvents::default());
    let service = TenantLifecycleService::with_clock(
        repository,
        events.clone(),
        Arc::new(SharedLimits::new(registry())),
        lifecycle_config(),
        Arc::new(clock),
    );
    (service, events)
}

pub(super) fn build_service() -> (
    TenantLifecycleService<InMemoryTenantStore, MemoryEvents>,
    Arc<InMemoryTenantStore>,
    Arc<MemoryEvents>,
) {
    let store = Arc::new(InMemoryTenantStore::new());
    let (service, events) = service_with(store.clone());
    (service, store, events)
}

pub(super) fn tenant_request(unit: &str, household_size: i64, income: i64) -> NewTenantRequest {
    NewTenantRequest {
        property_id: PROPERTY.to_string(),
        unit_number: unit.to_string(),
        tenant_name: format!("Resident {unit}"),
        move_in_date: date(2025, 5, 1),
        lease_expiration: Some(date(2026, 4, 30)),
        household_size,
        gross_annual_income: amount(income),
        monthly_rent: amount(700),
        utility_allowance: amount(85),
    }
}

pub(super) fn recert_request(household_size: i64, income: Decimal) -> RecertificationRequest {
    RecertificationRequest {
        gross_annual_income: income,
        household_size,
        documentation_notes: "Pay stubs and employer verification on file".to_string(),
        certified_on: None,
    }
}

#[derive(Default)]
pub(super) struct MemoryEvents {
    events: Mutex<Vec<ComplianceEvent>>,
}

impl MemoryEvents {
    pub(super) fn events(&self) -> Vec<ComplianceEvent> {
        self.events.lock().expect("event mutex poisoned").clone()
    }
}

impl ComplianceEventPublisher for MemoryEvents {
    fn publish(&self, event: ComplianceEvent) -> Result<(), EventError> {
        self.events.lock().expect("event mutex poisoned").push(event);
        Ok(())
    }
}

pub(super) struct OfflineEvents;

impl ComplianceEventPublisher for OfflineEvents {
    fn publish(&self, _event: ComplianceEvent) -> Result<(), EventError> {
        Err(EventError::Transport("broker offline".to_string()))
    }
}

/// Delegates to the in-memory store but fails the first `conflicts` commits as if another
/// writer got there first.
pub(super) struct ContendedRepository {
    pub(super) inner: InMemoryTenantStore,
    conflicts: AtomicU32,
    commit_calls: AtomicU32,
}

impl ContendedRepository {
    pub(super) fn new(conflicts: u32) -> Self {
        Self {
            inner: InMemoryTenantStore::new(),
            conflicts: AtomicU32::new(conflicts),
            commit_calls: AtomicU32::new(0),
        }
    }

    pub(super) fn commit_calls(&self) -> u32 {
        self.commit_calls.load(Ordering::SeqCst)
    }
}

impl TenantRepository for ContendedRepository {
    fn insert(&self, tenant: Tenant) -> Result<TenantSnapshot, RepositoryError> {
        self.inner.insert(tenant)
    }

    fn fetch(&self, id: &TenantId) -> Result<Option<TenantSnapshot>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn commit_recertification(
        &self,
        expected_version: u64,
        tenant: Tenant,
        record: RecertificationRecord,
    ) -> Result<TenantSnapshot, RepositoryError> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.conflicts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.conflicts.store(remaining - 1, Ordering::SeqCst);
            return Err(RepositoryError::Conflict);
        }
        self.inner
            .commit_recertification(expected_version, tenant, record)
    }

    fn history(&self, id: &TenantId) -> Result<Vec<RecertificationRecord>, RepositoryError> {
        self.inner.history(id)
    }

    fn property_summary(
        &self,
        property_id: &PropertyId,
    ) -> Result<PropertyComplianceSummary, RepositoryError> {
        self.inner.property_summary(property_id)
    }
}

/// Reads and inserts work; every recertification commit fails.
pub(super) struct FailingCommitRepository {
    pub(super) inner: InMemoryTenantStore,
}

impl FailingCommitRepository {
    pub(super) fn new() -> Self {
        Self {
            inner: InMemoryTenantStore::new(),
        }
    }
}

impl TenantRepository for FailingCommitRepository {
    fn insert(&self, tenant: Tenant) -> Result<TenantSnapshot, RepositoryError> {
        self.inner.insert(tenant)
    }

    fn fetch(&self, id: &TenantId) -> Result<Option<TenantSnapshot>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn commit_recertification(
        &self,
        _expected_version: u64,
        _tenant: Tenant,
        _record: RecertificationRecord,
    ) -> Result<TenantSnapshot, RepositoryError> {
        Err(RepositoryError::Unavailable("disk full".to_string()))
    }

    fn history(&self, id: &TenantId) -> Result<Vec<RecertificationRecord>, RepositoryError> {
        self.inner.history(id)
    }

    fn property_summary(
        &self,
        property_id: &PropertyId,
    ) -> Result<PropertyComplianceSummary, RepositoryError> {
        self.inner.property_summary(property_id)
    }
}

pub(super) struct UnavailableRepository;

impl TenantRepository for UnavailableRepository {
    fn insert(&self, _tenant: Tenant) -> Result<TenantSnapshot, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &TenantId) -> Result<Option<TenantSnapshot>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn commit_recertification(
        &self,
        _expected_version: u64,
        _tenant: Tenant,
        _record: RecertificationRecord,
    ) -> Result<TenantSnapshot, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn history(&self, _id: &TenantId) -> Result<Vec<RecertificationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn property_summary(
        &self,
        _property_id: &PropertyId,
    ) -> Result<PropertyComplianceSummary, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
