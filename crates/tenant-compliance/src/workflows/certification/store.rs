use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::domain::{
    PropertyComplianceSummary, PropertyId, RecertificationRecord, Tenant, TenantId,
};
use super::repository::{RepositoryError, TenantRepository, TenantSnapshot};

/// Process-local repository. One mutex covers tenants, ledger and property counts, so
/// every commit is observed whole or not at all.
#[derive(Debug, Default)]
pub struct InMemoryTenantStore {
    state: Mutex<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    tenants: HashMap<TenantId, TenantSnapshot>,
    ledger: HashMap<TenantId, Vec<RecertificationRecord>>,
    summaries: HashMap<PropertyId, PropertyComplianceSummary>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("tenant store lock poisoned".to_string()))
    }
}

impl TenantRepository for InMemoryTenantStore {
    fn insert(&self, tenant: Tenant) -> Result<TenantSnapshot, RepositoryError> {
        let mut state = self.lock()?;
        if state.tenants.contains_key(&tenant.id) {
            return Err(RepositoryError::Conflict);
        }

        state
            .summaries
            .entry(tenant.property_id.clone())
            .or_default()
            .add(&tenant);

        let snapshot = TenantSnapshot { tenant, version: 1 };
        state
            .tenants
            .insert(snapshot.tenant.id, snapshot.clone());
        Ok(snapshot)
    }

    fn fetch(&self, id: &TenantId) -> Result<Option<TenantSnapshot>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.tenants.get(id).cloned())
    }

    fn commit_recertification(
        &self,
        expected_version: u64,
        tenant: Tenant,
        record: RecertificationRecord,
    ) -> Result<TenantSnapshot, RepositoryError> {
        if record.tenant_id != tenant.id {
            return Err(RepositoryError::Unavailable(
                "ledger entry does not belong to tenant".to_string(),
            ));
        }

        let mut state = self.lock()?;
        let current = state
            .tenants
            .get(&tenant.id)
            .ok_or(RepositoryError::NotFound)?;
        if current.version != expected_version {
            return Err(RepositoryError::Conflict);
        }
        let previous = current.tenant.clone();

        if let Some(summary) = state.summaries.get_mut(&previous.property_id) {
            summary.remove(&previous);
        }
        state
            .summaries
            .entry(tenant.property_id.clone())
            .or_default()
            .add(&tenant);

        state.ledger.entry(tenant.id).or_default().push(record);

        let snapshot = TenantSnapshot {
            tenant,
            version: expected_version + 1,
        };
        state
            .tenants
            .insert(snapshot.tenant.id, snapshot.clone());
        Ok(snapshot)
    }

    fn history(&self, id: &TenantId) -> Result<Vec<RecertificationRecord>, RepositoryError> {
        let state = self.lock()?;
        if !state.tenants.contains_key(id) {
            return Err(RepositoryError::NotFound);
        }
        Ok(state.ledger.get(id).cloned().unwrap_or_default())
    }

    fn property_summary(
        &self,
        property_id: &PropertyId,
    ) -> Result<PropertyComplianceSummary, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .summaries
            .get(property_id)
            .cloned()
            .unwrap_or_default())
    }
}
