use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tenant_compliance::config::ComplianceSettings;
use tenant_compliance::error::AppError;
use tenant_compliance::workflows::certification::{
    bundled_registry, AmiLimitLoader, AmiLimitRegistry, ComplianceEvent,
    ComplianceEventPublisher, EventError, IncomeCategory, InMemoryTenantStore, LifecycleConfig,
    SharedLimits, TenantLifecycleService,
};
use tracing::{info, warn};

pub(crate) type ComplianceService =
    TenantLifecycleService<InMemoryTenantStore, LoggingEventPublisher>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Logs each compliance event; nothing is retained.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoggingEventPublisher;

impl ComplianceEventPublisher for LoggingEventPublisher {
    fn publish(&self, event: ComplianceEvent) -> Result<(), EventError> {
        match &event {
            ComplianceEvent::OverIncome(notice) => info!(
                tenant_id = %notice.tenant_id,
                property_id = %notice.property_id,
                unit = %notice.unit_number,
                trigger = %notice.over_income_trigger,
                "next comparable vacancy must be rented to a qualifying household"
            ),
        }
        Ok(())
    }
}

/// Configured CSV when set, otherwise the limits bundled with the engine.
pub(crate) fn load_limits(settings: &ComplianceSettings) -> Result<AmiLimitRegistry, AppError> {
    let registry = match &settings.ami_limits_path {
        Some(path) => {
            info!(path = %path.display(), "loading AMI limits");
            AmiLimitLoader::from_path(path)?
        }
        None => bundled_registry()?,
    };

    if registry.is_empty() {
        warn!("AMI limit source contained no program years");
    }
    Ok(registry)
}

pub(crate) fn build_service(
    settings: &ComplianceSettings,
) -> Result<Arc<ComplianceService>, AppError> {
    build_service_with(settings, Arc::new(LoggingEventPublisher))
}

pub(crate) fn build_service_with<P>(
    settings: &ComplianceSettings,
    events: Arc<P>,
) -> Result<Arc<TenantLifecycleService<InMemoryTenantStore, P>>, AppError>
where
    P: ComplianceEventPublisher + 'static,
{
    let registry = load_limits(settings)?;
    info!(program_years = ?registry.program_years(), "AMI limits loaded");

    let config = LifecycleConfig::try_from(settings)?;
    let service = TenantLifecycleService::new(
        Arc::new(InMemoryTenantStore::new()),
        events,
        Arc::new(SharedLimits::new(registry)),
        config,
    );
    Ok(Arc::new(service))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_category(raw: &str) -> Result<IncomeCategory, String> {
    let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
    match normalized.as_str() {
        "very_low" | "vli" => Ok(IncomeCategory::VeryLow),
        "low" | "li" => Ok(IncomeCategory::Low),
        "market_rate" | "market" => Ok(IncomeCategory::MarketRate),
        _ => Err(format!(
            "unknown income category '{raw}' (expected very-low, low or market-rate)"
        )),
    }
}
