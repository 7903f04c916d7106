use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::classifier::IncomeError;
use super::domain::{IncomeCategory, NewTenantRequest, PropertyId, RecertificationRequest, TenantId};
use super::limits::ConfigurationError;
use super::repository::{ComplianceEventPublisher, TenantRepository};
use super::service::{CertificationError, TenantLifecycleService};
use super::validation::ValidationError;

type SharedService<R, P> = Arc<TenantLifecycleService<R, P>>;

/// Live-preview request for an income classification.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifyIncomeRequest {
    pub gross_annual_income: Decimal,
    pub household_size: i64,
    #[serde(default)]
    pub program_year: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MaxRentRequest {
    pub household_size: i64,
    pub category: IncomeCategory,
    #[serde(default)]
    pub program_year: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MaxRentResponse {
    pub max_rent: Option<Decimal>,
}

/// Router builder exposing certification, recertification and preview endpoints.
pub fn certification_router<R, P>(service: SharedService<R, P>) -> Router
where
    R: TenantRepository + 'static,
    P: ComplianceEventPublisher + 'static,
{
    Router::new()
        .route("/api/v1/tenants", post(create_tenant_handler::<R, P>))
        .route("/api/v1/tenants/:tenant_id", get(get_tenant_handler::<R, P>))
        .route(
            "/api/v1/tenants/:tenant_id/recertifications",
            post(recertify_handler::<R, P>).get(history_handler::<R, P>),
        )
        .route("/api/v1/income/classify", post(classify_handler::<R, P>))
        .route("/api/v1/income/max-rent", post(max_rent_handler::<R, P>))
        .route(
            "/api/v1/properties/:property_id/compliance",
            get(property_compliance_handler::<R, P>),
        )
        .with_state(service)
}

pub(crate) async fn create_tenant_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    axum::Json(request): axum::Json<NewTenantRequest>,
) -> Response
where
    R: TenantRepository + 'static,
    P: ComplianceEventPublisher + 'static,
{
    match service.create_tenant(request) {
        Ok(outcome) => (StatusCode::CREATED, axum::Json(outcome)).into_response(),
        Err(err) => certification_error_response(err),
    }
}

pub(crate) async fn get_tenant_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Path(tenant_id): Path<Uuid>,
) -> Response
where
    R: TenantRepository + 'static,
    P: ComplianceEventPublisher + 'static,
{
    match service.get_tenant(&TenantId(tenant_id)) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(err) => certification_error_response(err),
    }
}

pub(crate) async fn recertify_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Path(tenant_id): Path<Uuid>,
    axum::Json(request): axum::Json<RecertificationRequest>,
) -> Response
where
    R: TenantRepository + 'static,
    P: ComplianceEventPublisher + 'static,
{
    // Write retries back off with a blocking sleep.
    let result = tokio::task::spawn_blocking(move || {
        service.recertify_tenant(&TenantId(tenant_id), request)
    })
    .await;

    match result {
        Ok(Ok(outcome)) => (StatusCode::CREATED, axum::Json(outcome)).into_response(),
        Ok(Err(err)) => certification_error_response(err),
        Err(join_error) => {
            let payload = json!({ "error": format!("recertification aborted: {join_error}") });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn history_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Path(tenant_id): Path<Uuid>,
) -> Response
where
    R: TenantRepository + 'static,
    P: ComplianceEventPublisher + 'static,
{
    match service.recertification_history(&TenantId(tenant_id)) {
        Ok(history) => (StatusCode::OK, axum::Json(history)).into_response(),
        Err(err) => certification_error_response(err),
    }
}

pub(crate) async fn classify_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    axum::Json(request): axum::Json<ClassifyIncomeRequest>,
) -> Response
where
    R: TenantRepository + 'static,
    P: ComplianceEventPublisher + 'static,
{
    let result = match request.program_year {
        Some(year) => service.classify_income_for_year(
            request.gross_annual_income,
            request.household_size,
            year,
        ),
        None => service.classify_income(request.gross_annual_income, request.household_size),
    };

    match result {
        Ok(classification) => (StatusCode::OK, axum::Json(classification)).into_response(),
        Err(err) => income_error_response(err),
    }
}

pub(crate) async fn max_rent_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    axum::Json(request): axum::Json<MaxRentRequest>,
) -> Response
where
    R: TenantRepository + 'static,
    P: ComplianceEventPublisher + 'static,
{
    let result = match request.program_year {
        Some(year) => {
            service.compute_max_rent_for_year(request.household_size, request.category, year)
        }
        None => service.compute_max_rent(request.household_size, request.category),
    };

    match result {
        Ok(max_rent) => (StatusCode::OK, axum::Json(MaxRentResponse { max_rent })).into_response(),
        Err(err) => income_error_response(err),
    }
}

pub(crate) async fn property_compliance_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Path(property_id): Path<String>,
) -> Response
where
    R: TenantRepository + 'static,
    P: ComplianceEventPublisher + 'static,
{
    match service.property_compliance(&PropertyId(property_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => certification_error_response(err),
    }
}

pub(crate) fn certification_error_response(err: CertificationError) -> Response {
    match err {
        CertificationError::Validation(err) => validation_response(&err),
        CertificationError::Configuration(err) => configuration_response(&err),
        CertificationError::NotFound(tenant_id) => {
            let payload = json!({
                "error": "tenant not found",
                "tenant_id": tenant_id,
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        err @ CertificationError::Conflict { .. } => {
            let payload = json!({
                "error": err.to_string(),
                "retry": true,
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        err @ CertificationError::Persistence(_) => {
            let payload = json!({
                "error": err.to_string(),
            });
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) fn income_error_response(err: IncomeError) -> Response {
    match err {
        IncomeError::Validation(err) => validation_response(&err),
        IncomeError::Configuration(err) => configuration_response(&err),
    }
}

fn validation_response(err: &ValidationError) -> Response {
    let payload = json!({
        "error": err.to_string(),
        "field": err.field(),
    });
    (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
}

fn configuration_response(err: &ConfigurationError) -> Response {
    let payload = json!({
        "error": "income limits are misconfigured; contact an administrator",
        "detail": err.to_string(),
    });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
}
