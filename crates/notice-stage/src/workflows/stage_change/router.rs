use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;

use super::batch::BatchRequest;
use super::partner::{PartnerChangeOutcome, PartnerChangeRequest};
use super::report::group_by_date;
use super::scheduled::ScheduledProgressionRequest;
use super::search::SearchCriteria;
use super::service::{StageChangeError, StageChangeService};
use super::validation::ValidationRequest;

pub const USER_ID_HEADER: &str = "x-user-id";
const DEFAULT_USER: &str = "SYSTEM";

/// Router builder exposing the portal, partner and scheduler endpoints.
pub fn stage_change_router(service: Arc<StageChangeService>) -> Router {
    Router::new()
        .route("/api/v1/change-processing-stage", post(batch_handler))
        .route(
            "/api/v1/change-processing-stage/validate",
            post(validate_handler),
        )
        .route("/api/v1/change-processing-stage/search", post(search_handler))
        .route("/api/v1/change-processing-stage/reports", get(reports_handler))
        .route(
            "/api/v1/external/plus/change-processing-stage",
            post(partner_handler),
        )
        .route(
            "/api/v1/internal/scheduled/update-stages",
            post(scheduled_handler),
        )
        .with_state(service)
}

fn user_id(headers: &HeaderMap) -> String {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_USER)
        .to_string()
}

pub(crate) async fn batch_handler(
    State(service): State<Arc<StageChangeService>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<BatchRequest>,
) -> Result<Response, AppError> {
    let result = service.process_batch(request, &user_id(&headers))?;
    Ok((StatusCode::OK, axum::Json(result)).into_response())
}

pub(crate) async fn validate_handler(
    State(service): State<Arc<StageChangeService>>,
    axum::Json(request): axum::Json<ValidationRequest>,
) -> Result<Response, AppError> {
    let outcome = service.validate_notices(&request)?;
    Ok((StatusCode::OK, axum::Json(outcome)).into_response())
}

pub(crate) async fn search_handler(
    State(service): State<Arc<StageChangeService>>,
    axum::Json(criteria): axum::Json<SearchCriteria>,
) -> Result<Response, AppError> {
    let outcome = service
        .search_notices(&criteria)
        .map_err(StageChangeError::from)?;
    Ok((StatusCode::OK, axum::Json(outcome)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReportQuery {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

pub(crate) async fn reports_handler(
    State(service): State<Arc<StageChangeService>>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, AppError> {
    let records = service.change_records_between(query.start_date, query.end_date)?;
    let total_records = records.len();
    let payload = json!({
        "startDate": query.start_date,
        "endDate": query.end_date,
        "totalRecords": total_records,
        "reports": group_by_date(records),
    });
    Ok((StatusCode::OK, axum::Json(payload)).into_response())
}

pub(crate) async fn partner_handler(
    State(service): State<Arc<StageChangeService>>,
    axum::Json(request): axum::Json<PartnerChangeRequest>,
) -> Result<Response, AppError> {
    let outcome = service.apply_partner_change(&request)?;
    let message = match outcome {
        PartnerChangeOutcome::Applied => "Stage change applied",
        PartnerChangeOutcome::Skipped => "Stage change skipped by rule",
    };
    let payload = json!({
        "status": outcome,
        "message": message,
    });
    Ok((StatusCode::OK, axum::Json(payload)).into_response())
}

pub(crate) async fn scheduled_handler(
    State(service): State<Arc<StageChangeService>>,
    axum::Json(request): axum::Json<ScheduledProgressionRequest>,
) -> Response {
    let summary = service.progress_scheduled(&request);
    (StatusCode::OK, axum::Json(summary)).into_response()
}
