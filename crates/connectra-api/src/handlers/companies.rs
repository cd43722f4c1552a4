//! `/companies/*` routes (§6).

use axum::extract::{Json, Path, State};
use axum::response::Response;
use connectra_core::{Company, Error, Service, VqlQuery};
use uuid::Uuid;

use crate::response::{bulk_outcome_response, ok, ok_page, ApiResult};
use crate::AppState;

pub async fn list(State(state): State<AppState>, Json(vql): Json<VqlQuery>) -> ApiResult<Response> {
    let (rows, cursor) = state.entity_service.list_by_vql(Service::Companies, &vql).await?;
    Ok(ok_page(&rows, rows.len(), cursor))
}

pub async fn count(State(state): State<AppState>, Json(vql): Json<VqlQuery>) -> ApiResult<Response> {
    let count = state.entity_service.count_by_vql(Service::Companies, &vql).await?;
    Ok(ok(serde_json::json!({ "count": count })))
}

pub async fn get(State(state): State<AppState>, Path(uuid): Path<Uuid>) -> ApiResult<Response> {
    let company = state
        .entity_service
        .get_company(uuid)
        .await?
        .ok_or_else(|| Error::NotFound(format!("company {uuid} not found")))?;
    Ok(ok(company))
}

pub async fn create(State(state): State<AppState>, Json(company): Json<Company>) -> ApiResult<Response> {
    state.entity_service.upsert_company(company.clone()).await?;
    Ok(ok(company))
}

pub async fn upsert(State(state): State<AppState>, Json(company): Json<Company>) -> ApiResult<Response> {
    state.entity_service.upsert_company(company.clone()).await?;
    Ok(ok(company))
}

pub async fn update(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    Json(mut company): Json<Company>,
) -> ApiResult<Response> {
    company.uuid = uuid;
    let updated = state.entity_service.update_company(company).await?;
    Ok(ok(updated))
}

pub async fn delete(State(state): State<AppState>, Path(uuid): Path<Uuid>) -> ApiResult<Response> {
    state.entity_service.delete_company(uuid).await?;
    Ok(ok(serde_json::json!({ "uuid": uuid })))
}

pub async fn batch_upsert(
    State(state): State<AppState>,
    Json(companies): Json<Vec<Company>>,
) -> ApiResult<Response> {
    let total = companies.len();
    let outcome = state.entity_service.bulk_upsert(companies, Vec::new()).await?;
    let errors: Vec<String> = outcome.errors.iter().map(ToString::to_string).collect();
    Ok(bulk_outcome_response(total, errors.len(), errors))
}
