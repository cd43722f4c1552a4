//! `/contacts/*` routes (§6), mirroring `companies.rs`.

use axum::extract::{Json, Path, State};
use axum::response::Response;
use connectra_core::{Contact, Error, Service, VqlQuery};
use uuid::Uuid;

use crate::response::{bulk_outcome_response, ok, ok_page, ApiResult};
use crate::AppState;

pub async fn list(State(state): State<AppState>, Json(vql): Json<VqlQuery>) -> ApiResult<Response> {
    let (rows, cursor) = state.entity_service.list_by_vql(Service::Contacts, &vql).await?;
    Ok(ok_page(&rows, rows.len(), cursor))
}

pub async fn count(State(state): State<AppState>, Json(vql): Json<VqlQuery>) -> ApiResult<Response> {
    let count = state.entity_service.count_by_vql(Service::Contacts, &vql).await?;
    Ok(ok(serde_json::json!({ "count": count })))
}

pub async fn get(State(state): State<AppState>, Path(uuid): Path<Uuid>) -> ApiResult<Response> {
    let contact = state
        .entity_service
        .get_contact(uuid)
        .await?
        .ok_or_else(|| Error::NotFound(format!("contact {uuid} not found")))?;
    Ok(ok(contact))
}

pub async fn create(State(state): State<AppState>, Json(contact): Json<Contact>) -> ApiResult<Response> {
    state.entity_service.upsert_contact(contact.clone()).await?;
    Ok(ok(contact))
}

pub async fn upsert(State(state): State<AppState>, Json(contact): Json<Contact>) -> ApiResult<Response> {
    state.entity_service.upsert_contact(contact.clone()).await?;
    Ok(ok(contact))
}

pub async fn update(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    Json(mut contact): Json<Contact>,
) -> ApiResult<Response> {
    contact.uuid = uuid;
    let updated = state.entity_service.update_contact(contact).await?;
    Ok(ok(updated))
}

pub async fn delete(State(state): State<AppState>, Path(uuid): Path<Uuid>) -> ApiResult<Response> {
    state.entity_service.delete_contact(uuid).await?;
    Ok(ok(serde_json::json!({ "uuid": uuid })))
}

pub async fn batch_upsert(
    State(state): State<AppState>,
    Json(contacts): Json<Vec<Contact>>,
) -> ApiResult<Response> {
    let total = contacts.len();
    let outcome = state.entity_service.bulk_upsert(Vec::new(), contacts).await?;
    let errors: Vec<String> = outcome.errors.iter().map(ToString::to_string).collect();
    Ok(bulk_outcome_response(total, errors.len(), errors))
}
