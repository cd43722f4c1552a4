//! `/common/*` and `/:service/filters*` routes (§6).

use axum::extract::{Json, Path, Query, State};
use axum::response::Response;
use chrono::Utc;
use connectra_core::defaults::PRESIGNED_URL_TTL_SECS;
use connectra_core::{Company, Contact, DagNode, Error, Job, JobRepository, JobStatus, ObjectStore};
use serde::Deserialize;
use uuid::Uuid;

use crate::response::{bulk_outcome_response, ok, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BatchUpsertPayload {
    #[serde(default)]
    pub companies: Vec<Company>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

pub async fn batch_upsert(
    State(state): State<AppState>,
    Json(payload): Json<BatchUpsertPayload>,
) -> ApiResult<Response> {
    let total = payload.companies.len() + payload.contacts.len();
    let outcome = state
        .entity_service
        .bulk_upsert(payload.companies, payload.contacts)
        .await?;
    let errors: Vec<String> = outcome.errors.iter().map(ToString::to_string).collect();
    Ok(bulk_outcome_response(total, errors.len(), errors))
}

pub async fn create_job_dag(
    State(state): State<AppState>,
    Json(nodes): Json<Vec<DagNode>>,
) -> ApiResult<Response> {
    let validated = connectra_jobs::validate_dag(&nodes)?;
    state.db.jobs.bulk_upsert(&validated.jobs).await?;
    state.db.jobs.bulk_insert_edges(&validated.edges).await?;
    Ok(ok(serde_json::json!({ "job_count": validated.jobs.len() })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateJobPayload {
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub retry_count: Option<i32>,
    #[serde(default)]
    pub retry_interval: Option<i64>,
}

/// Update a job's mutable fields and retrigger it (§6: "update + retrigger"):
/// resets `status = open` and `run_after = now` so the scheduler's next tick
/// re-claims it.
pub async fn update_job(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    Json(payload): Json<UpdateJobPayload>,
) -> ApiResult<Response> {
    let mut job = state
        .db
        .jobs
        .get(uuid)
        .await?
        .ok_or_else(|| Error::NotFound(format!("job {uuid} not found")))?;

    if let Some(job_title) = payload.job_title {
        job.job_title = Some(job_title);
    }
    if let Some(data) = payload.data {
        job.data = data;
    }
    if let Some(retry_count) = payload.retry_count {
        job.retry_count = retry_count;
    }
    if let Some(retry_interval) = payload.retry_interval {
        job.retry_interval = retry_interval;
    }
    job.status = JobStatus::Open;
    job.run_after = Utc::now();

    state.db.jobs.bulk_upsert(std::slice::from_ref(&job)).await?;
    Ok(ok(job))
}

pub async fn get_job(State(state): State<AppState>, Path(uuid): Path<Uuid>) -> ApiResult<Response> {
    let job = state
        .db
        .jobs
        .get(uuid)
        .await?
        .ok_or_else(|| Error::NotFound(format!("job {uuid} not found")))?;
    Ok(ok(job))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsPayload {
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Json(payload): Json<ListJobsPayload>,
) -> ApiResult<Response> {
    let jobs: Vec<Job> = state.db.jobs.list(payload.status, payload.limit, payload.offset).await?;
    Ok(ok(&jobs))
}

#[derive(Debug, Deserialize)]
pub struct PresignedUrlQuery {
    pub bucket: String,
    pub key: String,
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

pub async fn upload_url(
    State(state): State<AppState>,
    Query(query): Query<PresignedUrlQuery>,
) -> ApiResult<Response> {
    let ttl = query.ttl_secs.unwrap_or(PRESIGNED_URL_TTL_SECS);
    let url = state.object_store.presigned_url(&query.bucket, &query.key, ttl).await?;
    Ok(ok(serde_json::json!({ "url": url })))
}

pub async fn download_url(
    State(state): State<AppState>,
    Query(query): Query<PresignedUrlQuery>,
) -> ApiResult<Response> {
    let ttl = query.ttl_secs.unwrap_or(PRESIGNED_URL_TTL_SECS);
    let url = state.object_store.presigned_url(&query.bucket, &query.key, ttl).await?;
    Ok(ok(serde_json::json!({ "url": url })))
}

pub async fn list_filters(State(state): State<AppState>, Path(service): Path<String>) -> ApiResult<Response> {
    let _: connectra_core::Service = service.parse()?;
    let definitions = state.filter_registry.list_definitions(&service).await?;
    Ok(ok(&*definitions))
}

#[derive(Debug, Deserialize)]
pub struct FilterDataPayload {
    pub filter_key: String,
}

pub async fn filter_data(
    State(state): State<AppState>,
    Path(service): Path<String>,
    Json(payload): Json<FilterDataPayload>,
) -> ApiResult<Response> {
    let _: connectra_core::Service = service.parse()?;
    let definitions = state.filter_registry.list_definitions(&service).await?;
    let definition = definitions
        .iter()
        .find(|def| def.key == payload.filter_key)
        .ok_or_else(|| Error::NotFound(format!("unknown filter_key {}", payload.filter_key)))?;
    let values = state
        .filter_registry
        .list_values(&service, &payload.filter_key, definition.direct_derived)
        .await?;
    Ok(ok(&*values))
}
