//! PostgreSQL adapter for `jobs` and `job_edges` (§4.1, §4.2, §4.7).

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use connectra_core::{Edge, Error, Job, JobRepository, JobResponse, JobStatus, JobType, Result, RunMode};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn status_to_str(status: JobStatus) -> &'static str {
        match status {
            JobStatus::Open => "open",
            JobStatus::InQueue => "in_queue",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::RetryInQueued => "retry_in_queued",
        }
    }

    fn status_from_str(s: &str) -> Result<JobStatus> {
        match s {
            "open" => Ok(JobStatus::Open),
            "in_queue" => Ok(JobStatus::InQueue),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "retry_in_queued" => Ok(JobStatus::RetryInQueued),
            other => Err(Error::Internal(format!("unknown job status: {other}"))),
        }
    }

    fn dedup_by_uuid(jobs: &[Job]) -> Vec<&Job> {
        let mut seen = std::collections::HashMap::new();
        for job in jobs {
            seen.insert(job.uuid, job);
        }
        seen.into_values().collect()
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn bulk_upsert(&self, jobs: &[Job]) -> Result<()> {
        if jobs.is_empty() {
            return Ok(());
        }
        let deduped = Self::dedup_by_uuid(jobs);

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        for job in deduped {
            sqlx::query(
                "INSERT INTO jobs (
                    uuid, job_title, job_type, data, status, retry_count, retry_interval,
                    run_after, job_response, degree, created_at, updated_at, deleted_at
                ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13
                )
                ON CONFLICT (uuid) DO UPDATE SET
                    status = EXCLUDED.status,
                    job_response = EXCLUDED.job_response,
                    retry_count = EXCLUDED.retry_count,
                    run_after = EXCLUDED.run_after,
                    updated_at = EXCLUDED.updated_at",
            )
            .bind(job.uuid)
            .bind(&job.job_title)
            .bind(job.job_type.to_string())
            .bind(&job.data)
            .bind(Self::status_to_str(job.status))
            .bind(job.retry_count)
            .bind(job.retry_interval)
            .bind(job.run_after)
            .bind(Json(&job.job_response))
            .bind(job.degree)
            .bind(job.created_at)
            .bind(job.updated_at)
            .bind(job.deleted_at)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn bulk_insert_edges(&self, edges: &[Edge]) -> Result<()> {
        if edges.is_empty() {
            return Ok(());
        }
        let sources: Vec<Uuid> = edges.iter().map(|e| e.source).collect();
        let targets: Vec<Uuid> = edges.iter().map(|e| e.target).collect();
        sqlx::query(
            "INSERT INTO job_edges (source, target)
             SELECT * FROM UNNEST($1::uuid[], $2::uuid[])",
        )
        .bind(&sources)
        .bind(&targets)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fetch_eligible(&self, mode: RunMode, limit: i64) -> Result<Vec<Job>> {
        let rows = match mode {
            RunMode::FirstTime => {
                sqlx::query_as::<_, JobRow>(
                    "SELECT uuid, job_title, job_type, data, status, retry_count, retry_interval,
                            run_after, job_response, degree, created_at, updated_at, deleted_at
                     FROM jobs
                     WHERE status = 'open' AND degree = 0 AND run_after <= now()
                     ORDER BY created_at ASC
                     LIMIT $1",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            RunMode::Retry => {
                sqlx::query_as::<_, JobRow>(
                    "SELECT uuid, job_title, job_type, data, status, retry_count, retry_interval,
                            run_after, job_response, degree, created_at, updated_at, deleted_at
                     FROM jobs
                     WHERE status = 'failed' AND retry_count > 0 AND run_after <= now()
                     ORDER BY created_at ASC
                     LIMIT $1",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(Error::Database)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn mark_claimed(&self, uuids: &[Uuid], mode: RunMode) -> Result<()> {
        if uuids.is_empty() {
            return Ok(());
        }
        let status = match mode {
            RunMode::FirstTime => "in_queue",
            RunMode::Retry => "retry_in_queued",
        };
        sqlx::query(
            "UPDATE jobs SET status = $1, updated_at = now() WHERE uuid = ANY($2)",
        )
        .bind(status)
        .bind(uuids)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn mark_processing(&self, uuid: Uuid) -> Result<()> {
        sqlx::query("UPDATE jobs SET status = 'processing', updated_at = now() WHERE uuid = $1")
            .bind(uuid)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn complete(
        &self,
        uuid: Uuid,
        message: Option<&str>,
        s3_key: Option<&str>,
    ) -> Result<()> {
        let mut response = self.current_job_response(uuid).await?;
        if let Some(message) = message {
            response.message = Some(message.to_string());
        }
        if let Some(s3_key) = s3_key {
            response.s3_key = Some(s3_key.to_string());
        }

        sqlx::query(
            "UPDATE jobs SET status = 'completed', job_response = $1, updated_at = now()
             WHERE uuid = $2",
        )
        .bind(Json(response))
        .bind(uuid)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fail(&self, uuid: Uuid, error: &str) -> Result<()> {
        let mut response = self.current_job_response(uuid).await?;
        response.push_error(error);

        sqlx::query(
            "UPDATE jobs SET
                status = 'failed',
                job_response = $1,
                run_after = now() + (retry_interval || ' seconds')::interval,
                updated_at = now()
             WHERE uuid = $2",
        )
        .bind(Json(response))
        .bind(uuid)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn decrement_retry_count(&self, uuid: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE jobs SET retry_count = GREATEST(retry_count - 1, 0), updated_at = now()
             WHERE uuid = $1",
        )
        .bind(uuid)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn drain_queued(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let to_open = sqlx::query(
            "UPDATE jobs SET status = 'open', updated_at = now() WHERE status = 'in_queue'",
        )
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        let to_failed = sqlx::query(
            "UPDATE jobs SET status = 'failed', updated_at = now() WHERE status = 'retry_in_queued'",
        )
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        tx.commit().await.map_err(Error::Database)?;
        Ok(to_open + to_failed)
    }

    async fn decrement_target_degrees(&self, source: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE jobs SET degree = degree - 1
             WHERE uuid IN (SELECT target FROM job_edges WHERE source = $1)",
        )
        .bind(source)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, uuid: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT uuid, job_title, job_type, data, status, retry_count, retry_interval,
                    run_after, job_response, degree, created_at, updated_at, deleted_at
             FROM jobs WHERE uuid = $1",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, status: Option<JobStatus>, limit: i64, offset: i64) -> Result<Vec<Job>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, JobRow>(
                    "SELECT uuid, job_title, job_type, data, status, retry_count, retry_interval,
                            run_after, job_response, degree, created_at, updated_at, deleted_at
                     FROM jobs WHERE status = $1
                     ORDER BY created_at DESC LIMIT $2 OFFSET $3",
                )
                .bind(Self::status_to_str(status))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, JobRow>(
                    "SELECT uuid, job_title, job_type, data, status, retry_count, retry_interval,
                            run_after, job_response, degree, created_at, updated_at, deleted_at
                     FROM jobs
                     ORDER BY created_at DESC LIMIT $1 OFFSET $2",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(Error::Database)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

impl PgJobRepository {
    async fn current_job_response(&self, uuid: Uuid) -> Result<JobResponse> {
        let row: Option<(Json<JobResponse>,)> =
            sqlx::query_as("SELECT job_response FROM jobs WHERE uuid = $1")
                .bind(uuid)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(row.map(|(r,)| r.0).unwrap_or_default())
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    uuid: Uuid,
    job_title: Option<String>,
    job_type: String,
    data: serde_json::Value,
    status: String,
    retry_count: i32,
    retry_interval: i64,
    run_after: DateTime<Utc>,
    job_response: Json<JobResponse>,
    degree: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = Error;

    fn try_from(r: JobRow) -> Result<Self> {
        Ok(Job {
            uuid: r.uuid,
            job_title: r.job_title,
            job_type: JobType::from_str(&r.job_type)?,
            data: r.data,
            status: PgJobRepository::status_from_str(&r.status)?,
            retry_count: r.retry_count,
            retry_interval: r.retry_interval,
            run_after: r.run_after,
            job_response: r.job_response.0,
            degree: r.degree,
            created_at: r.created_at,
            updated_at: r.updated_at,
            deleted_at: r.deleted_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            JobStatus::Open,
            JobStatus::InQueue,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::RetryInQueued,
        ] {
            let s = PgJobRepository::status_to_str(status);
            assert_eq!(PgJobRepository::status_from_str(s).unwrap(), status);
        }
    }

    #[test]
    fn test_status_from_unknown_str_errors() {
        assert!(PgJobRepository::status_from_str("bogus").is_err());
    }
}
