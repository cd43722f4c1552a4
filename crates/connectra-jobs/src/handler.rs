//! Handler registry: dispatches a claimed job to its `JobHandler` by
//! `job_type` (§9: "polymorphic job handlers … registry `map[JobType] ->
//! Handler`").

use std::collections::HashMap;
use std::sync::Arc;

use connectra_core::{Error, Job, JobHandler, JobResponse, JobType, Result};

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<JobType, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(handler.job_type(), handler);
    }

    /// Run the handler registered for `job.job_type`. No handler registered
    /// for a job's type is a configuration error, not a job-runtime one.
    pub async fn dispatch(&self, job: Job) -> Result<JobResponse> {
        let handler = self.handlers.get(&job.job_type).ok_or_else(|| {
            Error::Internal(format!("no handler registered for job_type {}", job.job_type))
        })?;
        handler.run(job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use uuid::Uuid;

    struct EchoHandler;

    #[async_trait]
    impl JobHandler for EchoHandler {
        fn job_type(&self) -> JobType {
            JobType::InsertCsvFile
        }

        async fn run(&self, job: Job) -> Result<JobResponse> {
            Ok(JobResponse {
                message: Some(format!("ran {}", job.uuid)),
                ..Default::default()
            })
        }
    }

    fn sample_job(job_type: JobType) -> Job {
        let now = Utc::now();
        Job {
            uuid: Uuid::new_v4(),
            job_title: None,
            job_type,
            data: serde_json::json!({}),
            status: connectra_core::JobStatus::Open,
            retry_count: 0,
            retry_interval: 60,
            run_after: now,
            job_response: JobResponse::default(),
            degree: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn test_dispatch_routes_to_registered_handler() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(EchoHandler));
        let response = registry
            .dispatch(sample_job(JobType::InsertCsvFile))
            .await
            .unwrap();
        assert!(response.message.unwrap().starts_with("ran"));
    }

    #[tokio::test]
    async fn test_dispatch_missing_handler_errors() {
        let registry = HandlerRegistry::new();
        let result = registry.dispatch(sample_job(JobType::ExportCsvFile)).await;
        assert!(result.is_err());
    }
}
