//! `JobScheduler`: a producer tick loop feeding a bounded channel, and a
//! fixed pool of consumer workers dispatching through the `HandlerRegistry`
//! (§4.1, §4.7).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use connectra_core::defaults::{
    DEFAULT_RETRY_INTERVAL_SECS, EVENT_BUS_CAPACITY, JOB_IN_QUEUE_SIZE, JOB_MAX_RETRIES,
    PARALLEL_JOBS, TICKER_INTERVAL_MINUTES,
};
use connectra_core::{Job, JobRepository, JobStatus, JobType, Result, RunMode};
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::handler::HandlerRegistry;

/// Tunables for the producer/consumer job scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub channel_capacity: usize,
    pub worker_count: usize,
    pub tick_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: JOB_IN_QUEUE_SIZE,
            worker_count: PARALLEL_JOBS,
            tick_interval: Duration::from_secs(TICKER_INTERVAL_MINUTES * 60),
        }
    }
}

impl SchedulerConfig {
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_IN_QUEUE_SIZE` | 50 | Bounded producer/consumer channel capacity |
    /// | `PARALLEL_JOBS` | 4 | Worker pool size |
    /// | `TICKER_INTERVAL_MINUTES` | 1 | Producer tick interval |
    pub fn from_env() -> Self {
        let channel_capacity = std::env::var("JOB_IN_QUEUE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(JOB_IN_QUEUE_SIZE);
        let worker_count = std::env::var("PARALLEL_JOBS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(PARALLEL_JOBS);
        let tick_minutes = std::env::var("TICKER_INTERVAL_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(TICKER_INTERVAL_MINUTES);
        Self {
            channel_capacity,
            worker_count,
            tick_interval: Duration::from_secs(tick_minutes * 60),
        }
    }
}

/// Lifecycle event emitted by the scheduler, mirrored to any subscriber.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    JobClaimed { job_uuid: Uuid, job_type: JobType },
    JobCompleted { job_uuid: Uuid, job_type: JobType },
    JobFailed { job_uuid: Uuid, job_type: JobType, error: String },
}

/// Handle returned by [`JobScheduler::start`]; dropping it does not stop the
/// scheduler — call [`ScheduleHandle::stop`] for a graceful drain.
pub struct ScheduleHandle {
    cancelled: Arc<AtomicBool>,
    producer: tokio::task::JoinHandle<()>,
    workers: Vec<tokio::task::JoinHandle<()>>,
    repository: Arc<dyn JobRepository>,
    events: broadcast::Sender<SchedulerEvent>,
}

impl ScheduleHandle {
    pub fn events(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    /// Stop the producer, let in-flight workers finish their current job,
    /// then drain anything still resting in a queued state back to a safe
    /// resting state (§4.7: `in_queue → open`, `retry_in_queued → failed`).
    pub async fn stop(self) -> Result<u64> {
        self.cancelled.store(true, Ordering::Relaxed);
        let _ = self.producer.await;
        for worker in self.workers {
            let _ = worker.await;
        }
        self.repository.drain_queued().await
    }
}

/// Producer: ticks on an interval, checks remaining channel capacity,
/// fetches eligible jobs up to that capacity, bulk-marks them claimed, and
/// sends them to the workers (§4.1 steps 1-3).
pub struct JobScheduler {
    repository: Arc<dyn JobRepository>,
    registry: Arc<HandlerRegistry>,
    config: SchedulerConfig,
}

impl JobScheduler {
    pub fn new(
        repository: Arc<dyn JobRepository>,
        registry: Arc<HandlerRegistry>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            repository,
            registry,
            config,
        }
    }

    pub fn start(self) -> ScheduleHandle {
        let (sender, receiver) = mpsc::channel::<Job>(self.config.channel_capacity);
        let cancelled = Arc::new(AtomicBool::new(false));
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);

        let producer = {
            let repository = self.repository.clone();
            let cancelled = cancelled.clone();
            let capacity = self.config.channel_capacity;
            let tick_interval = self.config.tick_interval;
            tokio::spawn(async move {
                producer_loop(repository, sender, cancelled, capacity, tick_interval).await;
            })
        };

        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let workers = (0..self.config.worker_count)
            .map(|worker_id| {
                let repository = self.repository.clone();
                let registry = self.registry.clone();
                let receiver = receiver.clone();
                let events = events.clone();
                tokio::spawn(async move {
                    worker_loop(worker_id, repository, registry, receiver, events).await;
                })
            })
            .collect();

        ScheduleHandle {
            cancelled,
            producer,
            workers,
            repository: self.repository,
            events,
        }
    }
}

#[instrument(skip(repository, sender, cancelled))]
async fn producer_loop(
    repository: Arc<dyn JobRepository>,
    sender: mpsc::Sender<Job>,
    cancelled: Arc<AtomicBool>,
    capacity: usize,
    tick_interval: Duration,
) {
    let mut ticker = interval(tick_interval);
    loop {
        ticker.tick().await;
        if cancelled.load(Ordering::Relaxed) {
            break;
        }
        if let Err(err) = tick(&repository, &sender, capacity).await {
            error!(error = %err, "scheduler producer tick failed");
        }
    }
    debug!("scheduler producer stopped");
}

async fn tick(repository: &Arc<dyn JobRepository>, sender: &mpsc::Sender<Job>, capacity: usize) -> Result<()> {
    let available = sender.capacity();
    if available == 0 {
        return Ok(());
    }
    let limit = available.min(capacity) as i64;

    for mode in [RunMode::FirstTime, RunMode::Retry] {
        let eligible = repository.fetch_eligible(mode, limit).await?;
        if eligible.is_empty() {
            continue;
        }
        let uuids: Vec<Uuid> = eligible.iter().map(|job| job.uuid).collect();
        repository.mark_claimed(&uuids, mode).await?;
        for job in eligible {
            if sender.send(job).await.is_err() {
                warn!("scheduler channel closed while dispatching claimed jobs");
                return Ok(());
            }
        }
    }
    Ok(())
}

async fn worker_loop(
    worker_id: usize,
    repository: Arc<dyn JobRepository>,
    registry: Arc<HandlerRegistry>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    events: broadcast::Sender<SchedulerEvent>,
) {
    loop {
        let job = {
            let mut guard = receiver.lock().await;
            guard.recv().await
        };
        let Some(job) = job else { break };
        debug!(worker_id, job_uuid = %job.uuid, "worker claimed job");
        let _ = events.send(SchedulerEvent::JobClaimed {
            job_uuid: job.uuid,
            job_type: job.job_type,
        });
        process_job(&repository, &registry, job, &events).await;
    }
    debug!(worker_id, "scheduler worker stopped");
}

async fn process_job(
    repository: &Arc<dyn JobRepository>,
    registry: &Arc<HandlerRegistry>,
    job: Job,
    events: &broadcast::Sender<SchedulerEvent>,
) {
    let uuid = job.uuid;
    let job_type = job.job_type;
    let retry_count = job.retry_count;
    let was_retry = job.status == JobStatus::RetryInQueued;

    if let Err(err) = repository.mark_processing(uuid).await {
        error!(error = %err, %uuid, "failed to mark job processing");
        return;
    }

    match registry.dispatch(job).await {
        Ok(response) => {
            if let Err(err) = repository
                .complete(uuid, response.message.as_deref(), response.s3_key.as_deref())
                .await
            {
                error!(error = %err, %uuid, "failed to record job completion");
                return;
            }
            if was_retry {
                let _ = repository.decrement_retry_count(uuid).await;
            }
            let _ = events.send(SchedulerEvent::JobCompleted { job_uuid: uuid, job_type });
        }
        Err(err) => {
            warn!(error = %err, %uuid, "job handler returned an error");
            if let Err(mark_err) = repository.fail(uuid, &err.to_string()).await {
                error!(error = %mark_err, %uuid, "failed to record job failure");
            }
            if retry_count == 0 {
                debug!(%uuid, "job exhausted retries, will not retry further");
            }
            let _ = events.send(SchedulerEvent::JobFailed {
                job_uuid: uuid,
                job_type,
                error: err.to_string(),
            });
        }
    }
}

/// Default retry interval and max-retry count applied to jobs that don't set
/// their own (exposed for job-creation call sites).
pub fn default_retry_policy() -> (i64, i32) {
    (DEFAULT_RETRY_INTERVAL_SECS, JOB_MAX_RETRIES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_config_default_matches_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.channel_capacity, JOB_IN_QUEUE_SIZE);
        assert_eq!(config.worker_count, PARALLEL_JOBS);
        assert_eq!(config.tick_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_default_retry_policy() {
        let (interval_secs, max_retries) = default_retry_policy();
        assert_eq!(interval_secs, DEFAULT_RETRY_INTERVAL_SECS);
        assert_eq!(max_retries, JOB_MAX_RETRIES);
    }
}
