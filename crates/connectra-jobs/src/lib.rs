//! # connectra-jobs
//!
//! Background job pipeline for the connectra data platform.
//!
//! This crate provides:
//! - A DAG-validated job scheduler with a bounded producer/worker-pool split
//! - A registry routing jobs to their `JobHandler` by `JobType`
//! - `EntityService`: company/contact CRUD, bulk upsert fan-out, and VQL
//!   read-side projection, shared by the CSV ingestion/export handlers
//! - A bounded, retrying background index queue decoupling writes to the
//!   relational store from search-index updates
//! - `FilterRegistry`: a TTL-cached facade over the filter catalog and its
//!   materialized values
//!
//! ## Example
//!
//! ```ignore
//! use connectra_jobs::{HandlerRegistry, JobScheduler, SchedulerConfig};
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register(Arc::new(insert_handler));
//! registry.register(Arc::new(export_handler));
//!
//! let scheduler = JobScheduler::new(job_repository, Arc::new(registry), SchedulerConfig::default());
//! let handle = scheduler.start();
//!
//! let mut events = handle.events();
//! while let Ok(event) = events.recv().await {
//!     tracing::info!(?event, "scheduler event");
//! }
//!
//! handle.stop().await?;
//! ```

pub mod dag;
pub mod entity_service;
pub mod filter_registry;
pub mod handler;
pub mod handlers;
pub mod index_queue;
pub mod scheduler;

pub use connectra_core::*;

pub use dag::{validate_dag, ValidatedDag};
pub use entity_service::{BulkUpsertOutcome, EntityService};
pub use filter_registry::FilterRegistry;
pub use handler::HandlerRegistry;
pub use handlers::export_csv::ExportCsvFileHandler;
pub use handlers::insert_csv::InsertCsvFileHandler;
pub use index_queue::IndexQueue;
pub use scheduler::{default_retry_policy, JobScheduler, ScheduleHandle, SchedulerConfig, SchedulerEvent};
