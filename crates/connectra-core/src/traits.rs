//! Repository and adapter traits connectra's core depends on.
//!
//! These are the seams `connectra-db`, `connectra-search`, and the object
//! store wrapper implement; `connectra-jobs` and `connectra-api` depend only
//! on the traits, enabling pluggable backends and testability.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Company, Contact, Edge, FilterDefinition, FilterValue, Job, JobStatus, JobType, RunMode,
};

// =============================================================================
// RELATIONAL STORE: COMPANIES / CONTACTS
// =============================================================================

/// Relational adapter for `companies` (§4.4, §4.5).
#[async_trait]
pub trait CompanyRepository: Send + Sync {
    /// Insert-on-conflict-update-all-non-primary-columns for a batch,
    /// already deduplicated by UUID (§4.4).
    async fn bulk_upsert(&self, companies: &[Company]) -> Result<()>;

    /// Fetch a single company by UUID.
    async fn get(&self, uuid: Uuid) -> Result<Option<Company>>;

    /// Fetch several companies by UUID in one round trip (used to hydrate
    /// denormalized contact fields).
    async fn get_many(&self, uuids: &[Uuid]) -> Result<Vec<Company>>;

    /// Insert or fully overwrite a single company.
    async fn upsert_one(&self, company: &Company) -> Result<()>;

    /// Soft-delete by UUID (sets `deleted_at`).
    async fn soft_delete(&self, uuid: Uuid) -> Result<()>;
}

/// Relational adapter for `contacts` (§4.4, §4.5).
#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn bulk_upsert(&self, contacts: &[Contact]) -> Result<()>;

    async fn get(&self, uuid: Uuid) -> Result<Option<Contact>>;

    async fn upsert_one(&self, contact: &Contact) -> Result<()>;

    async fn soft_delete(&self, uuid: Uuid) -> Result<()>;
}

// =============================================================================
// JOB / DAG STORE
// =============================================================================

/// Relational adapter for `jobs` and `job_edges` (§4.1, §4.2, §4.7).
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Bulk-insert nodes, deduplicated by `uuid` within the call (last
    /// occurrence wins) before the insert-on-conflict statement (§4.1).
    async fn bulk_upsert(&self, jobs: &[Job]) -> Result<()>;

    /// Bulk-insert edges for a validated DAG submission (§4.2).
    async fn bulk_insert_edges(&self, edges: &[Edge]) -> Result<()>;

    /// Query eligible jobs for one producer tick (§4.1 step 2), ordered by
    /// `created_at` ascending, limited by remaining channel capacity.
    async fn fetch_eligible(&self, mode: RunMode, limit: i64) -> Result<Vec<Job>>;

    /// Mark a batch of jobs `in_queue`/`retry_in_queued` in a single bulk
    /// upsert (§4.1 step 3).
    async fn mark_claimed(&self, uuids: &[Uuid], mode: RunMode) -> Result<()>;

    /// Transition a single job to `processing`.
    async fn mark_processing(&self, uuid: Uuid) -> Result<()>;

    /// Record a successful terminal transition.
    async fn complete(&self, uuid: Uuid, message: Option<&str>, s3_key: Option<&str>)
        -> Result<()>;

    /// Record a failed transition: append `error` to `runtime_errors`, set
    /// `run_after = now + retry_interval`, set `status = failed` (§4.1).
    async fn fail(&self, uuid: Uuid, error: &str) -> Result<()>;

    /// Decrement `retry_count` by 1, bounded below at 0, on a successful
    /// retry attempt (§4.1).
    async fn decrement_retry_count(&self, uuid: Uuid) -> Result<()>;

    /// Drain jobs still resting in a queued state back to a safe resting
    /// state on scheduler startup/shutdown (§3.2, §4.1 graceful drain):
    /// `in_queue → open`, `retry_in_queued → failed`.
    async fn drain_queued(&self) -> Result<u64>;

    /// Decrement `degree` of every target of `source`'s outgoing edges
    /// (§4.2 completion propagation). Dangling edges are a silent no-op.
    async fn decrement_target_degrees(&self, source: Uuid) -> Result<()>;

    async fn get(&self, uuid: Uuid) -> Result<Option<Job>>;

    async fn list(&self, status: Option<JobStatus>, limit: i64, offset: i64) -> Result<Vec<Job>>;
}

// =============================================================================
// FILTER REGISTRY
// =============================================================================

/// Relational adapter for `filters` and `filters_data` (§4.8).
#[async_trait]
pub trait FilterRepository: Send + Sync {
    async fn list_definitions(&self, service: &str) -> Result<Vec<FilterDefinition>>;

    /// Bulk upsert materialized filter values, deduplicated by UUID (§4.4).
    async fn bulk_upsert_values(&self, values: &[FilterValue]) -> Result<()>;

    /// Distinct materialized values for a non-direct-derived filter.
    async fn list_values(&self, service: &str, filter_key: &str) -> Result<Vec<FilterValue>>;

    /// Distinct live values for a direct-derived filter (read straight from
    /// the entity column, e.g. `SELECT DISTINCT country FROM companies`).
    async fn list_direct_derived_values(
        &self,
        service: &str,
        filter_key: &str,
    ) -> Result<Vec<String>>;
}

// =============================================================================
// SEARCH ENGINE
// =============================================================================

/// One queued single-record index mutation (§4.5).
#[derive(Debug, Clone)]
pub struct IndexOperation {
    pub kind: IndexOperationKind,
    pub index_name: String,
    pub doc_id: Uuid,
    pub document: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOperationKind {
    Create,
    Update,
    Delete,
}

/// Search-engine adapter: bulk and single-document operations plus query
/// execution (§4.4, §4.5, §4.6).
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Newline-delimited bulk index under `{index, id}` pairs (§4.4).
    async fn bulk_index(
        &self,
        index_name: &str,
        documents: &[(Uuid, serde_json::Value)],
    ) -> Result<()>;

    async fn index_one(&self, index_name: &str, doc_id: Uuid, document: serde_json::Value)
        -> Result<()>;

    async fn delete_one(&self, index_name: &str, doc_id: Uuid) -> Result<()>;

    /// Execute a compiled search-engine query body, returning matched
    /// document IDs in result order plus an optional next-page cursor.
    async fn search(
        &self,
        index_name: &str,
        query_body: serde_json::Value,
    ) -> Result<SearchPage>;

    /// Execute a compiled count-only query body (§4.6: count queries bypass
    /// pagination/ordering).
    async fn count(&self, index_name: &str, query_body: serde_json::Value) -> Result<i64>;
}

/// One page of search results: ordered document IDs plus the `search_after`
/// sort values to resume from, if the engine returned any hits.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub ids: Vec<Uuid>,
    pub next_cursor: Option<String>,
}

// =============================================================================
// OBJECT STORE
// =============================================================================

/// Streaming object-storage adapter (§4.3, §4.9, out-of-scope per §1 but
/// exercised as an external collaborator).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open a streaming read of `key`. Implementations must not materialize
    /// the whole object in memory.
    async fn read_stream(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;

    /// Stream-write `key`, consuming bytes from `body`.
    async fn write_stream(
        &self,
        bucket: &str,
        key: &str,
        body: Box<dyn tokio::io::AsyncRead + Send + Unpin>,
    ) -> Result<()>;

    /// Issue a presigned URL valid for `ttl_secs` seconds.
    async fn presigned_url(&self, bucket: &str, key: &str, ttl_secs: u64) -> Result<String>;
}

// =============================================================================
// JOB HANDLER REGISTRY CONTRACT
// =============================================================================

/// Handler abstraction dispatched by `job_type` (§9: "polymorphic job
/// handlers … registry `map[JobType] → Handler`").
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn job_type(&self) -> JobType;

    async fn run(&self, job: Job) -> Result<crate::models::JobResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_operation_kind_eq() {
        assert_eq!(IndexOperationKind::Create, IndexOperationKind::Create);
        assert_ne!(IndexOperationKind::Create, IndexOperationKind::Delete);
    }

    #[test]
    fn test_search_page_default_is_empty() {
        let page = SearchPage::default();
        assert!(page.ids.is_empty());
        assert!(page.next_cursor.is_none());
    }
}
