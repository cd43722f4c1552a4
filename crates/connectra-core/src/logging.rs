//! Structured logging schema and field name constants for connectra.
//!
//! All crates use these constants for consistent structured logging fields
//! so log aggregation tools can query by standardized field names across
//! every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied (dropped index op, retry scheduled) |
//! | INFO  | Lifecycle events (startup, shutdown), job/tick completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-row iteration, high-volume data (CSV rows, bulk batch members) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → job → sub-calls.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "jobs", "db", "search", "ingestion"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "scheduler", "worker", "index_queue", "vql", "entity_service"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "tick", "claim_next", "bulk_upsert", "compile", "drain"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Job type string (e.g. "InsertCsvFile", "ExportCsvFile").
pub const JOB_TYPE: &str = "job_type";

/// Job status after a state transition.
pub const JOB_STATUS: &str = "job_status";

/// Company UUID being operated on.
pub const COMPANY_ID: &str = "company_id";

/// Contact UUID being operated on.
pub const CONTACT_ID: &str = "contact_id";

/// Service name a filter/query operates against ("companies" | "contacts").
pub const SERVICE: &str = "service";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows/records processed by a batch operation.
pub const ROW_COUNT: &str = "row_count";

/// Number of distinct UUIDs after in-batch dedup.
pub const DEDUPED_COUNT: &str = "deduped_count";

/// Number of jobs claimed in one producer tick.
pub const CLAIMED_COUNT: &str = "claimed_count";

/// Current retry attempt number.
pub const RETRY_COUNT: &str = "retry_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

/// Database table or entity affected.
pub const DB_TABLE: &str = "db_table";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
