//! HTTP API shell for the connectra B2B data platform (§6): wires the
//! `connectra-db`/`connectra-search`/`connectra-jobs` crates behind an axum
//! router, starts the background job scheduler, and serves the companies /
//! contacts / jobs / filters surface.

mod handlers;
mod middleware;
mod response;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, Method};
use axum::routing::{get, post, put};
use axum::Router;
use connectra_core::defaults::{MAX_REQUESTS_PER_MINUTE, SERVER_PORT};
use connectra_core::SearchIndex;
use connectra_db::{Database, FilesystemObjectStore, PgCompanyRepository, PgContactRepository, PgFilterRepository, PgJobRepository};
use connectra_jobs::{
    EntityService, ExportCsvFileHandler, FilterRegistry, HandlerRegistry, IndexQueue,
    InsertCsvFileHandler, JobScheduler, SchedulerConfig,
};
use connectra_search::{EsClientConfig, EsSearchIndex};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::middleware::{auth_middleware, build_limiter, rate_limit_middleware, GlobalRateLimiter};

/// Shared application state, cloned into every handler/middleware.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub entity_service: Arc<EntityService>,
    pub filter_registry: Arc<FilterRegistry>,
    pub object_store: Arc<FilesystemObjectStore>,
    pub api_key: Arc<str>,
    pub rate_limiter: Arc<GlobalRateLimiter>,
}

/// Time-ordered UUIDv7 request correlation IDs, propagated via `X-Request-Id`.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

fn parse_allowed_origins() -> Vec<axum::http::HeaderValue> {
    std::env::var("ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "*".to_string())
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "connectra_api=info,connectra_jobs=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let database_url = std::env::var("DATABASE_URL")
        .or_else(|_| pg_url_from_parts())
        .map_err(|_| anyhow::anyhow!("DATABASE_URL or PG_DB_* variables must be set"))?;
    info!("connecting to database");
    let db = Database::connect(&database_url).await?;
    info!("database connected");

    let search_base_url = std::env::var("ELASTICSEARCH_URL")
        .or_else(|_| std::env::var("OPENSEARCH_URL"))
        .unwrap_or_else(|_| "http://localhost:9200".to_string());
    let search_config = EsClientConfig {
        base_url: search_base_url,
        username: std::env::var("ELASTICSEARCH_USERNAME").ok(),
        password: std::env::var("ELASTICSEARCH_PASSWORD").ok(),
    };
    // One client serves both indices; `SearchIndex` methods take the index
    // name as an argument rather than binding to one at construction.
    let search_client: Arc<dyn SearchIndex> = Arc::new(EsSearchIndex::new(search_config));

    let object_store_path = std::env::var("OBJECT_STORE_PATH").unwrap_or_else(|_| "/var/lib/connectra/objects".to_string());
    let signing_key = std::env::var("OBJECT_STORE_SIGNING_KEY").unwrap_or_else(|_| "connectra-dev-signing-key".to_string());
    let object_store = Arc::new(FilesystemObjectStore::new(object_store_path, signing_key.into_bytes()));

    let index_queue = Arc::new(IndexQueue::start(search_client.clone()));

    let entity_service = Arc::new(EntityService::new(
        Arc::new(PgCompanyRepository::new(db.pool().clone())),
        Arc::new(PgContactRepository::new(db.pool().clone())),
        Arc::new(PgFilterRepository::new(db.pool().clone())),
        search_client.clone(),
        search_client,
        index_queue,
    ));

    let filter_registry = Arc::new(FilterRegistry::new(Arc::new(PgFilterRepository::new(db.pool().clone()))));
    filter_registry.spawn_sweeper();

    let mut handler_registry = HandlerRegistry::new();
    let default_bucket = std::env::var("S3_DEFAULT_BUCKET").unwrap_or_else(|_| "connectra-exports".to_string());
    handler_registry.register(Arc::new(InsertCsvFileHandler::new(
        object_store.clone(),
        entity_service.clone(),
        default_bucket.clone(),
    )));
    handler_registry.register(Arc::new(ExportCsvFileHandler::new(
        object_store.clone(),
        entity_service.clone(),
        default_bucket,
    )));

    let job_repository = Arc::new(PgJobRepository::new(db.pool().clone()));
    let scheduler = JobScheduler::new(job_repository, Arc::new(handler_registry), SchedulerConfig::from_env());
    // Kept alive for the process lifetime; the scheduler's background tasks
    // run until the binary exits, `axum::serve` below blocks until then.
    let _schedule_handle = scheduler.start();
    info!("job scheduler started");

    let api_key: Arc<str> = std::env::var("API_KEY")
        .map_err(|_| anyhow::anyhow!("API_KEY must be set"))?
        .into();
    let max_requests_per_minute: u64 = std::env::var("MAX_REQUESTS_PER_MINUTE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(MAX_REQUESTS_PER_MINUTE);
    let rate_limiter = build_limiter(max_requests_per_minute);

    let state = AppState {
        db,
        entity_service,
        filter_registry,
        object_store,
        api_key,
        rate_limiter,
    };

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/companies/", post(handlers::companies::list))
        .route("/companies/count", post(handlers::companies::count))
        .route("/companies/create", post(handlers::companies::create))
        .route("/companies/upsert", post(handlers::companies::upsert))
        .route("/companies/batch-upsert", post(handlers::companies::batch_upsert))
        .route(
            "/companies/:uuid",
            get(handlers::companies::get)
                .put(handlers::companies::update)
                .delete(handlers::companies::delete),
        )
        .route("/contacts/", post(handlers::contacts::list))
        .route("/contacts/count", post(handlers::contacts::count))
        .route("/contacts/create", post(handlers::contacts::create))
        .route("/contacts/upsert", post(handlers::contacts::upsert))
        .route("/contacts/batch-upsert", post(handlers::contacts::batch_upsert))
        .route(
            "/contacts/:uuid",
            get(handlers::contacts::get)
                .put(handlers::contacts::update)
                .delete(handlers::contacts::delete),
        )
        .route("/common/batch-upsert", post(handlers::common::batch_upsert))
        .route("/common/jobs/create", post(handlers::common::create_job_dag))
        .route(
            "/common/jobs/:uuid",
            put(handlers::common::update_job).get(handlers::common::get_job),
        )
        .route("/common/jobs", post(handlers::common::list_jobs))
        .route("/common/upload-url", get(handlers::common::upload_url))
        .route("/common/download-url", get(handlers::common::download_url))
        .route("/:service/filters", get(handlers::common::list_filters))
        .route("/:service/filters/data", post(handlers::common::filter_data))
        .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(parse_allowed_origins()))
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE, "x-api-key".parse().unwrap()]),
        )
        .with_state(state);

    let port: u16 = std::env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(SERVER_PORT);
    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    info!(%addr, "starting connectra-api");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn pg_url_from_parts() -> Result<String, std::env::VarError> {
    let host = std::env::var("PG_DB_HOST")?;
    let port = std::env::var("PG_DB_PORT").unwrap_or_else(|_| "5432".to_string());
    let user = std::env::var("PG_DB_USER")?;
    let password = std::env::var("PG_DB_PASSWORD").unwrap_or_default();
    let name = std::env::var("PG_DB_NAME")?;
    Ok(format!("postgres://{user}:{password}@{host}:{port}/{name}"))
}
