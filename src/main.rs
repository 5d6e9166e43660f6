use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use shoppers_verdict::api;
use shoppers_verdict::source::HttpReviewSource;
use shoppers_verdict::store::{CacheBackend, JsonFileBackend, PgCacheBackend, ReviewStore};
use shoppers_verdict::{Analyzer, Settings};

#[derive(OpenApi)]
#[openapi(
    paths(api::analyze, api::health),
    components(
        schemas(
            api::AnalyzeRequest,
            api::AnalysisResponse,
            api::RecommendationView,
            api::MetaView,
            api::DescriptionView,
            api::ErrorResponse,
            api::HealthResponse,
            api::HealthFeatures
        )
    ),
    tags(
        (name = "verdict", description = "Product review analysis")
    )
)]
struct ApiDoc;

async fn open_store(settings: &Settings) -> anyhow::Result<ReviewStore> {
    let backend: Option<Arc<dyn CacheBackend>> = if let Some(db_url) = &settings.database_url {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;
        Some(Arc::new(PgCacheBackend::new(pool).await?))
    } else {
        settings
            .cache_file
            .as_ref()
            .map(|path| Arc::new(JsonFileBackend::new(path)) as Arc<dyn CacheBackend>)
    };

    match backend {
        Some(backend) => Ok(ReviewStore::with_backend(settings, backend).await?),
        None => {
            warn!("No DATABASE_URL or VERDICT_CACHE_FILE set, cache is memory-only");
            Ok(ReviewStore::new(settings))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;
    let persistent_cache = settings.database_url.is_some() || settings.cache_file.is_some();
    let store = Arc::new(open_store(&settings).await?);
    let source = Arc::new(HttpReviewSource::new(settings.fetch_timeout, settings.max_reviews)?);

    let scheduler = JobScheduler::new().await?;
    let cleanup_store = store.clone();
    scheduler
        .add(Job::new_async(settings.cleanup_schedule.as_str(), move |_id, _lock| {
            let store = cleanup_store.clone();
            Box::pin(async move {
                if let Err(e) = store.cleanup().await {
                    error!(error = %e, "Scheduled cache cleanup failed");
                }
            })
        })?)
        .await?;
    scheduler.start().await?;

    let bind_addr = settings.bind_addr.clone();
    let analyzer = Analyzer::new(settings, store, source);
    let state = Arc::new(api::AppState {
        analyzer: Arc::new(analyzer),
        persistent_cache,
    });

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/extension/analyze", post(api::analyze))
        .route("/api/extension/health", get(api::health))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");
    axum::serve(listener, app).await?;

    Ok(())
}
