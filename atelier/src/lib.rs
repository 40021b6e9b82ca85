//! # atelier: Portfolio Backend for a Single Artist
//!
//! `atelier` serves a public portfolio gallery and the small content-management surface the
//! artist uses to maintain it. Works (title, category, tags, a cover image and a gallery of
//! further images) live in PostgreSQL; image files live in an object storage bucket.
//!
//! ## Overview
//!
//! Visitors browse published works and send messages through a contact form. The artist signs
//! in with a magic link or password against a hosted auth provider (GoTrue) and can then create,
//! edit, reorder and delete works. Deleting a work also removes its images from the bucket: each
//! image is deleted, checked for absence, and retried a bounded number of times before the row
//! goes, so the bucket does not slowly fill with orphans.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum). Every handler receives the shared
//! [`AppState`], which owns the database pool, configuration, the storage backend, the auth
//! provider client, the email relay and the image purger.
//!
//! ### Request Flow
//!
//! - **Public** (`/api/*`): gallery reads and the contact form, no session required
//! - **Auth** (`/auth/*`): sign-in flows that end by setting an HttpOnly session cookie
//! - **Admin** (`/admin/api/*`): passes through [`auth::middleware::require_admin_session`],
//!   which verifies the session token server side before the handler runs
//!
//! ### Core Components
//!
//! - [`api`]: handlers and request/response models
//! - [`auth`]: token verification, cookies, the route gate and the provider client
//! - [`db`]: the `works` repository
//! - [`storage`]: the [`storage::ObjectStorage`] seam and its backends
//! - [`cleanup`]: resolve, plan and execute image deletion for a work
//! - [`retry`]: the bounded retry combinator used by cleanup
//! - [`email`]: contact form relay
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use atelier::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = atelier::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     atelier::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod cleanup;
pub mod config;
pub mod db;
pub mod email;
pub mod errors;
mod openapi;
pub mod retry;
pub mod storage;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::{
    api::handlers::{auth as auth_handlers, contact, works},
    auth::{middleware::require_admin_session, provider::GoTrueClient},
    cleanup::ImagePurger,
    config::{CorsOrigin, StorageBackend},
    db::handlers::Works,
    email::EmailService,
    openapi::ApiDoc,
    storage::{MemoryStorage, ObjectStorage, SupabaseStorage},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{UserId, WorkId};

/// Headroom on top of the largest allowed upload for form fields and multipart framing.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Install the rustls crypto provider used by every outbound TLS client.
///
/// Safe to call more than once; later calls find the provider already installed.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .storage(storage)
///     .auth_client(auth_client)
///     .email(email)
///     .purger(purger)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub storage: Arc<dyn ObjectStorage>,
    pub auth_client: Arc<GoTrueClient>,
    pub email: Arc<EmailService>,
    pub purger: Arc<ImagePurger>,
}

impl AppState {
    /// Wire the provider client, email relay and purger around an existing pool and storage.
    pub fn assemble(db: PgPool, config: Config, storage: Arc<dyn ObjectStorage>) -> anyhow::Result<Self> {
        let auth_client = Arc::new(GoTrueClient::new(&config.auth)?);
        let email = Arc::new(EmailService::new(&config)?);
        let purger = Arc::new(ImagePurger::new(storage.clone(), config.cleanup.clone()));

        Ok(Self::builder()
            .db(db)
            .config(config)
            .storage(storage)
            .auth_client(auth_client)
            .email(email)
            .purger(purger)
            .build())
    }
}

/// Get the atelier database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Connect, migrate, and rewrite any galleries still stored as encoded strings.
#[instrument(skip_all, err)]
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let settings = &config.database.pool;
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(settings.idle_timeout)
        .connect(&config.database.url)
        .await?;

    migrator().run(&pool).await?;

    let mut conn = pool.acquire().await?;
    let normalized = Works::new(&mut conn).normalize_legacy_galleries().await?;
    if normalized > 0 {
        info!("Normalized {} legacy galleries to JSON arrays", normalized);
    }

    Ok(pool)
}

/// Build the storage backend selected by `storage.backend`
pub fn create_storage(config: &Config) -> anyhow::Result<Arc<dyn ObjectStorage>> {
    let storage: Arc<dyn ObjectStorage> = match config.storage.backend {
        StorageBackend::Supabase => Arc::new(SupabaseStorage::new(&config.storage)?),
        StorageBackend::Memory => {
            warn!("Using in-memory image storage; uploads are lost on restart");
            Arc::new(MemoryStorage::new(config.storage.url.clone(), config.storage.bucket.clone()))
        }
    };
    Ok(storage)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.cors;

    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .expose_headers([http::header::LOCATION]);

    if cors_config.allowed_origins.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard)) {
        if cors_config.allow_credentials {
            warn!("CORS wildcard origin configured; credentials will not be allowed cross-origin");
        }
        cors = cors.allow_origin(AllowOrigin::any());
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
            }
        }
        cors = cors.allow_origin(origins).allow_credentials(cors_config.allow_credentials);
    }

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the main application router with all endpoints and middleware.
///
/// - `/healthz` liveness check
/// - public gallery and contact routes under `/api`
/// - sign-in routes under `/auth`
/// - admin routes under `/admin/api`, gated by [`require_admin_session`]
/// - the API reference at `/docs`
/// - `static_dir`, when configured, for everything else
/// - optional Prometheus metrics at `/internal/metrics`
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let limits = &state.config.storage;
    let upload_limit = limits
        .max_images_per_work
        .saturating_mul(limits.max_file_size)
        .saturating_add(MULTIPART_OVERHEAD);

    let public_routes = Router::new()
        .route("/works", get(works::list_public_works))
        .route("/works/{id}", get(works::get_public_work))
        .route("/categories", get(works::list_categories))
        .route("/contact", post(contact::send_contact));

    let auth_routes = Router::new()
        .route("/magic-link", post(auth_handlers::magic_link))
        .route("/login", post(auth_handlers::login))
        .route("/callback", get(auth_handlers::callback))
        .route("/logout", post(auth_handlers::logout))
        .route("/session", get(auth_handlers::session));

    let admin_routes = Router::new()
        .route("/works", get(works::list_works).post(works::create_work))
        .route("/works/order", put(works::reorder_works))
        .route(
            "/works/{id}",
            get(works::get_work).patch(works::update_work).delete(works::delete_work),
        )
        .route("/works/{id}/images", post(works::add_images).delete(works::remove_image))
        .route("/tags", get(works::list_tags))
        .layer(DefaultBodyLimit::max(upload_limit))
        .route_layer(from_fn_with_state(state.clone(), require_admin_session));

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api", public_routes)
        .nest("/auth", auth_routes)
        .nest("/admin/api", admin_routes)
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    if let Some(static_dir) = &state.config.static_dir {
        debug!("Serving static files from {}", static_dir.display());
        router = router.fallback_service(ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html"))));
    }

    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations, normalizes
///    legacy rows and builds the storage backend
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles requests
/// 3. **Shutdown**: when the shutdown future resolves, in-flight requests finish and the pool closes
pub struct Application {
    router: Router,
    app_state: AppState,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting atelier with configuration: {:#?}", config);

        let pool = setup_database(&config).await?;
        let storage = create_storage(&config)?;
        Self::from_parts(pool, config, storage)
    }

    /// Build the application around an already migrated pool and a storage backend
    pub fn from_parts(pool: PgPool, config: Config, storage: Arc<dyn ObjectStorage>) -> anyhow::Result<Self> {
        let app_state = AppState::assemble(pool, config, storage)?;
        let router = build_router(&app_state)?;
        Ok(Self { router, app_state })
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> (axum_test::TestServer, AppState) {
        let server = axum_test::TestServer::new(self.router).expect("Failed to create test server");
        (server, self.app_state)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let config = &self.app_state.config;
        let bind_addr = config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("atelier listening on http://{}, public site at {}", bind_addr, config.site_url);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Closing database connections...");
        self.app_state.db.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{create_test_app, create_test_config};
    use axum::http::StatusCode;

    #[sqlx::test]
    #[test_log::test]
    async fn test_healthz_and_docs_are_served(pool: PgPool) {
        let (server, _) = create_test_app(pool, create_test_config()).await;

        let health = server.get("/healthz").await;
        health.assert_status_ok();
        health.assert_text("OK");

        server.get("/docs").await.assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_admin_route_is_not_found(pool: PgPool) {
        let (server, _) = create_test_app(pool, create_test_config()).await;

        server.get("/admin/api/nothing-here").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_static_dir_serves_index_for_unknown_paths(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>portfolio</h1>").unwrap();

        let mut config = create_test_config();
        config.static_dir = Some(dir.path().to_path_buf());
        let (server, _) = create_test_app(pool, config).await;

        let response = server.get("/about").await;
        response.assert_status_ok();
        assert!(response.text().contains("portfolio"));
    }

    #[test]
    fn test_cors_layer_accepts_wildcard_and_urls() {
        let mut config = create_test_config();
        assert!(create_cors_layer(&config).is_ok());

        config.cors.allowed_origins = vec![CorsOrigin::Wildcard];
        assert!(create_cors_layer(&config).is_ok());
    }

    #[test]
    fn test_crypto_provider_install_is_idempotent() {
        install_crypto_provider();
        install_crypto_provider();
    }
}
