//! Test utilities for integration testing (available with `test-utils` feature).

use crate::{
    AppState, Application,
    auth::session::{AUTHENTICATED_AUDIENCE, SessionClaims},
    config::{AuthConfig, CleanupConfig, Config, EmailTransportConfig, PoolSettings, StorageBackend},
    db::{
        handlers::{Repository, Works},
        models::works::WorkCreateDBRequest,
    },
    retry::RetryPolicy,
    storage::MemoryStorage,
    types::{UserId, WorkId},
};
use axum_test::TestServer;
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-for-testing-only";
pub const TEST_ADMIN_EMAIL: &str = "artist@example.com";

pub async fn create_test_app(pool: PgPool, config: Config) -> (TestServer, AppState) {
    let storage = Arc::new(MemoryStorage::new(config.storage.url.clone(), config.storage.bucket.clone()));
    create_test_app_with_storage(pool, config, storage).await
}

/// Like [`create_test_app`], keeping a handle on the in-memory bucket for assertions.
///
/// The pool comes from `#[sqlx::test]`, which has already applied the migrations.
pub async fn create_test_app_with_storage(pool: PgPool, config: Config, storage: Arc<MemoryStorage>) -> (TestServer, AppState) {
    let app = Application::from_parts(pool, config, storage).expect("Failed to create application");
    app.into_test_server()
}

pub fn create_test_config() -> Config {
    // Use temp directory for test emails
    let temp_dir = std::env::temp_dir().join(format!("atelier-test-emails-{}", std::process::id()));

    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        enable_metrics: false,
        enable_otel_export: false,
        ..Default::default()
    };

    config.database.pool = PoolSettings {
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    };

    config.storage.backend = StorageBackend::Memory;
    config.storage.service_key = "test-service-key".to_string();
    config.storage.max_images_per_work = 4;
    config.storage.max_file_size = 64 * 1024;

    config.auth.anon_key = "test-anon-key".to_string();
    config.auth.jwt_secret = Some(TEST_JWT_SECRET.to_string());

    config.cleanup = immediate_cleanup_config();

    config.email.transport = EmailTransportConfig::File {
        path: temp_dir.to_string_lossy().to_string(),
    };
    config.email.contact_to = Some("Artist <artist@example.com>".to_string());

    config
}

/// Cleanup settings with no waiting between attempts or objects
pub fn immediate_cleanup_config() -> CleanupConfig {
    CleanupConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            backoff: Duration::ZERO,
            backoff_factor: 1.0,
            max_backoff: Duration::ZERO,
        },
        settle_delay: Duration::ZERO,
        pause_between_objects: Duration::ZERO,
    }
}

/// Sign an access token the way the auth provider does, valid for one hour
pub fn mint_access_token(config: &AuthConfig, user_id: UserId, email: &str) -> String {
    let now = Utc::now();
    let claims = SessionClaims {
        sub: user_id,
        email: Some(email.to_string()),
        aud: AUTHENTICATED_AUDIENCE.to_string(),
        exp: (now + chrono::Duration::hours(1)).timestamp(),
        iat: Some(now.timestamp()),
        role: Some("authenticated".to_string()),
    };
    let secret = config.jwt_secret.as_deref().expect("test config has a JWT secret");
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).expect("Failed to sign test token")
}

/// Bearer header value for the default test admin
pub fn admin_bearer(config: &Config) -> String {
    format!("Bearer {}", mint_access_token(&config.auth, UserId::new_v4(), TEST_ADMIN_EMAIL))
}

pub async fn create_test_work(pool: &PgPool, request: WorkCreateDBRequest) -> WorkId {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Works::new(&mut conn).create(&request).await.expect("Failed to create test work").id
}
