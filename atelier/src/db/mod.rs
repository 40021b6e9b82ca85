//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL.
//! It follows the Repository pattern to provide clean abstractions over database operations.
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations for CRUD operations
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! ## Example Usage
//!
//! ```ignore
//! use atelier::db::handlers::{Repository, Works};
//! use atelier::db::models::works::WorkFilter;
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut conn = pool.acquire().await?;
//!     let mut works = Works::new(&mut conn);
//!
//!     for work in works.list(&WorkFilter::public(Some("Branding"))).await? {
//!         println!("{}", work.title);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Migrations
//!
//! Database migrations are managed by SQLx and located in the `migrations/` directory.
//! The [`crate::migrator`] function provides access to the migrator:
//!
//! ```ignore
//! atelier::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;
