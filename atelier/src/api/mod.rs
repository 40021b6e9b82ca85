//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - **Gallery** (`/api/works`, `/api/categories`): published works, no authentication
//! - **Contact** (`/api/contact`): the public contact form
//! - **Auth** (`/auth/*`): sign-in, sign-out and the current session
//! - **Admin** (`/admin/api/*`): work management, behind the session gate
//!
//! # OpenAPI Documentation
//!
//! Endpoints are documented with `utoipa` annotations; the rendered reference is served at
//! `/docs`.

pub mod handlers;
pub mod models;
