//! HTTP request handlers for all API endpoints.
//!
//! Handlers are grouped by audience:
//!
//! - [`works`]: the public gallery (`/api/works`, `/api/categories`) and the gated admin
//!   CRUD under `/admin/api`
//! - [`auth`]: magic link and password sign-in, the link callback, sign-out and the session probe
//! - [`contact`]: the public contact form
//!
//! Errors are returned as [`crate::errors::Error`], which renders a JSON `{"message": ...}` body.

pub mod auth;
pub mod contact;
pub mod works;
