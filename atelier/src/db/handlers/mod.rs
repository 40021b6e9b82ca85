//! Repository implementations for database access.
//!
//! Each repository wraps a SQLx connection or transaction and implements the
//! [`Repository`] trait for its table.
//!
//! - [`Works`]: portfolio works, their galleries, categories and ordering

pub mod repository;
pub mod works;

pub use repository::Repository;
pub use works::Works;
