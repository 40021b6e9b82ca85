//! API request and response models.

pub mod auth;
pub mod contact;
pub mod works;
