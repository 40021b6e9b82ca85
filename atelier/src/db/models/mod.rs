//! Database record models matching table schemas.
//!
//! Database models are distinct from the API models in [`crate::api::models`] so that storage
//! and wire representations can evolve independently.

pub mod works;
