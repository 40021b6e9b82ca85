//! Base repository trait for database operations.

use crate::db::errors::Result;

/// Data access layer for one postgres table.
///
/// Create and update requests, responses, ids and list filters are associated types so each
/// table can pick its own shapes. Table-specific queries live as inherent methods next to the
/// implementation.
#[async_trait::async_trait]
pub trait Repository {
    type CreateRequest;
    type UpdateRequest;
    type Response;
    type Id: Send + Sync;
    type Filter: Send + Sync;

    /// Insert a new row
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// Fetch a row by id
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// List rows matching a filter
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Delete a row by id, returning whether it existed
    async fn delete(&mut self, id: Self::Id) -> Result<bool>;

    /// Update a row by id
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}
