//! API request/response models for portfolio works.

use crate::db::models::works::{WorkDBResponse, WorkUpdateDBRequest};
use crate::types::WorkId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use utoipa::{IntoParams, ToSchema};

/// Query parameters for the public gallery
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListWorksQuery {
    /// Only works in this category. `all` or absent lists every category.
    #[param(example = "Illustration")]
    pub category: Option<String>,
}

/// A work as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: WorkId,
    pub title: String,
    pub description: Option<String>,
    /// Cover image URL
    pub image_url: Option<String>,
    /// Gallery image URLs in display order
    pub gallery: Vec<String>,
    pub category: Option<String>,
    /// Tags, with the category first when set
    pub tags: Vec<String>,
    /// Inactive works are hidden from the public gallery
    pub active: bool,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WorkDBResponse> for WorkResponse {
    fn from(db: WorkDBResponse) -> Self {
        let gallery = db.gallery_value().and_then(|g| g.urls()).unwrap_or_default();
        Self {
            id: db.id,
            title: db.title,
            description: db.description,
            image_url: db.image_url,
            gallery,
            category: db.category,
            tags: db.tags,
            active: db.active,
            display_order: db.display_order,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Partial update of a work. Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct WorkUpdate {
    #[schema(example = "Harbour at dusk")]
    pub title: Option<String>,
    /// Description (None = no change, Some(None) = clear, Some(text) = set)
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub description: Option<Option<String>>,
    /// Category (None = no change, Some(None) = clear, Some(label) = set)
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub category: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub active: Option<bool>,
    pub display_order: Option<i32>,
    /// New gallery order. Must be a permutation of the current gallery.
    pub gallery: Option<Vec<String>>,
    /// Make this image the cover. It must already belong to the work.
    pub cover_url: Option<String>,
}

impl WorkUpdate {
    /// The column changes that need no knowledge of the stored images
    pub fn field_changes(&self) -> WorkUpdateDBRequest {
        WorkUpdateDBRequest {
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            tags: self.tags.clone(),
            active: self.active,
            display_order: self.display_order,
            ..Default::default()
        }
    }
}

/// Request body for removing one image from a work
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RemoveImageRequest {
    /// Public URL of the image to remove
    pub url: String,
}

/// Request body for reordering the public gallery
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReorderWorksRequest {
    /// Work ids in display order
    #[schema(value_type = Vec<String>)]
    pub ids: Vec<WorkId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReorderWorksResponse {
    /// Number of works whose position was set
    pub updated: u64,
}
