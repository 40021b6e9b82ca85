//! Database models for portfolio works.

use crate::types::WorkId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use utoipa::ToSchema;

/// Database representation of a work
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Work {
    pub id: WorkId,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// JSON array of image URLs. Older rows may hold a JSON string wrapping an encoded array.
    pub gallery: Option<Value>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub active: bool,
    pub display_order: i32,
}

impl Work {
    /// Typed view over the stored gallery column
    pub fn gallery_value(&self) -> Option<GalleryValue> {
        self.gallery.as_ref().and_then(GalleryValue::from_json)
    }
}

/// A stored gallery, in either of the encodings found in the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum GalleryValue {
    /// Canonical encoding: a JSON array of URLs
    List(Vec<String>),
    /// Legacy encoding: a JSON string holding an encoded array
    Encoded(String),
}

impl GalleryValue {
    /// Interpret a raw column value. Non-string array elements are dropped; values that are
    /// neither arrays nor strings yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(Self::List(
                items.iter().filter_map(|item| item.as_str().map(str::to_string)).collect(),
            )),
            Value::String(encoded) => Some(Self::Encoded(encoded.clone())),
            Value::Null => None,
            other => {
                tracing::warn!("Ignoring gallery stored as unexpected JSON type: {}", other);
                None
            }
        }
    }

    /// The URLs in stored order. `None` when a legacy value does not decode to a JSON array.
    pub fn urls(&self) -> Option<Vec<String>> {
        match self {
            Self::List(items) => Some(items.clone()),
            Self::Encoded(encoded) => serde_json::from_str::<Vec<Value>>(encoded)
                .ok()
                .map(|items| items.into_iter().filter_map(|v| v.as_str().map(str::to_string)).collect()),
        }
    }
}

/// Request to create a new work
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkCreateDBRequest {
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub gallery: Vec<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub active: bool,
    pub display_order: i32,
}

/// Request to update an existing work. `None` leaves a column unchanged; for nullable columns
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkUpdateDBRequest {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub image_url: Option<Option<String>>,
    pub gallery: Option<Vec<String>>,
    pub category: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub active: Option<bool>,
    pub display_order: Option<i32>,
}

/// Response from database after creating or updating a work
pub type WorkDBResponse = Work;

/// Filter for listing works
#[derive(Debug, Clone, Default)]
pub struct WorkFilter {
    /// Only active works
    pub active_only: bool,
    /// Only works in this category
    pub category: Option<String>,
}

impl WorkFilter {
    /// Works visible on the public gallery, optionally in one category. `"all"` means no filter.
    pub fn public(category: Option<&str>) -> Self {
        let category = category
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"))
            .map(str::to_string);
        Self {
            active_only: true,
            category,
        }
    }

    /// Every work, as listed on the admin dashboard
    pub fn admin() -> Self {
        Self::default()
    }
}

/// Trim a free-text label, treating blank input as absent
pub fn clean_label(label: Option<&str>) -> Option<String> {
    label.map(str::trim).filter(|l| !l.is_empty()).map(str::to_string)
}

/// Normalize tags so that the category, when set, is the first tag and appears once.
///
/// Tags are trimmed, blank tags are dropped and duplicates keep their first position.
pub fn normalize_tags(category: Option<&str>, tags: &[String]) -> Vec<String> {
    let category = clean_label(category);
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(tags.len() + 1);
    for tag in category.iter().map(String::as_str).chain(tags.iter().map(|t| t.trim())) {
        if !tag.is_empty() && seen.insert(tag.to_string()) {
            normalized.push(tag.to_string());
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_category_becomes_first_tag() {
        assert_eq!(
            normalize_tags(Some("Branding"), &tags(&["Logo", "Branding", "Café"])),
            tags(&["Branding", "Logo", "Café"])
        );
    }

    #[test]
    fn test_tags_are_trimmed_and_deduplicated() {
        assert_eq!(
            normalize_tags(Some("  Art "), &tags(&[" Art", "x", "", "x ", "  "])),
            tags(&["Art", "x"])
        );
    }

    #[test]
    fn test_without_category_tags_keep_order() {
        assert_eq!(normalize_tags(None, &tags(&["b", "a"])), tags(&["b", "a"]));
        assert_eq!(normalize_tags(Some("   "), &tags(&["b"])), tags(&["b"]));
    }

    #[test]
    fn test_gallery_value_from_json() {
        assert_eq!(
            GalleryValue::from_json(&json!(["a", 1, null, "b"])),
            Some(GalleryValue::List(tags(&["a", "b"])))
        );
        assert_eq!(
            GalleryValue::from_json(&json!("[\"a\"]")),
            Some(GalleryValue::Encoded("[\"a\"]".to_string()))
        );
        assert_eq!(GalleryValue::from_json(&json!({ "a": 1 })), None);
        assert_eq!(GalleryValue::from_json(&Value::Null), None);
    }

    #[test]
    fn test_public_filter_treats_all_as_no_filter() {
        assert_eq!(WorkFilter::public(Some("all")).category, None);
        assert_eq!(WorkFilter::public(Some(" ")).category, None);
        assert_eq!(WorkFilter::public(Some("Branding")).category.as_deref(), Some("Branding"));
        assert!(WorkFilter::public(None).active_only);
    }
}
