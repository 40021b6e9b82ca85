use crate::storage::paths::object_key_from_public_url;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;
use utoipa::ToSchema;

/// Unique object keys to delete, in the order their URLs were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DeletionPlan {
    pub keys: Vec<String>,
    /// URLs that do not point into the bucket and were left alone
    pub skipped_urls: usize,
}

impl DeletionPlan {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Resolve URLs to object keys, dropping URLs outside the bucket and repeated keys.
pub fn plan_deletions<I, S>(urls: I, bucket: &str) -> DeletionPlan
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut plan = DeletionPlan::default();
    let mut seen = HashSet::new();

    for url in urls {
        let url = url.as_ref();
        match object_key_from_public_url(url, bucket) {
            Some(key) => {
                if seen.insert(key.clone()) {
                    plan.keys.push(key);
                }
            }
            None => {
                debug!("Not a bucket object, skipping: {}", url);
                plan.skipped_urls += 1;
            }
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::collect::collect_image_urls;
    use crate::db::models::works::GalleryValue;

    const BASE: &str = "https://abc.supabase.co/storage/v1/object/public/portfolio";

    #[test]
    fn test_cover_repeated_in_gallery_is_planned_once() {
        let a = format!("{BASE}/works/a.jpg");
        let b = format!("{BASE}/works/b.jpg");
        let gallery = GalleryValue::List(vec![a.clone(), b.clone()]);

        let plan = plan_deletions(collect_image_urls(Some(&a), Some(&gallery)), "portfolio");

        assert_eq!(plan.keys, vec!["works/a.jpg", "works/b.jpg"]);
        assert_eq!(plan.skipped_urls, 0);
    }

    #[test]
    fn test_foreign_urls_are_counted_not_planned() {
        let urls = [
            "/profile.jpg".to_string(),
            format!("{BASE}/works/a.jpg"),
            "https://cdn.example.com/b.jpg".to_string(),
        ];
        let plan = plan_deletions(&urls, "portfolio");

        assert_eq!(plan.keys, vec!["works/a.jpg"]);
        assert_eq!(plan.skipped_urls, 2);
    }

    #[test]
    fn test_first_seen_order_is_kept() {
        let urls = [
            format!("{BASE}/works/c.jpg"),
            format!("{BASE}/works/a.jpg"),
            format!("{BASE}/works/c.jpg?download"),
            format!("{BASE}/works/b.jpg"),
        ];
        let plan = plan_deletions(&urls, "portfolio");
        assert_eq!(plan.keys, vec!["works/c.jpg", "works/a.jpg", "works/b.jpg"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(plan_deletions(Vec::<String>::new(), "portfolio").is_empty());
    }
}
