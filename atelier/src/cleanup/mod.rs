//! Image cleanup when a work is deleted.
//!
//! Deleting a work removes its images from the bucket before the row itself goes:
//!
//! 1. [`collect::collect_image_urls`] gathers the cover and gallery URLs
//! 2. [`plan::plan_deletions`] resolves them to unique object keys
//! 3. [`executor::ImagePurger`] removes each key, verifying and retrying per key
//! 4. the row is deleted
//!
//! Storage trouble never stops step 4; it only shows up in the [`PurgeReport`] and the logs.
//! Nothing is persisted between steps, so deleting again is how a partial failure is retried.

pub mod collect;
pub mod executor;
pub mod plan;

pub use collect::collect_image_urls;
pub use executor::{ImagePurger, KeyOutcome, PurgeOutcome, PurgeReport};
pub use plan::{DeletionPlan, plan_deletions};

use crate::db::errors::DbError;
use crate::db::handlers::{Repository, Works};
use crate::errors::{Error, Result};
use crate::types::{WorkId, abbrev_uuid};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, instrument};
use utoipa::ToSchema;

/// Outcome of deleting a work together with its images
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WorkDeletion {
    #[schema(value_type = String, format = "uuid")]
    pub work_id: WorkId,
    pub title: String,
    pub images: PurgeReport,
}

/// Delete a work's images, then the work.
///
/// Only database failures are returned as errors: a missing work is [`Error::NotFound`], and a
/// failed row deletion is surfaced after the images have already been purged.
#[instrument(skip(pool, purger), fields(work_id = %abbrev_uuid(&id)), err)]
pub async fn delete_work(pool: &PgPool, purger: &ImagePurger, id: WorkId) -> Result<WorkDeletion> {
    let work = {
        let mut conn = pool.acquire().await.map_err(DbError::from)?;
        Works::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
            resource: "Work".to_string(),
            id: id.to_string(),
        })?
    };

    let gallery = work.gallery_value();
    let urls = collect_image_urls(work.image_url.as_deref(), gallery.as_ref());
    let plan = plan_deletions(&urls, purger.bucket());
    let images = purger.purge(&plan).await;

    let mut conn = pool.acquire().await.map_err(DbError::from)?;
    let existed = Works::new(&mut conn).delete(id).await?;
    if !existed {
        // Deleted concurrently while the images were being purged
        info!("Work {} was already gone when its row was deleted", abbrev_uuid(&id));
    }

    info!(
        images_deleted = images.deleted,
        images_failed = images.failed,
        "Deleted work '{}'",
        work.title
    );

    Ok(WorkDeletion {
        work_id: id,
        title: work.title,
        images,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::works::WorkCreateDBRequest;
    use crate::storage::{MemoryStorage, ObjectStorage};
    use crate::test_utils::immediate_cleanup_config;
    use std::sync::Arc;
    use url::Url;

    fn memory_storage() -> Arc<MemoryStorage> {
        Arc::new(MemoryStorage::new(Url::parse("http://localhost:54321").unwrap(), "portfolio"))
    }

    async fn create_work(pool: &PgPool, image_url: Option<String>, gallery: Vec<String>) -> WorkId {
        let mut conn = pool.acquire().await.unwrap();
        let request = WorkCreateDBRequest {
            title: "Poster".to_string(),
            image_url,
            gallery,
            active: true,
            ..Default::default()
        };
        Works::new(&mut conn).create(&request).await.unwrap().id
    }

    async fn work_exists(pool: &PgPool, id: WorkId) -> bool {
        let mut conn = pool.acquire().await.unwrap();
        Works::new(&mut conn).get_by_id(id).await.unwrap().is_some()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_deletes_images_then_row(pool: PgPool) {
        let storage = memory_storage();
        storage.insert("works/a.jpg", "a");
        storage.insert("works/b.jpg", "b");
        let a = storage.public_url("works/a.jpg");
        let b = storage.public_url("works/b.jpg");
        let id = create_work(&pool, Some(a.clone()), vec![a, b, "/profile.jpg".to_string()]).await;

        let purger = ImagePurger::new(storage.clone(), immediate_cleanup_config());
        let deletion = delete_work(&pool, &purger, id).await.unwrap();

        assert_eq!(deletion.images.deleted, 2);
        assert_eq!(deletion.images.skipped_urls, 1);
        assert_eq!(storage.remove_calls("works/a.jpg"), 1);
        assert!(storage.keys().is_empty());
        assert!(!work_exists(&pool, id).await);
    }

    #[sqlx::test]
    async fn test_already_absent_objects_still_delete_row(pool: PgPool) {
        let storage = memory_storage();
        let id = create_work(&pool, Some(storage.public_url("works/gone.jpg")), vec![]).await;

        let purger = ImagePurger::new(storage.clone(), immediate_cleanup_config());
        let deletion = delete_work(&pool, &purger, id).await.unwrap();

        assert_eq!(deletion.images.already_absent, 1);
        assert_eq!(deletion.images.failed, 0);
        assert!(!work_exists(&pool, id).await);
    }

    #[sqlx::test]
    async fn test_failed_image_does_not_block_row_deletion(pool: PgPool) {
        let storage = memory_storage();
        storage.insert("works/a.jpg", "a");
        storage.insert("works/b.jpg", "b");
        storage.fail_removes_of("works/b.jpg");
        let id = create_work(
            &pool,
            Some(storage.public_url("works/a.jpg")),
            vec![storage.public_url("works/b.jpg")],
        )
        .await;

        let purger = ImagePurger::new(storage.clone(), immediate_cleanup_config());
        let deletion = delete_work(&pool, &purger, id).await.unwrap();

        assert_eq!(deletion.images.failed, 1);
        assert_eq!(deletion.images.deleted, 1);
        assert_eq!(storage.remove_calls("works/b.jpg"), 3);
        assert!(storage.contains("works/b.jpg"));
        assert!(!work_exists(&pool, id).await);
    }

    #[sqlx::test]
    async fn test_legacy_encoded_gallery_is_cleaned(pool: PgPool) {
        let storage = memory_storage();
        storage.insert("works/x.jpg", "x");
        storage.insert("works/y.jpg", "y");
        let encoded = serde_json::to_string(&[storage.public_url("works/x.jpg"), storage.public_url("works/y.jpg")]).unwrap();
        let id: WorkId = sqlx::query_scalar("INSERT INTO works (title, gallery) VALUES ('legacy', to_jsonb($1::text)) RETURNING id")
            .bind(encoded)
            .fetch_one(&pool)
            .await
            .unwrap();

        let purger = ImagePurger::new(storage.clone(), immediate_cleanup_config());
        let deletion = delete_work(&pool, &purger, id).await.unwrap();

        assert_eq!(deletion.images.deleted, 2);
        assert!(storage.keys().is_empty());
    }

    #[sqlx::test]
    async fn test_missing_work_is_not_found(pool: PgPool) {
        let purger = ImagePurger::new(memory_storage(), immediate_cleanup_config());
        let err = delete_work(&pool, &purger, WorkId::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
