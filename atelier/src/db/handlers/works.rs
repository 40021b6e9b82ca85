//! Database repository for portfolio works.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::works::{GalleryValue, Work, WorkCreateDBRequest, WorkDBResponse, WorkFilter, WorkUpdateDBRequest, clean_label, normalize_tags},
};
use crate::types::{WorkId, abbrev_uuid};
use serde_json::Value;
use sqlx::{PgConnection, QueryBuilder};
use tracing::{info, instrument, warn};

pub struct Works<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Works<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Distinct non-empty categories of active works, sorted
    #[instrument(skip(self), err)]
    pub async fn categories(&mut self) -> Result<Vec<String>> {
        let categories = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT btrim(category) AS category
            FROM works
            WHERE active AND category IS NOT NULL AND btrim(category) <> ''
            ORDER BY category
            "#,
        )
        .fetch_all(&mut *self.db)
        .await?;

        Ok(categories)
    }

    /// Distinct tags used across all works, for autocompletion in the admin forms
    #[instrument(skip(self), err)]
    pub async fn tag_suggestions(&mut self) -> Result<Vec<String>> {
        let tags = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT btrim(tag) AS tag
            FROM works, UNNEST(tags) AS tag
            WHERE btrim(tag) <> ''
            ORDER BY tag
            "#,
        )
        .fetch_all(&mut *self.db)
        .await?;

        Ok(tags)
    }

    /// Set `display_order` to each work's position in `ids`. Unknown ids are ignored.
    ///
    /// Returns the number of works updated.
    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    pub async fn reorder(&mut self, ids: &[WorkId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE works AS w
            SET display_order = (o.position - 1)::int, updated_at = NOW()
            FROM UNNEST($1::uuid[]) WITH ORDINALITY AS o(id, position)
            WHERE w.id = o.id
            "#,
        )
        .bind(ids)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// Rewrite galleries stored as a JSON string into the canonical JSON array.
    ///
    /// Rows whose string does not hold an array are left untouched. Returns the number of
    /// rows rewritten.
    #[instrument(skip(self), err)]
    pub async fn normalize_legacy_galleries(&mut self) -> Result<u64> {
        let legacy: Vec<(WorkId, String)> = sqlx::query_as(
            r#"
            SELECT id, gallery #>> '{}' AS gallery
            FROM works
            WHERE jsonb_typeof(gallery) = 'string'
            "#,
        )
        .fetch_all(&mut *self.db)
        .await?;

        let mut rewritten = 0;
        for (id, encoded) in legacy {
            let Some(urls) = GalleryValue::Encoded(encoded).urls() else {
                warn!(work_id = %abbrev_uuid(&id), "Leaving unparseable legacy gallery in place");
                continue;
            };
            sqlx::query("UPDATE works SET gallery = $2 WHERE id = $1")
                .bind(id)
                .bind(Value::from(urls))
                .execute(&mut *self.db)
                .await?;
            rewritten += 1;
        }

        if rewritten > 0 {
            info!("Normalized {} legacy galleries", rewritten);
        }
        Ok(rewritten)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Works<'c> {
    type CreateRequest = WorkCreateDBRequest;
    type UpdateRequest = WorkUpdateDBRequest;
    type Response = WorkDBResponse;
    type Id = WorkId;
    type Filter = WorkFilter;

    #[instrument(skip(self, request), fields(title = %request.title), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let category = clean_label(request.category.as_deref());
        let tags = normalize_tags(category.as_deref(), &request.tags);

        let work = sqlx::query_as::<_, Work>(
            r#"
            INSERT INTO works (title, description, image_url, gallery, category, tags, active, display_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(request.title.trim())
        .bind(clean_label(request.description.as_deref()))
        .bind(&request.image_url)
        .bind(Value::from(request.gallery.clone()))
        .bind(category)
        .bind(tags)
        .bind(request.active)
        .bind(request.display_order)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(work)
    }

    #[instrument(skip(self), fields(work_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let work = sqlx::query_as::<_, Work>("SELECT * FROM works WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(work)
    }

    #[instrument(skip(self, filter), fields(active_only = filter.active_only, category = ?filter.category), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM works WHERE 1=1");

        if filter.active_only {
            query.push(" AND active");
        }
        if let Some(ref category) = filter.category {
            query.push(" AND category = ");
            query.push_bind(category.clone());
        }

        if filter.active_only {
            query.push(" ORDER BY display_order ASC, created_at DESC");
        } else {
            query.push(" ORDER BY created_at DESC");
        }

        let works = query.build_query_as::<Work>().fetch_all(&mut *self.db).await?;

        Ok(works)
    }

    #[instrument(skip(self), fields(work_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM works WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(work_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // Tags depend on the category, so either one changing means both are rewritten
        let (category, tags) = if request.category.is_some() || request.tags.is_some() {
            let current = self.get_by_id(id).await?.ok_or(DbError::NotFound)?;
            let category = match &request.category {
                Some(category) => clean_label(category.as_deref()),
                None => current.category,
            };
            let tags = request.tags.as_ref().unwrap_or(&current.tags);
            let tags = normalize_tags(category.as_deref(), tags);
            (Some(category), Some(tags))
        } else {
            (None, None)
        };

        let work = sqlx::query_as::<_, Work>(
            r#"
            UPDATE works SET
                title = COALESCE($2, title),
                description = CASE WHEN $3::boolean THEN $4::text ELSE description END,
                image_url = CASE WHEN $5::boolean THEN $6::text ELSE image_url END,
                gallery = COALESCE($7, gallery),
                category = CASE WHEN $8::boolean THEN $9::text ELSE category END,
                tags = COALESCE($10, tags),
                active = COALESCE($11, active),
                display_order = COALESCE($12, display_order),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.title.as_deref().map(str::trim))
        .bind(request.description.is_some())
        .bind(request.description.as_ref().and_then(|d| clean_label(d.as_deref())))
        .bind(request.image_url.is_some())
        .bind(request.image_url.clone().flatten())
        .bind(request.gallery.clone().map(Value::from))
        .bind(category.is_some())
        .bind(category.flatten())
        .bind(tags)
        .bind(request.active)
        .bind(request.display_order)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(work)
    }
}
