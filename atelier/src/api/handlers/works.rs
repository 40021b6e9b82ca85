use crate::{
    AppState,
    api::models::works::{ListWorksQuery, RemoveImageRequest, ReorderWorksRequest, ReorderWorksResponse, WorkResponse, WorkUpdate},
    auth::current_user::CurrentUser,
    cleanup::{self, WorkDeletion},
    db::{
        handlers::{Repository, Works},
        models::works::{Work, WorkCreateDBRequest, WorkFilter, WorkUpdateDBRequest},
    },
    errors::{Error, Result},
    storage::{ObjectStorage, paths},
    types::{WorkId, abbrev_uuid},
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use bytes::Bytes;
use tracing::{debug, info, instrument, warn};

fn not_found(id: WorkId) -> Error {
    Error::NotFound {
        resource: "Work".to_string(),
        id: id.to_string(),
    }
}

async fn load_work(state: &AppState, id: WorkId) -> Result<Work> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Works::new(&mut conn).get_by_id(id).await?.ok_or_else(|| not_found(id))
}

async fn save_changes(state: &AppState, id: WorkId, changes: &WorkUpdateDBRequest) -> Result<Work> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Works::new(&mut conn).update(id, changes).await?)
}

// Public gallery

#[utoipa::path(
    get,
    path = "/api/works",
    tag = "gallery",
    summary = "List published works",
    params(ListWorksQuery),
    responses(
        (status = 200, description = "Active works in display order", body = Vec<WorkResponse>),
        (status = 500, description = "Internal server error")
    )
)]
#[instrument(skip_all)]
pub async fn list_public_works(State(state): State<AppState>, Query(query): Query<ListWorksQuery>) -> Result<Json<Vec<WorkResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let works = Works::new(&mut conn).list(&WorkFilter::public(query.category.as_deref())).await?;
    Ok(Json(works.into_iter().map(WorkResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/works/{id}",
    tag = "gallery",
    summary = "Get a published work",
    params(("id" = String, Path, description = "Work ID")),
    responses(
        (status = 200, description = "Work details", body = WorkResponse),
        (status = 404, description = "No active work with this ID"),
        (status = 500, description = "Internal server error")
    )
)]
#[instrument(skip_all, fields(work_id = %abbrev_uuid(&id)))]
pub async fn get_public_work(State(state): State<AppState>, Path(id): Path<WorkId>) -> Result<Json<WorkResponse>> {
    let work = load_work(&state, id).await?;
    // Drafts are indistinguishable from missing works
    if !work.active {
        return Err(not_found(id));
    }
    Ok(Json(WorkResponse::from(work)))
}

#[utoipa::path(
    get,
    path = "/api/categories",
    tag = "gallery",
    summary = "List categories",
    responses(
        (status = 200, description = "Distinct categories of published works", body = Vec<String>),
        (status = 500, description = "Internal server error")
    )
)]
#[instrument(skip_all)]
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(Works::new(&mut conn).categories().await?))
}

// Multipart forms and uploads

/// An image file received in a multipart form
struct ImageUpload {
    file_name: String,
    content: Bytes,
}

/// Fields of the create and append multipart forms
#[derive(Default)]
struct WorkForm {
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    tags: Vec<String>,
    active: Option<bool>,
    display_order: Option<i32>,
    images: Vec<ImageUpload>,
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Ok(true),
        "false" | "off" | "0" | "no" | "" => Ok(false),
        other => Err(Error::BadRequest {
            message: format!("Invalid value for 'active': {other}"),
        }),
    }
}

/// Read a multipart form, keeping at most `capacity` image files.
///
/// Any part carrying a file name is treated as an image. Tags may be sent as repeated fields,
/// comma-separated, or both.
async fn read_work_form(multipart: &mut Multipart, capacity: usize, max_file_size: usize) -> Result<WorkForm> {
    let mut form = WorkForm::default();
    let mut dropped = 0;

    while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to parse multipart data: {e}"),
    })? {
        let name = field.name().unwrap_or("").to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            if file_name.is_empty() {
                continue;
            }
            if form.images.len() >= capacity {
                dropped += 1;
                continue;
            }
            let content = field.bytes().await.map_err(|e| Error::BadRequest {
                message: format!("Failed to read file '{file_name}': {e}"),
            })?;
            if content.is_empty() {
                continue;
            }
            if content.len() > max_file_size {
                return Err(Error::PayloadTooLarge {
                    message: format!("File '{file_name}' exceeds the maximum size of {max_file_size} bytes"),
                });
            }
            form.images.push(ImageUpload { file_name, content });
            continue;
        }

        let value = field.text().await.map_err(|e| Error::BadRequest {
            message: format!("Failed to read field '{name}': {e}"),
        })?;
        match name.as_str() {
            "title" => form.title = Some(value),
            "description" => form.description = Some(value),
            "category" => form.category = Some(value),
            "tags" | "tags[]" => form.tags.extend(value.split(',').map(str::to_string)),
            "active" => form.active = Some(parse_flag(&value)?),
            "display_order" => {
                form.display_order = Some(value.trim().parse::<i32>().map_err(|_| Error::BadRequest {
                    message: "Invalid value for 'display_order': must be an integer".to_string(),
                })?)
            }
            _ => {
                // Ignore unknown fields (forward compatibility)
            }
        }
    }

    if dropped > 0 {
        warn!("Dropped {} images beyond the per-work limit", dropped);
    }
    Ok(form)
}

/// Remove objects stored earlier in a request that is now failing
async fn discard_uploads(storage: &dyn ObjectStorage, keys: &[String]) {
    for key in keys {
        if let Err(e) = storage.remove(key).await {
            warn!("Could not remove orphaned upload {}: {}", key, e);
        }
    }
}

/// Upload images in order and return their public URLs.
///
/// If one upload fails, the objects already stored by this call are removed again.
async fn upload_images(state: &AppState, images: Vec<ImageUpload>, scope: Option<&str>) -> Result<Vec<String>> {
    let storage = state.storage.as_ref();
    let prefix = &state.config.storage.path_prefix;
    let mut keys: Vec<String> = Vec::with_capacity(images.len());
    let mut urls = Vec::with_capacity(images.len());

    for image in images {
        let content_type = mime_guess::from_path(&image.file_name).first_or_octet_stream();
        if content_type.type_() != mime_guess::mime::IMAGE {
            discard_uploads(storage, &keys).await;
            return Err(Error::BadRequest {
                message: format!("'{}' is not an image", image.file_name),
            });
        }

        let key = paths::new_object_key(prefix, &image.file_name, scope);
        match storage.upload(&key, image.content, content_type.essence_str(), true).await {
            Ok(url) => {
                debug!("Uploaded {} as {}", image.file_name, key);
                keys.push(key);
                urls.push(url);
            }
            Err(e) => {
                discard_uploads(storage, &keys).await;
                return Err(e.into());
            }
        }
    }

    Ok(urls)
}

// Admin

#[utoipa::path(
    get,
    path = "/admin/api/works",
    tag = "works",
    summary = "List all works",
    responses(
        (status = 200, description = "Every work, newest first", body = Vec<WorkResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("CookieAuth" = []), ("BearerAuth" = []))
)]
#[instrument(skip_all)]
pub async fn list_works(State(state): State<AppState>, _: CurrentUser) -> Result<Json<Vec<WorkResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let works = Works::new(&mut conn).list(&WorkFilter::admin()).await?;
    Ok(Json(works.into_iter().map(WorkResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/admin/api/works",
    tag = "works",
    summary = "Create work",
    description = "Create a work from a multipart form. The first image becomes the cover and the rest the gallery; \
                   images beyond the per-work limit are dropped.",
    request_body(
        content_type = "multipart/form-data",
        description = "Fields: title, description, category, tags, active, display_order, plus image files"
    ),
    responses(
        (status = 201, description = "Work created", body = WorkResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "Payload too large"),
        (status = 502, description = "Image storage failed")
    ),
    security(("CookieAuth" = []), ("BearerAuth" = []))
)]
#[instrument(skip_all, fields(admin = %current_user.email))]
pub async fn create_work(
    State(state): State<AppState>,
    current_user: CurrentUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<WorkResponse>)> {
    let limits = &state.config.storage;
    let form = read_work_form(&mut multipart, limits.max_images_per_work, limits.max_file_size).await?;

    let title = form.title.as_deref().map(str::trim).unwrap_or_default().to_string();
    if title.is_empty() {
        return Err(Error::BadRequest {
            message: "Missing required field: 'title'".to_string(),
        });
    }

    let mut urls = upload_images(&state, form.images, None).await?;
    let cover = (!urls.is_empty()).then(|| urls.remove(0));

    let request = WorkCreateDBRequest {
        title,
        description: form.description,
        image_url: cover,
        gallery: urls,
        category: form.category,
        tags: form.tags,
        active: form.active.unwrap_or(true),
        display_order: form.display_order.unwrap_or(0),
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let work = match Works::new(&mut conn).create(&request).await {
        Ok(work) => work,
        Err(e) => {
            let keys: Vec<String> = request
                .image_url
                .iter()
                .chain(&request.gallery)
                .filter_map(|url| paths::object_key_from_public_url(url, state.storage.bucket()))
                .collect();
            discard_uploads(state.storage.as_ref(), &keys).await;
            return Err(e.into());
        }
    };

    info!("Created work '{}' ({})", work.title, abbrev_uuid(&work.id));
    Ok((StatusCode::CREATED, Json(WorkResponse::from(work))))
}

#[utoipa::path(
    get,
    path = "/admin/api/works/{id}",
    tag = "works",
    summary = "Get work",
    params(("id" = String, Path, description = "Work ID")),
    responses(
        (status = 200, description = "Work details", body = WorkResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Work not found")
    ),
    security(("CookieAuth" = []), ("BearerAuth" = []))
)]
#[instrument(skip_all, fields(work_id = %abbrev_uuid(&id)))]
pub async fn get_work(State(state): State<AppState>, _: CurrentUser, Path(id): Path<WorkId>) -> Result<Json<WorkResponse>> {
    Ok(Json(WorkResponse::from(load_work(&state, id).await?)))
}

/// Apply gallery reorder and cover selection to the stored images
/// Cover and gallery changes derived from a patch
#[derive(Debug, Default)]
struct ImageChanges {
    image_url: Option<Option<String>>,
    gallery: Option<Vec<String>>,
    /// Previous cover that no longer fits in the gallery; its object must be removed
    dropped: Option<String>,
}

fn image_changes(work: &Work, update: &WorkUpdate, max_images: usize) -> Result<ImageChanges> {
    let current = work.gallery_value().and_then(|g| g.urls()).unwrap_or_default();
    let mut gallery = None;

    if let Some(order) = &update.gallery {
        let mut proposed = order.clone();
        let mut existing = current.clone();
        proposed.sort();
        existing.sort();
        if proposed != existing {
            return Err(Error::BadRequest {
                message: "Gallery order must contain exactly the work's current images".to_string(),
            });
        }
        gallery = Some(order.clone());
    }

    let Some(cover) = update.cover_url.as_deref().map(str::trim) else {
        return Ok(ImageChanges {
            gallery,
            ..Default::default()
        });
    };

    let mut next = gallery.unwrap_or(current);
    let previous_cover = work.image_url.clone();
    if previous_cover.as_deref() != Some(cover) && !next.iter().any(|url| url == cover) {
        return Err(Error::BadRequest {
            message: "The cover must be one of the work's images".to_string(),
        });
    }

    // The cover leads the gallery; a previous cover outside it is kept while there is room
    next.retain(|url| url != cover);
    next.insert(0, cover.to_string());
    let mut dropped = None;
    if let Some(previous) = previous_cover.filter(|p| p != cover && !next.contains(p)) {
        if next.len() < max_images {
            next.insert(1, previous);
        } else {
            dropped = Some(previous);
        }
    }
    Ok(ImageChanges {
        image_url: Some(Some(cover.to_string())),
        gallery: Some(next),
        dropped,
    })
}

#[utoipa::path(
    patch,
    path = "/admin/api/works/{id}",
    tag = "works",
    summary = "Update work",
    params(("id" = String, Path, description = "Work ID")),
    request_body = WorkUpdate,
    responses(
        (status = 200, description = "Work updated", body = WorkResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Work not found")
    ),
    security(("CookieAuth" = []), ("BearerAuth" = []))
)]
#[instrument(skip_all, fields(work_id = %abbrev_uuid(&id)))]
pub async fn update_work(
    State(state): State<AppState>,
    _: CurrentUser,
    Path(id): Path<WorkId>,
    Json(update): Json<WorkUpdate>,
) -> Result<Json<WorkResponse>> {
    if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(Error::BadRequest {
            message: "Title cannot be empty".to_string(),
        });
    }

    let mut changes = update.field_changes();
    changes.title = changes.title.map(|t| t.trim().to_string());

    let mut dropped = None;
    if update.gallery.is_some() || update.cover_url.is_some() {
        let work = load_work(&state, id).await?;
        let images = image_changes(&work, &update, state.config.storage.max_images_per_work)?;
        changes.image_url = images.image_url;
        changes.gallery = images.gallery;
        dropped = images.dropped;
    }

    let updated = save_changes(&state, id, &changes).await?;
    if let Some(url) = dropped {
        info!("Previous cover no longer fits in the gallery, removing it");
        remove_stored_image(&state, &url).await;
    }
    Ok(Json(WorkResponse::from(updated)))
}

#[utoipa::path(
    delete,
    path = "/admin/api/works/{id}",
    tag = "works",
    summary = "Delete work",
    description = "Remove the work's images from storage, then the work. Image failures are reported, not raised.",
    params(("id" = String, Path, description = "Work ID")),
    responses(
        (status = 200, description = "Work deleted; per-image outcomes included", body = WorkDeletion),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Work not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("CookieAuth" = []), ("BearerAuth" = []))
)]
#[instrument(skip_all, fields(work_id = %abbrev_uuid(&id), admin = %current_user.email))]
pub async fn delete_work(State(state): State<AppState>, current_user: CurrentUser, Path(id): Path<WorkId>) -> Result<Json<WorkDeletion>> {
    // Run to completion even if the client goes away mid-cleanup
    let pool = state.db.clone();
    let purger = state.purger.clone();
    let deletion = tokio::spawn(async move { cleanup::delete_work(&pool, &purger, id).await })
        .await
        .map_err(|e| Error::Internal {
            operation: format!("complete work deletion: {e}"),
        })??;

    if deletion.images.failed > 0 {
        warn!(
            "Deleted work {} but {} images could not be removed from storage",
            abbrev_uuid(&id),
            deletion.images.failed
        );
    }
    Ok(Json(deletion))
}

#[utoipa::path(
    post,
    path = "/admin/api/works/{id}/images",
    tag = "works",
    summary = "Add images",
    description = "Append uploaded images to the gallery. Uploads beyond the per-work limit are dropped.",
    params(("id" = String, Path, description = "Work ID")),
    request_body(content_type = "multipart/form-data", description = "One or more image files"),
    responses(
        (status = 200, description = "Images added", body = WorkResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Work not found"),
        (status = 413, description = "Payload too large"),
        (status = 502, description = "Image storage failed")
    ),
    security(("CookieAuth" = []), ("BearerAuth" = []))
)]
#[instrument(skip_all, fields(work_id = %abbrev_uuid(&id)))]
pub async fn add_images(
    State(state): State<AppState>,
    _: CurrentUser,
    Path(id): Path<WorkId>,
    mut multipart: Multipart,
) -> Result<Json<WorkResponse>> {
    let work = load_work(&state, id).await?;
    let mut gallery = work.gallery_value().and_then(|g| g.urls()).unwrap_or_default();

    let limits = &state.config.storage;
    let capacity = limits.max_images_per_work.saturating_sub(gallery.len());
    let form = read_work_form(&mut multipart, capacity, limits.max_file_size).await?;
    if form.images.is_empty() {
        return Ok(Json(WorkResponse::from(work)));
    }

    let scope = id.to_string();
    let added = upload_images(&state, form.images, Some(&scope)).await?;
    info!("Added {} images to work {}", added.len(), abbrev_uuid(&id));
    gallery.extend(added);

    let mut changes = WorkUpdateDBRequest::default();
    if work.image_url.is_none() {
        changes.image_url = Some(gallery.first().cloned());
    }
    changes.gallery = Some(gallery);

    Ok(Json(WorkResponse::from(save_changes(&state, id, &changes).await?)))
}

#[utoipa::path(
    delete,
    path = "/admin/api/works/{id}/images",
    tag = "works",
    summary = "Remove image",
    description = "Detach one image from the work and remove it from storage (best effort). \
                   If it was the cover, the next gallery image becomes the cover.",
    params(("id" = String, Path, description = "Work ID")),
    request_body = RemoveImageRequest,
    responses(
        (status = 200, description = "Image removed", body = WorkResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Work or image not found")
    ),
    security(("CookieAuth" = []), ("BearerAuth" = []))
)]
#[instrument(skip_all, fields(work_id = %abbrev_uuid(&id)))]
pub async fn remove_image(
    State(state): State<AppState>,
    _: CurrentUser,
    Path(id): Path<WorkId>,
    Json(request): Json<RemoveImageRequest>,
) -> Result<Json<WorkResponse>> {
    let work = load_work(&state, id).await?;
    let url = request.url.trim();
    let gallery = work.gallery_value().and_then(|g| g.urls()).unwrap_or_default();
    let is_cover = work.image_url.as_deref() == Some(url);

    if !is_cover && !gallery.iter().any(|g| g == url) {
        return Err(Error::NotFound {
            resource: "Image".to_string(),
            id: url.to_string(),
        });
    }

    let next: Vec<String> = gallery.into_iter().filter(|g| g != url).collect();
    let mut changes = WorkUpdateDBRequest {
        gallery: Some(next.clone()),
        ..Default::default()
    };
    if is_cover {
        changes.image_url = Some(next.first().cloned());
    }
    let updated = save_changes(&state, id, &changes).await?;
    remove_stored_image(&state, url).await;

    Ok(Json(WorkResponse::from(updated)))
}

/// Best-effort removal of a detached image's object
async fn remove_stored_image(state: &AppState, url: &str) {
    match paths::object_key_from_public_url(url, state.storage.bucket()) {
        Some(key) => {
            if let Err(e) = state.storage.remove(&key).await {
                warn!("Image {} detached but not removed from storage: {}", key, e);
            }
        }
        None => debug!("Image {} is not stored in the bucket, nothing to remove", url),
    }
}

#[utoipa::path(
    put,
    path = "/admin/api/works/order",
    tag = "works",
    summary = "Reorder works",
    description = "Set each work's display order to its position in the list. Unknown ids are ignored.",
    request_body = ReorderWorksRequest,
    responses(
        (status = 200, description = "Order saved", body = ReorderWorksResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("CookieAuth" = []), ("BearerAuth" = []))
)]
#[instrument(skip_all, fields(count = request.ids.len()))]
pub async fn reorder_works(
    State(state): State<AppState>,
    _: CurrentUser,
    Json(request): Json<ReorderWorksRequest>,
) -> Result<Json<ReorderWorksResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let updated = Works::new(&mut tx).reorder(&request.ids).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(ReorderWorksResponse { updated }))
}

#[utoipa::path(
    get,
    path = "/admin/api/tags",
    tag = "works",
    summary = "Tag suggestions",
    responses(
        (status = 200, description = "Distinct tags in use", body = Vec<String>),
        (status = 401, description = "Unauthorized")
    ),
    security(("CookieAuth" = []), ("BearerAuth" = []))
)]
#[instrument(skip_all)]
pub async fn list_tags(State(state): State<AppState>, _: CurrentUser) -> Result<Json<Vec<String>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(Works::new(&mut conn).tag_suggestions().await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::test_utils::{admin_bearer, create_test_app_with_storage, create_test_config, create_test_work};
    use axum_test::{
        TestServer,
        multipart::{MultipartForm, Part},
    };
    use serde_json::{Value, json};
    use sqlx::PgPool;
    use std::sync::Arc;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-a-png";

    struct Harness {
        server: TestServer,
        storage: Arc<MemoryStorage>,
        bearer: String,
    }

    async fn harness(pool: PgPool) -> Harness {
        let config = create_test_config();
        let storage = Arc::new(MemoryStorage::new(config.storage.url.clone(), config.storage.bucket.clone()));
        let bearer = admin_bearer(&config);
        let (server, _) = create_test_app_with_storage(pool, config, storage.clone()).await;
        Harness { server, storage, bearer }
    }

    fn image(name: &str) -> Part {
        Part::bytes(PNG.to_vec()).file_name(name).mime_type("image/png")
    }

    fn work_request(title: &str) -> WorkCreateDBRequest {
        WorkCreateDBRequest {
            title: title.to_string(),
            active: true,
            ..Default::default()
        }
    }

    /// Store an object and return its public URL
    fn stored(storage: &MemoryStorage, key: &str) -> String {
        storage.insert(key, PNG.to_vec());
        storage.public_url(key)
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_work_with_images(pool: PgPool) {
        let h = harness(pool).await;

        let form = MultipartForm::new()
            .add_text("title", "  Poster series ")
            .add_text("category", "Branding")
            .add_text("tags", "print, risograph")
            .add_part("images", image("cover.png"))
            .add_part("images", image("detail one.png"))
            .add_part("images", image("detail-two.png"));

        let response = h.server.post("/admin/api/works").add_header("authorization", &h.bearer).multipart(form).await;
        response.assert_status(StatusCode::CREATED);

        let work: Value = response.json();
        assert_eq!(work["title"], "Poster series");
        assert_eq!(work["tags"], json!(["Branding", "print", "risograph"]));
        let cover = work["image_url"].as_str().unwrap();
        assert!(cover.ends_with("-cover.png"), "{cover}");
        let gallery = work["gallery"].as_array().unwrap();
        assert_eq!(gallery.len(), 2);
        assert!(gallery[0].as_str().unwrap().ends_with("-detail_one.png"));
        assert_eq!(h.storage.keys().len(), 3);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_work_drops_images_beyond_limit(pool: PgPool) {
        let h = harness(pool).await;

        let mut form = MultipartForm::new().add_text("title", "Sketchbook");
        for i in 0..6 {
            form = form.add_part("images", image(&format!("page-{i}.png")));
        }

        let response = h.server.post("/admin/api/works").add_header("authorization", &h.bearer).multipart(form).await;
        response.assert_status(StatusCode::CREATED);

        // The test limit is four images per work: one cover plus three in the gallery
        let work: Value = response.json();
        assert_eq!(work["gallery"].as_array().unwrap().len(), 3);
        assert_eq!(h.storage.keys().len(), 4);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_work_requires_title(pool: PgPool) {
        let h = harness(pool).await;

        let form = MultipartForm::new().add_text("title", "   ").add_part("images", image("a.png"));
        let response = h.server.post("/admin/api/works").add_header("authorization", &h.bearer).multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(h.storage.keys().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_work_rolls_back_uploads_on_non_image(pool: PgPool) {
        let h = harness(pool).await;

        let form = MultipartForm::new()
            .add_text("title", "Mixed")
            .add_part("images", image("a.png"))
            .add_part("images", Part::bytes(b"hello".to_vec()).file_name("notes.txt").mime_type("text/plain"));
        let response = h.server.post("/admin/api/works").add_header("authorization", &h.bearer).multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["message"], "'notes.txt' is not an image");
        assert!(h.storage.keys().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_work_rejects_oversized_file(pool: PgPool) {
        let h = harness(pool).await;

        let big = Part::bytes(vec![0u8; 64 * 1024 + 1]).file_name("huge.png").mime_type("image/png");
        let form = MultipartForm::new().add_text("title", "Mural").add_part("images", big);
        let response = h.server.post("/admin/api/works").add_header("authorization", &h.bearer).multipart(form).await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_routes_require_session(pool: PgPool) {
        let h = harness(pool).await;

        let form = MultipartForm::new().add_text("title", "Sneaky");
        h.server.post("/admin/api/works").multipart(form).await.assert_status(StatusCode::UNAUTHORIZED);
        h.server.get("/admin/api/tags").await.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_public_gallery_filters_and_hides_drafts(pool: PgPool) {
        let h = harness(pool.clone()).await;

        create_test_work(&pool, WorkCreateDBRequest {
            category: Some("Branding".to_string()),
            ..work_request("Logo")
        })
        .await;
        create_test_work(&pool, WorkCreateDBRequest {
            category: Some("Illustration".to_string()),
            ..work_request("Zine")
        })
        .await;
        let draft = create_test_work(&pool, WorkCreateDBRequest {
            active: false,
            category: Some("Secret".to_string()),
            ..work_request("Draft")
        })
        .await;

        let all: Vec<Value> = h.server.get("/api/works").await.json();
        assert_eq!(all.len(), 2);

        let branding: Vec<Value> = h.server.get("/api/works").add_query_param("category", "Branding").await.json();
        assert_eq!(branding.len(), 1);
        assert_eq!(branding[0]["title"], "Logo");

        let everything: Vec<Value> = h.server.get("/api/works").add_query_param("category", "all").await.json();
        assert_eq!(everything.len(), 2);

        let categories: Vec<String> = h.server.get("/api/categories").await.json();
        assert_eq!(categories, vec!["Branding", "Illustration"]);

        h.server.get(&format!("/api/works/{draft}")).await.assert_status(StatusCode::NOT_FOUND);
        h.server
            .get(&format!("/admin/api/works/{draft}"))
            .add_header("authorization", &h.bearer)
            .await
            .assert_status_ok();

        let admin_list: Vec<Value> = h.server.get("/admin/api/works").add_header("authorization", &h.bearer).await.json();
        assert_eq!(admin_list.len(), 3);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_fields_and_clear_description(pool: PgPool) {
        let h = harness(pool.clone()).await;
        let id = create_test_work(&pool, WorkCreateDBRequest {
            description: Some("Old text".to_string()),
            ..work_request("Poster")
        })
        .await;

        let response = h
            .server
            .patch(&format!("/admin/api/works/{id}"))
            .add_header("authorization", &h.bearer)
            .json(&json!({ "title": " Poster v2 ", "description": null, "active": false }))
            .await;

        response.assert_status_ok();
        let work: Value = response.json();
        assert_eq!(work["title"], "Poster v2");
        assert_eq!(work["description"], Value::Null);
        assert_eq!(work["active"], false);

        h.server
            .patch(&format!("/admin/api/works/{id}"))
            .add_header("authorization", &h.bearer)
            .json(&json!({ "title": "  " }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_selects_cover_and_reorders_gallery(pool: PgPool) {
        let h = harness(pool.clone()).await;
        let a = stored(&h.storage, "works/a.png");
        let b = stored(&h.storage, "works/b.png");
        let c = stored(&h.storage, "works/c.png");
        let id = create_test_work(&pool, WorkCreateDBRequest {
            image_url: Some(a.clone()),
            gallery: vec![b.clone(), c.clone()],
            ..work_request("Series")
        })
        .await;

        let response = h
            .server
            .patch(&format!("/admin/api/works/{id}"))
            .add_header("authorization", &h.bearer)
            .json(&json!({ "gallery": [c, b] }))
            .await;
        response.assert_status_ok();
        let work: Value = response.json();
        assert_eq!(work["gallery"], json!([c, b]));
        assert_eq!(work["image_url"], json!(a));

        // The old cover stays in the gallery so its object is still referenced
        let response = h
            .server
            .patch(&format!("/admin/api/works/{id}"))
            .add_header("authorization", &h.bearer)
            .json(&json!({ "cover_url": b }))
            .await;
        response.assert_status_ok();
        let work: Value = response.json();
        assert_eq!(work["image_url"], json!(b));
        assert_eq!(work["gallery"], json!([b, a, c]));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cover_selection_on_full_gallery_drops_previous_cover(pool: PgPool) {
        let h = harness(pool.clone()).await;
        let old_cover = stored(&h.storage, "works/cover.png");
        // The test config allows four images per work
        let gallery: Vec<String> = (0..4).map(|i| stored(&h.storage, &format!("works/g{i}.png"))).collect();
        let id = create_test_work(&pool, WorkCreateDBRequest {
            image_url: Some(old_cover.clone()),
            gallery: gallery.clone(),
            ..work_request("Full")
        })
        .await;

        let response = h
            .server
            .patch(&format!("/admin/api/works/{id}"))
            .add_header("authorization", &h.bearer)
            .json(&json!({ "cover_url": gallery[2] }))
            .await;
        response.assert_status_ok();
        let work: Value = response.json();
        assert_eq!(work["image_url"], json!(gallery[2]));
        assert_eq!(work["gallery"], json!([gallery[2], gallery[0], gallery[1], gallery[3]]));
        assert!(!h.storage.contains("works/cover.png"));
        assert!(h.storage.contains("works/g2.png"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_rejects_foreign_images(pool: PgPool) {
        let h = harness(pool.clone()).await;
        let a = stored(&h.storage, "works/a.png");
        let id = create_test_work(&pool, WorkCreateDBRequest {
            image_url: Some(a.clone()),
            gallery: vec![a.clone()],
            ..work_request("Single")
        })
        .await;

        h.server
            .patch(&format!("/admin/api/works/{id}"))
            .add_header("authorization", &h.bearer)
            .json(&json!({ "gallery": [a, "https://elsewhere.example.com/x.png"] }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        h.server
            .patch(&format!("/admin/api/works/{id}"))
            .add_header("authorization", &h.bearer)
            .json(&json!({ "cover_url": "https://elsewhere.example.com/x.png" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_add_images_sets_missing_cover(pool: PgPool) {
        let h = harness(pool.clone()).await;
        let id = create_test_work(&pool, work_request("Empty")).await;

        let form = MultipartForm::new().add_part("images", image("one.png")).add_part("images", image("two.png"));
        let response = h
            .server
            .post(&format!("/admin/api/works/{id}/images"))
            .add_header("authorization", &h.bearer)
            .multipart(form)
            .await;

        response.assert_status_ok();
        let work: Value = response.json();
        let gallery = work["gallery"].as_array().unwrap();
        assert_eq!(gallery.len(), 2);
        assert_eq!(work["image_url"], gallery[0]);
        assert!(h.storage.keys().iter().all(|key| key.starts_with(&format!("works/{id}-"))));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_add_images_respects_remaining_capacity(pool: PgPool) {
        let h = harness(pool.clone()).await;
        let existing: Vec<String> = (0..3).map(|i| stored(&h.storage, &format!("works/{i}.png"))).collect();
        let id = create_test_work(&pool, WorkCreateDBRequest {
            image_url: Some(existing[0].clone()),
            gallery: existing.clone(),
            ..work_request("Nearly full")
        })
        .await;

        let form = MultipartForm::new().add_part("images", image("x.png")).add_part("images", image("y.png"));
        let response = h
            .server
            .post(&format!("/admin/api/works/{id}/images"))
            .add_header("authorization", &h.bearer)
            .multipart(form)
            .await;

        response.assert_status_ok();
        let work: Value = response.json();
        assert_eq!(work["gallery"].as_array().unwrap().len(), 4);
        assert_eq!(work["image_url"], json!(existing[0]));
        assert_eq!(h.storage.keys().len(), 4);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_remove_cover_image(pool: PgPool) {
        let h = harness(pool.clone()).await;
        let a = stored(&h.storage, "works/a.png");
        let b = stored(&h.storage, "works/b.png");
        let id = create_test_work(&pool, WorkCreateDBRequest {
            image_url: Some(a.clone()),
            gallery: vec![a.clone(), b.clone()],
            ..work_request("Pair")
        })
        .await;

        let response = h
            .server
            .delete(&format!("/admin/api/works/{id}/images"))
            .add_header("authorization", &h.bearer)
            .json(&json!({ "url": a }))
            .await;

        response.assert_status_ok();
        let work: Value = response.json();
        assert_eq!(work["image_url"], json!(b));
        assert_eq!(work["gallery"], json!([b]));
        assert!(!h.storage.contains("works/a.png"));
        assert!(h.storage.contains("works/b.png"));

        h.server
            .delete(&format!("/admin/api/works/{id}/images"))
            .add_header("authorization", &h.bearer)
            .json(&json!({ "url": a }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_reorder_works(pool: PgPool) {
        let h = harness(pool.clone()).await;
        let first = create_test_work(&pool, work_request("First")).await;
        let second = create_test_work(&pool, work_request("Second")).await;
        let third = create_test_work(&pool, work_request("Third")).await;

        let response = h
            .server
            .put("/admin/api/works/order")
            .add_header("authorization", &h.bearer)
            .json(&json!({ "ids": [third, first, second, WorkId::new_v4()] }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["updated"], 3);

        let titles: Vec<String> = h
            .server
            .get("/api/works")
            .await
            .json::<Vec<Value>>()
            .iter()
            .map(|w| w["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["Third", "First", "Second"]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_tags(pool: PgPool) {
        let h = harness(pool.clone()).await;
        create_test_work(&pool, WorkCreateDBRequest {
            category: Some("branding".to_string()),
            tags: vec!["logo".to_string()],
            ..work_request("Mark")
        })
        .await;
        create_test_work(&pool, WorkCreateDBRequest {
            tags: vec!["logo".to_string(), "animation".to_string()],
            ..work_request("Loop")
        })
        .await;

        let tags: Vec<String> = h.server.get("/admin/api/tags").add_header("authorization", &h.bearer).await.json();
        assert_eq!(tags, vec!["animation", "branding", "logo"]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_work_purges_images(pool: PgPool) {
        let h = harness(pool.clone()).await;
        let a = stored(&h.storage, "works/a.png");
        let b = stored(&h.storage, "works/b.png");
        let id = create_test_work(&pool, WorkCreateDBRequest {
            image_url: Some(a.clone()),
            gallery: vec![a, b, "/profile.jpg".to_string()],
            ..work_request("Doomed")
        })
        .await;

        let response = h
            .server
            .delete(&format!("/admin/api/works/{id}"))
            .add_header("authorization", &h.bearer)
            .await;

        response.assert_status_ok();
        let deletion: Value = response.json();
        assert_eq!(deletion["title"], "Doomed");
        assert_eq!(deletion["images"]["deleted"], 2);
        assert_eq!(deletion["images"]["failed"], 0);
        assert_eq!(deletion["images"]["skipped_urls"], 1);
        assert!(h.storage.keys().is_empty());

        h.server
            .get(&format!("/admin/api/works/{id}"))
            .add_header("authorization", &h.bearer)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        h.server
            .delete(&format!("/admin/api/works/{id}"))
            .add_header("authorization", &h.bearer)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("on").unwrap());
        assert!(parse_flag(" TRUE ").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(parse_flag("maybe").is_err());
    }
}
