use crate::db::models::works::GalleryValue;
use tracing::warn;

/// Gather every image URL a work references: the cover first, then gallery entries in order.
///
/// Blank entries are skipped. A legacy encoded gallery is decoded here; if it does not decode to
/// an array the gallery contributes nothing and a warning is logged.
pub fn collect_image_urls(image_url: Option<&str>, gallery: Option<&GalleryValue>) -> Vec<String> {
    let mut urls = Vec::new();

    if let Some(cover) = image_url.map(str::trim).filter(|u| !u.is_empty()) {
        urls.push(cover.to_string());
    }

    let entries = gallery
        .map(|g| {
            g.urls().unwrap_or_else(|| {
                warn!("Skipping gallery that is not a JSON array");
                Vec::new()
            })
        })
        .unwrap_or_default();

    urls.extend(
        entries
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .map(str::to_string),
    );
    urls
}
