//! Mapping between public object URLs and bucket object keys.
//!
//! Every uploaded image is referenced by its public URL, which has the shape
//! `<storage url>/storage/v1/object/public/<bucket>/<key>`. Cleanup depends on this shape
//! verbatim: [`object_key_from_public_url`] is the only way a stored URL is turned back into
//! something the storage API can delete.

use chrono::Utc;
use url::Url;
use uuid::Uuid;

/// Path segment that precedes the bucket name in public object URLs
pub const PUBLIC_OBJECT_PATH: &str = "/storage/v1/object/public/";

/// Resolve the object key of a public URL pointing into `bucket`.
///
/// Returns `None` for anything that is not a bucket-hosted file: URLs that don't parse
/// (including relative asset paths such as `/profile.jpg`), URLs without the bucket prefix,
/// and URLs that stop right after the prefix.
pub fn object_key_from_public_url(public_url: &str, bucket: &str) -> Option<String> {
    let url = Url::parse(public_url.trim()).ok()?;
    let prefix = format!("{PUBLIC_OBJECT_PATH}{bucket}/");
    let path = url.path();
    let idx = path.find(&prefix)?;
    let key = &path[idx + prefix.len()..];
    if key.is_empty() { None } else { Some(key.to_string()) }
}

/// Build the public URL of an object; the inverse of [`object_key_from_public_url`].
pub fn public_url(base: &Url, bucket: &str, key: &str) -> String {
    format!("{}{}{bucket}/{key}", base.as_str().trim_end_matches('/'), PUBLIC_OBJECT_PATH)
}

/// Split a key into its directory and file name. The directory is empty for top-level keys.
pub fn split_key(key: &str) -> (&str, &str) {
    match key.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", key),
    }
}

/// Generate a fresh key for an upload.
///
/// Keys look like `works/<scope>-<millis>-<random>-<file name>`, where `scope` is usually the
/// owning work id and may be omitted for uploads made before the work exists.
pub fn new_object_key(prefix: &str, file_name: &str, scope: Option<&str>) -> String {
    let millis = Utc::now().timestamp_millis();
    let random: String = Uuid::new_v4().simple().to_string().chars().take(10).collect();
    let name = sanitize_file_name(file_name);
    let prefix = prefix.trim_matches('/');
    let stem = match scope {
        Some(scope) => format!("{scope}-{millis}-{random}-{name}"),
        None => format!("{millis}-{random}-{name}"),
    };
    if prefix.is_empty() { stem } else { format!("{prefix}/{stem}") }
}

/// Reduce a client-supplied file name to characters that survive URLs unescaped.
pub fn sanitize_file_name(file_name: &str) -> String {
    // Browsers may send full paths on some platforms
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() { "image".to_string() } else { cleaned }
}
