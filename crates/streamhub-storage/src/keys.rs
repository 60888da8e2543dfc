//! Storage key layout.
//!
//! - sources: `uploads/{owner_id}/{uuid}/{filename}`
//! - thumbnails: `thumbnails/{owner_id}/{media_id}/{uuid}/{filename}`
//! - transcoder output: `transcoded/{media_id}/` (see `RenditionLadder`)

use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

/// Reduce a client-supplied filename to its final path component.
pub fn sanitize_filename(filename: &str) -> StorageResult<String> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(StorageError::InvalidKey(format!(
            "invalid filename: {}",
            filename
        )));
    }
    Ok(name.to_string())
}

/// Prefix under which every source upload of `owner_id` lives.
pub fn upload_prefix(owner_id: Uuid) -> String {
    format!("uploads/{}/", owner_id)
}

pub fn upload_key(owner_id: Uuid, filename: &str) -> StorageResult<String> {
    Ok(format!(
        "{}{}/{}",
        upload_prefix(owner_id),
        Uuid::new_v4(),
        sanitize_filename(filename)?
    ))
}

pub fn thumbnail_prefix(owner_id: Uuid, media_id: Uuid) -> String {
    format!("thumbnails/{}/{}/", owner_id, media_id)
}

pub fn thumbnail_key(owner_id: Uuid, media_id: Uuid, filename: &str) -> StorageResult<String> {
    Ok(format!(
        "{}{}/{}",
        thumbnail_prefix(owner_id, media_id),
        Uuid::new_v4(),
        sanitize_filename(filename)?
    ))
}

/// Public URL of an object under `bucket_url`.
pub fn public_url(bucket_url: &str, key: &str) -> String {
    format!("{}/{}", bucket_url.trim_end_matches('/'), key)
}

/// Turn a public object URL back into its storage key.
pub fn strip_bucket_url<'a>(bucket_url: &str, url: &'a str) -> Option<&'a str> {
    let base = bucket_url.trim_end_matches('/');
    url.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|key| !key.is_empty())
}
