//! Loading multi-source requests from JSON files.

use std::path::Path;

use canon_core::{Error, Result};

use crate::types::MultiSourceRequest;

/// Read a [`MultiSourceRequest`] from `path`.
///
/// Sources without a `content_hash` get one computed from their content.
pub fn load_request(path: &Path) -> Result<MultiSourceRequest> {
    let raw = std::fs::read_to_string(path)?;
    let mut request: MultiSourceRequest = serde_json::from_str(&raw).map_err(|e| {
        Error::Validation(format!("invalid request file {}: {}", path.display(), e))
    })?;
    for source in &mut request.raw_sources {
        source.ensure_content_hash();
    }
    Ok(request)
}
