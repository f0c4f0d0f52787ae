//! Public URL derivation for posts
//!
//! Maps a file under a Hugo-style `content/` tree to the URL it is served at.
//! Directories after the `content` segment become the URL path, the file stem
//! (or `slug` field) becomes the last segment, and leaf bundles (`index.md`,
//! `_index.md`) are served at their directory.

use std::path::{Component, Path};

use crate::types::PostDocument;

pub const DEFAULT_BASE_URL: &str = "https://example.com";

const CONTENT_DIR: &str = "content";
const FALLBACK_SECTION: &str = "posts";

/// Canonical URL of a post, always ending in `/`.
pub fn post_url(base_url: Option<&str>, doc: &PostDocument) -> String {
    url_for_path(base_url, doc.path(), doc.slug())
}

pub fn url_for_path(base_url: Option<&str>, path: &Path, slug: Option<&str>) -> String {
    let root = base_url
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .unwrap_or(DEFAULT_BASE_URL)
        .trim_end_matches('/');

    let segments: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    let Some((file_name, parents)) = segments.split_last() else {
        return format!("{}/", root);
    };

    let mut dirs: Vec<String> = match parents.iter().rposition(|s| s == CONTENT_DIR) {
        Some(idx) => parents[idx + 1..].to_vec(),
        None => vec![FALLBACK_SECTION.to_string()],
    };

    if file_name == "index.md" || file_name == "_index.md" {
        if let Some(slug) = slug {
            match dirs.last_mut() {
                Some(last) => *last = slug.to_string(),
                None => dirs.push(slug.to_string()),
            }
        }
    } else {
        let stem = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());
        dirs.push(slug.map(str::to_string).unwrap_or(stem));
    }

    if dirs.is_empty() {
        format!("{}/", root)
    } else {
        format!("{}/{}/", root, dirs.join("/"))
    }
}
