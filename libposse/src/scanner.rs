//! Content directory scanning
//!
//! Walks a site's content tree and yields every markdown file whose front
//! matter parses. Files that cannot be read or parsed are logged, remembered
//! in [`PostScanner::skipped`], and otherwise ignored so one broken post never
//! aborts a batch.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::ScanError;
use crate::types::PostDocument;

const CONTENT_EXTENSION: &str = "md";

/// A file the scanner could not turn into a [`PostDocument`]
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Start scanning `root`.
///
/// Fails only when `root` is missing or not a directory. Nothing is read until
/// the returned iterator is advanced, and each call re-reads the disk.
pub fn scan(root: impl AsRef<Path>) -> Result<PostScanner, ScanError> {
    let root = root.as_ref();
    let metadata = std::fs::metadata(root).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ScanError::NotFound(root.to_path_buf()),
        _ => ScanError::Read {
            path: root.to_path_buf(),
            source: e,
        },
    })?;
    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter();

    Ok(PostScanner {
        walker,
        skipped: Vec::new(),
    })
}

/// Lazy iterator over the parsed posts under a directory
pub struct PostScanner {
    walker: walkdir::IntoIter,
    skipped: Vec<SkippedFile>,
}

impl PostScanner {
    /// Files skipped so far
    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }

    fn skip(&mut self, error: ScanError) {
        warn!("Skipping {}", error);
        let path = match &error {
            ScanError::Read { path, .. } | ScanError::Format { path, .. } => path.clone(),
            ScanError::NotFound(path) | ScanError::NotADirectory(path) => path.clone(),
        };
        let reason = match &error {
            ScanError::Read { source, .. } => source.to_string(),
            ScanError::Format { source, .. } => source.to_string(),
            other => other.to_string(),
        };
        self.skipped.push(SkippedFile { path, reason });
    }
}

fn is_content_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(CONTENT_EXTENSION))
}

impl Iterator for PostScanner {
    type Item = PostDocument;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    self.skip(ScanError::Read {
                        path,
                        source: e.into(),
                    });
                    continue;
                }
            };

            if !entry.file_type().is_file() || !is_content_file(entry.path()) {
                continue;
            }

            let path = entry.into_path();
            let raw = match std::fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(source) => {
                    self.skip(ScanError::Read { path, source });
                    continue;
                }
            };

            match PostDocument::parse(&path, &raw) {
                Ok(doc) => {
                    debug!("Parsed {} ({} front matter)", path.display(), doc.format());
                    return Some(doc);
                }
                Err(source) => self.skip(ScanError::Format { path, source }),
            }
        }
    }
}
