//! Core types for posse

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FormatError, PublishError};
use crate::frontmatter::{FieldValue, Fields, FrontMatter, FrontMatterFormat};

pub const FIELD_SYNDICATE_TO: &str = "syndicate_to";
pub const FIELD_MICROBLOG_CONTENT: &str = "microblog_content";
pub const FIELD_SYNDICATED: &str = "syndicated";
pub const FIELD_TITLE: &str = "title";
pub const FIELD_SLUG: &str = "slug";

/// A syndication target network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Bluesky,
    Mastodon,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::Bluesky, Target::Mastodon];

    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Bluesky => "bluesky",
            Target::Mastodon => "mastodon",
        }
    }

    /// Human-facing platform name used in log lines
    pub fn display_name(&self) -> &'static str {
        match self {
            Target::Bluesky => "Bluesky",
            Target::Mastodon => "Mastodon",
        }
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bluesky" => Ok(Target::Bluesky),
            "mastodon" => Ok(Target::Mastodon),
            _ => Err(format!(
                "Unknown syndication target: '{}'. Valid options: bluesky, mastodon",
                s
            )),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One post file read from disk.
///
/// Built fresh for every run. The only mutation the pipeline performs is
/// [`mark_syndicated`](Self::mark_syndicated).
#[derive(Debug, Clone)]
pub struct PostDocument {
    path: PathBuf,
    front_matter: FrontMatter,
}

impl PostDocument {
    pub fn parse(path: impl Into<PathBuf>, raw: &str) -> Result<Self, FormatError> {
        Ok(Self {
            path: path.into(),
            front_matter: FrontMatter::parse(raw)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> FrontMatterFormat {
        self.front_matter.format()
    }

    pub fn fields(&self) -> &Fields {
        self.front_matter.fields()
    }

    pub fn body(&self) -> &str {
        self.front_matter.body()
    }

    pub fn title(&self) -> Option<&str> {
        self.fields().get_str(FIELD_TITLE)
    }

    pub fn slug(&self) -> Option<&str> {
        self.fields()
            .get_str(FIELD_SLUG)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn microblog_content(&self) -> Option<&str> {
        self.fields()
            .get_str(FIELD_MICROBLOG_CONTENT)
            .filter(|s| !s.trim().is_empty())
    }

    /// Requested target names, lowercased, in the order listed.
    ///
    /// A single string is accepted in place of an array.
    pub fn syndicate_to(&self) -> Vec<String> {
        let normalize = |value: &FieldValue| -> Option<String> {
            let name = match value {
                FieldValue::String(s) => s.trim().to_lowercase(),
                FieldValue::Null => return None,
                FieldValue::Bool(b) => b.to_string(),
                FieldValue::Integer(i) => i.to_string(),
                FieldValue::Float(f) => f.to_string(),
                FieldValue::Array(_) => return None,
                FieldValue::Other(raw) => raw.trim().to_lowercase(),
            };
            (!name.is_empty()).then_some(name)
        };

        match self.fields().get(FIELD_SYNDICATE_TO) {
            Some(FieldValue::Array(items)) => items.iter().filter_map(normalize).collect(),
            Some(scalar) => normalize(scalar).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Whether the post already carries the syndicated marker.
    ///
    /// Anything other than an absent, null or `false` value counts as marked,
    /// so a hand-edited `syndicated: "yes"` never leads to a second post.
    pub fn is_syndicated(&self) -> bool {
        match self.fields().get(FIELD_SYNDICATED) {
            None | Some(FieldValue::Null) => false,
            Some(FieldValue::Bool(b)) => *b,
            Some(FieldValue::String(s)) => !s.trim().eq_ignore_ascii_case("false"),
            Some(_) => true,
        }
    }

    pub fn mark_syndicated(&mut self) {
        self.front_matter.set(FIELD_SYNDICATED, FieldValue::Bool(true));
    }

    /// File contents in the original dialect
    pub fn serialize(&self) -> Result<String, FormatError> {
        self.front_matter.serialize()
    }
}

/// Outcome of one publish attempt
#[derive(Debug, Clone, Serialize)]
pub struct PostResult {
    pub target: Target,
    pub success: bool,
    /// Remote identifier (AT URI, status id) on success
    pub remote_id: Option<String>,
    pub error: Option<String>,
    /// True when the result was simulated by a dry run
    pub dry_run: bool,
    pub timestamp: DateTime<Utc>,
}

impl PostResult {
    pub fn published(target: Target, remote_id: String) -> Self {
        Self {
            target,
            success: true,
            remote_id: Some(remote_id),
            error: None,
            dry_run: false,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(target: Target, error: &PublishError) -> Self {
        Self {
            target,
            success: false,
            remote_id: None,
            error: Some(error.to_string()),
            dry_run: false,
            timestamp: Utc::now(),
        }
    }

    pub fn simulated(target: Target) -> Self {
        Self {
            target,
            success: true,
            remote_id: None,
            error: None,
            dry_run: true,
            timestamp: Utc::now(),
        }
    }
}
