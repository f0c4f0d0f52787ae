//! Syndication orchestration
//!
//! Drives each post through
//! `Discovered → Eligible? → ReachabilityChecked → Published → PersistedOrSkipped`.
//!
//! Posts are handled one at a time and targets one at a time, in the order
//! listed in `syndicate_to`. A post is only marked `syndicated = true` when
//! every known target it asks for succeeded, so a failed target means the
//! whole post is retried on the next run.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::eligibility::{self, Eligibility};
use crate::error::PublishError;
use crate::platforms::{Publishers, Syndication};
use crate::reachability::{Reachability, DEFAULT_TIMEOUT};
use crate::scanner::SkippedFile;
use crate::frontmatter::FieldValue;
use crate::types::{PostDocument, PostResult, Target, FIELD_SYNDICATED};
use crate::url::post_url;

/// Caller-supplied switches for a run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Simulate everything: no reachability request, no publish, no write
    pub dry_run: bool,
    /// Skip the reachability check
    pub force: bool,
}

/// What happened at the reachability gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReachabilityStep {
    Reachable,
    Unreachable,
    /// `--force` skipped the check
    Bypassed,
    /// Dry run; the check would have been made
    WouldCheck,
}

/// Whether the syndicated marker was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "error")]
pub enum Marking {
    Marked,
    WouldMark,
    NotMarked,
    WriteFailed(String),
}

/// Result of processing one eligible post
#[derive(Debug, Clone, Serialize)]
pub struct PostOutcome {
    pub path: PathBuf,
    pub title: String,
    pub url: String,
    pub reachability: ReachabilityStep,
    pub results: Vec<PostResult>,
    /// Names in `syndicate_to` that are not a known target
    pub unknown_targets: Vec<String>,
    pub marking: Marking,
}

impl PostOutcome {
    pub fn is_syndicated(&self) -> bool {
        matches!(self.marking, Marking::Marked | Marking::WouldMark)
    }

    pub fn failures(&self) -> impl Iterator<Item = &PostResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn successes(&self) -> impl Iterator<Item = &PostResult> {
        self.results.iter().filter(|r| r.success)
    }
}

/// End-of-run report
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub dry_run: bool,
    pub posts: Vec<PostOutcome>,
    /// Posts skipped because they already carry the marker
    pub already_syndicated: usize,
    /// Posts without targets or without `microblog_content`
    pub ineligible: usize,
    /// Files the scanner could not parse
    pub skipped_files: Vec<SkippedFile>,
}

impl Summary {
    pub fn syndicated(&self) -> usize {
        self.posts.iter().filter(|p| p.is_syndicated()).count()
    }

    pub fn unreachable(&self) -> usize {
        self.posts
            .iter()
            .filter(|p| p.reachability == ReachabilityStep::Unreachable)
            .count()
    }

    /// Posts that were attempted but not marked
    pub fn failed(&self) -> usize {
        self.posts
            .iter()
            .filter(|p| p.reachability != ReachabilityStep::Unreachable && !p.is_syndicated())
            .count()
    }

    pub fn publish_successes(&self) -> usize {
        self.posts.iter().map(|p| p.successes().count()).sum()
    }

    pub fn publish_failures(&self) -> usize {
        self.posts.iter().map(|p| p.failures().count()).sum()
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.dry_run {
            writeln!(f, "DRY RUN: nothing was published or written")?;
        }

        for post in &self.posts {
            writeln!(f, "{} ({})", post.title, post.path.display())?;
            writeln!(f, "  url: {}", post.url)?;
            let reachability = match post.reachability {
                ReachabilityStep::Reachable => "reachable",
                ReachabilityStep::Unreachable => "UNREACHABLE, skipped",
                ReachabilityStep::Bypassed => "bypassed (--force)",
                ReachabilityStep::WouldCheck => "would check",
            };
            writeln!(f, "  reachability: {}", reachability)?;

            for result in &post.results {
                let status = match (result.success, result.dry_run) {
                    (true, true) => "would publish".to_string(),
                    (true, false) => format!(
                        "published {}",
                        result.remote_id.as_deref().unwrap_or_default()
                    ),
                    (false, _) => format!(
                        "FAILED: {}",
                        result.error.as_deref().unwrap_or("unknown error")
                    ),
                };
                writeln!(f, "  {}: {}", result.target, status)?;
            }
            for name in &post.unknown_targets {
                writeln!(f, "  {}: unknown target, skipped", name)?;
            }

            let marking = match &post.marking {
                Marking::Marked => "marked as syndicated".to_string(),
                Marking::WouldMark => "would mark as syndicated".to_string(),
                Marking::NotMarked => "not marked".to_string(),
                Marking::WriteFailed(e) => format!("FAILED to write marker: {}", e),
            };
            writeln!(f, "  {}", marking)?;
        }

        for skipped in &self.skipped_files {
            writeln!(f, "skipped {}: {}", skipped.path.display(), skipped.reason)?;
        }

        write!(
            f,
            "{} syndicated, {} failed, {} unreachable, {} already syndicated, {} ineligible, {} unparsable",
            self.syndicated(),
            self.failed(),
            self.unreachable(),
            self.already_syndicated,
            self.ineligible,
            self.skipped_files.len()
        )
    }
}

/// Coordinates reachability checks, publishers and marker persistence
pub struct Syndicator {
    publishers: Publishers,
    reachability: Box<dyn Reachability>,
    base_url: Option<String>,
    timeout: Duration,
}

impl Syndicator {
    pub fn new(
        publishers: Publishers,
        reachability: Box<dyn Reachability>,
        base_url: Option<String>,
    ) -> Self {
        Self {
            publishers,
            reachability,
            base_url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Process every document and report what happened.
    ///
    /// Never fails: per-post and per-target problems end up in the summary.
    pub async fn run<I>(&self, documents: I, options: RunOptions) -> Summary
    where
        I: IntoIterator<Item = PostDocument>,
    {
        let mut summary = Summary {
            dry_run: options.dry_run,
            ..Summary::default()
        };

        if options.dry_run {
            info!("--- DRY RUN MODE ACTIVE ---");
        }

        let mut manifest = Vec::new();
        for doc in documents {
            match eligibility::check(&doc) {
                Eligibility::Eligible => manifest.push(doc),
                Eligibility::AlreadySyndicated => {
                    debug!("{} already syndicated", doc.path().display());
                    summary.already_syndicated += 1;
                }
                Eligibility::MissingMicroblogContent => {
                    warn!("SKIPPED {}: missing 'microblog_content'", doc.path().display());
                    summary.ineligible += 1;
                }
                Eligibility::NoTargets => summary.ineligible += 1,
            }
        }

        info!("Found {} post(s) ready to syndicate", manifest.len());

        for doc in manifest {
            let outcome = self.process(doc, options).await;
            summary.posts.push(outcome);
        }

        summary
    }

    async fn process(&self, mut doc: PostDocument, options: RunOptions) -> PostOutcome {
        let url = post_url(self.base_url.as_deref(), &doc);
        let title = doc.title().unwrap_or("Unknown").to_string();
        let (targets, unknown_targets) = resolve_targets(&doc.syndicate_to());

        for name in &unknown_targets {
            warn!("{}: unknown target '{}', skipping it", doc.path().display(), name);
        }

        let reachability = if options.dry_run {
            if options.force {
                ReachabilityStep::Bypassed
            } else {
                ReachabilityStep::WouldCheck
            }
        } else if options.force {
            ReachabilityStep::Bypassed
        } else {
            info!("Verifying URL: {}", url);
            if self.reachability.check_reachable(&url, self.timeout).await {
                ReachabilityStep::Reachable
            } else {
                ReachabilityStep::Unreachable
            }
        };

        if reachability == ReachabilityStep::Unreachable {
            error!("STOPPING: URL {} is not accessible, skipping '{}'", url, title);
            return PostOutcome {
                path: doc.path().to_path_buf(),
                title,
                url,
                reachability,
                results: Vec::new(),
                unknown_targets,
                marking: Marking::NotMarked,
            };
        }

        let summary_text = doc.microblog_content().unwrap_or_default();
        let syndication = Syndication::new(doc.title(), summary_text, &url);
        let mut results = Vec::with_capacity(targets.len());
        for target in &targets {
            results.push(self.publish_one(*target, &syndication, options).await);
        }

        let all_succeeded = !results.is_empty() && results.iter().all(|r| r.success);
        let marking = if !all_succeeded {
            if !results.is_empty() {
                warn!("Partial failure for '{}'. Not marking as syndicated.", title);
            }
            Marking::NotMarked
        } else if options.dry_run {
            info!("ACTION: Would mark {} as syndicated", doc.path().display());
            Marking::WouldMark
        } else {
            doc.mark_syndicated();
            match persist_marker(&doc) {
                Ok(()) => {
                    info!("Updated syndicated status in {}", doc.path().display());
                    Marking::Marked
                }
                Err(e) => {
                    error!(
                        "Published '{}' but failed to mark {}: {}",
                        title,
                        doc.path().display(),
                        e
                    );
                    Marking::WriteFailed(e)
                }
            }
        };

        PostOutcome {
            path: doc.path().to_path_buf(),
            title,
            url,
            reachability,
            results,
            unknown_targets,
            marking,
        }
    }

    async fn publish_one(
        &self,
        target: Target,
        syndication: &Syndication,
        options: RunOptions,
    ) -> PostResult {
        if options.dry_run {
            info!(
                "[{} Dry Run] {} -> {}",
                target.display_name(),
                syndication.title,
                syndication.url
            );
            return PostResult::simulated(target);
        }

        let Some(publisher) = self.publishers.get(target) else {
            let error = PublishError::NotConfigured(target.display_name().to_string());
            error!("{} failed: {}", target.display_name(), error);
            return PostResult::failed(target, &error);
        };

        match publisher.publish(syndication).await {
            Ok(remote_id) => {
                info!("{}: Posted '{}'", target.display_name(), syndication.title);
                PostResult::published(target, remote_id)
            }
            Err(e) => {
                error!("{} failed: {}", target.display_name(), e);
                PostResult::failed(target, &e)
            }
        }
    }
}

/// Split requested names into known targets (deduplicated, in order) and
/// unknown names.
fn resolve_targets(names: &[String]) -> (Vec<Target>, Vec<String>) {
    let mut targets = Vec::new();
    let mut unknown = Vec::new();
    for name in names {
        match name.parse::<Target>() {
            Ok(target) if !targets.contains(&target) => targets.push(target),
            Ok(_) => {}
            Err(_) => {
                if !unknown.contains(name) {
                    unknown.push(name.clone());
                }
            }
        }
    }
    (targets, unknown)
}

/// Serialize a marked document, check the result, then write it back.
fn persist_marker(doc: &PostDocument) -> Result<(), String> {
    let contents = doc.serialize().map_err(|e| e.to_string())?;
    verify_marked(doc, &contents)?;
    write_atomically(doc.path(), &contents).map_err(|e| e.to_string())
}

/// The rewritten text must parse, carry the marker, and leave every other
/// field and the body exactly as they were.
fn verify_marked(doc: &PostDocument, contents: &str) -> Result<(), String> {
    let reparsed = PostDocument::parse(doc.path(), contents)
        .map_err(|e| format!("refusing to write: rewritten front matter is invalid: {}", e))?;

    if !reparsed.is_syndicated() {
        return Err("refusing to write: marker missing from rewritten front matter".to_string());
    }

    let others = |d: &PostDocument| {
        let mut fields: Vec<(String, FieldValue)> = d
            .fields()
            .iter()
            .filter(|(k, _)| *k != FIELD_SYNDICATED)
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        fields
    };

    if others(&reparsed) != others(doc) {
        return Err("refusing to write: marking would change other front matter fields".to_string());
    }
    if reparsed.body() != doc.body() {
        return Err("refusing to write: marking would change the post body".to_string());
    }
    Ok(())
}

/// Replace `path` with `contents` via a temp file in the same directory.
fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let permissions = std::fs::metadata(path)?.permissions();

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    std::fs::set_permissions(tmp.path(), permissions)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
