//! End-to-end syndication runs against real files, mock publishers and a
//! stubbed reachability check

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use libposse::error::PublishError;
use libposse::platforms::mock::MockPublisher;
use libposse::platforms::Publishers;
use libposse::reachability::Reachability;
use libposse::syndicate::{Marking, ReachabilityStep, RunOptions, Summary, Syndicator};
use libposse::{scan, Target};
use tempfile::TempDir;

const BASE_URL: &str = "https://blog.example";

#[derive(Clone)]
struct StubReachability {
    reachable: bool,
    checked: Arc<Mutex<Vec<String>>>,
}

impl StubReachability {
    fn new(reachable: bool) -> Self {
        Self {
            reachable,
            checked: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn checked(&self) -> Vec<String> {
        self.checked.lock().unwrap().clone()
    }
}

#[async_trait]
impl Reachability for StubReachability {
    async fn check_reachable(&self, url: &str, _timeout: Duration) -> bool {
        self.checked.lock().unwrap().push(url.to_string());
        self.reachable
    }
}

/// Content tree rooted at `<tmp>/content`
struct Site {
    _dir: TempDir,
    content: PathBuf,
}

impl Site {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let content = dir.path().join("content");
        fs::create_dir_all(content.join("blog")).unwrap();
        Self { _dir: dir, content }
    }

    fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.content.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }
}

fn yaml_post(targets: &str) -> String {
    format!(
        "---\ntitle: Hello World\nsyndicate_to: {}\nmicroblog_content: A short note about the post.\n---\n\nBody text.\n",
        targets
    )
}

async fn run(
    site: &Site,
    publishers: Publishers,
    reachability: &StubReachability,
    options: RunOptions,
) -> Summary {
    let syndicator = Syndicator::new(
        publishers,
        Box::new(reachability.clone()),
        Some(BASE_URL.to_string()),
    );
    let mut documents = scan(&site.content).unwrap();
    let mut summary = syndicator.run(documents.by_ref(), options).await;
    summary.skipped_files = documents.skipped().to_vec();
    summary
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn test_reachable_post_is_published_and_marked() {
    let site = Site::new();
    let path = site.write("blog/hello.md", &yaml_post("[\"bluesky\"]"));
    let bluesky = MockPublisher::success(Target::Bluesky);
    let reachability = StubReachability::new(true);

    let summary = run(
        &site,
        Publishers::new().with(Box::new(bluesky.clone())),
        &reachability,
        RunOptions::default(),
    )
    .await;

    assert_eq!(summary.syndicated(), 1);
    assert_eq!(summary.publish_successes(), 1);
    assert_eq!(summary.failed(), 0);

    let outcome = &summary.posts[0];
    assert_eq!(outcome.reachability, ReachabilityStep::Reachable);
    assert_eq!(outcome.marking, Marking::Marked);
    assert_eq!(outcome.url, "https://blog.example/blog/hello/");
    assert_eq!(reachability.checked(), vec!["https://blog.example/blog/hello/"]);

    let published = bluesky.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].title, "Hello World");
    assert_eq!(published[0].summary, "A short note about the post.");

    let contents = read(&path);
    assert!(contents.contains("\nsyndicated: true\n---\n"));
    assert!(contents.ends_with("\n\nBody text.\n"));
}

#[tokio::test]
async fn test_unreachable_post_is_not_published() {
    let site = Site::new();
    let original = yaml_post("[\"bluesky\"]");
    let path = site.write("blog/hello.md", &original);
    let bluesky = MockPublisher::success(Target::Bluesky);

    let summary = run(
        &site,
        Publishers::new().with(Box::new(bluesky.clone())),
        &StubReachability::new(false),
        RunOptions::default(),
    )
    .await;

    assert_eq!(summary.unreachable(), 1);
    assert_eq!(summary.syndicated(), 0);
    assert_eq!(summary.failed(), 0);
    assert!(summary.posts[0].results.is_empty());
    assert_eq!(summary.posts[0].marking, Marking::NotMarked);
    assert_eq!(bluesky.call_count(), 0);
    assert_eq!(read(&path), original);
}

#[tokio::test]
async fn test_partial_failure_leaves_post_unmarked() {
    let site = Site::new();
    let original = yaml_post("[\"bluesky\", \"mastodon\"]");
    let path = site.write("blog/hello.md", &original);
    let bluesky = MockPublisher::success(Target::Bluesky);
    let mastodon = MockPublisher::failure(
        Target::Mastodon,
        PublishError::Authentication("The access token is invalid".to_string()),
    );

    let summary = run(
        &site,
        Publishers::new()
            .with(Box::new(bluesky.clone()))
            .with(Box::new(mastodon.clone())),
        &StubReachability::new(true),
        RunOptions::default(),
    )
    .await;

    let outcome = &summary.posts[0];
    assert_eq!(outcome.successes().count(), 1);
    assert_eq!(outcome.failures().count(), 1);
    assert_eq!(outcome.results[0].target, Target::Bluesky);
    assert_eq!(outcome.results[1].target, Target::Mastodon);
    assert!(outcome.results[1]
        .error
        .as_deref()
        .unwrap()
        .contains("access token is invalid"));
    assert_eq!(outcome.marking, Marking::NotMarked);
    assert_eq!(summary.failed(), 1);

    assert_eq!(bluesky.call_count(), 1);
    assert_eq!(mastodon.call_count(), 1);
    assert_eq!(read(&path), original);
}

#[tokio::test]
async fn test_force_bypasses_reachability() {
    let site = Site::new();
    let path = site.write("blog/hello.md", &yaml_post("[\"bluesky\"]"));
    let bluesky = MockPublisher::success(Target::Bluesky);
    let reachability = StubReachability::new(false);

    let summary = run(
        &site,
        Publishers::new().with(Box::new(bluesky.clone())),
        &reachability,
        RunOptions {
            dry_run: false,
            force: true,
        },
    )
    .await;

    assert_eq!(summary.posts[0].reachability, ReachabilityStep::Bypassed);
    assert_eq!(summary.posts[0].marking, Marking::Marked);
    assert!(reachability.checked().is_empty());
    assert_eq!(bluesky.call_count(), 1);
    assert!(read(&path).contains("syndicated: true"));
}

#[tokio::test]
async fn test_rerun_never_publishes_twice() {
    let site = Site::new();
    site.write("blog/hello.md", &yaml_post("[\"bluesky\"]"));
    let bluesky = MockPublisher::success(Target::Bluesky);
    let reachability = StubReachability::new(true);

    for _ in 0..3 {
        run(
            &site,
            Publishers::new().with(Box::new(bluesky.clone())),
            &reachability,
            RunOptions::default(),
        )
        .await;
    }

    assert_eq!(bluesky.call_count(), 1);
    assert_eq!(reachability.checked().len(), 1);
}

#[tokio::test]
async fn test_already_syndicated_posts_are_skipped() {
    let site = Site::new();
    site.write(
        "blog/old.md",
        "+++\ntitle = \"Old\"\nsyndicate_to = [\"mastodon\"]\nmicroblog_content = \"old news\"\nsyndicated = true\n+++\nbody\n",
    );
    let mastodon = MockPublisher::success(Target::Mastodon);

    let summary = run(
        &site,
        Publishers::new().with(Box::new(mastodon.clone())),
        &StubReachability::new(true),
        RunOptions::default(),
    )
    .await;

    assert!(summary.posts.is_empty());
    assert_eq!(summary.already_syndicated, 1);
    assert_eq!(mastodon.call_count(), 0);
}

#[tokio::test]
async fn test_ineligible_posts_are_never_marked() {
    let site = Site::new();
    let no_summary = "---\ntitle: No summary\nsyndicate_to: [bluesky]\n---\nbody\n";
    let no_targets = "+++\ntitle = \"No targets\"\nmicroblog_content = \"hi\"\n+++\nbody\n";
    let a = site.write("blog/a.md", no_summary);
    let b = site.write("blog/b.md", no_targets);
    let bluesky = MockPublisher::success(Target::Bluesky);

    let summary = run(
        &site,
        Publishers::new().with(Box::new(bluesky.clone())),
        &StubReachability::new(true),
        RunOptions::default(),
    )
    .await;

    assert_eq!(summary.ineligible, 2);
    assert!(summary.posts.is_empty());
    assert_eq!(bluesky.call_count(), 0);
    assert_eq!(read(&a), no_summary);
    assert_eq!(read(&b), no_targets);
}

#[tokio::test]
async fn test_dry_run_has_no_side_effects() {
    let site = Site::new();
    let yaml = yaml_post("[\"bluesky\", \"mastodon\"]");
    let toml =
        "+++\ntitle = \"Toml\"\nsyndicate_to = [\"mastodon\"]\nmicroblog_content = \"hi\"\n+++\nbody\n";
    let a = site.write("blog/a.md", &yaml);
    let b = site.write("notes/b.md", toml);
    let reachability = StubReachability::new(true);

    let summary = run(
        &site,
        Publishers::new(),
        &reachability,
        RunOptions {
            dry_run: true,
            force: false,
        },
    )
    .await;

    assert!(summary.dry_run);
    assert_eq!(summary.posts.len(), 2);
    for outcome in &summary.posts {
        assert_eq!(outcome.reachability, ReachabilityStep::WouldCheck);
        assert_eq!(outcome.marking, Marking::WouldMark);
        assert!(outcome.results.iter().all(|r| r.success && r.dry_run));
    }
    assert_eq!(summary.posts[0].results.len(), 2);
    assert_eq!(summary.posts[1].url, "https://blog.example/notes/b/");

    assert!(reachability.checked().is_empty());
    assert_eq!(read(&a), yaml);
    assert_eq!(read(&b), toml);
}

#[tokio::test]
async fn test_dry_run_with_force_reports_bypass_without_side_effects() {
    let site = Site::new();
    let original = yaml_post("[\"bluesky\"]");
    let path = site.write("blog/hello.md", &original);
    let bluesky = MockPublisher::success(Target::Bluesky);
    let reachability = StubReachability::new(false);

    let summary = run(
        &site,
        Publishers::new().with(Box::new(bluesky.clone())),
        &reachability,
        RunOptions {
            dry_run: true,
            force: true,
        },
    )
    .await;

    let outcome = &summary.posts[0];
    assert_eq!(outcome.reachability, ReachabilityStep::Bypassed);
    assert_eq!(outcome.marking, Marking::WouldMark);
    assert!(outcome.results.iter().all(|r| r.dry_run));
    assert!(reachability.checked().is_empty());
    assert_eq!(bluesky.call_count(), 0);
    assert_eq!(read(&path), original);
}

#[tokio::test]
async fn test_unknown_target_is_reported_but_others_proceed() {
    let site = Site::new();
    let path = site.write("blog/hello.md", &yaml_post("[\"myspace\", \"Bluesky\"]"));
    let bluesky = MockPublisher::success(Target::Bluesky);

    let summary = run(
        &site,
        Publishers::new().with(Box::new(bluesky.clone())),
        &StubReachability::new(true),
        RunOptions::default(),
    )
    .await;

    let outcome = &summary.posts[0];
    assert_eq!(outcome.unknown_targets, vec!["myspace".to_string()]);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.marking, Marking::Marked);
    assert_eq!(bluesky.call_count(), 1);
    assert!(read(&path).contains("syndicated: true"));
}

#[tokio::test]
async fn test_only_unknown_targets_is_not_marked() {
    let site = Site::new();
    let original = yaml_post("[\"myspace\"]");
    let path = site.write("blog/hello.md", &original);

    let summary = run(
        &site,
        Publishers::new(),
        &StubReachability::new(true),
        RunOptions::default(),
    )
    .await;

    assert_eq!(summary.posts[0].marking, Marking::NotMarked);
    assert_eq!(summary.failed(), 1);
    assert_eq!(read(&path), original);
}

#[tokio::test]
async fn test_missing_publisher_fails_that_target() {
    let site = Site::new();
    let original = yaml_post("[\"bluesky\", \"mastodon\"]");
    let path = site.write("blog/hello.md", &original);
    let bluesky = MockPublisher::success(Target::Bluesky);

    let summary = run(
        &site,
        Publishers::new().with(Box::new(bluesky.clone())),
        &StubReachability::new(true),
        RunOptions::default(),
    )
    .await;

    let outcome = &summary.posts[0];
    assert!(outcome.results[1]
        .error
        .as_deref()
        .unwrap()
        .contains("No client configured for Mastodon"));
    assert_eq!(outcome.marking, Marking::NotMarked);
    assert_eq!(read(&path), original);
}

#[tokio::test]
async fn test_unparsable_file_does_not_stop_the_batch() {
    let site = Site::new();
    site.write("blog/a-broken.md", "title: no delimiters\n");
    site.write("blog/b-good.md", &yaml_post("[\"bluesky\"]"));
    site.write("blog/c-notes.txt", "not markdown");
    let bluesky = MockPublisher::success(Target::Bluesky);

    let summary = run(
        &site,
        Publishers::new().with(Box::new(bluesky.clone())),
        &StubReachability::new(true),
        RunOptions::default(),
    )
    .await;

    assert_eq!(summary.skipped_files.len(), 1);
    assert!(summary.skipped_files[0].path.ends_with("a-broken.md"));
    assert_eq!(summary.syndicated(), 1);
    assert_eq!(bluesky.call_count(), 1);
}

#[tokio::test]
async fn test_toml_marking_preserves_the_rest_of_the_file() {
    let site = Site::new();
    let original = concat!(
        "+++\n",
        "title = \"Toml post\"\n",
        "date = 2024-05-01T10:00:00Z\n",
        "syndicate_to = [\"mastodon\"]\n",
        "microblog_content = \"\"\"\nmulti\nline\n\"\"\"\n",
        "\n",
        "[extra]\n",
        "mood = \"happy\"\n",
        "+++\n",
        "Body\n",
    );
    let path = site.write("blog/toml-post.md", original);
    let mastodon = MockPublisher::success(Target::Mastodon);

    let summary = run(
        &site,
        Publishers::new().with(Box::new(mastodon.clone())),
        &StubReachability::new(true),
        RunOptions::default(),
    )
    .await;

    assert_eq!(summary.syndicated(), 1);
    let expected = original.replace("\n[extra]", "syndicated = true\n\n[extra]");
    assert_eq!(read(&path), expected);
}

#[tokio::test]
async fn test_toml_marker_lookalike_in_multiline_summary() {
    let site = Site::new();
    let original = concat!(
        "+++\n",
        "title = \"Lookalike\"\n",
        "syndicate_to = [\"mastodon\"]\n",
        "microblog_content = \"\"\"\n",
        "syndicated = false\n",
        "[Read it](https://blog.example/blog/lookalike/)\n",
        "\"\"\"\n",
        "+++\n",
        "Body\n",
    );
    let path = site.write("blog/lookalike.md", original);
    let mastodon = MockPublisher::success(Target::Mastodon);

    for _ in 0..2 {
        run(
            &site,
            Publishers::new().with(Box::new(mastodon.clone())),
            &StubReachability::new(true),
            RunOptions::default(),
        )
        .await;
    }

    assert_eq!(mastodon.call_count(), 1);
    assert_eq!(
        mastodon.published()[0].summary,
        "syndicated = false\n[Read it](https://blog.example/blog/lookalike/)"
    );
    let expected = original.replace("\"\"\"\n+++", "\"\"\"\nsyndicated = true\n+++");
    assert_eq!(read(&path), expected);
}

#[tokio::test]
async fn test_yaml_block_summary_is_marked_and_round_trips() {
    let site = Site::new();
    let original = concat!(
        "---\n",
        "title: Block summary\n",
        "syndicate_to: [bluesky]\n",
        "microblog_content: |\n",
        "  First line.\n",
        "  syndicated: false\n",
        "tags: [\"a\"]\n",
        "---\n",
        "\n",
        "Body.\n",
    );
    let path = site.write("blog/block.md", original);
    let bluesky = MockPublisher::success(Target::Bluesky);

    let summary = run(
        &site,
        Publishers::new().with(Box::new(bluesky.clone())),
        &StubReachability::new(true),
        RunOptions::default(),
    )
    .await;

    assert_eq!(summary.posts[0].marking, Marking::Marked);
    assert_eq!(bluesky.published()[0].summary, "First line.\nsyndicated: false");
    let expected = original.replace("tags: [\"a\"]\n", "tags: [\"a\"]\nsyndicated: true\n");
    assert_eq!(read(&path), expected);

    let rerun = run(
        &site,
        Publishers::new().with(Box::new(bluesky.clone())),
        &StubReachability::new(true),
        RunOptions::default(),
    )
    .await;
    assert_eq!(rerun.already_syndicated, 1);
    assert_eq!(bluesky.call_count(), 1);
}

#[tokio::test]
async fn test_yaml_quoted_summary_keeps_existing_marker_line() {
    let site = Site::new();
    let original = concat!(
        "---\n",
        "title: Quoted\n",
        "syndicate_to: [mastodon]\n",
        "microblog_content: \"New post!\n",
        "syndicated: false\"\n",
        "syndicated: false\n",
        "---\n",
        "Body.\n",
    );
    let path = site.write("blog/quoted.md", original);
    let mastodon = MockPublisher::success(Target::Mastodon);

    let summary = run(
        &site,
        Publishers::new().with(Box::new(mastodon.clone())),
        &StubReachability::new(true),
        RunOptions::default(),
    )
    .await;

    assert_eq!(summary.posts[0].marking, Marking::Marked);
    assert_eq!(mastodon.published()[0].summary, "New post! syndicated: false");
    let expected = original.replace("syndicated: false\n---", "syndicated: true\n---");
    assert_eq!(read(&path), expected);
}

#[tokio::test]
async fn test_summary_serializes_to_json() {
    let site = Site::new();
    site.write("blog/hello.md", &yaml_post("[\"bluesky\"]"));

    let summary = run(
        &site,
        Publishers::new().with(Box::new(MockPublisher::success(Target::Bluesky))),
        &StubReachability::new(true),
        RunOptions::default(),
    )
    .await;

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["posts"][0]["reachability"], "reachable");
    assert_eq!(json["posts"][0]["marking"]["status"], "marked");
    assert_eq!(json["posts"][0]["results"][0]["target"], "bluesky");
    assert_eq!(json["posts"][0]["results"][0]["remote_id"], "mock-bluesky-1");
}
