//! posse - Publish on your Own Site, Syndicate Elsewhere
//!
//! Finds Markdown posts whose front matter asks to be syndicated, checks that
//! the post is live on the site, announces it on Bluesky and Mastodon, and
//! marks it `syndicated = true` so it is never announced twice.

pub mod config;
pub mod eligibility;
pub mod error;
pub mod frontmatter;
pub mod logging;
pub mod platforms;
pub mod reachability;
pub mod scanner;
pub mod syndicate;
pub mod types;
pub mod url;

pub use config::Config;
pub use error::{PosseError, Result};
pub use frontmatter::{FrontMatter, FrontMatterFormat};
pub use platforms::{Publisher, Publishers, Syndication};
pub use reachability::{HttpReachability, Reachability};
pub use scanner::{scan, PostScanner, SkippedFile};
pub use syndicate::{RunOptions, Summary, Syndicator};
pub use types::{PostDocument, PostResult, Target};
