//! Eligibility rules for syndication

use serde::Serialize;

use crate::types::PostDocument;

/// Why a post will or will not be syndicated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    Eligible,
    /// Already carries `syndicated = true`; never published again
    AlreadySyndicated,
    /// `syndicate_to` is absent or empty
    NoTargets,
    /// Targets requested but `microblog_content` is absent or blank
    MissingMicroblogContent,
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

pub fn check(doc: &PostDocument) -> Eligibility {
    if doc.is_syndicated() {
        Eligibility::AlreadySyndicated
    } else if doc.syndicate_to().is_empty() {
        Eligibility::NoTargets
    } else if doc.microblog_content().is_none() {
        Eligibility::MissingMicroblogContent
    } else {
        Eligibility::Eligible
    }
}

pub fn is_eligible(doc: &PostDocument) -> bool {
    check(doc).is_eligible()
}
