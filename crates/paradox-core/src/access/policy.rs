//! ============================================================================
//! Access Policy - The rule table the evaluator runs against
//! ============================================================================
//! Content-type rules plus the free-chapter allowance. Defaults come from
//! [`ContentType::default_rule`]; a deployment can override counts through
//! configuration or persist a tuned policy in the subscriber database.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::{AccessRule, ContentType, FREE_CHAPTER_COUNT, TOTAL_CHAPTERS};
use crate::config::ParadoxConfig;

/// Access rules for every content type plus chapter allowances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicy {
    /// Chapters 1..=N are readable by every tier
    pub free_chapter_count: u32,
    pub total_chapters: u32,
    /// Content types without an entry are denied
    pub rules: BTreeMap<ContentType, AccessRule>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            free_chapter_count: FREE_CHAPTER_COUNT,
            total_chapters: TOTAL_CHAPTERS,
            rules: ContentType::ALL
                .iter()
                .map(|ct| (*ct, ct.default_rule()))
                .collect(),
        }
    }
}

impl AccessPolicy {
    /// Default rules with the chapter counts taken from configuration
    pub fn from_config(config: &ParadoxConfig) -> Self {
        Self {
            free_chapter_count: config.free_chapter_count.min(config.total_chapters),
            total_chapters: config.total_chapters,
            ..Self::default()
        }
    }

    /// Rule for a content type, `None` when the policy has no entry
    pub fn rule_for(&self, content_type: ContentType) -> Option<&AccessRule> {
        self.rules.get(&content_type)
    }

    /// Replace the rule for a content type
    pub fn set_rule(&mut self, content_type: ContentType, rule: AccessRule) -> Option<AccessRule> {
        self.rules.insert(content_type, rule)
    }

    /// Drop the rule for a content type; items of that type become denied
    pub fn remove_rule(&mut self, content_type: ContentType) -> Option<AccessRule> {
        self.rules.remove(&content_type)
    }

    /// True when `chapter` falls inside the free allowance
    pub fn is_free_chapter(&self, chapter: u32) -> bool {
        chapter <= self.free_chapter_count
    }
}
