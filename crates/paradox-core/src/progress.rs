//! ============================================================================
//! Reading Progress - Per-subscriber position within a content item
//! ============================================================================
//! Progress only moves forward and never passes the part of the item the
//! reader is allowed to see.
//! ============================================================================

use serde::{Deserialize, Serialize};

use crate::access::{AccessDecision, ContentType};

/// Percentage at which an item counts as finished
pub const COMPLETION_THRESHOLD: u8 = 90;

/// Reading position for one subscriber on one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingProgress {
    pub email: String,
    pub content_id: String,
    pub content_type: ContentType,
    pub percent: u8,
    pub completed: bool,
    pub started_at: i64,
    pub updated_at: i64,
}

impl ReadingProgress {
    pub fn new(email: &str, content_type: ContentType, content_id: &str, now: i64) -> Self {
        Self {
            email: email.to_string(),
            content_id: content_id.to_string(),
            content_type,
            percent: 0,
            completed: false,
            started_at: now,
            updated_at: now,
        }
    }

    /// Move forward to `percent`, capped at `cap` (the visible share of the item).
    /// Returns true if the stored position changed.
    pub fn advance(&mut self, percent: u8, cap: u8, now: i64) -> bool {
        let target = percent.min(cap).min(100);
        if target <= self.percent {
            return false;
        }

        self.percent = target;
        self.updated_at = now;
        if target >= COMPLETION_THRESHOLD {
            self.completed = true;
        }
        true
    }

    /// Storage key: `<email>:<content type>:<content id>`
    pub fn key(&self) -> String {
        progress_key(&self.email, self.content_type, &self.content_id)
    }
}

pub(crate) fn progress_key(email: &str, content_type: ContentType, content_id: &str) -> String {
    format!("{}:{}:{}", email, content_type, content_id)
}

/// Cap for progress given the viewer's access decision on the item
pub fn progress_cap(decision: &AccessDecision) -> u8 {
    if decision.has_full_access {
        100
    } else {
        decision.preview_percentage
    }
}

/// Dashboard roll-up of a subscriber's progress entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub started: usize,
    pub completed: usize,
    pub chapters_completed: usize,
    pub average_percent: u8,
}

impl ProgressSummary {
    pub fn from_entries(entries: &[ReadingProgress]) -> Self {
        if entries.is_empty() {
            return Self::default();
        }

        let total: u32 = entries.iter().map(|p| u32::from(p.percent)).sum();
        let average = total / entries.len() as u32;

        Self {
            started: entries.len(),
            completed: entries.iter().filter(|p| p.completed).count(),
            chapters_completed: entries
                .iter()
                .filter(|p| p.completed && p.content_type == ContentType::Chapter)
                .count(),
            average_percent: u8::try_from(average).unwrap_or(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessPolicy, SubscriptionTier};
    use crate::types::{ContentItem, Viewer};

    fn progress() -> ReadingProgress {
        ReadingProgress::new("reader@example.com", ContentType::Chapter, "4", 1_000)
    }

    #[test]
    fn test_advance_moves_forward_only() {
        let mut p = progress();
        assert!(p.advance(40, 100, 1_010));
        assert!(!p.advance(30, 100, 1_020));
        assert_eq!(p.percent, 40);
        assert_eq!(p.updated_at, 1_010);
    }

    #[test]
    fn test_advance_respects_cap() {
        let mut p = progress();
        assert!(p.advance(75, 20, 1_010));
        assert_eq!(p.percent, 20);
        assert!(!p.completed);
        assert!(!p.advance(50, 20, 1_020));
    }

    #[test]
    fn test_completion_threshold() {
        let mut p = progress();
        p.advance(89, 100, 1_010);
        assert!(!p.completed);
        p.advance(90, 100, 1_020);
        assert!(p.completed);
    }

    #[test]
    fn test_advance_clamps_above_hundred() {
        let mut p = progress();
        p.advance(250, 255, 1_010);
        assert_eq!(p.percent, 100);
    }

    #[test]
    fn test_key_format() {
        assert_eq!(progress().key(), "reader@example.com:chapter:4");
    }

    #[test]
    fn test_progress_cap_from_decision() {
        let policy = AccessPolicy::default();
        let item = ContentItem::new("8", ContentType::Chapter);
        let denied = policy.evaluate(&Viewer::authenticated(SubscriptionTier::Free), &item);
        let granted = policy.evaluate(&Viewer::authenticated(SubscriptionTier::Premium), &item);
        assert_eq!(progress_cap(&denied), 20);
        assert_eq!(progress_cap(&granted), 100);
    }

    #[test]
    fn test_summary() {
        let mut a = progress();
        a.advance(100, 100, 1_010);
        let mut b = ReadingProgress::new("reader@example.com", ContentType::Article, "intro", 1_000);
        b.advance(50, 100, 1_010);

        let summary = ProgressSummary::from_entries(&[a, b]);
        assert_eq!(summary.started, 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.chapters_completed, 1);
        assert_eq!(summary.average_percent, 75);
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(ProgressSummary::from_entries(&[]), ProgressSummary::default());
    }
}
