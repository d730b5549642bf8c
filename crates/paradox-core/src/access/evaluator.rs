//! ============================================================================
//! Access Evaluator - Tier comparison, preview sizing and upsell copy
//! ============================================================================
//! Pure functions over an [`AccessPolicy`]. No I/O and no hidden state: the
//! same inputs always give the same answer, and anything the policy does not
//! know about is denied.
//! ============================================================================

use serde::Serialize;
use tracing::debug;

use super::policy::AccessPolicy;
use super::types::{ContentType, PreviewPercentage, SubscriptionTier};
use crate::types::{parse_chapter_number, ContentItem, Viewer};

/// Largest preview a denied decision can carry; a denial always withholds part of the body
pub const MAX_DENIED_PREVIEW: u8 = 99;

/// Outcome of evaluating one content item for one viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    pub has_full_access: bool,
    /// 100 when access is granted, otherwise the preview shown
    pub preview_percentage: u8,
    /// Tier that would unlock the item, `None` when nothing can
    pub required_tier: Option<SubscriptionTier>,
    /// Upsell copy, only set when access is denied
    pub gate_message: Option<String>,
}

impl AccessDecision {
    fn granted(required_tier: Option<SubscriptionTier>) -> Self {
        Self {
            has_full_access: true,
            preview_percentage: 100,
            required_tier,
            gate_message: None,
        }
    }

    fn denied(required_tier: Option<SubscriptionTier>, preview: PreviewPercentage, message: String) -> Self {
        Self {
            has_full_access: false,
            preview_percentage: preview.get().min(MAX_DENIED_PREVIEW),
            required_tier,
            gate_message: Some(message),
        }
    }

    /// Number of units (words, paragraphs, blocks) of a `total`-unit body to reveal
    pub fn visible_len(&self, total: usize) -> usize {
        if self.has_full_access {
            return total;
        }
        total * usize::from(self.preview_percentage) / 100
    }
}

/// Dashboard snapshot of what a viewer can reach
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessSummary {
    pub tier: SubscriptionTier,
    pub is_logged_in: bool,
    pub can_access_premium_chapters: bool,
    pub can_download: bool,
    pub can_access_community: bool,
    pub can_access_exercises: bool,
    pub free_chapters_count: u32,
    pub total_chapters_count: u32,
}

impl AccessPolicy {
    /// Check whether `tier` may see `content_type` in full.
    ///
    /// For chapters, a numeric `content_id` inside the free allowance is open
    /// to every tier. Types without a rule are denied.
    pub fn can_access(
        &self,
        tier: SubscriptionTier,
        content_type: ContentType,
        content_id: Option<&str>,
    ) -> bool {
        if content_type == ContentType::Chapter {
            if let Some(chapter) = content_id.and_then(parse_chapter_number) {
                if self.is_free_chapter(chapter) {
                    return true;
                }
            }
        }

        match self.rule_for(content_type) {
            Some(rule) => tier.satisfies(rule.required_tier),
            None => false,
        }
    }

    /// String boundary for [`Self::can_access`]; unparseable input is denied
    pub fn can_access_str(&self, tier: &str, content_type: &str, content_id: Option<&str>) -> bool {
        let (tier, content_type) = match (tier.parse::<SubscriptionTier>(), content_type.parse::<ContentType>()) {
            (Ok(tier), Ok(content_type)) => (tier, content_type),
            (tier, content_type) => {
                debug!(
                    "Denying unparseable access check: tier={:?} content_type={:?}",
                    tier, content_type
                );
                return false;
            }
        };
        self.can_access(tier, content_type, content_id)
    }

    /// Upsell copy for a viewer looking at a content type
    pub fn gate_message(&self, viewer: &Viewer, content_type: ContentType) -> String {
        match self.rule_for(content_type) {
            Some(rule) => self.message_for(viewer, content_type, rule.required_tier),
            None => format!("This {} is not available right now.", content_type),
        }
    }

    /// Aggregate the checks a subscriber dashboard needs
    pub fn access_summary(&self, viewer: &Viewer) -> AccessSummary {
        let tier = if viewer.is_authenticated() {
            viewer.tier()
        } else {
            SubscriptionTier::Free
        };

        AccessSummary {
            tier,
            is_logged_in: viewer.is_authenticated(),
            can_access_premium_chapters: self.can_access(tier, ContentType::Chapter, None),
            can_download: self.can_access(tier, ContentType::Download, None),
            can_access_community: self.can_access(tier, ContentType::Community, None),
            can_access_exercises: self.can_access(tier, ContentType::Exercise, None),
            free_chapters_count: self.free_chapter_count,
            total_chapters_count: self.total_chapters,
        }
    }

    /// Full decision for one item.
    ///
    /// Checked in order: the item's unlock override, the signup requirement of
    /// early-access items, the free-chapter allowance, then the tier rule (the
    /// item's own required tier if set, else the content-type default).
    pub fn evaluate(&self, viewer: &Viewer, item: &ContentItem) -> AccessDecision {
        let rule = self.rule_for(item.content_type);
        let required = item.required_tier.or(rule.map(|r| r.required_tier));
        let preview = item
            .preview_percentage()
            .or(rule.map(|r| r.preview_percentage))
            .unwrap_or(PreviewPercentage::NONE);

        if item.unlock_override {
            return AccessDecision::granted(required);
        }

        // Early-access bodies stay hidden until signup
        if item.early_access && !viewer.is_authenticated() {
            return AccessDecision::denied(
                Some(required.unwrap_or(SubscriptionTier::Free)),
                PreviewPercentage::NONE,
                format!("Sign up free to get early access to this {}.", item.content_type),
            );
        }

        if item
            .chapter_number()
            .is_some_and(|chapter| self.is_free_chapter(chapter))
        {
            return AccessDecision::granted(required);
        }

        match required {
            Some(required) if viewer.tier().satisfies(required) => AccessDecision::granted(Some(required)),
            Some(required) => AccessDecision::denied(
                Some(required),
                preview,
                self.message_for(viewer, item.content_type, required),
            ),
            None => AccessDecision::denied(
                None,
                PreviewPercentage::NONE,
                format!("This {} is not available right now.", item.content_type),
            ),
        }
    }

    fn message_for(&self, viewer: &Viewer, content_type: ContentType, required: SubscriptionTier) -> String {
        if viewer.tier().satisfies(required) {
            return format!("You have full access to this {}.", content_type);
        }

        if !viewer.is_authenticated() {
            return match content_type {
                ContentType::Chapter => format!(
                    "Sign up free to read the first {} chapters of The Paradox Engine, then go {} for the rest of the book.",
                    self.free_chapter_count,
                    required.display_name()
                ),
                ContentType::Article => "Sign up free to keep reading this article.".to_string(),
                ContentType::Exercise => format!(
                    "Create a free account, then upgrade to {} to work through the exercises.",
                    required.display_name()
                ),
                ContentType::Community => format!(
                    "Join as a {} member to take part in the Paradox Engine community.",
                    required.display_name()
                ),
                ContentType::Download => format!(
                    "Create an account and upgrade to {} to download the companion resources.",
                    required.display_name()
                ),
            };
        }

        match content_type {
            ContentType::Chapter => format!(
                "You've read the free chapters. Upgrade to {} to unlock all {} chapters.",
                required.display_name(),
                self.total_chapters
            ),
            ContentType::Article => format!("Upgrade to {} to read this article in full.", required.display_name()),
            ContentType::Exercise => format!(
                "Upgrade to {} to unlock the interactive exercises.",
                required.display_name()
            ),
            ContentType::Community => format!(
                "Upgrade to {} to join the community discussions.",
                required.display_name()
            ),
            ContentType::Download => format!(
                "Upgrade to {} to download worksheets and companion material.",
                required.display_name()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessRule, PreviewPercentage, TIER_ORDER};

    fn policy() -> AccessPolicy {
        AccessPolicy::default()
    }

    #[test]
    fn test_first_three_chapters_free() {
        let p = policy();
        for id in ["1", "2", "3"] {
            assert!(p.can_access(SubscriptionTier::Free, ContentType::Chapter, Some(id)));
        }
        assert!(!p.can_access(SubscriptionTier::Free, ContentType::Chapter, Some("4")));
    }

    #[test]
    fn test_premium_unlocks_every_chapter() {
        assert!(policy().can_access(SubscriptionTier::Premium, ContentType::Chapter, Some("20")));
    }

    #[test]
    fn test_download_gating() {
        let p = policy();
        assert!(p.can_access(SubscriptionTier::Vip, ContentType::Download, None));
        assert!(!p.can_access(SubscriptionTier::Free, ContentType::Download, None));
    }

    #[test]
    fn test_non_numeric_chapter_id_uses_tier_rule() {
        let p = policy();
        assert!(!p.can_access(SubscriptionTier::Free, ContentType::Chapter, Some("prologue")));
        assert!(p.can_access(SubscriptionTier::Premium, ContentType::Chapter, Some("prologue")));
    }

    #[test]
    fn test_free_chapter_rule_only_applies_to_chapters() {
        assert!(!policy().can_access(SubscriptionTier::Free, ContentType::Exercise, Some("1")));
    }

    #[test]
    fn test_monotonic_in_tier() {
        let p = policy();
        let ids = [None, Some("1"), Some("4"), Some("20"), Some("x")];
        for ct in ContentType::ALL {
            for id in ids {
                for (i, lower) in TIER_ORDER.iter().enumerate() {
                    for higher in &TIER_ORDER[i + 1..] {
                        if p.can_access(*lower, ct, id) {
                            assert!(p.can_access(*higher, ct, id), "{:?} {:?} {:?}", higher, ct, id);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_can_access_is_idempotent() {
        let p = policy();
        let first = p.can_access(SubscriptionTier::Premium, ContentType::Community, None);
        let second = p.can_access(SubscriptionTier::Premium, ContentType::Community, None);
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_rule_fails_closed() {
        let mut p = policy();
        p.remove_rule(ContentType::Download);
        assert!(!p.can_access(SubscriptionTier::Vip, ContentType::Download, None));

        let decision = p.evaluate(
            &Viewer::authenticated(SubscriptionTier::Vip),
            &ContentItem::new("worksheet", ContentType::Download),
        );
        assert!(!decision.has_full_access);
        assert_eq!(decision.preview_percentage, 0);
        assert_eq!(decision.required_tier, None);
    }

    #[test]
    fn test_can_access_str_fails_closed() {
        let p = policy();
        assert!(p.can_access_str("free", "chapter", Some("2")));
        assert!(p.can_access_str("VIP", "community", None));
        assert!(!p.can_access_str("free", "podcast", None));
        assert!(!p.can_access_str("platinum", "article", None));
    }

    #[test]
    fn test_summary_for_anonymous_viewer() {
        let summary = policy().access_summary(&Viewer::anonymous());
        assert_eq!(summary.tier, SubscriptionTier::Free);
        assert!(!summary.is_logged_in);
        assert!(!summary.can_access_premium_chapters);
        assert!(!summary.can_download);
        assert!(!summary.can_access_community);
        assert!(!summary.can_access_exercises);
        assert_eq!(summary.free_chapters_count, 3);
        assert_eq!(summary.total_chapters_count, 24);
    }

    #[test]
    fn test_summary_for_premium_viewer() {
        let summary = policy().access_summary(&Viewer::authenticated(SubscriptionTier::Premium));
        assert!(summary.is_logged_in);
        assert!(summary.can_access_premium_chapters);
        assert!(summary.can_download);
        assert!(summary.can_access_exercises);
        assert!(!summary.can_access_community);
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let json = serde_json::to_value(policy().access_summary(&Viewer::anonymous())).unwrap();
        assert_eq!(json["tier"], "free");
        assert_eq!(json["isLoggedIn"], false);
        assert_eq!(json["freeChaptersCount"], 3);
    }

    #[test]
    fn test_granted_decision_shows_everything() {
        let p = policy();
        let viewer = Viewer::authenticated(SubscriptionTier::Premium);
        let item = ContentItem::new("9", ContentType::Chapter)
            .with_preview_percentage(10)
            .unwrap();
        let decision = p.evaluate(&viewer, &item);
        assert!(decision.has_full_access);
        assert_eq!(decision.preview_percentage, 100);
        assert_eq!(decision.gate_message, None);
        assert_eq!(decision.visible_len(250), 250);
    }

    #[test]
    fn test_denied_decision_uses_preview() {
        let p = policy();
        let viewer = Viewer::authenticated(SubscriptionTier::Free);
        let decision = p.evaluate(&viewer, &ContentItem::new("9", ContentType::Chapter));
        assert!(!decision.has_full_access);
        assert_eq!(decision.preview_percentage, 20);
        assert_eq!(decision.required_tier, Some(SubscriptionTier::Premium));
        assert_eq!(decision.visible_len(250), 50);
        assert!(decision.gate_message.unwrap().contains("Upgrade to Premium"));
    }

    #[test]
    fn test_item_preview_overrides_rule() {
        let item = ContentItem::new("9", ContentType::Chapter)
            .with_preview_percentage(5)
            .unwrap();
        let decision = policy().evaluate(&Viewer::anonymous(), &item);
        assert_eq!(decision.preview_percentage, 5);
    }

    #[test]
    fn test_unlock_override_opens_item_to_anonymous() {
        let item = ContentItem::new("15", ContentType::Chapter).unlocked();
        let decision = policy().evaluate(&Viewer::anonymous(), &item);
        assert!(decision.has_full_access);
        assert_eq!(decision.preview_percentage, 100);
    }

    #[test]
    fn test_free_chapter_via_evaluate() {
        let decision = policy().evaluate(&Viewer::anonymous(), &ContentItem::new("3", ContentType::Chapter));
        assert!(decision.has_full_access);
    }

    #[test]
    fn test_item_required_tier_override() {
        let item = ContentItem::new("ama", ContentType::Article).with_required_tier(SubscriptionTier::Vip);
        let p = policy();
        let premium = p.evaluate(&Viewer::authenticated(SubscriptionTier::Premium), &item);
        assert!(!premium.has_full_access);
        assert_eq!(premium.required_tier, Some(SubscriptionTier::Vip));
        assert_eq!(premium.preview_percentage, MAX_DENIED_PREVIEW);
        assert!(premium.visible_len(1000) < 1000);
        assert!(premium.visible_len(1) < 1);

        let vip = p.evaluate(&Viewer::authenticated(SubscriptionTier::Vip), &item);
        assert!(vip.has_full_access);
    }

    #[test]
    fn test_early_access_requires_signup() {
        let item = ContentItem::new("launch-notes", ContentType::Article).requiring_signup();
        let p = policy();

        let anonymous = p.evaluate(&Viewer::anonymous(), &item);
        assert!(!anonymous.has_full_access);
        assert!(anonymous.gate_message.unwrap().starts_with("Sign up free"));

        let member = p.evaluate(&Viewer::authenticated(SubscriptionTier::Free), &item);
        assert!(member.has_full_access);
    }

    #[test]
    fn test_early_access_denial_withholds_body() {
        let p = policy();
        for item in [
            ContentItem::new("launch-notes", ContentType::Article).requiring_signup(),
            ContentItem::new("12", ContentType::Chapter)
                .with_preview_percentage(60)
                .unwrap()
                .requiring_signup(),
        ] {
            let decision = p.evaluate(&Viewer::anonymous(), &item);
            assert!(!decision.has_full_access);
            assert_eq!(decision.preview_percentage, 0);
            assert_eq!(decision.visible_len(1000), 0);
        }
    }

    #[test]
    fn test_denied_preview_never_reveals_whole_body() {
        let p = policy();
        let item = ContentItem::new("deep-dive", ContentType::Article)
            .with_required_tier(SubscriptionTier::Premium)
            .with_preview_percentage(100)
            .unwrap();
        let decision = p.evaluate(&Viewer::authenticated(SubscriptionTier::Free), &item);
        assert!(!decision.has_full_access);
        for total in [1, 7, 100, 1000] {
            assert!(decision.visible_len(total) < total, "total={}", total);
        }
    }

    #[test]
    fn test_gate_messages() {
        let p = policy();
        let anon = p.gate_message(&Viewer::anonymous(), ContentType::Chapter);
        assert!(anon.contains("first 3 chapters"));

        let free = p.gate_message(&Viewer::authenticated(SubscriptionTier::Free), ContentType::Exercise);
        assert_eq!(free, "Upgrade to Premium to unlock the interactive exercises.");

        let premium = p.gate_message(&Viewer::authenticated(SubscriptionTier::Premium), ContentType::Community);
        assert_eq!(premium, "Upgrade to VIP to join the community discussions.");

        let vip = p.gate_message(&Viewer::authenticated(SubscriptionTier::Vip), ContentType::Download);
        assert_eq!(vip, "You have full access to this download.");
    }

    #[test]
    fn test_gate_message_for_unruled_type() {
        let mut p = policy();
        p.remove_rule(ContentType::Community);
        assert_eq!(
            p.gate_message(&Viewer::anonymous(), ContentType::Community),
            "This community is not available right now."
        );
    }

    #[test]
    fn test_custom_rule_changes_preview() {
        let mut p = policy();
        p.set_rule(
            ContentType::Exercise,
            AccessRule::new(SubscriptionTier::Vip, PreviewPercentage::new(50).unwrap()),
        );
        let decision = p.evaluate(
            &Viewer::authenticated(SubscriptionTier::Premium),
            &ContentItem::new("ex-1", ContentType::Exercise),
        );
        assert!(!decision.has_full_access);
        assert_eq!(decision.preview_percentage, 50);
    }
}
