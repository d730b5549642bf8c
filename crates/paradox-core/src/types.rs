//! ============================================================================
//! Shared Types - Viewers, principals and content metadata
//! ============================================================================
//! Plain data passed between the identity provider, the content store and the
//! access evaluator. Everything here is a per-request snapshot; nothing is
//! mutated by the access logic.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::access::{ContentType, PreviewPercentage, SubscriptionTier};

// ============================================================================
// Identity
// ============================================================================

/// Role attached to a signed-in principal by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Reader,
    Admin,
}

impl FromStr for Role {
    type Err = ParadoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reader" | "user" => Ok(Role::Reader),
            "admin" => Ok(Role::Admin),
            other => Err(ParadoxError::UnknownRole(other.to_string())),
        }
    }
}

/// Signed-in identity as supplied by the session provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

impl Principal {
    /// Build a reader principal, normalizing the email
    pub fn reader(email: &str) -> Result<Self, ParadoxError> {
        Ok(Self {
            email: normalize_email(email)?,
            role: Role::Reader,
        })
    }

    /// Build an admin principal, normalizing the email
    pub fn admin(email: &str) -> Result<Self, ParadoxError> {
        Ok(Self {
            email: normalize_email(email)?,
            role: Role::Admin,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Lowercase and trim an email, rejecting anything without a local part and domain
pub fn normalize_email(raw: &str) -> Result<String, ParadoxError> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ParadoxError::InvalidEmail(raw.to_string())),
    }
}

// ============================================================================
// Viewer
// ============================================================================

/// The person looking at a page, reduced to what the access rules need.
///
/// An anonymous viewer is always on the free tier; the constructors are the
/// only way to build one so that cannot be violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    tier: SubscriptionTier,
    is_authenticated: bool,
}

impl Viewer {
    /// Viewer without a session
    pub fn anonymous() -> Self {
        Self {
            tier: SubscriptionTier::Free,
            is_authenticated: false,
        }
    }

    /// Signed-in viewer with a resolved subscription tier
    pub fn authenticated(tier: SubscriptionTier) -> Self {
        Self {
            tier,
            is_authenticated: true,
        }
    }

    pub fn tier(&self) -> SubscriptionTier {
        self.tier
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }
}

impl Default for Viewer {
    fn default() -> Self {
        Self::anonymous()
    }
}

// ============================================================================
// Content
// ============================================================================

/// Gating metadata for one item fetched from the content store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub content_type: ContentType,
    /// Per-item override of the content-type default tier
    #[serde(default)]
    pub required_tier: Option<SubscriptionTier>,
    /// Per-item override of the content-type default preview
    #[serde(default)]
    preview_percentage: Option<PreviewPercentage>,
    /// Unlocks the item for every viewer
    #[serde(default)]
    pub unlock_override: bool,
    /// Requires a signed-in viewer even when the tier rule passes
    #[serde(default)]
    pub early_access: bool,
}

impl ContentItem {
    /// Item that follows the content-type defaults
    pub fn new(id: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            id: id.into(),
            content_type,
            required_tier: None,
            preview_percentage: None,
            unlock_override: false,
            early_access: false,
        }
    }

    pub fn with_required_tier(mut self, tier: SubscriptionTier) -> Self {
        self.required_tier = Some(tier);
        self
    }

    pub fn with_preview_percentage(mut self, percentage: u8) -> Result<Self, ParadoxError> {
        self.preview_percentage = Some(PreviewPercentage::new(percentage)?);
        Ok(self)
    }

    pub fn unlocked(mut self) -> Self {
        self.unlock_override = true;
        self
    }

    pub fn requiring_signup(mut self) -> Self {
        self.early_access = true;
        self
    }

    pub fn preview_percentage(&self) -> Option<PreviewPercentage> {
        self.preview_percentage
    }

    /// Chapter number when the id is numeric
    pub fn chapter_number(&self) -> Option<u32> {
        match self.content_type {
            ContentType::Chapter => parse_chapter_number(&self.id),
            _ => None,
        }
    }
}

pub(crate) fn parse_chapter_number(id: &str) -> Option<u32> {
    id.trim().parse::<u32>().ok()
}

// ============================================================================
// Errors
// ============================================================================

/// Error types for the access core
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParadoxError {
    #[error("Unknown subscription tier: {0}")]
    UnknownTier(String),

    #[error("Unknown content type: {0}")]
    UnknownContentType(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Unknown subscription status: {0}")]
    UnknownStatus(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Preview percentage must be between 0 and 100, got {0}")]
    InvalidPreviewPercentage(u8),

    #[error("Access denied ({required} required): {message}")]
    AccessDenied {
        required: SubscriptionTier,
        message: String,
    },

    #[error("Subscriber not found: {0}")]
    SubscriberNotFound(String),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Reader => write!(f, "reader"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_viewer_is_free() {
        let viewer = Viewer::anonymous();
        assert_eq!(viewer.tier(), SubscriptionTier::Free);
        assert!(!viewer.is_authenticated());
        assert_eq!(Viewer::default(), viewer);
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Reader@Example.COM ").unwrap(), "reader@example.com");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("reader@localhost").is_err());
    }

    #[test]
    fn test_preview_percentage_validation() {
        let item = ContentItem::new("7", ContentType::Chapter);
        assert!(item.clone().with_preview_percentage(100).is_ok());
        assert_eq!(
            item.with_preview_percentage(101),
            Err(ParadoxError::InvalidPreviewPercentage(101))
        );
    }

    #[test]
    fn test_chapter_number_only_for_chapters() {
        assert_eq!(ContentItem::new(" 2 ", ContentType::Chapter).chapter_number(), Some(2));
        assert_eq!(ContentItem::new("intro", ContentType::Chapter).chapter_number(), None);
        assert_eq!(ContentItem::new("2", ContentType::Article).chapter_number(), None);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("reader".parse::<Role>().unwrap(), Role::Reader);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_content_item_json_shape() {
        let json = r#"{"id":"12","contentType":"chapter","unlockOverride":true}"#;
        let item: ContentItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.content_type, ContentType::Chapter);
        assert!(item.unlock_override);
        assert_eq!(item.required_tier, None);
    }

    #[test]
    fn test_content_item_json_rejects_out_of_range_preview() {
        let json = r#"{"id":"9","contentType":"chapter","previewPercentage":250}"#;
        assert!(serde_json::from_str::<ContentItem>(json).is_err());

        let json = r#"{"id":"9","contentType":"chapter","previewPercentage":35}"#;
        let item: ContentItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.preview_percentage().map(PreviewPercentage::get), Some(35));
    }
}
