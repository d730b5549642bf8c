//! ============================================================================
//! Access Types - Subscription tiers, content types and gating rules
//! ============================================================================
//! Defines the ordered subscription tiers and the per-content-type default
//! rules that the evaluator consults.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::types::ParadoxError;

/// Number of chapters readable on the free tier
pub const FREE_CHAPTER_COUNT: u32 = 3;

/// Chapters in the published book
pub const TOTAL_CHAPTERS: u32 = 24;

/// Tier order, lowest first. Rank is the index into this list.
pub const TIER_ORDER: [SubscriptionTier; 3] = [
    SubscriptionTier::Free,
    SubscriptionTier::Premium,
    SubscriptionTier::Vip,
];

/// Subscription tiers, ordered free < premium < vip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    /// Signed up (or anonymous) without a paid plan
    #[default]
    Free,
    /// Full book, exercises and downloads
    Premium,
    /// Everything in premium plus the community
    Vip,
}

impl SubscriptionTier {
    /// Position in [`TIER_ORDER`]
    pub fn rank(&self) -> usize {
        TIER_ORDER
            .iter()
            .position(|tier| tier == self)
            .unwrap_or(0)
    }

    /// True when this tier reaches `required`
    pub fn satisfies(&self, required: SubscriptionTier) -> bool {
        self.rank() >= required.rank()
    }

    /// Get human-readable tier name
    pub fn display_name(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "Free",
            SubscriptionTier::Premium => "Premium",
            SubscriptionTier::Vip => "VIP",
        }
    }

    /// Next tier up, if any
    pub fn next(&self) -> Option<SubscriptionTier> {
        TIER_ORDER.get(self.rank() + 1).copied()
    }
}

impl PartialOrd for SubscriptionTier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SubscriptionTier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Premium => "premium",
            SubscriptionTier::Vip => "vip",
        };
        f.write_str(name)
    }
}

impl FromStr for SubscriptionTier {
    type Err = ParadoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(SubscriptionTier::Free),
            "premium" => Ok(SubscriptionTier::Premium),
            "vip" => Ok(SubscriptionTier::Vip),
            other => Err(ParadoxError::UnknownTier(other.to_string())),
        }
    }
}

/// Kinds of content served from the library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// A chapter of the book
    Chapter,
    /// Blog-style article
    Article,
    /// Interactive exercise
    Exercise,
    /// Community discussion space
    Community,
    /// Downloadable companion material
    Download,
}

impl ContentType {
    pub const ALL: [ContentType; 5] = [
        ContentType::Chapter,
        ContentType::Article,
        ContentType::Exercise,
        ContentType::Community,
        ContentType::Download,
    ];

    /// Default gating rule for this content type
    pub fn default_rule(&self) -> AccessRule {
        match self {
            ContentType::Chapter => AccessRule::new(SubscriptionTier::Premium, PreviewPercentage(20)),
            ContentType::Article => AccessRule::new(SubscriptionTier::Free, PreviewPercentage::FULL),
            ContentType::Exercise => AccessRule::new(SubscriptionTier::Premium, PreviewPercentage(30)),
            ContentType::Community => AccessRule::new(SubscriptionTier::Vip, PreviewPercentage::NONE),
            ContentType::Download => AccessRule::new(SubscriptionTier::Premium, PreviewPercentage::NONE),
        }
    }

    /// Get human-readable content type name
    pub fn display_name(&self) -> &'static str {
        match self {
            ContentType::Chapter => "chapter",
            ContentType::Article => "article",
            ContentType::Exercise => "exercise",
            ContentType::Community => "community",
            ContentType::Download => "download",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ContentType {
    type Err = ParadoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chapter" | "chapters" => Ok(ContentType::Chapter),
            "article" | "articles" => Ok(ContentType::Article),
            "exercise" | "exercises" => Ok(ContentType::Exercise),
            "community" => Ok(ContentType::Community),
            "download" | "downloads" => Ok(ContentType::Download),
            other => Err(ParadoxError::UnknownContentType(other.to_string())),
        }
    }
}

/// Share of an item (0-100) revealed before the gate.
///
/// Deserialization goes through [`PreviewPercentage::new`], so content-store
/// JSON and persisted policies cannot carry values above 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PreviewPercentage(u8);

impl PreviewPercentage {
    pub const NONE: Self = Self(0);
    pub const FULL: Self = Self(100);

    pub fn new(value: u8) -> Result<Self, ParadoxError> {
        if value > 100 {
            return Err(ParadoxError::InvalidPreviewPercentage(value));
        }
        Ok(Self(value))
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for PreviewPercentage {
    type Error = ParadoxError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PreviewPercentage> for u8 {
    fn from(value: PreviewPercentage) -> Self {
        value.0
    }
}

impl fmt::Display for PreviewPercentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Minimum tier for full access plus the preview shown below it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRule {
    pub required_tier: SubscriptionTier,
    /// Share of the item revealed to viewers below `required_tier`
    pub preview_percentage: PreviewPercentage,
}

impl AccessRule {
    pub const fn new(required_tier: SubscriptionTier, preview_percentage: PreviewPercentage) -> Self {
        Self {
            required_tier,
            preview_percentage,
        }
    }
}
