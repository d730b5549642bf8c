//! ============================================================================
//! Access Module - Subscription-tier gating for the content library
//! ============================================================================
//! Decides how much of a chapter, article, exercise, community space or
//! download a viewer may see.
//!
//! ## Tiers
//! - **Free**: articles, the first three chapters, previews of the rest
//! - **Premium**: every chapter, exercises and downloads
//! - **VIP**: everything in premium plus the community
//!
//! ## Usage
//! ```rust,ignore
//! use paradox_core::access::{AccessGate, AccessPolicy, SubscriptionChecker};
//!
//! let gate = AccessGate::new(SubscriptionChecker::new(db), AccessPolicy::default(), tracker);
//! let decision = gate.evaluate(session.as_ref(), &item).await;
//! ```
//! ============================================================================

mod checker;
mod evaluator;
mod gate;
mod policy;
mod types;

// Re-export public types
pub use checker::SubscriptionChecker;
pub use evaluator::{AccessDecision, AccessSummary, MAX_DENIED_PREVIEW};
pub use gate::{AccessGate, DEFAULT_CACHE_DURATION_SECS};
pub use policy::AccessPolicy;
pub use types::{
    AccessRule, ContentType, PreviewPercentage, SubscriptionTier, FREE_CHAPTER_COUNT, TIER_ORDER, TOTAL_CHAPTERS,
};
