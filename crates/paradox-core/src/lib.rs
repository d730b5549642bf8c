//! ============================================================================
//! PARADOX-CORE: Reader access for The Paradox Engine
//! ============================================================================
//! This crate handles the subscriber-side logic of the book site:
//! - Subscription-tier gating of chapters, articles, exercises and downloads
//! - Persistent subscriber records and reading progress (redb)
//! - Cached tier lookups for request handlers
//! - An explicitly passed error tracker
//! ============================================================================

pub mod access;
pub mod config;
pub mod db;
pub mod progress;
pub mod telemetry;
pub mod types;

// Re-export main types for convenience
pub use types::*;
pub use access::{AccessDecision, AccessGate, AccessPolicy, AccessSummary, ContentType, PreviewPercentage, SubscriptionTier};
pub use config::ParadoxConfig;
pub use db::{DbStats, SubscriberDb, SubscriberRecord, SubscriptionStatus};
pub use progress::{ProgressSummary, ReadingProgress};
pub use telemetry::{CapturedError, ErrorTracker};
