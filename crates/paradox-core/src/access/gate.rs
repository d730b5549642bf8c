//! ============================================================================
//! Access Gate - Cached tier lookups with content gating
//! ============================================================================
//! Turns a session principal into a viewer, caching tiers so page renders
//! don't hit the subscriber database every time, then runs the evaluator.
//! Lookup failures are captured and resolve to the free tier.
//! ============================================================================

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::checker::SubscriptionChecker;
use super::evaluator::{AccessDecision, AccessSummary};
use super::policy::AccessPolicy;
use super::types::SubscriptionTier;
use crate::config::ParadoxConfig;
use crate::db::SubscriberDb;
use crate::progress::{progress_cap, ReadingProgress};
use crate::telemetry::ErrorTracker;
use crate::types::{normalize_email, ContentItem, ParadoxError, Principal, Viewer};

/// Default cache duration in seconds (5 minutes)
pub const DEFAULT_CACHE_DURATION_SECS: i64 = 300;

/// Maximum number of entries in the tier cache to prevent unbounded growth
const MAX_CACHE_SIZE: usize = 1000;

/// Cached tier information
#[derive(Debug, Clone)]
struct CachedTier {
    tier: SubscriptionTier,
    cached_at: i64,
}

/// Access gate with caching for efficient tier lookups
pub struct AccessGate {
    checker: SubscriptionChecker,
    policy: AccessPolicy,
    tracker: Arc<ErrorTracker>,
    tier_cache: Arc<RwLock<HashMap<String, CachedTier>>>,
    cache_duration_secs: i64,
}

impl AccessGate {
    /// Create a new access gate with the default cache duration
    pub fn new(checker: SubscriptionChecker, policy: AccessPolicy, tracker: Arc<ErrorTracker>) -> Self {
        Self::with_cache_duration(checker, policy, tracker, DEFAULT_CACHE_DURATION_SECS)
    }

    /// Create a new access gate with custom cache duration
    pub fn with_cache_duration(
        checker: SubscriptionChecker,
        policy: AccessPolicy,
        tracker: Arc<ErrorTracker>,
        cache_duration_secs: i64,
    ) -> Self {
        Self {
            checker,
            policy,
            tracker,
            tier_cache: Arc::new(RwLock::new(HashMap::new())),
            cache_duration_secs,
        }
    }

    /// Build a gate from configuration. A policy stored in the database wins
    /// over the configured chapter counts.
    pub fn from_config(db: Arc<SubscriberDb>, config: &ParadoxConfig, tracker: Arc<ErrorTracker>) -> Result<Self> {
        let policy = match db.get_policy()? {
            Some(stored) => {
                info!("Using access policy stored in {}", db.path().display());
                stored
            }
            None => AccessPolicy::from_config(config),
        };

        Ok(Self::with_cache_duration(
            SubscriptionChecker::new(db),
            policy,
            tracker,
            config.cache_duration_secs,
        ))
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Resolve a principal's tier, using cache when possible.
    /// Database failures are captured and treated as free.
    pub async fn check_tier(&self, principal: &Principal) -> SubscriptionTier {
        if principal.is_admin() {
            return SubscriptionTier::Vip;
        }

        // Cache keys are normalized so `invalidate` matches whatever case the session carried
        let email = match normalize_email(&principal.email) {
            Ok(email) => email,
            Err(e) => {
                self.tracker.capture("gate.tier_lookup", e.to_string());
                warn!("Unusable principal email, treating as free");
                return SubscriptionTier::Free;
            }
        };
        let now = chrono::Utc::now().timestamp();

        // Check cache first
        {
            let cache = self.tier_cache.read().await;
            if let Some(cached) = cache.get(&email) {
                if now - cached.cached_at < self.cache_duration_secs {
                    debug!(
                        "Cache hit for {}: {} (age: {}s)",
                        email,
                        cached.tier,
                        now - cached.cached_at
                    );
                    return cached.tier;
                }
            }
        }

        // Cache miss or expired - fetch fresh
        debug!("Cache miss for {}, reading subscriber database", email);
        let tier = match self.checker.tier_for_email(&email) {
            Ok(tier) => tier,
            Err(e) => {
                self.tracker
                    .capture("gate.tier_lookup", format!("{}: {}", email, e));
                warn!("Tier lookup failed for {}, treating as free", email);
                return SubscriptionTier::Free;
            }
        };

        // Update cache
        {
            let mut cache = self.tier_cache.write().await;
            // Evict oldest entry if cache is at capacity
            if cache.len() >= MAX_CACHE_SIZE && !cache.contains_key(&email) {
                if let Some(oldest_key) = cache
                    .iter()
                    .min_by_key(|(_, v)| v.cached_at)
                    .map(|(k, _)| k.clone())
                {
                    cache.remove(&oldest_key);
                }
            }
            cache.insert(email.clone(), CachedTier { tier, cached_at: now });
        }

        debug!("Subscription tier for {}: {}", email, tier);
        tier
    }

    /// Viewer for a request; no principal means anonymous
    pub async fn viewer_for(&self, principal: Option<&Principal>) -> Viewer {
        match principal {
            Some(principal) => Viewer::authenticated(self.check_tier(principal).await),
            None => Viewer::anonymous(),
        }
    }

    /// Decide what a request may see of an item
    pub async fn evaluate(&self, principal: Option<&Principal>, item: &ContentItem) -> AccessDecision {
        let viewer = self.viewer_for(principal).await;
        self.policy.evaluate(&viewer, item)
    }

    /// Gate an item - returns Ok(tier) if fully accessible, Err with the upsell message if not
    pub async fn require_access(&self, principal: Option<&Principal>, item: &ContentItem) -> Result<SubscriptionTier> {
        let viewer = self.viewer_for(principal).await;
        let decision = self.policy.evaluate(&viewer, item);

        if !decision.has_full_access {
            let required = decision.required_tier.unwrap_or(SubscriptionTier::Vip);
            warn!(
                "Access denied for {} {}: viewer has {} tier, needs {}",
                item.content_type,
                item.id,
                viewer.tier(),
                required
            );
            return Err(ParadoxError::AccessDenied {
                required,
                message: decision.gate_message.unwrap_or_default(),
            }
            .into());
        }

        Ok(viewer.tier())
    }

    /// Dashboard summary for a request
    pub async fn access_summary(&self, principal: Option<&Principal>) -> AccessSummary {
        let viewer = self.viewer_for(principal).await;
        self.policy.access_summary(&viewer)
    }

    /// Record reading progress, capped at the part of the item the reader can see
    pub async fn record_progress(
        &self,
        principal: &Principal,
        item: &ContentItem,
        percent: u8,
    ) -> Result<ReadingProgress> {
        let decision = self.evaluate(Some(principal), item).await;
        self.checker.db().record_progress(
            &principal.email,
            item.content_type,
            &item.id,
            percent,
            progress_cap(&decision),
        )
    }

    /// Invalidate cache for an email (e.g., after a plan change)
    pub async fn invalidate(&self, email: &str) {
        let Ok(email) = normalize_email(email) else {
            debug!("Nothing cached for unusable email {:?}", email);
            return;
        };
        let mut cache = self.tier_cache.write().await;
        if cache.remove(&email).is_some() {
            info!("Invalidated cached tier for {}", email);
        }
    }

    /// Clear the entire cache
    pub async fn clear_cache(&self) {
        let mut cache = self.tier_cache.write().await;
        let count = cache.len();
        cache.clear();
        info!("Cleared {} cached tier entries", count);
    }

    /// Get cache statistics as (total, still valid)
    pub async fn cache_stats(&self) -> (usize, usize) {
        let cache = self.tier_cache.read().await;
        let now = chrono::Utc::now().timestamp();
        let total = cache.len();
        let valid = cache
            .values()
            .filter(|c| now - c.cached_at < self.cache_duration_secs)
            .count();
        (total, valid)
    }
}
