//! ============================================================================
//! Subscription Checker - Tier lookup against the subscriber database
//! ============================================================================
//! Resolves a principal to the subscription tier its stored record grants
//! right now. No record means free.
//! ============================================================================

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use super::types::SubscriptionTier;
use crate::db::{SubscriberDb, SubscriberRecord};
use crate::types::Principal;

/// Reads subscriber records and determines the effective tier
pub struct SubscriptionChecker {
    db: Arc<SubscriberDb>,
}

impl SubscriptionChecker {
    pub fn new(db: Arc<SubscriberDb>) -> Self {
        Self { db }
    }

    /// Get the stored subscriber record for an email
    pub fn get_subscriber(&self, email: &str) -> Result<Option<SubscriberRecord>> {
        self.db.get_subscriber(email)
    }

    /// Effective tier for an email at the current time
    pub fn tier_for_email(&self, email: &str) -> Result<SubscriptionTier> {
        let now = chrono::Utc::now().timestamp();

        match self.get_subscriber(email)? {
            Some(record) => {
                let tier = record.effective_tier(now);
                debug!(
                    "Subscriber {}: stored {} ({}), effective {}",
                    record.email, record.tier, record.status, tier
                );
                Ok(tier)
            }
            None => {
                debug!("No subscriber record for {}, using free tier", email);
                Ok(SubscriptionTier::Free)
            }
        }
    }

    /// Effective tier for a principal; admins see everything
    pub fn tier_for_principal(&self, principal: &Principal) -> Result<SubscriptionTier> {
        if principal.is_admin() {
            return Ok(SubscriptionTier::Vip);
        }
        self.tier_for_email(&principal.email)
    }

    /// The underlying database handle
    pub fn db(&self) -> &Arc<SubscriberDb> {
        &self.db
    }
}
