//! ============================================================================
//! Database Types - Serializable records for redb storage
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::access::SubscriptionTier;
use crate::types::ParadoxError;

/// Subscriber record stored in the local database.
/// The paid tier only applies while the subscription is active and unexpired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberRecord {
    /// Normalized email, also the primary key
    pub email: String,
    pub tier: SubscriptionTier,
    pub status: SubscriptionStatus,
    /// Unix seconds; `None` means no end date
    pub expires_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SubscriberRecord {
    pub fn new(email: &str, tier: SubscriptionTier, now: i64) -> Self {
        Self {
            email: email.to_string(),
            tier,
            status: SubscriptionStatus::Active,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True once the end date has passed
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Tier that access checks should use at `now`
    pub fn effective_tier(&self, now: i64) -> SubscriptionTier {
        if self.status == SubscriptionStatus::Active && !self.is_expired(now) {
            self.tier
        } else {
            SubscriptionTier::Free
        }
    }

    /// Canceled, or past its end date
    pub fn is_lapsed(&self, now: i64) -> bool {
        self.status == SubscriptionStatus::Canceled || self.is_expired(now)
    }
}

/// Billing state of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Canceled,
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        };
        f.write_str(name)
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ParadoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(SubscriptionStatus::Active),
            "past-due" | "past_due" | "pastdue" => Ok(SubscriptionStatus::PastDue),
            "canceled" | "cancelled" => Ok(SubscriptionStatus::Canceled),
            other => Err(ParadoxError::UnknownStatus(other.to_string())),
        }
    }
}

/// Database statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbStats {
    pub total_subscribers: usize,
    /// Counted by effective tier
    pub tier_counts: HashMap<String, usize>,
    pub status_counts: HashMap<String, usize>,
    pub total_progress_entries: usize,
    pub completed_progress_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_tier_active() {
        let record = SubscriberRecord::new("a@example.com", SubscriptionTier::Vip, 100);
        assert_eq!(record.effective_tier(200), SubscriptionTier::Vip);
    }

    #[test]
    fn test_effective_tier_expired() {
        let mut record = SubscriberRecord::new("a@example.com", SubscriptionTier::Premium, 100);
        record.expires_at = Some(150);
        assert_eq!(record.effective_tier(149), SubscriptionTier::Premium);
        assert_eq!(record.effective_tier(150), SubscriptionTier::Free);
        assert!(record.is_lapsed(150));
    }

    #[test]
    fn test_effective_tier_inactive_statuses() {
        let mut record = SubscriberRecord::new("a@example.com", SubscriptionTier::Premium, 100);
        record.status = SubscriptionStatus::PastDue;
        assert_eq!(record.effective_tier(100), SubscriptionTier::Free);
        assert!(!record.is_lapsed(100));
        record.status = SubscriptionStatus::Canceled;
        assert_eq!(record.effective_tier(100), SubscriptionTier::Free);
        assert!(record.is_lapsed(100));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("Past-Due".parse::<SubscriptionStatus>().unwrap(), SubscriptionStatus::PastDue);
        assert_eq!("cancelled".parse::<SubscriptionStatus>().unwrap(), SubscriptionStatus::Canceled);
        assert!("paused".parse::<SubscriptionStatus>().is_err());
    }
}
