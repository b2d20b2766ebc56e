//! Business pricing configuration provider.
//!
//! Pricing settings are operator-managed and may legitimately be partial —
//! consumers apply their own defaults to absent fields rather than treating
//! a missing value as an error.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Last-minute dispatch section of the pricing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMinuteConfig {
    /// How far out to notify cleaners, in miles. Defaulted by the consumer
    /// (25 miles) when unset.
    pub notification_radius_miles: Option<f64>,
}

#[async_trait]
pub trait PricingProvider: Send + Sync {
    async fn last_minute(&self) -> Result<LastMinuteConfig>;
}

// =============================================================================
// PgPricingProvider — reads the pricing_settings row
// =============================================================================

pub struct PgPricingProvider {
    pool: PgPool,
}

impl PgPricingProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PricingProvider for PgPricingProvider {
    async fn last_minute(&self) -> Result<LastMinuteConfig> {
        let radius: Option<Option<f64>> = sqlx::query_scalar(
            "SELECT last_minute_notification_radius_miles FROM pricing_settings LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(LastMinuteConfig {
            notification_radius_miles: radius.flatten(),
        })
    }
}

// =============================================================================
// StaticPricingProvider — fixed config (tests / dev)
// =============================================================================

pub struct StaticPricingProvider(pub LastMinuteConfig);

#[async_trait]
impl PricingProvider for StaticPricingProvider {
    async fn last_minute(&self) -> Result<LastMinuteConfig> {
        Ok(self.0.clone())
    }
}
