//! Nearby-cleaner search and ranking for last-minute dispatch.
//!
//! Candidates come from a `CleanerDirectory` (the SQL impl filters in the
//! database — active, non-frozen cleaners with service-area coordinates on
//! file); admission and ordering are a pure function over the loaded rows so
//! the ranking rules test without a datastore.

use std::cmp::Ordering;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::queries;
use crate::defaults::DEFAULT_SERVICE_AREA_RADIUS_MILES;
use crate::services::geo::{
    haversine_distance_meters, meters_to_miles, miles_to_meters, round_miles_1dp,
};
use crate::types::{Cleaner, VERIFICATION_VERIFIED};

/// Search options
#[derive(Debug, Clone)]
pub struct FinderOptions {
    /// Verified businesses sort strictly before everyone else
    pub prioritize_verified: bool,
}

impl Default for FinderOptions {
    fn default() -> Self {
        Self {
            prioritize_verified: true,
        }
    }
}

/// A cleaner admitted to the dispatch set
#[derive(Debug, Clone)]
pub struct CandidateCleaner {
    pub cleaner: Cleaner,
    pub distance_meters: f64,
    /// Display distance, one decimal place
    pub distance_miles: f64,
    pub is_verified_business: bool,
}

/// Directory of cleaners eligible for dispatch consideration.
#[async_trait]
pub trait CleanerDirectory: Send + Sync {
    /// Active, non-frozen cleaners with service-area coordinates on file.
    async fn dispatchable_cleaners(&self) -> Result<Vec<Cleaner>>;
}

pub struct PgCleanerDirectory {
    pool: PgPool,
}

impl PgCleanerDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CleanerDirectory for PgCleanerDirectory {
    async fn dispatchable_cleaners(&self) -> Result<Vec<Cleaner>> {
        queries::cleaner::list_dispatchable_cleaners(&self.pool).await
    }
}

/// Verified business: owner-flagged, verification passed, and the cleaner has
/// not opted out of highlighting (absent opt-in counts as in).
fn is_verified_business(cleaner: &Cleaner) -> bool {
    cleaner.is_business_owner
        && cleaner.business_verification_status.as_deref() == Some(VERIFICATION_VERIFIED)
        && cleaner.business_highlight_opt_in != Some(false)
}

/// The cleaner's own travel radius, defaulting to 30 miles when absent or
/// unparseable.
fn service_radius_miles(cleaner: &Cleaner) -> f64 {
    cleaner
        .service_area_radius_miles
        .as_deref()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|r| r.is_finite() && *r > 0.0)
        .unwrap_or(DEFAULT_SERVICE_AREA_RADIUS_MILES)
}

/// Stored coordinates are plain decimal strings; anything that does not parse
/// to a finite number disqualifies the candidate without erroring.
fn parse_coordinate(value: Option<&str>) -> Option<f64> {
    value?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Rank cleaners near a home. Pure — admission and ordering only.
///
/// A candidate is admitted when it is simultaneously within the search's
/// notification radius AND within its own service-area radius. The two checks
/// stay separate on purpose: they are distinct business concepts (how far the
/// platform searches vs. how far the cleaner will travel), even though today
/// they reduce to a `min`.
pub fn rank_nearby_cleaners(
    home_lat: f64,
    home_lon: f64,
    radius_miles: f64,
    cleaners: Vec<Cleaner>,
    options: &FinderOptions,
) -> Vec<CandidateCleaner> {
    let notification_radius_m = miles_to_meters(radius_miles);

    let mut admitted: Vec<CandidateCleaner> = Vec::new();
    for cleaner in cleaners {
        let Some(lat) = parse_coordinate(cleaner.service_area_latitude.as_deref()) else {
            continue;
        };
        let Some(lon) = parse_coordinate(cleaner.service_area_longitude.as_deref()) else {
            continue;
        };
        let Some(distance_meters) = haversine_distance_meters(home_lat, home_lon, lat, lon) else {
            continue;
        };

        let within_notification_radius = distance_meters <= notification_radius_m;
        let within_service_area =
            distance_meters <= miles_to_meters(service_radius_miles(&cleaner));
        if !(within_notification_radius && within_service_area) {
            continue;
        }

        admitted.push(CandidateCleaner {
            distance_miles: round_miles_1dp(meters_to_miles(distance_meters)),
            distance_meters,
            is_verified_business: is_verified_business(&cleaner),
            cleaner,
        });
    }

    // Stable sorts: equal distances keep insertion order.
    if options.prioritize_verified {
        admitted.sort_by(|a, b| {
            b.is_verified_business
                .cmp(&a.is_verified_business)
                .then(by_distance(a, b))
        });
    } else {
        admitted.sort_by(by_distance);
    }

    admitted
}

fn by_distance(a: &CandidateCleaner, b: &CandidateCleaner) -> Ordering {
    a.distance_meters
        .partial_cmp(&b.distance_meters)
        .unwrap_or(Ordering::Equal)
}

/// Loads candidates through the directory and ranks them.
pub struct NearbyCleanerFinder {
    directory: Arc<dyn CleanerDirectory>,
}

impl NearbyCleanerFinder {
    pub fn new(directory: Arc<dyn CleanerDirectory>) -> Self {
        Self { directory }
    }

    /// An empty result is a valid outcome; only directory failures propagate.
    pub async fn find_nearby(
        &self,
        home_lat: f64,
        home_lon: f64,
        radius_miles: f64,
        options: &FinderOptions,
    ) -> Result<Vec<CandidateCleaner>> {
        let cleaners = self.directory.dispatchable_cleaners().await?;
        Ok(rank_nearby_cleaners(
            home_lat, home_lon, radius_miles, cleaners, options,
        ))
    }
}
