//! Review event types
//!
//! Review persistence itself lives in the platform API; the worker only
//! consumes the post-submission event to apply the preferred-cleaner side
//! effect.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const REVIEW_HOMEOWNER_TO_CLEANER: &str = "homeowner_to_cleaner";
pub const REVIEW_CLEANER_TO_HOMEOWNER: &str = "cleaner_to_homeowner";

/// brightnest.review.submitted payload — emitted after a review is stored
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSubmittedPayload {
    pub review_id: Uuid,
    /// "homeowner_to_cleaner" or "cleaner_to_homeowner"
    pub review_type: String,
    pub cleaner_id: Uuid,
    /// Absent for reviews not tied to a home
    pub home_id: Option<Uuid>,
    /// Tri-state: Some(true) set, Some(false) unset, None leave alone
    pub set_as_preferred: Option<bool>,
}

/// Reply to brightnest.review.submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSideEffectResponse {
    pub review_id: Uuid,
    /// True when the preferred registry was actually mutated
    pub preferred_updated: bool,
}
