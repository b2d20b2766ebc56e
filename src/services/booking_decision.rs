//! Booking decision engine.
//!
//! The only branching business rule in the booking flow, kept as a pure
//! function of the preferred-cleaner flag. The caller resolves that flag via
//! `PreferredCleanerRegistry::is_preferred` and performs the side effects the
//! decision names (pending-request row or immediate assignment), so this
//! function stays exhaustively testable without persistence or notification
//! doubles.

use crate::types::{BookingAction, BookingDecision};

pub const DIRECT_BOOKING_MESSAGE: &str =
    "Job booked successfully! As a preferred cleaner, no approval was needed.";
pub const REQUEST_APPROVAL_MESSAGE: &str = "Request sent to the client for approval";

/// Decide the booking flow for a cleaner requesting an appointment.
pub fn decide(is_preferred_cleaner: bool) -> BookingDecision {
    if is_preferred_cleaner {
        BookingDecision {
            action: BookingAction::DirectBooking,
            create_pending_request: false,
            assign_immediately: true,
            message: DIRECT_BOOKING_MESSAGE.to_string(),
        }
    } else {
        BookingDecision {
            action: BookingAction::RequestApproval,
            create_pending_request: true,
            assign_immediately: false,
            message: REQUEST_APPROVAL_MESSAGE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The input domain is two values; cover both exhaustively.

    #[test]
    fn test_preferred_cleaner_books_directly() {
        let decision = decide(true);
        assert_eq!(decision.action, BookingAction::DirectBooking);
        assert!(!decision.create_pending_request);
        assert!(decision.assign_immediately);
        assert_eq!(decision.message, DIRECT_BOOKING_MESSAGE);
    }

    #[test]
    fn test_non_preferred_cleaner_requests_approval() {
        let decision = decide(false);
        assert_eq!(decision.action, BookingAction::RequestApproval);
        assert!(decision.create_pending_request);
        assert!(!decision.assign_immediately);
        assert_eq!(decision.message, REQUEST_APPROVAL_MESSAGE);
    }

    #[test]
    fn test_decision_is_deterministic() {
        for _ in 0..10 {
            assert_eq!(decide(true), decide(true));
            assert_eq!(decide(false), decide(false));
        }
    }

    #[test]
    fn test_flags_never_agree() {
        // create_pending_request and assign_immediately are mutually exclusive
        for preferred in [true, false] {
            let decision = decide(preferred);
            assert_ne!(decision.create_pending_request, decision.assign_immediately);
        }
    }
}
