//! Status normalization and transition significance.
//!
//! Providers disagree on status vocabulary ("airborne", "in flight",
//! "cancelled", ...), so classification is keyword based rather than a
//! strict enum mapping. The significance check is the single gate deciding
//! whether a transition notifies recipients.

use contrail_common::types::{FlightStatus, MessageType};

/// Map a raw provider status string (or webhook event tag) to a canonical
/// status. Unrecognized vocabulary defaults to `Scheduled` after a debug
/// log, never an error.
pub fn normalize(raw: &str) -> FlightStatus {
    let s = raw.to_lowercase();

    if s.contains("cancel") {
        FlightStatus::Canceled
    } else if s.contains("delay") || s.contains("postponed") {
        FlightStatus::Delayed
    } else if s.contains("arriv") || s.contains("landed") {
        FlightStatus::Arrived
    } else if s.contains("en route")
        || s.contains("en-route")
        || s.contains("enroute")
        || s.contains("in flight")
        || s.contains("in_air")
        || s.contains("in air")
        || s.contains("cruis")
    {
        FlightStatus::EnRoute
    } else if s.contains("depart") || s.contains("airborne") || s.contains("takeoff") {
        FlightStatus::Departed
    } else {
        tracing::debug!(raw, "Unrecognized provider status, defaulting to scheduled");
        FlightStatus::Scheduled
    }
}

/// Position along the forward lifecycle. `Delayed` occupies the scheduled
/// rung (it notifies without advancing), `Canceled` has no position.
fn lifecycle_rank(status: FlightStatus) -> Option<u8> {
    match status {
        FlightStatus::Scheduled | FlightStatus::Delayed => Some(0),
        FlightStatus::Departed => Some(1),
        FlightStatus::EnRoute => Some(2),
        FlightStatus::Arrived => Some(3),
        FlightStatus::Canceled => None,
    }
}

/// Decide whether a transition is worth notifying about.
///
/// False if equal; true unconditionally for a move into `Canceled`; true for
/// a move into `Delayed` unless the flight is already canceled; true for a
/// strictly forward move along [scheduled, departed, en_route, arrived];
/// false otherwise — backward and lateral moves never notify.
pub fn is_significant(old: FlightStatus, new: FlightStatus) -> bool {
    if old == new {
        return false;
    }
    if new == FlightStatus::Canceled {
        return true;
    }
    if new == FlightStatus::Delayed {
        return old != FlightStatus::Canceled;
    }
    match (lifecycle_rank(old), lifecycle_rank(new)) {
        (Some(from), Some(to)) => to > from,
        _ => false,
    }
}

/// Message kind produced by a transition into `status`, if any.
pub fn message_type_for(status: FlightStatus) -> Option<MessageType> {
    match status {
        FlightStatus::Departed => Some(MessageType::Departure),
        FlightStatus::EnRoute => Some(MessageType::EnRoute),
        FlightStatus::Arrived => Some(MessageType::Arrival),
        FlightStatus::Delayed => Some(MessageType::Delay),
        FlightStatus::Canceled => Some(MessageType::Cancellation),
        FlightStatus::Scheduled => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use FlightStatus::*;

    const ALL: [FlightStatus; 6] = [Scheduled, Departed, EnRoute, Arrived, Delayed, Canceled];

    #[test]
    fn test_normalize_common_vocabulary() {
        assert_eq!(normalize("departed"), Departed);
        assert_eq!(normalize("Airborne"), Departed);
        assert_eq!(normalize("EN ROUTE"), EnRoute);
        assert_eq!(normalize("InFlight"), EnRoute);
        assert_eq!(normalize("cruising"), EnRoute);
        assert_eq!(normalize("landed"), Arrived);
        assert_eq!(normalize("arrived at gate"), Arrived);
        assert_eq!(normalize("cancelled"), Canceled);
        assert_eq!(normalize("canceled"), Canceled);
        assert_eq!(normalize("delayed 45m"), Delayed);
        assert_eq!(normalize("postponed"), Delayed);
    }

    #[test]
    fn test_normalize_delay_beats_departure_wording() {
        // "delayed departure" must classify as a delay, not a departure
        assert_eq!(normalize("delayed departure"), Delayed);
    }

    #[test]
    fn test_normalize_unknown_defaults_to_scheduled() {
        assert_eq!(normalize("expected"), Scheduled);
        assert_eq!(normalize(""), Scheduled);
        assert_eq!(normalize("??"), Scheduled);
    }

    #[test]
    fn test_same_status_never_significant() {
        for s in ALL {
            assert!(!is_significant(s, s), "{s} -> {s} must not notify");
        }
    }

    #[test]
    fn test_cancellation_always_significant() {
        for s in ALL {
            if s != Canceled {
                assert!(is_significant(s, Canceled), "{s} -> canceled must notify");
            }
        }
    }

    #[test]
    fn test_forward_moves_are_significant() {
        assert!(is_significant(Scheduled, Departed));
        assert!(is_significant(Scheduled, EnRoute));
        assert!(is_significant(Departed, EnRoute));
        assert!(is_significant(EnRoute, Arrived));
        assert!(is_significant(Scheduled, Arrived));
    }

    #[test]
    fn test_backward_moves_are_not_significant() {
        assert!(!is_significant(Departed, Scheduled));
        assert!(!is_significant(EnRoute, Departed));
        assert!(!is_significant(Arrived, Scheduled));
        assert!(!is_significant(Arrived, EnRoute));
    }

    #[test]
    fn test_delay_is_a_side_channel() {
        // Delay notifies unless the flight is already canceled...
        assert!(is_significant(Scheduled, Delayed));
        assert!(is_significant(Departed, Delayed));
        assert!(!is_significant(Canceled, Delayed));
        // ...and does not advance the lifecycle: delayed -> scheduled is lateral.
        assert!(!is_significant(Delayed, Scheduled));
        assert!(is_significant(Delayed, Departed));
    }

    #[test]
    fn test_canceled_is_terminal_for_lifecycle_moves() {
        assert!(!is_significant(Canceled, Departed));
        assert!(!is_significant(Canceled, Arrived));
        assert!(!is_significant(Canceled, Scheduled));
    }

    #[test]
    fn test_message_type_mapping() {
        assert_eq!(message_type_for(Departed), Some(MessageType::Departure));
        assert_eq!(message_type_for(EnRoute), Some(MessageType::EnRoute));
        assert_eq!(message_type_for(Arrived), Some(MessageType::Arrival));
        assert_eq!(message_type_for(Delayed), Some(MessageType::Delay));
        assert_eq!(message_type_for(Canceled), Some(MessageType::Cancellation));
        assert_eq!(message_type_for(Scheduled), None);
    }
}
