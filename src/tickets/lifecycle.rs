//! Ticket lifecycle rules.
//!
//! Statuses form `open → in_progress → resolved → closed` in name only:
//! there is no transition-order guard, and no state is terminal. An admin may
//! move a ticket between any two statuses (reopening a closed ticket
//! included). The single enforced rule is the actor gate: a non-admin update
//! that carries a status is not rejected, the status is dropped and the
//! remaining fields go through.

use crate::core::shared::enums::{TicketPriority, TicketStatus};

use super::access::{self, Caller};

pub const INITIAL_STATUS: TicketStatus = TicketStatus::Open;

/// Validated field changes for one ticket. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketUpdate {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<TicketPriority>,
    pub status: Option<TicketStatus>,
}

impl TicketUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Apply the actor gate to a validated update.
pub fn sanitize_update(caller: &Caller, mut update: TicketUpdate) -> TicketUpdate {
    if !access::can_update_ticket_status(caller) {
        update.status = None;
    }
    update
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::enums::UserRole;
    use uuid::Uuid;

    fn update_with_status(status: TicketStatus) -> TicketUpdate {
        TicketUpdate {
            subject: Some("New subject".to_string()),
            status: Some(status),
            ..TicketUpdate::default()
        }
    }

    #[test]
    fn customer_status_is_silently_dropped_other_fields_survive() {
        let customer = Caller::new(Uuid::new_v4(), UserRole::Customer);
        let sanitized = sanitize_update(&customer, update_with_status(TicketStatus::Closed));
        assert_eq!(sanitized.status, None);
        assert_eq!(sanitized.subject.as_deref(), Some("New subject"));
    }

    #[test]
    fn admin_status_passes_through() {
        let admin = Caller::new(Uuid::new_v4(), UserRole::Admin);
        let sanitized = sanitize_update(&admin, update_with_status(TicketStatus::Resolved));
        assert_eq!(sanitized.status, Some(TicketStatus::Resolved));
    }

    #[test]
    fn any_transition_is_allowed_for_admins() {
        // No ordering guard: closed → open is as legal as open → closed.
        let admin = Caller::new(Uuid::new_v4(), UserRole::Admin);
        for target in [
            TicketStatus::Open,
            TicketStatus::InProgress,
            TicketStatus::Resolved,
            TicketStatus::Closed,
        ] {
            let sanitized = sanitize_update(&admin, update_with_status(target));
            assert_eq!(sanitized.status, Some(target));
        }
    }

    #[test]
    fn status_only_update_from_customer_becomes_empty() {
        let customer = Caller::new(Uuid::new_v4(), UserRole::Customer);
        let update = TicketUpdate {
            status: Some(TicketStatus::Resolved),
            ..TicketUpdate::default()
        };
        let sanitized = sanitize_update(&customer, update);
        assert!(sanitized.is_empty());
    }

    #[test]
    fn new_tickets_start_open() {
        assert_eq!(INITIAL_STATUS, TicketStatus::Open);
    }
}
