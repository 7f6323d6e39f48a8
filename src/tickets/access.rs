//! Authorization rules for tickets, comments and messages.
//!
//! Every rule is a pure predicate over the caller and the target row; the
//! handlers consult these before touching the store, so a denied request
//! performs no reads of protected data and no writes. Keeping the whole rule
//! set in one module (instead of per-endpoint role branching) makes it
//! testable on its own.

use uuid::Uuid;

use crate::core::shared::enums::UserRole;

use super::comments::TicketComment;
use super::Ticket;

/// The identity a request acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub role: UserRole,
}

impl Caller {
    pub fn new(id: Uuid, role: UserRole) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Admins see every ticket; customers only their own.
pub fn can_view_ticket(caller: &Caller, ticket: &Ticket) -> bool {
    caller.is_admin() || ticket.user_id == caller.id
}

/// Subject, description, category and priority follow visibility.
pub fn can_update_ticket_fields(caller: &Caller, ticket: &Ticket) -> bool {
    can_view_ticket(caller, ticket)
}

/// Status is the one field only admins may drive.
pub fn can_update_ticket_status(caller: &Caller) -> bool {
    caller.is_admin()
}

pub fn can_delete_ticket(caller: &Caller, ticket: &Ticket) -> bool {
    can_view_ticket(caller, ticket)
}

/// Comments are author-only: role is irrelevant, an admin cannot edit or
/// delete someone else's comment.
pub fn can_mutate_comment(caller: &Caller, comment: &TicketComment) -> bool {
    comment.user_id == caller.id
}

/// The message panel is gated exactly like the ticket itself, for both
/// listing and appending.
pub fn can_access_ticket_messages(caller: &Caller, ticket: &Ticket) -> bool {
    can_view_ticket(caller, ticket)
}
