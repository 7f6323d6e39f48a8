//! Closed enum sets persisted as text columns.
//!
//! Roles, ticket statuses and priorities are fixed vocabularies on the wire
//! and in the database. Modelling them as enums with diesel `Text` mappings
//! means an out-of-set value can neither be parsed from a request nor loaded
//! from a row.

use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use std::io::Write;

// ============================================================================
// USER ROLE
// ============================================================================

/// Account role. Fixed at registration; there is no role-change operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Admin,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Customer
    }
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
        }
    }
}

impl ToSql<Text, Pg> for UserRole {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for UserRole {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = std::str::from_utf8(bytes.as_bytes())?;
        value.parse().map_err(|e: String| e.into())
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

// ============================================================================
// TICKET STATUS
// ============================================================================

/// Lifecycle state of a ticket. New tickets always start `Open`; only admins
/// may move a ticket between states, in any order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl Default for TicketStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }
}

impl ToSql<Text, Pg> for TicketStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for TicketStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = std::str::from_utf8(bytes.as_bytes())?;
        value.parse().map_err(|e: String| e.into())
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            _ => Err(format!("Unknown ticket status: {}", s)),
        }
    }
}

// ============================================================================
// TICKET PRIORITY
// ============================================================================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl ToSql<Text, Pg> for TicketPriority {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for TicketPriority {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = std::str::from_utf8(bytes.as_bytes())?;
        value.parse().map_err(|e: String| e.into())
    }
}

impl std::fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TicketPriority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(format!("Unknown ticket priority: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            TicketStatus::Open,
            TicketStatus::InProgress,
            TicketStatus::Resolved,
            TicketStatus::Closed,
        ] {
            assert_eq!(status.as_str().parse::<TicketStatus>(), Ok(status));
        }
    }

    #[test]
    fn status_rejects_values_outside_the_set() {
        assert!("pending".parse::<TicketStatus>().is_err());
        assert!("OPEN".parse::<TicketStatus>().is_err());
        assert!("".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn priority_round_trips_through_text() {
        for priority in [
            TicketPriority::Low,
            TicketPriority::Medium,
            TicketPriority::High,
            TicketPriority::Urgent,
        ] {
            assert_eq!(priority.as_str().parse::<TicketPriority>(), Ok(priority));
        }
    }

    #[test]
    fn role_parses_exactly_two_values() {
        assert_eq!("customer".parse::<UserRole>(), Ok(UserRole::Customer));
        assert_eq!("admin".parse::<UserRole>(), Ok(UserRole::Admin));
        assert!("superadmin".parse::<UserRole>().is_err());
    }

    #[test]
    fn serde_uses_snake_case_words() {
        assert_eq!(
            serde_json::to_string(&TicketStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::from_str::<TicketPriority>("\"urgent\"").unwrap(),
            TicketPriority::Urgent
        );
        assert_eq!(
            serde_json::to_string(&UserRole::Customer).unwrap(),
            "\"customer\""
        );
    }
}
