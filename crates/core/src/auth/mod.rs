//! Caller identity and role scoping.
//!
//! Authentication happens outside the ledger. Every ledger call receives an
//! already verified [`Caller`], and the role decides what the caller may
//! record and which transactions it may read.

use lifeline_shared::types::ActorId;
use serde::{Deserialize, Serialize};

use crate::ledger::store::HistoryQuery;
use crate::ledger::types::{Direction, Transaction};

/// Roles issued by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform administrator, sees everything.
    Admin,
    /// Blood bank or transplant organisation that records movements.
    Organisation,
    /// Donor, sees its own intakes.
    Donor,
    /// Hospital, sees dispenses made to it.
    Hospital,
}

impl Role {
    /// Returns true if this role can record transactions.
    #[must_use]
    pub const fn can_record(&self) -> bool {
        matches!(self, Self::Admin | Self::Organisation)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Organisation => write!(f, "organisation"),
            Self::Donor => write!(f, "donor"),
            Self::Hospital => write!(f, "hospital"),
        }
    }
}

/// Verified identity of whoever invokes a ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Actor id issued by the identity provider.
    pub actor_id: ActorId,
    /// Role of the actor.
    pub role: Role,
}

impl Caller {
    /// Creates a caller.
    #[must_use]
    pub fn new(actor_id: impl Into<String>, role: Role) -> Self {
        Self {
            actor_id: ActorId::new(actor_id),
            role,
        }
    }

    /// Returns true if `tx` is within this caller's visibility scope.
    #[must_use]
    pub fn can_see(&self, tx: &Transaction) -> bool {
        let me = self.actor_id.as_str();
        match self.role {
            Role::Admin => true,
            Role::Organisation => tx.recorded_by == self.actor_id,
            Role::Donor => {
                tx.direction == Direction::In && tx.counterparty.donor_ref() == Some(me)
            }
            Role::Hospital => {
                tx.direction == Direction::Out && tx.counterparty.hospital_ref() == Some(me)
            }
        }
    }

    /// Narrows `query` to this caller's scope.
    ///
    /// Returns `false` when the caller's own filters already exclude
    /// everything it may see, e.g. a donor asking for dispenses.
    #[must_use]
    pub fn restrict(&self, query: &mut HistoryQuery) -> bool {
        let me = self.actor_id.as_str().to_string();
        match self.role {
            Role::Admin => true,
            Role::Organisation => {
                query.recorded_by = Some(self.actor_id.clone());
                true
            }
            Role::Donor => {
                query.donor_ref = Some(me);
                narrow_direction(query, Direction::In)
            }
            Role::Hospital => {
                query.hospital_ref = Some(me);
                narrow_direction(query, Direction::Out)
            }
        }
    }
}

fn narrow_direction(query: &mut HistoryQuery, direction: Direction) -> bool {
    match query.direction {
        Some(requested) if requested != direction => false,
        _ => {
            query.direction = Some(direction);
            true
        }
    }
}
