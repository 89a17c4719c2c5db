//! Connection request lifecycle.
//!
//! ```text
//! NONE ──request──▶ PENDING ──accept──▶ ACCEPTED
//!                      │
//!                      └────reject──▶ REJECTED ──request (replaces row)──▶ PENDING
//! ```
//!
//! These functions decide transitions from the row currently stored for a
//! pair of users. They perform no I/O; the data layer applies the plan.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ConnectionStatus;

/// The stored connection between two users, reduced to what transitions need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub status: ConnectionStatus,
}

impl Edge {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionAction {
    Accept,
    Reject,
}

impl ConnectionAction {
    pub fn target_status(self) -> ConnectionStatus {
        match self {
            Self::Accept => ConnectionStatus::Accepted,
            Self::Reject => ConnectionStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot connect with yourself")]
    SelfConnection,
    #[error("connection already exists")]
    AlreadyExists,
    #[error("no connection exists between these users")]
    NoConnection,
    #[error("no pending connection request found from this user")]
    NoPendingRequest,
    #[error("connection request was already answered")]
    AlreadyAnswered,
}

/// What a new request must do to the stored rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPlan {
    Create,
    /// Delete the rejected row, then create a fresh pending one.
    ReplaceRejected(Uuid),
}

pub fn plan_request(
    actor: Uuid,
    target: Uuid,
    existing: Option<&Edge>,
) -> Result<RequestPlan, TransitionError> {
    if actor == target {
        return Err(TransitionError::SelfConnection);
    }
    match existing {
        None => Ok(RequestPlan::Create),
        Some(edge) if edge.status == ConnectionStatus::Rejected => {
            Ok(RequestPlan::ReplaceRejected(edge.id))
        }
        Some(_) => Err(TransitionError::AlreadyExists),
    }
}

/// Validate an accept/reject by `actor` on a request sent by `counterpart`.
/// Returns the status the row must move to.
pub fn plan_response(
    actor: Uuid,
    counterpart: Uuid,
    existing: Option<&Edge>,
    action: ConnectionAction,
) -> Result<ConnectionStatus, TransitionError> {
    if actor == counterpart {
        return Err(TransitionError::SelfConnection);
    }
    let edge = existing.ok_or(TransitionError::NoConnection)?;
    let is_receiver = edge.sender_id == counterpart && edge.receiver_id == actor;
    if !is_receiver || edge.status != ConnectionStatus::Pending {
        return Err(TransitionError::NoPendingRequest);
    }
    Ok(action.target_status())
}

/// Either participant may delete a connection, in any state.
pub fn may_delete(actor: Uuid, edge: &Edge) -> bool {
    edge.involves(actor)
}
