//! The room-level error taxonomy (§7): one variant family per error kind,
//! each carrying the structured context needed to render a `gameError` /
//! `lobbyError` string without call-site string matching.

use crate::rules::MeldKind;
use crate::tile::TileKind;
use thiserror::Error;

/// Errors a room actor can produce while processing one inbound message.
///
/// Variants are grouped by kind per §7: `Transport` and `Authorisation`
/// never mutate state; `Phase` and `Rule` roll back the in-flight action and
/// restart the acting seat's timer; `Internal` ends the round as a draw and
/// destroys the room.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("malformed message: {reason}")]
    Transport { reason: String },

    #[error("unknown message tag: {tag}")]
    UnknownTag { tag: String },

    #[error("seat {seat} is not a member of this room")]
    NotAMember { seat: u8 },

    #[error("only the host may {action}")]
    NotHost { action: String },

    #[error("it is not seat {seat}'s turn")]
    NotYourTurn { seat: u8 },

    #[error("action {action} is not valid in phase {phase}")]
    WrongPhase { action: String, phase: String },

    #[error("seat {seat} has an action already in flight")]
    ActionInFlight { seat: u8 },

    #[error("seat {seat} cannot claim {attempted:?}: rule feasibility check failed")]
    IllegalClaim { seat: u8, attempted: MeldKind },

    #[error("{kind:?} cannot be discarded: not held")]
    TileNotHeld { kind: TileKind },

    #[error("hand does not contain a winning decomposition")]
    NoWinningHand,

    #[error("room {room_id} not found")]
    RoomNotFound { room_id: String },

    #[error("room {room_id} is full")]
    RoomFull { room_id: String },

    #[error("incorrect password for room {room_id}")]
    WrongPassword { room_id: String },

    #[error("internal invariant violated: {detail}")]
    Internal { detail: String },
}

impl RoomError {
    /// Whether this error should roll back state and restart the acting
    /// seat's timer (Phase/Rule kinds), as opposed to being purely
    /// rejectable with no timer interaction (Transport/Authorisation) or
    /// fatal (Internal).
    pub fn restarts_timer(&self) -> bool {
        matches!(
            self,
            RoomError::WrongPhase { .. }
                | RoomError::NotYourTurn { .. }
                | RoomError::IllegalClaim { .. }
                | RoomError::TileNotHeld { .. }
                | RoomError::NoWinningHand
        )
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, RoomError::Internal { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_and_rule_errors_restart_the_timer() {
        assert!(RoomError::NotYourTurn { seat: 1 }.restarts_timer());
        assert!(RoomError::NoWinningHand.restarts_timer());
        assert!(!RoomError::NotHost {
            action: "start the match".into()
        }
        .restarts_timer());
    }

    #[test]
    fn internal_errors_are_flagged() {
        assert!(RoomError::Internal {
            detail: "tile count mismatch".into()
        }
        .is_internal());
        assert!(!RoomError::RoomFull {
            room_id: "abc".into()
        }
        .is_internal());
    }
}
