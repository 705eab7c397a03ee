//! Wire protocol types (§6): inbound client messages, the game-action sum
//! type they carry, outbound server messages, and the snapshot privacy
//! redaction that produces them.

use crate::rules::MeldKind;
use crate::seat::{Meld, PendingClaim, Seat};
use crate::tile::{Tile, TileKind};
use serde::{Deserialize, Serialize};

/// One inbound action dispatched through a `gameAction` message (§6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameAction {
    DrawTile,
    DiscardTile { tile_id: crate::tile::TileId },
    DeclareConcealedQuad { kind: TileKind },
    UpgradeTripletToQuad { kind: TileKind },
    ClaimTriplet { tile: Tile },
    ClaimQuad { tile: Tile },
    ClaimRun { two_hand_tiles: (Tile, Tile), discard: Tile },
    DeclareWin,
    PassClaim,
    ConfirmNextRound,
    RequestRematch,
}

/// Everything a connected socket can send (§6 inbound table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum ClientMessage {
    SetName { name: String },
    CreateRoom {
        room_name: String,
        target_humans: u8,
        fill_with_ai: bool,
        password: Option<String>,
        rounds: u8,
    },
    JoinRoom {
        room_id: String,
        password: Option<String>,
        player_name: String,
    },
    ListRooms,
    LobbyChat { text: String },
    LobbyLeave,
    GameAction { room_id: String, action: GameAction },
    GameChat { room_id: String, text: String },
    GameRequestStart { room_id: String },
    GameQuitRoom { room_id: String },
}

/// Summary line used in the `lobbyRoomList` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: String,
    pub name: String,
    pub players_count: u8,
    pub target_humans: u8,
    pub current_humans: u8,
    pub status: String,
    pub password_protected: bool,
    pub rounds: u8,
    pub host_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub sender_name: String,
    pub text: String,
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A redacted view of a [`Meld`] safe to include in any snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeldView {
    pub id: u32,
    pub kind: MeldKind,
    pub tiles: Vec<Tile>,
    pub is_open: bool,
}

impl From<&Meld> for MeldView {
    fn from(m: &Meld) -> Self {
        Self {
            id: m.id,
            kind: m.kind,
            tiles: m.tiles.clone(),
            is_open: m.is_open,
        }
    }
}

/// Redacted per-seat view embedded in a [`GameStateSnapshot`]: the receiving
/// seat's own hand is shown in full, every other seat's hand is replaced
/// tile-by-tile with opaque placeholders, except when `reveal_hands` is set
/// (RoundOver / GameOver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatView {
    pub index: u8,
    pub display_name: String,
    pub is_human: bool,
    pub hand_size: usize,
    /// Populated only for the receiving seat, or for every seat once
    /// `reveal_hands` is set on the enclosing snapshot.
    pub hand: Option<Vec<Tile>>,
    pub melds: Vec<MeldView>,
    pub is_dealer: bool,
    pub score: i32,
    pub is_online: bool,
    pub is_host: bool,
    pub pending_claims: Vec<PendingClaim>,
}

impl SeatView {
    /// Builds the view of `seat` as seen by `viewer_index`. `reveal_hands`
    /// overrides the normal redaction (RoundOver/GameOver).
    pub fn redacted_for(seat: &Seat, viewer_index: u8, reveal_hands: bool) -> Self {
        let owns_hand = seat.index == viewer_index || reveal_hands;
        Self {
            index: seat.index,
            display_name: seat.display_name.clone(),
            is_human: seat.is_human,
            hand_size: seat.hand.len(),
            hand: owns_hand.then(|| seat.hand.clone()),
            melds: seat.melds.iter().map(MeldView::from).collect(),
            is_dealer: seat.is_dealer,
            score: seat.score,
            is_online: seat.is_online,
            is_host: seat.is_host,
            pending_claims: seat.pending_claims.clone(),
        }
    }
}

/// Full per-socket game-state snapshot (`gameStateUpdate` payload, §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    pub room_id: String,
    pub phase: String,
    pub seats: Vec<SeatView>,
    pub discard_pile_top: Option<Tile>,
    pub current_player_index: Option<u8>,
    pub dealer_index: u8,
    pub turn_number: u32,
    pub chi_options: Vec<(Tile, Tile)>,
    pub player_making_claim_decision: Option<u8>,
    pub action_timer_remaining: Option<u32>,
    pub current_round: u8,
    pub number_of_rounds: u8,
    pub match_over: bool,
    pub next_round_countdown: Option<u32>,
    pub winner_seat: Option<u8>,
    pub is_draw_game: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionAnnouncement {
    pub text: String,
    pub player_id: u8,
    pub id: u64,
    pub is_multi_hu_target: Option<bool>,
}

/// Everything the server can send back (§6 outbound table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum ServerMessage {
    LobbyRoomList { rooms: Vec<RoomSummary> },
    LobbyChatMessage { message: ChatMessage },
    LobbyError { text: String },
    JoinedRoom {
        game_state: GameStateSnapshot,
        room_id: String,
        client_player_id: u8,
    },
    GameStateUpdate { state: GameStateSnapshot },
    GamePlayerLeft {
        player_id: u8,
        new_host_id: Option<u8>,
        message: Option<String>,
    },
    GameChatMessage { message: ChatMessage },
    GameError { text: String },
    ActionAnnouncement { announcement: ActionAnnouncement },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::create_deck;

    fn seat_with_hand(index: u8) -> Seat {
        let mut seat = Seat::new_human(index, format!("seat-{index}"), 1);
        seat.hand = create_deck().into_iter().take(7).collect();
        seat
    }

    #[test]
    fn owning_seat_sees_its_own_hand() {
        let seat = seat_with_hand(0);
        let view = SeatView::redacted_for(&seat, 0, false);
        assert_eq!(Some(seat.hand.clone()), view.hand);
        assert_eq!(7, view.hand_size);
    }

    #[test]
    fn other_seats_hand_is_hidden_outside_reveal() {
        let seat = seat_with_hand(2);
        let view = SeatView::redacted_for(&seat, 0, false);
        assert!(view.hand.is_none());
        assert_eq!(7, view.hand_size);
    }

    #[test]
    fn reveal_hands_exposes_every_seat() {
        let seat = seat_with_hand(2);
        let view = SeatView::redacted_for(&seat, 0, true);
        assert!(view.hand.is_some());
    }

    #[test]
    fn client_message_round_trips_through_json() {
        let msg = ClientMessage::GameAction {
            room_id: "r1".into(),
            action: GameAction::PassClaim,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }
}
