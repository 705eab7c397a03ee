//! The room state machine (C5): phases, round lifecycle, turn sequencing,
//! and claim arbitration. `Room` is a plain struct with synchronous,
//! panic-free inherent methods; the server crate wraps one in a
//! `thespian` actor so that all mutation of a given room happens on a
//! single logical task (§5), the way the reference engine wraps its own
//! `GameState`/`MatchController` business logic in an actor proxy.

use crate::messages::{ActionAnnouncement, GameAction};
use crate::rules::{check_win, chi_options, MeldKind};
use crate::seat::{Meld, PendingClaim, Seat};
use crate::tile::{create_deck, shuffle, visual_sort, Tile, TileId, TileKind};
use rand::RngCore;
use std::collections::VecDeque;

/// Phases of the room state machine (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    WaitingForPlayers,
    Dealing,
    PlayerTurnStart,
    PlayerDrawn,
    AwaitingDiscard,
    TileDiscarded,
    AwaitingClaimsResolution,
    AwaitingPlayerClaimAction,
    ActionPendingChiChoice,
    RoundOver,
    GameOver,
}

#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub room_name: String,
    pub target_human_count: u8,
    pub fill_with_ai: bool,
    pub password: Option<String>,
    pub number_of_rounds: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinType {
    SelfDraw,
    Discard,
    Heaven,
}

/// The action a seat submits while it is `AwaitingPlayerClaimAction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimAction {
    DeclareWin,
    ClaimTriplet,
    ClaimQuad,
    ClaimRun { pair: (Tile, Tile) },
    Pass,
}

const HAND_SIZE: usize = 7;
const DEALER_HAND_SIZE: usize = 8;

use crate::error::RoomError;

/// One entry in the global claim-resolution queue: a seat and the kind it
/// is about to be offered (§4.4.3's "processed in priority/seat order").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClaimQueueEntry {
    seat: u8,
    priority: u8,
}

pub struct Room {
    pub id: String,
    pub settings: RoomSettings,
    pub seats: Vec<Seat>,
    pub phase: Phase,
    pub deck: Vec<Tile>,
    /// LIFO; `discard_pile.last()` is the most recently discarded tile.
    pub discard_pile: Vec<Tile>,
    pub current_player_index: Option<u8>,
    pub dealer_index: u8,
    pub last_discarder_index: Option<u8>,
    pub last_discarded_tile: Option<Tile>,
    pub last_drawn_tile: Option<Tile>,
    pub turn_number: u32,
    pub message_log: VecDeque<crate::messages::ChatMessage>,
    pub winner: Option<u8>,
    pub win_type: Option<WinType>,
    pub winning_tile: Option<Tile>,
    pub is_draw_game: bool,
    pub chi_options: Vec<(Tile, Tile)>,
    pub player_making_claim_decision: Option<u8>,
    pub current_round: u8,
    pub match_over: bool,
    pub next_round_countdown: Option<u32>,
    pub human_players_ready_for_next_round: Vec<u8>,

    claim_queue: Vec<ClaimQueueEntry>,
    /// Seats holding a live Win candidate against the current discard,
    /// recorded by [`Room::begin_claims`]. More than one entry is the
    /// multi-hu case (§4.4.3): each seat's successful Win is announced with
    /// `isMultiHuTarget` set, though the round still ends on whichever of
    /// them is first to act (the queue stays seat-ascending within a
    /// priority tier).
    multi_hu_candidate_seats: Vec<u8>,
    pending_announcements: Vec<ActionAnnouncement>,
    next_announcement_id: u64,
    action_in_flight: [bool; 4],
    rng: Box<dyn RngCore + Send>,
    next_meld_id: u32,
    next_chat_id: u64,
}

impl Room {
    pub fn new(id: String, settings: RoomSettings, rng: impl RngCore + Send + 'static) -> Self {
        Self {
            id,
            settings,
            seats: Vec::new(),
            phase: Phase::WaitingForPlayers,
            deck: Vec::new(),
            discard_pile: Vec::new(),
            current_player_index: None,
            dealer_index: 0,
            last_discarder_index: None,
            last_discarded_tile: None,
            last_drawn_tile: None,
            turn_number: 0,
            message_log: VecDeque::with_capacity(50),
            winner: None,
            win_type: None,
            winning_tile: None,
            is_draw_game: false,
            chi_options: Vec::new(),
            player_making_claim_decision: None,
            current_round: 0,
            match_over: false,
            next_round_countdown: None,
            human_players_ready_for_next_round: Vec::new(),
            claim_queue: Vec::new(),
            multi_hu_candidate_seats: Vec::new(),
            pending_announcements: Vec::new(),
            next_announcement_id: 0,
            action_in_flight: [false; 4],
            rng: Box::new(rng),
            next_meld_id: 0,
            next_chat_id: 0,
        }
    }

    pub fn push_chat(&mut self, sender_name: String, text: String, kind: &str) {
        let message = crate::messages::ChatMessage {
            id: self.next_chat_id,
            sender_name,
            text,
            timestamp: 0,
            kind: kind.to_string(),
        };
        self.next_chat_id += 1;
        self.message_log.push_front(message);
        if self.message_log.len() > 50 {
            self.message_log.pop_back();
        }
    }

    fn push_announcement(&mut self, text: String, player_id: u8, is_multi_hu_target: Option<bool>) {
        let id = self.next_announcement_id;
        self.next_announcement_id += 1;
        self.pending_announcements.push(ActionAnnouncement { text, player_id, id, is_multi_hu_target });
    }

    /// Takes every announcement queued since the last drain, for the server
    /// crate to broadcast as `ServerMessage::ActionAnnouncement`.
    pub fn drain_announcements(&mut self) -> Vec<ActionAnnouncement> {
        std::mem::take(&mut self.pending_announcements)
    }

    /// Applies one client- or AI-sourced [`GameAction`] as `seat`. The single
    /// seam both the server's human action handler and its AI-substitution
    /// loop dispatch through, so both paths see identical validation.
    pub fn apply_action(&mut self, seat: u8, action: GameAction) -> Result<(), RoomError> {
        match action {
            GameAction::DrawTile => self.draw_tile(seat),
            GameAction::DiscardTile { tile_id } => self.discard_tile(seat, tile_id),
            GameAction::DeclareConcealedQuad { kind } => self.declare_concealed_quad(seat, kind),
            GameAction::UpgradeTripletToQuad { kind } => self.upgrade_triplet_to_quad(seat, kind),
            GameAction::DeclareWin => {
                if self.phase == Phase::AwaitingPlayerClaimAction && self.player_making_claim_decision == Some(seat) {
                    self.submit_claim(seat, ClaimAction::DeclareWin)
                } else {
                    self.declare_self_draw_win(seat)
                }
            }
            GameAction::PassClaim => self.submit_claim(seat, ClaimAction::Pass),
            GameAction::ClaimTriplet { .. } => self.submit_claim(seat, ClaimAction::ClaimTriplet),
            GameAction::ClaimQuad { .. } => self.submit_claim(seat, ClaimAction::ClaimQuad),
            GameAction::ClaimRun { two_hand_tiles, .. } => {
                self.submit_claim(seat, ClaimAction::ClaimRun { pair: two_hand_tiles })
            }
            GameAction::ConfirmNextRound => self.confirm_next_round(seat),
            GameAction::RequestRematch => Ok(()),
        }
    }

    fn seat_mut(&mut self, index: u8) -> Result<&mut Seat, RoomError> {
        self.seats
            .iter_mut()
            .find(|s| s.index == index)
            .ok_or(RoomError::NotAMember { seat: index })
    }

    fn seat(&self, index: u8) -> Result<&Seat, RoomError> {
        self.seats
            .iter()
            .find(|s| s.index == index)
            .ok_or(RoomError::NotAMember { seat: index })
    }

    fn with_guard<F>(&mut self, seat: u8, action: &str, f: F) -> Result<(), RoomError>
    where
        F: FnOnce(&mut Self) -> Result<(), RoomError>,
    {
        let slot = self.action_in_flight.get_mut(seat as usize).ok_or(RoomError::NotAMember { seat })?;
        if *slot {
            return Err(RoomError::ActionInFlight { seat });
        }
        *slot = true;
        let result = f(self);
        self.action_in_flight[seat as usize] = false;
        result.map_err(|e| {
            tracing::warn!(seat, action, error = %e, "action rejected");
            e
        })
    }

    fn ensure_current_actor(&self, seat: u8) -> Result<(), RoomError> {
        if self.current_player_index != Some(seat) {
            return Err(RoomError::NotYourTurn { seat });
        }
        Ok(())
    }

    fn ensure_phase(&self, allowed: &[Phase]) -> Result<(), RoomError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(RoomError::WrongPhase {
                action: "submitted action".into(),
                phase: format!("{:?}", self.phase),
            })
        }
    }

    // ---- Round initialisation (§4.4.1) ----------------------------------

    /// Starts the match: seats at least `target_human_count`, fills the
    /// remainder with AI if `fill_with_ai`, chooses the dealer uniformly at
    /// random, resets scores, and deals round 1.
    pub fn start_match(&mut self) -> Result<(), RoomError> {
        if self.seats.len() < 4 {
            if self.settings.fill_with_ai {
                for index in 0..4u8 {
                    if !self.seats.iter().any(|s| s.index == index) {
                        self.seats.push(Seat::new_ai(index, format!("AI {}", index + 1)));
                    }
                }
            } else {
                return Err(RoomError::Internal {
                    detail: "cannot start: fewer than 4 seats and fillWithAI is false".into(),
                });
            }
        }
        self.seats.sort_by_key(|s| s.index);
        for seat in &mut self.seats {
            seat.score = 0;
        }
        self.dealer_index = (self.rng.next_u32() % 4) as u8;
        self.current_round = 1;
        self.deal_round();
        Ok(())
    }

    fn deal_round(&mut self) {
        self.phase = Phase::Dealing;
        for seat in &mut self.seats {
            seat.hand.clear();
            seat.melds.clear();
            seat.is_dealer = seat.index == self.dealer_index;
        }
        self.discard_pile.clear();
        self.winner = None;
        self.win_type = None;
        self.winning_tile = None;
        self.is_draw_game = false;
        self.chi_options.clear();
        self.player_making_claim_decision = None;
        self.claim_queue.clear();
        self.multi_hu_candidate_seats.clear();
        self.human_players_ready_for_next_round.clear();
        self.turn_number = 1;
        self.next_meld_id = 0;

        let mut deck = create_deck();
        shuffle(&mut deck, &mut *self.rng);
        self.deck = deck;

        for offset in 0..4u8 {
            let seat_index = (self.dealer_index + offset) % 4;
            let count = if seat_index == self.dealer_index {
                DEALER_HAND_SIZE
            } else {
                HAND_SIZE
            };
            let dealt: Vec<Tile> = self.deck.drain(self.deck.len() - count..).collect();
            let seat = self.seats.iter_mut().find(|s| s.index == seat_index).unwrap();
            seat.hand = dealt;
            visual_sort(&mut seat.hand);
        }

        self.current_player_index = Some(self.dealer_index);
        let dealer_hand_len = self.seat(self.dealer_index).unwrap().hand.len();
        if dealer_hand_len == DEALER_HAND_SIZE {
            self.last_drawn_tile = self.seat(self.dealer_index).unwrap().hand.last().copied();
            self.phase = Phase::AwaitingDiscard;
        } else {
            self.last_drawn_tile = None;
            self.phase = Phase::PlayerTurnStart;
        }
    }

    fn start_next_round(&mut self) {
        let dealer_kept = self.winner == Some(self.dealer_index) || self.is_draw_game;
        if !dealer_kept {
            self.dealer_index = (self.dealer_index + 1) % 4;
        }
        self.current_round += 1;
        if self.current_round > self.settings.number_of_rounds {
            self.phase = Phase::GameOver;
            self.match_over = true;
        } else {
            self.deal_round();
        }
    }

    // ---- Turn sequence (§4.4.2) ------------------------------------------

    pub fn draw_tile(&mut self, seat: u8) -> Result<(), RoomError> {
        self.with_guard(seat, "draw", |room| {
            room.ensure_current_actor(seat)?;
            room.ensure_phase(&[Phase::PlayerTurnStart])?;
            match room.deck.pop() {
                Some(tile) => {
                    room.last_drawn_tile = Some(tile);
                    room.seat_mut(seat)?.hand.push(tile);
                    room.phase = Phase::PlayerDrawn;
                    Ok(())
                }
                None => {
                    room.end_round_draw_game();
                    Ok(())
                }
            }
        })
    }

    pub fn discard_tile(&mut self, seat: u8, tile_id: TileId) -> Result<(), RoomError> {
        self.with_guard(seat, "discard", |room| {
            room.ensure_current_actor(seat)?;
            room.ensure_phase(&[Phase::PlayerDrawn, Phase::AwaitingDiscard])?;

            let seat_ref = room.seat_mut(seat)?;
            let position = match seat_ref.hand.iter().position(|t| t.id == tile_id) {
                Some(p) => p,
                None => {
                    let fallback = seat_ref.hand.first().map(|t| t.kind).unwrap_or(TileKind::SoldierBlack);
                    return Err(RoomError::TileNotHeld { kind: fallback });
                }
            };
            let discarded = seat_ref.hand.remove(position);
            visual_sort(&mut seat_ref.hand);

            room.discard_pile.push(discarded);
            room.last_discarded_tile = Some(discarded);
            room.last_discarder_index = Some(seat);
            room.last_drawn_tile = None;
            room.turn_number += 1;
            room.phase = Phase::TileDiscarded;

            room.begin_claims(seat, discarded);
            Ok(())
        })
    }

    pub fn declare_concealed_quad(&mut self, seat: u8, kind: TileKind) -> Result<(), RoomError> {
        self.with_guard(seat, "declare_concealed_quad", |room| {
            room.ensure_current_actor(seat)?;
            room.ensure_phase(&[Phase::PlayerTurnStart, Phase::PlayerDrawn])?;

            let hand = room.seat(seat)?.hand.clone();
            if crate::rules::can_declare_concealed_quad(&hand, None)
                .iter()
                .all(|&k| k != kind)
            {
                return Err(RoomError::IllegalClaim {
                    seat,
                    attempted: MeldKind::Quad,
                });
            }

            let (rest, removed) = crate::rules::remove_n(hand, kind, 4)
                .map_err(|_| RoomError::IllegalClaim { seat, attempted: MeldKind::Quad })?;
            let meld_id = room.next_meld_id;
            room.next_meld_id += 1;

            let s = room.seat_mut(seat)?;
            s.hand = rest;
            s.melds.push(Meld::concealed(meld_id, MeldKind::Quad, removed));

            room.draw_replacement_after_meld();
            Ok(())
        })
    }

    pub fn upgrade_triplet_to_quad(&mut self, seat: u8, kind: TileKind) -> Result<(), RoomError> {
        self.with_guard(seat, "upgrade_triplet_to_quad", |room| {
            room.ensure_current_actor(seat)?;
            room.ensure_phase(&[Phase::PlayerTurnStart, Phase::PlayerDrawn])?;

            let hand = room.seat(seat)?.hand.clone();
            let position = hand
                .iter()
                .position(|t| t.kind == kind)
                .ok_or(RoomError::IllegalClaim { seat, attempted: MeldKind::Quad })?;

            let s = room.seat_mut(seat)?;
            let meld = s
                .melds
                .iter_mut()
                .find(|m| m.kind == MeldKind::Triplet && m.tiles[0].kind == kind)
                .ok_or(RoomError::IllegalClaim { seat, attempted: MeldKind::Quad })?;
            let upgrading_tile = s.hand.remove(position);
            meld.tiles.push(upgrading_tile);
            meld.kind = MeldKind::Quad;

            room.draw_replacement_after_meld();
            Ok(())
        })
    }

    fn draw_replacement_after_meld(&mut self) {
        match self.deck.pop() {
            Some(tile) => {
                self.last_drawn_tile = Some(tile);
                if let Ok(seat) = self.seat_mut(self.current_player_index.unwrap()) {
                    seat.hand.push(tile);
                }
                self.phase = Phase::PlayerDrawn;
            }
            None => {
                self.last_drawn_tile = None;
                self.phase = Phase::AwaitingDiscard;
            }
        }
    }

    /// Self-draw win declaration, including the dealer's first-turn Heaven
    /// Win (§4.4.2).
    pub fn declare_self_draw_win(&mut self, seat: u8) -> Result<(), RoomError> {
        self.with_guard(seat, "declare_win", |room| {
            room.ensure_current_actor(seat)?;
            room.ensure_phase(&[Phase::PlayerTurnStart, Phase::PlayerDrawn, Phase::AwaitingDiscard])?;

            let s = room.seat(seat)?;
            let hand = s.hand.clone();
            let melds = s.melds.clone();
            if !check_win(&hand, &melds).win {
                return Err(RoomError::NoWinningHand);
            }

            let win_type = if room.turn_number == 1 && seat == room.dealer_index {
                WinType::Heaven
            } else {
                WinType::SelfDraw
            };
            let winning_tile = room.last_drawn_tile;
            let display_name = room.seat(seat)?.display_name.clone();
            room.end_round_win(seat, win_type, winning_tile);
            let verb = if win_type == WinType::Heaven { "a Heaven Win" } else { "a self-draw win" };
            room.push_announcement(format!("{display_name} declares {verb}"), seat, None);
            Ok(())
        })
    }

    // ---- Claim arbitration (§4.4.3) --------------------------------------

    fn begin_claims(&mut self, discarder: u8, discard: Tile) {
        let next_clockwise = (discarder + 1) % 4;
        let mut queue = Vec::new();
        let mut hu_candidate_seats = Vec::new();

        for seat in self.seats.clone() {
            if seat.index == discarder || !seat.is_actionable() {
                continue;
            }

            let mut effective_hand = seat.hand.clone();
            effective_hand.push(discard);
            let mut candidates = Vec::new();
            let mut best_priority = 0u8;

            if check_win(&effective_hand, &seat.melds).win {
                candidates.push(PendingClaim::Hu);
                best_priority = best_priority.max(3);
                hu_candidate_seats.push(seat.index);
            }
            if crate::rules::can_ming_gang_from_discard(&seat.hand, discard) {
                candidates.push(PendingClaim::MingGang);
                best_priority = best_priority.max(2);
            }
            if crate::rules::can_peng(&seat.hand, discard) {
                candidates.push(PendingClaim::Peng);
                best_priority = best_priority.max(2);
            }
            if seat.index == next_clockwise {
                let options = chi_options(&seat.hand, discard);
                if !options.is_empty() {
                    for &pair in &options {
                        candidates.push(PendingClaim::Chi { pair });
                    }
                    best_priority = best_priority.max(1);
                }
            }

            if !candidates.is_empty() {
                if let Ok(s) = self.seat_mut(seat.index) {
                    s.pending_claims = candidates;
                }
                queue.push(ClaimQueueEntry {
                    seat: seat.index,
                    priority: best_priority,
                });
            }
        }

        queue.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seat.cmp(&b.seat)));
        self.multi_hu_candidate_seats = hu_candidate_seats;

        if queue.is_empty() {
            self.advance_to_next_turn_actor(discarder);
            return;
        }

        self.claim_queue = queue;
        self.phase = Phase::AwaitingPlayerClaimAction;
        self.player_making_claim_decision = self.claim_queue.first().map(|e| e.seat);
        if let Some(seat) = self.player_making_claim_decision {
            if let Ok(s) = self.seat(seat) {
                if s.pending_claims.iter().any(|c| matches!(c, PendingClaim::Chi { .. })) {
                    self.chi_options = chi_options(&self.seat(seat).unwrap().hand, discard);
                }
            }
        }
    }

    fn advance_to_next_turn_actor(&mut self, discarder: u8) {
        self.clear_all_claims();
        self.current_player_index = Some((discarder + 1) % 4);
        self.last_discarded_tile = None;
        self.last_discarder_index = None;
        self.phase = Phase::PlayerTurnStart;
    }

    fn clear_all_claims(&mut self) {
        for seat in &mut self.seats {
            seat.pending_claims.clear();
        }
        self.claim_queue.clear();
        self.player_making_claim_decision = None;
        self.chi_options.clear();
    }

    pub fn submit_claim(&mut self, seat: u8, action: ClaimAction) -> Result<(), RoomError> {
        self.with_guard(seat, "claim", |room| {
            if room.phase != Phase::AwaitingPlayerClaimAction || room.player_making_claim_decision != Some(seat) {
                return Err(RoomError::WrongPhase {
                    action: "submit claim".into(),
                    phase: format!("{:?}", room.phase),
                });
            }

            let discard = room.last_discarded_tile.ok_or(RoomError::Internal {
                detail: "claim submitted with no pending discard".into(),
            })?;
            let discarder = room.last_discarder_index.ok_or(RoomError::Internal {
                detail: "claim submitted with no discarder on record".into(),
            })?;

            match action {
                ClaimAction::Pass => {
                    room.reject_current_claimant(seat, discarder);
                    Ok(())
                }
                ClaimAction::DeclareWin => {
                    if !room.seat(seat)?.pending_claims.contains(&PendingClaim::Hu) {
                        return Err(RoomError::IllegalClaim { seat, attempted: MeldKind::Pair });
                    }
                    let is_multi_hu = room.multi_hu_candidate_seats.len() > 1;
                    let display_name = room.seat(seat)?.display_name.clone();
                    room.end_round_win(seat, WinType::Discard, Some(discard));
                    room.push_announcement(
                        format!("{display_name} claims Win on the discard"),
                        seat,
                        Some(is_multi_hu),
                    );
                    Ok(())
                }
                ClaimAction::ClaimTriplet => {
                    if !room.seat(seat)?.pending_claims.contains(&PendingClaim::Peng) {
                        return Err(RoomError::IllegalClaim { seat, attempted: MeldKind::Triplet });
                    }
                    let (rest, removed) = crate::rules::remove_n(room.seat(seat)?.hand.clone(), discard.kind, 2)
                        .map_err(|_| RoomError::IllegalClaim { seat, attempted: MeldKind::Triplet })?;
                    room.execute_claim(seat, discarder, discard, MeldKind::Triplet, rest, removed)
                }
                ClaimAction::ClaimQuad => {
                    if !room.seat(seat)?.pending_claims.contains(&PendingClaim::MingGang) {
                        return Err(RoomError::IllegalClaim { seat, attempted: MeldKind::Quad });
                    }
                    let (rest, removed) = crate::rules::remove_n(room.seat(seat)?.hand.clone(), discard.kind, 3)
                        .map_err(|_| RoomError::IllegalClaim { seat, attempted: MeldKind::Quad })?;
                    room.execute_claim(seat, discarder, discard, MeldKind::Quad, rest, removed)
                }
                ClaimAction::ClaimRun { pair } => {
                    let valid = room
                        .seat(seat)?
                        .pending_claims
                        .iter()
                        .any(|c| matches!(c, PendingClaim::Chi { pair: p } if *p == pair || (p.0 == pair.1 && p.1 == pair.0)));
                    if !valid {
                        return Err(RoomError::IllegalClaim { seat, attempted: MeldKind::Run });
                    }
                    let mut rest = room.seat(seat)?.hand.clone();
                    for wanted in [pair.0, pair.1] {
                        let pos = rest
                            .iter()
                            .position(|t| t.id == wanted.id)
                            .ok_or(RoomError::IllegalClaim { seat, attempted: MeldKind::Run })?;
                        rest.remove(pos);
                    }
                    room.execute_claim(seat, discarder, discard, MeldKind::Run, rest, vec![pair.0, pair.1])
                }
            }
        })
    }

    fn reject_current_claimant(&mut self, seat: u8, discarder: u8) {
        if let Ok(s) = self.seat_mut(seat) {
            s.pending_claims.clear();
        }
        self.claim_queue.retain(|e| e.seat != seat);
        self.advance_claim_queue(discarder);
    }

    fn advance_claim_queue(&mut self, discarder: u8) {
        match self.claim_queue.first().copied() {
            Some(next) => {
                self.player_making_claim_decision = Some(next.seat);
                self.chi_options.clear();
                if let Ok(s) = self.seat(next.seat) {
                    if s.pending_claims.iter().any(|c| matches!(c, PendingClaim::Chi { .. })) {
                        if let Some(discard) = self.last_discarded_tile {
                            self.chi_options = chi_options(&s.hand, discard);
                        }
                    }
                }
            }
            None => self.advance_to_next_turn_actor(discarder),
        }
    }

    fn execute_claim(
        &mut self,
        seat: u8,
        discarder: u8,
        discard: Tile,
        kind: MeldKind,
        rest: Vec<Tile>,
        consumed_hand_tiles: Vec<Tile>,
    ) -> Result<(), RoomError> {
        if self.discard_pile.last() == Some(&discard) {
            self.discard_pile.pop();
        } else if let Some(pos) = self.discard_pile.iter().position(|t| *t == discard) {
            tracing::warn!(room = %self.id, "discard pile head mismatch on claim, splicing");
            self.discard_pile.remove(pos);
        }

        let mut sorted_consumed = consumed_hand_tiles;
        sorted_consumed.sort_by_key(|t| t.kind.order_value());
        let meld_id = self.next_meld_id;
        self.next_meld_id += 1;
        let meld = Meld::from_claim(meld_id, kind, sorted_consumed, discarder, discard);

        let s = self.seat_mut(seat)?;
        s.hand = rest;
        s.melds.push(meld);

        self.clear_all_claims();
        self.current_player_index = Some(seat);
        self.last_discarded_tile = None;
        self.last_discarder_index = None;

        if kind == MeldKind::Quad {
            self.draw_replacement_after_meld();
        } else {
            self.phase = Phase::AwaitingDiscard;
        }
        Ok(())
    }

    // ---- Round / match end (§4.4.5) --------------------------------------

    fn end_round_draw_game(&mut self) {
        self.is_draw_game = true;
        self.winner = None;
        self.win_type = None;
        self.clear_all_claims();
        self.phase = Phase::RoundOver;
        if self.current_round >= self.settings.number_of_rounds {
            self.phase = Phase::GameOver;
            self.match_over = true;
        } else {
            self.next_round_countdown = Some(10);
        }
    }

    fn end_round_win(&mut self, seat: u8, win_type: WinType, winning_tile: Option<Tile>) {
        self.winner = Some(seat);
        self.win_type = Some(win_type);
        self.winning_tile = winning_tile;
        self.is_draw_game = false;
        self.clear_all_claims();
        self.phase = Phase::RoundOver;
        if self.current_round >= self.settings.number_of_rounds {
            self.phase = Phase::GameOver;
            self.match_over = true;
        } else {
            self.next_round_countdown = Some(10);
        }
    }

    pub fn confirm_next_round(&mut self, seat: u8) -> Result<(), RoomError> {
        if self.phase != Phase::RoundOver {
            return Err(RoomError::WrongPhase {
                action: "confirm next round".into(),
                phase: format!("{:?}", self.phase),
            });
        }
        if !self.human_players_ready_for_next_round.contains(&seat) {
            self.human_players_ready_for_next_round.push(seat);
        }
        let all_online_humans_ready = self
            .seats
            .iter()
            .filter(|s| s.is_human && s.is_online)
            .all(|s| self.human_players_ready_for_next_round.contains(&s.index));
        if all_online_humans_ready {
            self.next_round_countdown = None;
            self.start_next_round();
        }
        Ok(())
    }

    /// Called by the server crate when the inter-round countdown elapses.
    pub fn expire_inter_round_timer(&mut self) {
        if self.phase == Phase::RoundOver {
            self.start_next_round();
        }
    }

    /// Called by the server crate when a human's turn timer elapses (§4.5).
    pub fn expire_turn_timer(&mut self, seat: u8) {
        match self.phase {
            Phase::PlayerTurnStart => {
                let _ = self.draw_tile(seat);
            }
            Phase::PlayerDrawn => {
                if let Some(tile) = self.last_drawn_tile {
                    let _ = self.discard_tile(seat, tile.id);
                }
            }
            Phase::AwaitingDiscard => {
                if let Ok(s) = self.seat(seat) {
                    if let Some(first) = s.hand.first().copied() {
                        let _ = self.discard_tile(seat, first.id);
                    }
                }
            }
            _ => {}
        }
    }

    /// Called by the server crate when a human's claim timer elapses (§4.5):
    /// equivalent to submitting `Pass`.
    pub fn expire_claim_timer(&mut self) {
        if let Some(seat) = self.player_making_claim_decision {
            let _ = self.submit_claim(seat, ClaimAction::Pass);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_pcg::Pcg64Mcg;
    use rand::SeedableRng;

    fn new_room(seed: u64, rounds: u8) -> Room {
        let mut room = Room::new(
            "room-1".into(),
            RoomSettings {
                room_name: "Test".into(),
                target_human_count: 1,
                fill_with_ai: true,
                password: None,
                number_of_rounds: rounds,
            },
            Pcg64Mcg::seed_from_u64(seed),
        );
        room.seats.push(Seat::new_human(0, "Alice".into(), 1));
        room.start_match().unwrap();
        room
    }

    #[test]
    fn dealing_gives_dealer_eight_and_others_seven() {
        let room = new_room(1, 4);
        for seat in &room.seats {
            let expected = if seat.index == room.dealer_index { 8 } else { 7 };
            assert_eq!(expected, seat.hand.len());
        }
        assert_eq!(56 - 4 * 7 - 1, room.deck.len());
    }

    #[test]
    fn dealer_starts_awaiting_discard() {
        let room = new_room(2, 4);
        assert_eq!(Phase::AwaitingDiscard, room.phase);
        assert_eq!(Some(room.dealer_index), room.current_player_index);
    }

    #[test]
    fn draw_then_discard_advances_turn_and_fills_claim_queue_or_passes_play() {
        let mut room = new_room(3, 4);
        let dealer = room.dealer_index;
        let tile = room.seats.iter().find(|s| s.index == dealer).unwrap().hand[0];
        room.discard_tile(dealer, tile.id).unwrap();

        assert!(matches!(
            room.phase,
            Phase::AwaitingPlayerClaimAction | Phase::PlayerTurnStart
        ));
        assert_eq!(Some(tile), room.last_discarded_tile.or(room.discard_pile.last().copied()));
    }

    #[test]
    fn guard_rejects_concurrent_action_from_same_seat() {
        let mut room = new_room(4, 4);
        let dealer = room.dealer_index;
        let seat_copy_hand = room.seats.iter().find(|s| s.index == dealer).unwrap().hand.clone();

        room.action_in_flight[dealer as usize] = true;
        let err = room.discard_tile(dealer, seat_copy_hand[0].id).unwrap_err();
        assert!(matches!(err, RoomError::ActionInFlight { .. }));
    }

    #[test]
    fn concealed_quad_draws_a_replacement_tile() {
        let mut room = new_room(5, 4);
        let dealer = room.dealer_index;

        // Force a hand with four of a kind so the quad is legal regardless of seed.
        let kind = TileKind::SoldierBlack;
        let quad_tiles: Vec<Tile> = create_deck().into_iter().filter(|t| t.kind == kind).collect();
        {
            let seat = room.seats.iter_mut().find(|s| s.index == dealer).unwrap();
            seat.hand.truncate(4);
            seat.hand.extend(quad_tiles);
        }
        let deck_len_before = room.deck.len();

        room.declare_concealed_quad(dealer, kind).unwrap();

        assert_eq!(1, room.seats.iter().find(|s| s.index == dealer).unwrap().melds.len());
        assert_eq!(deck_len_before - 1, room.deck.len());
        assert_eq!(Phase::PlayerDrawn, room.phase);
    }

    #[test]
    fn deck_exhaustion_on_draw_ends_round_as_a_draw_game() {
        let mut room = new_room(6, 1);
        room.phase = Phase::PlayerTurnStart;
        room.deck.clear();
        let actor = room.current_player_index.unwrap();

        room.draw_tile(actor).unwrap();

        assert!(room.is_draw_game);
        assert!(matches!(room.phase, Phase::RoundOver | Phase::GameOver));
    }

    #[test]
    fn claim_priority_orders_win_over_triplet_over_run() {
        let mut room = new_room(7, 4);
        let discarder = room.dealer_index;
        let win_seat = (discarder + 1) % 4;
        let triplet_seat = (discarder + 2) % 4;

        let discard_kind = TileKind::ElephantBlack;
        {
            let s = room.seats.iter_mut().find(|s| s.index == win_seat).unwrap();
            s.hand = tiles_of(TileKind::GeneralBlack, 2);
            s.hand.extend(tiles_of(TileKind::AdvisorBlack, 3));
            s.hand.extend(tiles_of(discard_kind, 2));
        }
        {
            let s = room.seats.iter_mut().find(|s| s.index == triplet_seat).unwrap();
            s.hand = tiles_of(discard_kind, 2);
        }

        let discard = tiles_of(discard_kind, 3)[2];
        room.phase = Phase::PlayerDrawn;
        room.current_player_index = Some(discarder);
        {
            let s = room.seats.iter_mut().find(|s| s.index == discarder).unwrap();
            if !s.hand.iter().any(|t| t.id == discard.id) {
                s.hand.push(discard);
            }
        }
        room.discard_tile(discarder, discard.id).unwrap();

        assert_eq!(Phase::AwaitingPlayerClaimAction, room.phase);
        assert_eq!(Some(win_seat), room.player_making_claim_decision);
    }

    fn tiles_of(kind: TileKind, n: usize) -> Vec<Tile> {
        create_deck().into_iter().filter(|t| t.kind == kind).take(n).collect()
    }
}
