//! The lobby-facing actor wrapping [`xqmj::directory::RoomDirectory`].
//!
//! Mirrors the reference engine's `GameState` actor: a single struct with
//! business-logic methods in an inherent `impl`, and a `#[thespian::actor]`
//! impl exposing the operations the socket pump needs, all serialized on
//! one mailbox. Also keeps the registry of live [`ClientSessionProxy`]s so
//! that after a room mutation it can push redacted snapshots out to every
//! member's socket, the way `MatchController::broadcast` does in the
//! reference engine.
//!
//! Beyond that, this actor drives everything §4.5's timers and the AI
//! policy (C4) need a scheduler for: after any mutation that might hand
//! the turn or a claim decision to an AI-controlled or offline seat, it
//! schedules an `AiThink` timer and, once it fires, computes and applies
//! that seat's action itself; for seats staffed by a connected human it
//! schedules the matching turn/claim/inter-round real-time timeout.

use crate::session::ClientSessionProxy;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thespian::Actor;
use xqmj::ai;
use xqmj::directory::{RoomDirectory, SocketId};
use xqmj::error::RoomError;
use xqmj::messages::{GameAction, GameStateSnapshot, RoomSummary, SeatView, ServerMessage};
use xqmj::room::{Phase, Room, RoomSettings};
use xqmj::timers::{ai_think_bounds, TimerGenerations, TimerRole};

#[derive(Actor)]
pub struct DirectoryActor {
    directory: RoomDirectory,
    sessions: HashMap<SocketId, ClientSessionProxy>,
    names: HashMap<SocketId, String>,
    timers: HashMap<String, TimerGenerations>,
    /// The instant the room's current Turn or Claim timer will expire, kept
    /// only for the human-facing roles so `GameStateSnapshot.action_timer_remaining`
    /// can report a genuinely decremented value instead of a fixed ceiling.
    deadlines: HashMap<String, Instant>,
    /// A clone of this actor's own proxy, used to schedule a callback to
    /// itself once a spawned `tokio::time::delay_for` elapses. Set once by
    /// [`DirectoryActor::set_self`] right after the actor is spawned; every
    /// method below that schedules a timer assumes it is populated.
    self_proxy: Option<DirectoryActorProxy>,
}

impl DirectoryActor {
    pub fn new() -> Self {
        Self {
            directory: RoomDirectory::new(),
            sessions: HashMap::new(),
            names: HashMap::new(),
            timers: HashMap::new(),
            deadlines: HashMap::new(),
            self_proxy: None,
        }
    }

    fn snapshot_for(room: &Room, viewer: u8, remaining: Option<u32>) -> GameStateSnapshot {
        let reveal = matches!(room.phase, Phase::RoundOver | Phase::GameOver);
        GameStateSnapshot {
            room_id: room.id.clone(),
            phase: format!("{:?}", room.phase),
            seats: room
                .seats
                .iter()
                .map(|s| SeatView::redacted_for(s, viewer, reveal))
                .collect(),
            discard_pile_top: room.discard_pile.last().copied(),
            current_player_index: room.current_player_index,
            dealer_index: room.dealer_index,
            turn_number: room.turn_number,
            chi_options: room.chi_options.clone(),
            player_making_claim_decision: room.player_making_claim_decision,
            action_timer_remaining: remaining,
            current_round: room.current_round,
            number_of_rounds: room.settings.number_of_rounds,
            match_over: room.match_over,
            next_round_countdown: room.next_round_countdown,
            winner_seat: room.winner,
            is_draw_game: room.is_draw_game,
        }
    }

    /// The whole-second count down to this room's live Turn/Claim deadline,
    /// or `None` when neither timer is in flight (AI/offline seat acting,
    /// or the room is between turns).
    fn action_timer_remaining(&self, room_id: &str) -> Option<u32> {
        self.deadlines.get(room_id).map(|deadline| {
            let now = Instant::now();
            if *deadline > now {
                (*deadline - now).as_secs() as u32 + 1
            } else {
                0
            }
        })
    }

    async fn broadcast_room(&mut self, room_id: &str) {
        let targets: Vec<(SocketId, u8)> = match self.directory.room(room_id) {
            Some(room) => room.seats.iter().filter_map(|s| s.transport.map(|t| (t, s.index))).collect(),
            None => return,
        };
        let remaining = self.action_timer_remaining(room_id);

        for (socket, seat_index) in targets {
            let state = match self.directory.room(room_id) {
                Some(room) => Self::snapshot_for(room, seat_index, remaining),
                None => return,
            };
            if let Some(session) = self.sessions.get_mut(&socket) {
                let _ = session.push(ServerMessage::GameStateUpdate { state }).await;
            }
        }
    }

    async fn broadcast_announcements(&mut self, room_id: &str) {
        let announcements = match self.directory.room_mut(room_id) {
            Some(room) => room.drain_announcements(),
            None => return,
        };
        if announcements.is_empty() {
            return;
        }
        let targets: Vec<SocketId> = match self.directory.room(room_id) {
            Some(room) => room.seats.iter().filter_map(|s| s.transport).collect(),
            None => return,
        };
        for announcement in announcements {
            for &socket in &targets {
                if let Some(session) = self.sessions.get_mut(&socket) {
                    let _ = session
                        .push(ServerMessage::ActionAnnouncement { announcement: announcement.clone() })
                        .await;
                }
            }
        }
    }

    /// Runs after every mutation that can change who is supposed to act
    /// next: broadcasts any announcements the mutation queued, pushes the
    /// new state, then arranges for the next actor to actually be driven,
    /// whether that means starting a human-facing timeout or scheduling the
    /// AI-think delay ahead of an AI-substituted move (§4.5, §2 C5/C4).
    async fn after_mutation(&mut self, room_id: &str) {
        self.broadcast_announcements(room_id).await;
        self.broadcast_room(room_id).await;
        self.schedule_next(room_id).await;
    }

    /// Examines the room's phase and arranges whatever comes next: an
    /// inter-round countdown, a turn/claim timeout for a human actor, an
    /// AI-think delay for an AI-controlled or disconnected one, or an
    /// empty-room reclamation timer if no human is left online.
    async fn schedule_next(&mut self, room_id: &str) {
        let (phase, match_over, turn_actor, claim_actor) = match self.directory.room(room_id) {
            Some(room) => (room.phase, room.match_over, room.current_player_index, room.player_making_claim_decision),
            None => return,
        };

        if self.directory.room_is_empty_of_humans(room_id) && phase != Phase::WaitingForPlayers {
            self.spawn_default_timer(room_id, TimerRole::EmptyRoom).await;
        } else {
            self.timers.entry(room_id.to_string()).or_default().cancel(TimerRole::EmptyRoom);
        }

        match phase {
            Phase::RoundOver if !match_over => {
                self.deadlines.remove(room_id);
                self.spawn_default_timer(room_id, TimerRole::InterRound).await;
            }
            Phase::PlayerTurnStart | Phase::PlayerDrawn | Phase::AwaitingDiscard => {
                if let Some(seat) = turn_actor {
                    self.schedule_for_actor(room_id, seat, TimerRole::Turn).await;
                }
            }
            Phase::AwaitingPlayerClaimAction => {
                if let Some(seat) = claim_actor {
                    self.schedule_for_actor(room_id, seat, TimerRole::Claim).await;
                }
            }
            _ => {
                self.deadlines.remove(room_id);
            }
        }
    }

    /// Decides whether `seat_index` needs the AI policy substituted in for
    /// it (AI-controlled, or a human seat gone offline) and schedules
    /// either the `AiThink` delay or `human_role`'s real timeout.
    async fn schedule_for_actor(&mut self, room_id: &str, seat_index: u8, human_role: TimerRole) {
        let seat_needs_ai = match self.directory.room(room_id).and_then(|r| r.seats.iter().find(|s| s.index == seat_index)) {
            Some(seat) => !seat.is_human || !seat.is_online,
            None => return,
        };

        if seat_needs_ai {
            self.deadlines.remove(room_id);
            self.timers.entry(room_id.to_string()).or_default().cancel(human_role);
            let (min, max) = ai_think_bounds();
            let think_millis = rand::thread_rng().gen_range(min.as_millis() as u64..max.as_millis() as u64);
            self.spawn_timer(room_id, TimerRole::AiThink, Duration::from_millis(think_millis)).await;
        } else {
            self.timers.entry(room_id.to_string()).or_default().cancel(TimerRole::AiThink);
            let duration = human_role.default_duration().expect("human turn/claim roles always carry a fixed duration");
            self.deadlines.insert(room_id.to_string(), Instant::now() + duration);
            self.spawn_timer(room_id, human_role, duration).await;
        }
    }

    async fn spawn_default_timer(&mut self, room_id: &str, role: TimerRole) {
        let duration = role.default_duration().expect("spawn_default_timer used for a role with no fixed duration");
        self.spawn_timer(room_id, role, duration).await;
    }

    async fn spawn_timer(&mut self, room_id: &str, role: TimerRole, duration: Duration) {
        let me = match self.self_proxy.clone() {
            Some(proxy) => proxy,
            None => return,
        };
        let generation = self.timers.entry(room_id.to_string()).or_default().start(role);
        let room_id = room_id.to_string();
        tokio::spawn(async move {
            tokio::time::delay_for(duration).await;
            let mut me = me;
            let _ = me.fire_timer(room_id, role, generation).await;
        });
    }

    /// Computes and applies the AI policy's move for whichever seat the
    /// room is currently waiting on (C4), the way a client would submit a
    /// `GameAction` for that seat.
    fn drive_ai_turn(&mut self, room_id: &str) {
        let room = match self.directory.room_mut(room_id) {
            Some(room) => room,
            None => return,
        };

        let (seat_index, action) = match room.phase {
            Phase::PlayerTurnStart => {
                let seat = match room.current_player_index {
                    Some(s) => s,
                    None => return,
                };
                let hand = match room.seats.iter().find(|s| s.index == seat) {
                    Some(s) => s.hand.clone(),
                    None => return,
                };
                (seat, ai::decide_before_draw(&hand))
            }
            Phase::PlayerDrawn => {
                let seat = match room.current_player_index {
                    Some(s) => s,
                    None => return,
                };
                let drawn = match room.last_drawn_tile {
                    Some(t) => t,
                    None => return,
                };
                let seat_ref = match room.seats.iter().find(|s| s.index == seat) {
                    Some(s) => s,
                    None => return,
                };
                let (hand, melds) = (seat_ref.hand.clone(), seat_ref.melds.clone());
                (seat, ai::decide_after_draw(&hand, &melds, &room.discard_pile, drawn))
            }
            Phase::AwaitingDiscard => {
                let seat = match room.current_player_index {
                    Some(s) => s,
                    None => return,
                };
                let seat_ref = match room.seats.iter().find(|s| s.index == seat) {
                    Some(s) => s,
                    None => return,
                };
                let (hand, melds) = (seat_ref.hand.clone(), seat_ref.melds.clone());
                (seat, ai::decide_forced_discard(&hand, &melds, &room.discard_pile))
            }
            Phase::AwaitingPlayerClaimAction => {
                let seat = match room.player_making_claim_decision {
                    Some(s) => s,
                    None => return,
                };
                let discard = match room.last_discarded_tile {
                    Some(t) => t,
                    None => return,
                };
                let discarder = match room.last_discarder_index {
                    Some(d) => d,
                    None => return,
                };
                let seat_ref = match room.seats.iter().find(|s| s.index == seat) {
                    Some(s) => s,
                    None => return,
                };
                let (hand, melds) = (seat_ref.hand.clone(), seat_ref.melds.clone());
                let is_next_clockwise = seat == (discarder + 1) % 4;
                (seat, ai::decide_claim_response(&hand, &melds, discard, is_next_clockwise))
            }
            _ => return,
        };

        if let Err(err) = room.apply_action(seat_index, action) {
            tracing::warn!(room = room_id, seat = seat_index, error = %err, "AI-substituted action rejected");
        }
    }
}

#[thespian::actor]
impl DirectoryActor {
    /// Records this actor's own proxy so it can schedule callbacks to
    /// itself (timer fires). Called once from `main` right after the actor
    /// is spawned.
    pub fn set_self(&mut self, me: DirectoryActorProxy) {
        self.self_proxy = Some(me);
    }

    pub fn register(&mut self, socket: SocketId, session: ClientSessionProxy) {
        self.sessions.insert(socket, session);
    }

    pub async fn unregister(&mut self, socket: SocketId) {
        self.sessions.remove(&socket);
        self.names.remove(&socket);
        if let Some((room_id, _new_host)) = self.directory.leave(socket) {
            self.after_mutation(&room_id).await;
        }
    }

    pub fn set_name(&mut self, socket: SocketId, name: String) {
        self.names.insert(socket, name);
    }

    pub fn list_rooms(&mut self) -> Vec<RoomSummary> {
        self.directory.list_rooms()
    }

    pub async fn create_room(
        &mut self,
        socket: SocketId,
        room_name: String,
        target_humans: u8,
        fill_with_ai: bool,
        password: Option<String>,
        rounds: u8,
    ) -> (String, u8, GameStateSnapshot) {
        let host_name = self.names.get(&socket).cloned().unwrap_or_else(|| "Player".into());
        let settings = RoomSettings {
            room_name,
            target_human_count: target_humans,
            fill_with_ai,
            password,
            number_of_rounds: rounds,
        };
        let rng = rand_pcg::Pcg64Mcg::from_entropy();
        let room_id = self.directory.create_room(settings, host_name, socket, rng);
        let snapshot = Self::snapshot_for(self.directory.room(&room_id).unwrap(), 0, None);
        (room_id, 0, snapshot)
    }

    pub fn join_room(
        &mut self,
        socket: SocketId,
        room_id: String,
        password: Option<String>,
        player_name: String,
    ) -> Result<(String, u8, GameStateSnapshot), RoomError> {
        let seat_index = self
            .directory
            .join_room(&room_id, password.as_deref(), &player_name, socket)?;
        let snapshot = Self::snapshot_for(self.directory.room(&room_id).unwrap(), seat_index, None);
        Ok((room_id, seat_index, snapshot))
    }

    pub async fn game_request_start(&mut self, socket: SocketId, room_id: String) -> Result<(), RoomError> {
        let (_, seat) = self
            .directory
            .find_by_socket(socket)
            .map(|(r, s)| (r.to_string(), s))
            .ok_or(RoomError::NotAMember { seat: 0 })?;
        let room = self
            .directory
            .room_mut(&room_id)
            .ok_or_else(|| RoomError::RoomNotFound { room_id: room_id.clone() })?;
        let is_host = room.seats.iter().any(|s| s.index == seat && s.is_host);
        if !is_host {
            return Err(RoomError::NotHost { action: "start the match".into() });
        }
        room.start_match()?;
        self.after_mutation(&room_id).await;
        Ok(())
    }

    pub async fn game_action(&mut self, socket: SocketId, room_id: String, action: GameAction) -> Result<(), RoomError> {
        let (member_room, seat) = self
            .directory
            .find_by_socket(socket)
            .map(|(r, s)| (r.to_string(), s))
            .ok_or(RoomError::NotAMember { seat: 0 })?;
        if member_room != room_id {
            return Err(RoomError::NotAMember { seat });
        }

        let room = self
            .directory
            .room_mut(&room_id)
            .ok_or_else(|| RoomError::RoomNotFound { room_id: room_id.clone() })?;
        room.apply_action(seat, action)?;

        self.after_mutation(&room_id).await;
        Ok(())
    }

    pub async fn game_chat(&mut self, socket: SocketId, room_id: String, text: String) -> Result<(), RoomError> {
        let (member_room, seat) = self
            .directory
            .find_by_socket(socket)
            .map(|(r, s)| (r.to_string(), s))
            .ok_or(RoomError::NotAMember { seat: 0 })?;
        if member_room != room_id {
            return Err(RoomError::NotAMember { seat });
        }
        let room = self
            .directory
            .room_mut(&room_id)
            .ok_or_else(|| RoomError::RoomNotFound { room_id: room_id.clone() })?;
        let sender = room
            .seats
            .iter()
            .find(|s| s.index == seat)
            .map(|s| s.display_name.clone())
            .unwrap_or_default();
        room.push_chat(sender, text, "game");
        self.broadcast_room(&room_id).await;
        Ok(())
    }

    pub async fn game_quit_room(&mut self, socket: SocketId) {
        if let Some((room_id, _)) = self.directory.leave(socket) {
            self.after_mutation(&room_id).await;
        }
    }

    /// A spawned `tokio::time::delay_for` callback. Stale fires (a newer
    /// timer of the same role has since started) are silently ignored,
    /// per `TimerGenerations`'s contract.
    pub async fn fire_timer(&mut self, room_id: String, role: TimerRole, generation: u64) {
        let is_current = self.timers.get(&room_id).map(|g| g.is_current(role, generation)).unwrap_or(false);
        if !is_current {
            return;
        }

        match role {
            TimerRole::EmptyRoom => {
                if self.directory.room_is_empty_of_humans(&room_id) {
                    self.directory.destroy_room(&room_id);
                    self.timers.remove(&room_id);
                    self.deadlines.remove(&room_id);
                }
                return;
            }
            TimerRole::InterRound => {
                if let Some(room) = self.directory.room_mut(&room_id) {
                    room.expire_inter_round_timer();
                }
            }
            TimerRole::Turn => {
                if let Some(room) = self.directory.room_mut(&room_id) {
                    if let Some(seat) = room.current_player_index {
                        room.expire_turn_timer(seat);
                    }
                }
            }
            TimerRole::Claim => {
                if let Some(room) = self.directory.room_mut(&room_id) {
                    room.expire_claim_timer();
                }
            }
            TimerRole::AiThink => self.drive_ai_turn(&room_id),
        }

        self.after_mutation(&room_id).await;
    }
}
