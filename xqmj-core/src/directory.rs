//! The room directory (C7): the map of room id to room, socket/seat
//! bookkeeping, and the reconnection and host-reassignment rules of §4.6.
//! Like [`crate::room::Room`], this is a plain struct; the server crate
//! wraps it in a `thespian` actor so directory operations and in-room
//! mutation never overlap (§5).

use crate::error::RoomError;
use crate::room::{Phase, Room, RoomSettings};
use crate::seat::Seat;
use rand::RngCore;
use std::collections::HashMap;

/// Opaque per-connection identifier the transport layer assigns; the
/// directory never interprets it beyond equality and as a map key.
pub type SocketId = u64;

struct Membership {
    room_id: String,
    seat_index: u8,
}

pub struct RoomDirectory {
    rooms: HashMap<String, Room>,
    memberships: HashMap<SocketId, Membership>,
    next_room_id: u64,
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
            memberships: HashMap::new(),
            next_room_id: 0,
        }
    }

    pub fn list_rooms(&self) -> Vec<crate::messages::RoomSummary> {
        self.rooms
            .values()
            .map(|room| crate::messages::RoomSummary {
                id: room.id.clone(),
                name: room.settings.room_name.clone(),
                players_count: room.seats.len() as u8,
                target_humans: room.settings.target_human_count,
                current_humans: room.seats.iter().filter(|s| s.is_human).count() as u8,
                status: format!("{:?}", room.phase),
                password_protected: room.settings.password.is_some(),
                rounds: room.settings.number_of_rounds,
                host_name: room
                    .seats
                    .iter()
                    .find(|s| s.is_host)
                    .map(|s| s.display_name.clone())
                    .unwrap_or_default(),
            })
            .collect()
    }

    pub fn find_by_socket(&self, socket: SocketId) -> Option<(&str, u8)> {
        self.memberships
            .get(&socket)
            .map(|m| (m.room_id.as_str(), m.seat_index))
    }

    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn room_mut(&mut self, room_id: &str) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    /// Creates a room and seats `host` at index 0 as its host.
    pub fn create_room(
        &mut self,
        settings: RoomSettings,
        host_name: String,
        host_socket: SocketId,
        rng: impl RngCore + Send + 'static,
    ) -> String {
        let room_id = format!("room-{}", self.next_room_id);
        self.next_room_id += 1;

        let mut room = Room::new(room_id.clone(), settings, rng);
        let mut host_seat = Seat::new_human(0, host_name, host_socket);
        host_seat.is_host = true;
        room.seats.push(host_seat);

        self.rooms.insert(room_id.clone(), room);
        self.memberships.insert(
            host_socket,
            Membership {
                room_id: room_id.clone(),
                seat_index: 0,
            },
        );
        room_id
    }

    /// Joins `socket` to `room_id`. Reconnects to a matching offline seat by
    /// display name if one exists; otherwise assigns the lowest unoccupied
    /// seat index. A socket may only belong to one room at a time.
    pub fn join_room(
        &mut self,
        room_id: &str,
        password: Option<&str>,
        player_name: &str,
        socket: SocketId,
    ) -> Result<u8, RoomError> {
        if self.memberships.contains_key(&socket) {
            return Err(RoomError::Internal {
                detail: "socket already belongs to a room".into(),
            });
        }

        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::RoomNotFound { room_id: room_id.to_string() })?;

        if let Some(expected) = &room.settings.password {
            if password != Some(expected.as_str()) {
                return Err(RoomError::WrongPassword { room_id: room_id.to_string() });
            }
        }

        let seat_index = if let Some(offline) = room
            .seats
            .iter_mut()
            .find(|s| s.is_human && !s.is_online && s.display_name == player_name)
        {
            offline.mark_online(socket);
            offline.index
        } else {
            if room.seats.len() >= 4 {
                return Err(RoomError::RoomFull { room_id: room_id.to_string() });
            }
            let used: Vec<u8> = room.seats.iter().map(|s| s.index).collect();
            let index = (0..4u8).find(|i| !used.contains(i)).ok_or(RoomError::RoomFull {
                room_id: room_id.to_string(),
            })?;
            room.seats.push(Seat::new_human(index, player_name.to_string(), socket));
            index
        };

        self.memberships.insert(
            socket,
            Membership {
                room_id: room_id.to_string(),
                seat_index,
            },
        );
        Ok(seat_index)
    }

    /// Applies §4.6's disconnect rules: outside active play the seat is
    /// dropped; during active play it is marked offline and retained (so
    /// the AI-think timer can substitute for it). Returns the room id the
    /// socket left and, if a new host was assigned, the new host's seat
    /// index.
    pub fn leave(&mut self, socket: SocketId) -> Option<(String, Option<u8>)> {
        let membership = self.memberships.remove(&socket)?;
        let room = self.rooms.get_mut(&membership.room_id)?;

        let was_host = room
            .seats
            .iter()
            .find(|s| s.index == membership.seat_index)
            .map(|s| s.is_host)
            .unwrap_or(false);

        if room.phase == Phase::WaitingForPlayers {
            room.seats.retain(|s| s.index != membership.seat_index);
        } else if let Some(seat) = room.seats.iter_mut().find(|s| s.index == membership.seat_index) {
            seat.mark_offline();
        }

        let mut new_host = None;
        if was_host {
            let mut online_humans: Vec<&mut Seat> = room
                .seats
                .iter_mut()
                .filter(|s| s.is_human && s.is_online)
                .collect();
            online_humans.sort_by_key(|s| s.index);
            if let Some(next_host) = online_humans.into_iter().next() {
                next_host.is_host = true;
                new_host = Some(next_host.index);
            }
        }

        let no_humans_online = room.seats.iter().all(|s| !s.is_human || !s.is_online);
        if no_humans_online && room.phase != Phase::WaitingForPlayers {
            room.match_over = true;
        }

        Some((membership.room_id, new_host))
    }

    /// Destroys a room (called after its empty-room timer elapses with
    /// still-zero online humans).
    pub fn destroy_room(&mut self, room_id: &str) {
        self.rooms.remove(room_id);
        self.memberships.retain(|_, m| m.room_id != room_id);
    }

    pub fn room_is_empty_of_humans(&self, room_id: &str) -> bool {
        self.rooms
            .get(room_id)
            .map(|r| r.seats.iter().all(|s| !s.is_human || !s.is_online))
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_pcg::Pcg64Mcg;
    use rand::SeedableRng;

    fn settings() -> RoomSettings {
        RoomSettings {
            room_name: "Test Room".into(),
            target_human_count: 2,
            fill_with_ai: true,
            password: None,
            number_of_rounds: 4,
        }
    }

    #[test]
    fn create_and_join_assigns_lowest_free_seat() {
        let mut directory = RoomDirectory::new();
        let room_id = directory.create_room(settings(), "Host".into(), 1, Pcg64Mcg::seed_from_u64(1));

        let seat_index = directory.join_room(&room_id, None, "Guest", 2).unwrap();
        assert_eq!(1, seat_index);
    }

    #[test]
    fn wrong_password_is_rejected() {
        let mut directory = RoomDirectory::new();
        let mut locked = settings();
        locked.password = Some("secret".into());
        let room_id = directory.create_room(locked, "Host".into(), 1, Pcg64Mcg::seed_from_u64(2));

        let err = directory.join_room(&room_id, Some("wrong"), "Guest", 2).unwrap_err();
        assert!(matches!(err, RoomError::WrongPassword { .. }));
    }

    #[test]
    fn reconnecting_player_reuses_their_offline_seat() {
        let mut directory = RoomDirectory::new();
        let room_id = directory.create_room(settings(), "Host".into(), 1, Pcg64Mcg::seed_from_u64(3));
        directory.join_room(&room_id, None, "Guest", 2).unwrap();

        directory.room_mut(&room_id).unwrap().phase = Phase::PlayerTurnStart;
        directory.leave(2);
        assert!(!directory.room(&room_id).unwrap().seats.iter().any(|s| s.index == 1 && s.is_online));

        let seat_index = directory.join_room(&room_id, None, "Guest", 99).unwrap();
        assert_eq!(1, seat_index);
        assert!(directory.room(&room_id).unwrap().seats[1].is_online);
    }

    #[test]
    fn leaving_during_waiting_for_players_removes_the_seat() {
        let mut directory = RoomDirectory::new();
        let room_id = directory.create_room(settings(), "Host".into(), 1, Pcg64Mcg::seed_from_u64(4));
        directory.join_room(&room_id, None, "Guest", 2).unwrap();

        directory.leave(2);
        assert_eq!(1, directory.room(&room_id).unwrap().seats.len());
    }

    #[test]
    fn host_disconnect_transfers_to_lowest_index_online_human() {
        let mut directory = RoomDirectory::new();
        let room_id = directory.create_room(settings(), "Host".into(), 1, Pcg64Mcg::seed_from_u64(5));
        directory.join_room(&room_id, None, "Guest", 2).unwrap();
        directory.room_mut(&room_id).unwrap().phase = Phase::PlayerTurnStart;

        let (_, new_host) = directory.leave(1).unwrap();
        assert_eq!(Some(1), new_host);
        assert!(directory.room(&room_id).unwrap().seats[1].is_host);
    }
}
