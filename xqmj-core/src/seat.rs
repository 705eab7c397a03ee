//! Per-player seat state: hand, exposed melds, and the bits of identity and
//! connection status a room needs to track (C3).

use crate::rules::MeldKind;
use crate::tile::Tile;
use serde::{Deserialize, Serialize};

/// A fully-formed combination of tiles materialised onto a seat, either by
/// self-draw (concealed) or by claiming another seat's discard (open).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meld {
    pub id: u32,
    pub kind: MeldKind,
    pub tiles: Vec<Tile>,
    pub is_open: bool,
    /// The seat the claimed discard came from, absent for self-drawn melds
    /// (concealed Triplet-to-Quad upgrades, concealed Quads).
    pub source_seat: Option<u8>,
    /// The specific discard tile this meld consumed, absent for self-drawn
    /// melds.
    pub consumed_tile: Option<Tile>,
}

impl Meld {
    pub fn concealed(id: u32, kind: MeldKind, tiles: Vec<Tile>) -> Self {
        Self {
            id,
            kind,
            tiles,
            is_open: false,
            source_seat: None,
            consumed_tile: None,
        }
    }

    pub fn from_claim(
        id: u32,
        kind: MeldKind,
        mut tiles: Vec<Tile>,
        source_seat: u8,
        consumed_tile: Tile,
    ) -> Self {
        tiles.push(consumed_tile);
        Self {
            id,
            kind,
            tiles,
            is_open: true,
            source_seat: Some(source_seat),
            consumed_tile: Some(consumed_tile),
        }
    }
}

/// A claim a seat is eligible to make against an in-flight discard, queued
/// until the discarder's claim window closes (see the room's claim
/// arbitration protocol).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingClaim {
    Chi { pair: (Tile, Tile) },
    Peng,
    MingGang,
    Hu,
}

/// One of the four seats at a table. Owned exclusively by the room actor;
/// never shared or cloned into client-facing snapshots directly (see
/// [`crate::messages`] for the redacted view).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub index: u8,
    pub display_name: String,
    pub is_human: bool,
    pub hand: Vec<Tile>,
    pub melds: Vec<Meld>,
    pub is_dealer: bool,
    pub score: i32,
    pub is_online: bool,
    pub is_host: bool,
    pub pending_claims: Vec<PendingClaim>,
    /// Opaque handle used by the server crate to address this seat's
    /// transport actor; `None` for seats backed by the AI policy or for a
    /// human seat that has gone offline.
    #[serde(skip)]
    pub transport: Option<u64>,
}

impl Seat {
    pub fn new_human(index: u8, display_name: String, transport: u64) -> Self {
        Self {
            index,
            display_name,
            is_human: true,
            hand: Vec::new(),
            melds: Vec::new(),
            is_dealer: false,
            score: 0,
            is_online: true,
            is_host: false,
            pending_claims: Vec::new(),
            transport: Some(transport),
        }
    }

    pub fn new_ai(index: u8, display_name: String) -> Self {
        Self {
            index,
            display_name,
            is_human: false,
            hand: Vec::new(),
            melds: Vec::new(),
            is_dealer: false,
            score: 0,
            is_online: true,
            is_host: false,
            pending_claims: Vec::new(),
            transport: None,
        }
    }

    /// A seat is a valid draw/discard actor only while staffed, either by a
    /// connected human or by the AI policy substituting for an offline one.
    pub fn is_actionable(&self) -> bool {
        self.is_human == false || self.is_online
    }

    pub fn mark_offline(&mut self) {
        self.is_online = false;
        self.transport = None;
    }

    pub fn mark_online(&mut self, transport: u64) {
        self.is_online = true;
        self.transport = Some(transport);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ai_seats_are_always_actionable() {
        let seat = Seat::new_ai(2, "table-ai-2".into());
        assert!(seat.is_actionable());
    }

    #[test]
    fn offline_human_seat_is_not_actionable() {
        let mut seat = Seat::new_human(0, "Player".into(), 7);
        seat.mark_offline();
        assert!(!seat.is_actionable());
        assert!(seat.transport.is_none());
    }

    #[test]
    fn reconnecting_restores_transport_and_online_flag() {
        let mut seat = Seat::new_human(0, "Player".into(), 7);
        seat.mark_offline();
        seat.mark_online(99);
        assert!(seat.is_online);
        assert_eq!(Some(99), seat.transport);
    }
}
