//! Tile identity, suit/group/order metadata, and deck construction (C1).

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

/// One of the 14 tile symbols, each permanently associated with a suit,
/// [`Group`], and `order_value` via [`TileKind::metadata`].
///
/// Per suit there are 7 kinds: one `Soldier` (group 0, never part of a run),
/// and two run-groups of three kinds each (the four [`RUN_TRIPLES`] in total
/// across both suits).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, Serialize, Deserialize,
)]
pub enum TileKind {
    GeneralBlack,
    AdvisorBlack,
    ElephantBlack,
    ChariotBlack,
    HorseBlack,
    CannonBlack,
    SoldierBlack,
    GeneralRed,
    AdvisorRed,
    ElephantRed,
    ChariotRed,
    HorseRed,
    CannonRed,
    SoldierRed,
}

/// The color half of a tile's identity. Denormalized onto [`Tile`] for
/// convenient access even though it is fully determined by [`TileKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Suit {
    Black,
    Red,
}

/// Run-group membership. `Soldier` kinds are always `Group::None` and never
/// participate in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Group {
    None,
    First,
    Second,
}

/// Static per-kind metadata: suit, run-group membership, and the ordinal
/// used for sorting and run adjacency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindMetadata {
    pub suit: Suit,
    pub group: Group,
    pub order_value: u8,
}

impl TileKind {
    pub fn metadata(self) -> KindMetadata {
        use Group::*;
        use Suit::*;
        use TileKind::*;

        let (suit, group, order_value) = match self {
            GeneralBlack => (Black, First, 1),
            AdvisorBlack => (Black, First, 2),
            ElephantBlack => (Black, First, 3),
            ChariotBlack => (Black, Second, 1),
            HorseBlack => (Black, Second, 2),
            CannonBlack => (Black, Second, 3),
            SoldierBlack => (Black, None, 0),
            GeneralRed => (Red, First, 1),
            AdvisorRed => (Red, First, 2),
            ElephantRed => (Red, First, 3),
            ChariotRed => (Red, Second, 1),
            HorseRed => (Red, Second, 2),
            CannonRed => (Red, Second, 3),
            SoldierRed => (Red, None, 0),
        };

        KindMetadata {
            suit,
            group,
            order_value,
        }
    }

    pub fn suit(self) -> Suit {
        self.metadata().suit
    }

    pub fn group(self) -> Group {
        self.metadata().group
    }

    pub fn order_value(self) -> u8 {
        self.metadata().order_value
    }

    pub fn all() -> Vec<TileKind> {
        TileKind::iter().collect()
    }
}

/// The four fixed run-triples the rule engine recognises. Each triple shares
/// a suit and group; the tuple order matches ascending `order_value`.
pub static RUN_TRIPLES: [[TileKind; 3]; 4] = [
    [TileKind::GeneralBlack, TileKind::AdvisorBlack, TileKind::ElephantBlack],
    [TileKind::ChariotBlack, TileKind::HorseBlack, TileKind::CannonBlack],
    [TileKind::GeneralRed, TileKind::AdvisorRed, TileKind::ElephantRed],
    [TileKind::ChariotRed, TileKind::HorseRed, TileKind::CannonRed],
];

/// Stable identifier for a physical tile instance within one deck generation.
///
/// Formatted as `{kind}_{copy}`, e.g. the third copy of `ChariotRed` is
/// `ChariotRed_2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileId {
    kind_tag: u8,
    copy: u8,
}

impl TileId {
    fn new(kind: TileKind, copy: u8) -> Self {
        Self {
            kind_tag: TileKind::all().iter().position(|k| *k == kind).unwrap() as u8,
            copy,
        }
    }

    pub fn kind(self) -> TileKind {
        TileKind::all()[self.kind_tag as usize]
    }
}

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.kind(), self.copy)
    }
}

impl std::fmt::Display for TileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A single physical tile: immutable identity plus the suit/kind it
/// represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub id: TileId,
    pub kind: TileKind,
    pub suit: Suit,
}

impl Tile {
    fn new(id: TileId, kind: TileKind) -> Self {
        Self {
            id,
            kind,
            suit: kind.suit(),
        }
    }
}

/// Builds a fresh 56-tile deck: 4 physical copies of each of the 14 kinds.
///
/// The returned order is deck-generation order (kind-major), not shuffled;
/// callers that need a shuffled deck should pass the result through
/// [`shuffle`].
pub fn create_deck() -> Vec<Tile> {
    let mut tiles = Vec::with_capacity(56);
    for kind in TileKind::all() {
        for copy in 0..4 {
            tiles.push(Tile::new(TileId::new(kind, copy), kind));
        }
    }
    tiles
}

/// Shuffles `tiles` in place using the Fisher-Yates algorithm driven by the
/// supplied RNG. The RNG is an explicit parameter (rather than a global) so
/// that tests and replay tooling can seed deterministic deals.
pub fn shuffle<R: Rng + ?Sized>(tiles: &mut [Tile], rng: &mut R) {
    tiles.shuffle(rng);
}

/// Total ordering used when presenting a hand to a client: suit (Black
/// before Red), then group (First, Second, None), then descending
/// `order_value`.
///
/// This ordering is semantic, not merely cosmetic: [`crate::rules::chi_options`]
/// assumes hands are grouped by suit/group when scanning for run candidates.
pub fn visual_sort(hand: &mut [Tile]) {
    hand.sort_by(|a, b| {
        let a_meta = a.kind.metadata();
        let b_meta = b.kind.metadata();

        suit_rank(a_meta.suit)
            .cmp(&suit_rank(b_meta.suit))
            .then(group_rank(a_meta.group).cmp(&group_rank(b_meta.group)))
            .then(b_meta.order_value.cmp(&a_meta.order_value))
            .then(a.id.cmp(&b.id))
    });
}

fn suit_rank(suit: Suit) -> u8 {
    match suit {
        Suit::Black => 0,
        Suit::Red => 1,
    }
}

fn group_rank(group: Group) -> u8 {
    match group {
        Group::First => 0,
        Group::Second => 1,
        Group::None => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_pcg::Pcg64Mcg;
    use rand::SeedableRng;

    #[test]
    fn deck_has_fifty_six_tiles_four_of_each_kind() {
        let deck = create_deck();
        assert_eq!(56, deck.len());

        for kind in TileKind::all() {
            let count = deck.iter().filter(|t| t.kind == kind).count();
            assert_eq!(4, count, "expected 4 copies of {:?}", kind);
        }
    }

    #[test]
    fn tile_ids_are_unique_within_a_deck() {
        let deck = create_deck();
        let mut ids: Vec<_> = deck.iter().map(|t| t.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(56, ids.len());
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = Pcg64Mcg::seed_from_u64(42);
        let mut deck = create_deck();
        let before = deck.clone();
        shuffle(&mut deck, &mut rng);

        assert_ne!(before, deck, "a 56-tile deck should not shuffle back to itself");
        let mut sorted_before = before.clone();
        let mut sorted_after = deck.clone();
        sorted_before.sort_by_key(|t| t.id);
        sorted_after.sort_by_key(|t| t.id);
        assert_eq!(sorted_before, sorted_after);
    }

    #[test]
    fn visual_sort_is_idempotent() {
        let mut rng = Pcg64Mcg::seed_from_u64(7);
        let mut hand = create_deck();
        shuffle(&mut hand, &mut rng);
        hand.truncate(8);

        visual_sort(&mut hand);
        let once = hand.clone();
        visual_sort(&mut hand);

        assert_eq!(once, hand);
    }

    #[test]
    fn run_triples_share_suit_and_group() {
        for triple in RUN_TRIPLES {
            let metas: Vec<_> = triple.iter().map(|k| k.metadata()).collect();
            assert!(metas.iter().all(|m| m.suit == metas[0].suit));
            assert!(metas.iter().all(|m| m.group == metas[0].group));
            assert_ne!(Group::None, metas[0].group);

            let mut orders: Vec<_> = metas.iter().map(|m| m.order_value).collect();
            orders.sort();
            assert_eq!(vec![1, 2, 3], orders);
        }
    }

    #[test]
    fn soldiers_are_groupless() {
        assert_eq!(Group::None, TileKind::SoldierBlack.group());
        assert_eq!(Group::None, TileKind::SoldierRed.group());
        assert_eq!(0, TileKind::SoldierBlack.order_value());
    }
}
