//! Pure tile-combinatorics rules: meld detection, Chi options, and the
//! winning-hand search (C2).
//!
//! Every function here is a pure function over tiles and melds; none of them
//! touch seat or room state. [`crate::room`] is responsible for enforcing
//! turn-order constraints (e.g. "only the seat clockwise of the discarder
//! may Chi") on top of the feasibility these functions report.

use crate::tile::{Group, Tile, TileKind, RUN_TRIPLES};
use fehler::{throw, throws};
use serde::{Deserialize, Serialize};

/// The shape of a materialised combination of tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeldKind {
    Run,
    Triplet,
    Quad,
    /// Only ever appears transiently inside [`WinSearchResult`]; seats never
    /// hold an exposed `Pair` meld.
    Pair,
}

/// A fully-formed group of tiles, either still "free" (part of a win-search
/// decomposition) or materialised onto a seat (see [`crate::seat::Meld`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundGroup {
    pub kind: MeldKind,
    pub tiles: Vec<Tile>,
}

/// Counts how many tiles of `kind` appear in `tiles`.
pub fn count_of_kind(tiles: &[Tile], kind: TileKind) -> usize {
    tiles.iter().filter(|t| t.kind == kind).count()
}

/// A Peng (Triplet claim) is feasible against `t` iff the hand already holds
/// two tiles of `t`'s kind.
pub fn can_peng(hand: &[Tile], t: Tile) -> bool {
    count_of_kind(hand, t.kind) >= 2
}

/// A Ming Gang (open Quad claimed from a discard) is feasible iff the hand
/// already holds three tiles of `t`'s kind.
pub fn can_ming_gang_from_discard(hand: &[Tile], t: Tile) -> bool {
    count_of_kind(hand, t.kind) >= 3
}

/// Returns the set of unordered hand-tile pairs that, combined with `t`,
/// complete one of the four fixed [`RUN_TRIPLES`].
///
/// This function only reports combinatorial feasibility; [`crate::room`]
/// additionally enforces that only the seat immediately clockwise of the
/// discarder may act on a non-empty result.
pub fn chi_options(hand: &[Tile], t: Tile) -> Vec<(Tile, Tile)> {
    if t.kind.group() == Group::None {
        return Vec::new();
    }

    let mut options = Vec::new();
    for triple in RUN_TRIPLES {
        if !triple.contains(&t.kind) {
            continue;
        }

        let needed: Vec<TileKind> = triple.into_iter().filter(|k| *k != t.kind).collect();
        debug_assert_eq!(2, needed.len());

        let firsts: Vec<&Tile> = hand.iter().filter(|h| h.kind == needed[0]).collect();
        let seconds: Vec<&Tile> = hand.iter().filter(|h| h.kind == needed[1]).collect();

        for &a in &firsts {
            for &b in &seconds {
                options.push((*a, *b));
            }
        }
    }

    options
}

/// Returns the kinds for which a concealed Quad can be declared, given the
/// current hand plus an optional just-drawn tile.
pub fn can_declare_concealed_quad(hand: &[Tile], drawn: Option<Tile>) -> Vec<TileKind> {
    let mut effective: Vec<Tile> = hand.to_vec();
    effective.extend(drawn);

    TileKind::all()
        .into_iter()
        .filter(|&k| count_of_kind(&effective, k) >= 4)
        .collect()
}

/// Returns the kinds for which an already-exposed Triplet can be upgraded to
/// a Quad using the drawn tile.
pub fn can_upgrade_triplet_to_quad(
    melds: &[crate::seat::Meld],
    drawn: Tile,
) -> Vec<TileKind> {
    melds
        .iter()
        .filter(|m| m.kind == MeldKind::Triplet && m.tiles[0].kind == drawn.kind)
        .map(|_| drawn.kind)
        .collect()
}

/// Result of a [`check_win`] search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinSearchResult {
    pub win: bool,
    pub pair: Option<[Tile; 2]>,
    pub found_groups: Vec<FoundGroup>,
}

/// Depth-first search for a winning decomposition of `hand` given the
/// groups already materialised in `existing_melds`.
///
/// Goal form: exactly one Pair plus two additional complete groups (Triplet,
/// Quad, or Run) assembled from `hand`, on top of whatever complete groups
/// are already in `existing_melds` (a Quad already exposed still counts as
/// one group). Hand size is bounded (<= 8) so the search space is small;
/// ties are irrelevant since any successful decomposition suffices.
pub fn check_win(hand: &[Tile], existing_melds: &[crate::seat::Meld]) -> WinSearchResult {
    let groups_needed = 2usize.saturating_sub(existing_melds.len());

    match search(hand.to_vec(), groups_needed, None) {
        Some((pair, found_groups)) => WinSearchResult {
            win: true,
            pair: Some(pair),
            found_groups,
        },
        None => WinSearchResult {
            win: false,
            pair: None,
            found_groups: Vec::new(),
        },
    }
}

/// Recursive partition search over the free tiles. `groups_needed` counts
/// remaining Triplet/Run groups still to find; `pair` accumulates the Pair
/// once chosen. Returns the Pair and the groups found on the first
/// successful decomposition that consumes `remaining` exactly.
fn search(
    remaining: Vec<Tile>,
    groups_needed: usize,
    pair: Option<[Tile; 2]>,
) -> Option<([Tile; 2], Vec<FoundGroup>)> {
    if remaining.is_empty() {
        return pair.filter(|_| groups_needed == 0).map(|p| (p, Vec::new()));
    }

    if pair.is_none() {
        for kind in distinct_kinds(&remaining) {
            if count_of_kind(&remaining, kind) >= 2 {
                let (rest, removed) = remove_n(remaining.clone(), kind, 2).expect("counted >= 2");
                let found_pair = [removed[0], removed[1]];
                if let Some(result) = search(rest, groups_needed, Some(found_pair)) {
                    return Some(result);
                }
            }
        }
    }

    if groups_needed > 0 {
        for kind in distinct_kinds(&remaining) {
            if count_of_kind(&remaining, kind) >= 3 {
                let (rest, removed) = remove_n(remaining.clone(), kind, 3).expect("counted >= 3");
                if let Some((pair_found, mut groups)) = search(rest, groups_needed - 1, pair) {
                    groups.push(FoundGroup {
                        kind: MeldKind::Triplet,
                        tiles: removed,
                    });
                    return Some((pair_found, groups));
                }
            }
        }

        for triple in RUN_TRIPLES {
            if triple.iter().all(|k| count_of_kind(&remaining, *k) >= 1) {
                let mut rest = remaining.clone();
                let mut removed = Vec::with_capacity(3);
                for k in triple {
                    let pos = rest.iter().position(|t| t.kind == k).unwrap();
                    removed.push(rest.remove(pos));
                }

                if let Some((pair_found, mut groups)) = search(rest, groups_needed - 1, pair) {
                    groups.push(FoundGroup {
                        kind: MeldKind::Run,
                        tiles: removed,
                    });
                    return Some((pair_found, groups));
                }
            }
        }
    }

    None
}

fn distinct_kinds(tiles: &[Tile]) -> Vec<TileKind> {
    let mut kinds: Vec<TileKind> = tiles.iter().map(|t| t.kind).collect();
    kinds.sort();
    kinds.dedup();
    kinds
}

/// Removes up to `n` tiles of `kind` from `hand`, returning the remainder and
/// the removed tiles, or an error naming how many were actually available.
#[throws(RemovalError)]
pub fn remove_n(mut hand: Vec<Tile>, kind: TileKind, n: usize) -> (Vec<Tile>, Vec<Tile>) {
    let available = count_of_kind(&hand, kind);
    if available < n {
        throw!(RemovalError {
            kind,
            requested: n,
            available,
        });
    }

    let mut removed = Vec::with_capacity(n);
    let mut i = 0;
    while removed.len() < n {
        if hand[i].kind == kind {
            removed.push(hand.remove(i));
        } else {
            i += 1;
        }
    }

    (hand, removed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("requested {requested} of {kind:?} but only {available} available")]
pub struct RemovalError {
    pub kind: TileKind,
    pub requested: usize,
    pub available: usize,
}
