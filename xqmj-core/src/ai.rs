//! Stateless AI decision policy (C4, §4.3). Every function here takes a
//! seat's view (hand, melds) plus whatever room context the decision needs,
//! and returns exactly one legal [`GameAction`]. None of these functions
//! hold state between calls; [`crate::room`] is responsible for invoking
//! the right one for the current phase and for actually applying the
//! result.

use crate::messages::GameAction;
use crate::rules::{
    can_declare_concealed_quad, can_ming_gang_from_discard, can_peng, can_upgrade_triplet_to_quad,
    check_win, chi_options,
};
use crate::seat::Meld;
use crate::tile::{Group, Tile, TileKind};

/// Decision order 1: a claimant has been asked to respond to a discard.
/// `is_next_clockwise` gates whether a Run claim may be offered at all
/// (only the seat immediately clockwise of the discarder may Chi).
pub fn decide_claim_response(
    hand: &[Tile],
    melds: &[Meld],
    discard: Tile,
    is_next_clockwise: bool,
) -> GameAction {
    let mut effective_hand = hand.to_vec();
    effective_hand.push(discard);

    if check_win(&effective_hand, melds).win {
        return GameAction::DeclareWin;
    }

    if can_ming_gang_from_discard(hand, discard) {
        return GameAction::ClaimQuad { tile: discard };
    }

    if can_peng(hand, discard) {
        return GameAction::ClaimTriplet { tile: discard };
    }

    if is_next_clockwise {
        let options = chi_options(hand, discard);
        if let Some(&(a, b)) = options.first() {
            return GameAction::ClaimRun {
                two_hand_tiles: (a, b),
                discard,
            };
        }
    }

    GameAction::PassClaim
}

/// Decision order 2: own turn, before drawing.
pub fn decide_before_draw(hand: &[Tile]) -> GameAction {
    match can_declare_concealed_quad(hand, None).first() {
        Some(&kind) => GameAction::DeclareConcealedQuad { kind },
        None => GameAction::DrawTile,
    }
}

/// Decision order 3: own turn, after drawing. `hand_with_drawn` already
/// includes `drawn`.
pub fn decide_after_draw(
    hand_with_drawn: &[Tile],
    melds: &[Meld],
    discard_pile: &[Tile],
    drawn: Tile,
) -> GameAction {
    if check_win(hand_with_drawn, melds).win {
        return GameAction::DeclareWin;
    }

    if let Some(&kind) = can_declare_concealed_quad(hand_with_drawn, None).first() {
        return GameAction::DeclareConcealedQuad { kind };
    }

    if let Some(&kind) = can_upgrade_triplet_to_quad(melds, drawn).first() {
        return GameAction::UpgradeTripletToQuad { kind };
    }

    GameAction::DiscardTile {
        tile_id: choose_discard(hand_with_drawn, melds, discard_pile).id,
    }
}

/// Decision order 4: a forced discard after Chi/Peng/open Quad, where there
/// was no preceding draw to evaluate for Win/Quad. Shares the discard
/// heuristic with [`decide_after_draw`].
pub fn decide_forced_discard(hand: &[Tile], melds: &[Meld], discard_pile: &[Tile]) -> GameAction {
    GameAction::DiscardTile {
        tile_id: choose_discard(hand, melds, discard_pile).id,
    }
}

/// Picks the hand tile with the lowest discard score (§4.3 scoring table);
/// ties broken by lower `orderValue`, then lower `group`.
pub fn choose_discard(hand: &[Tile], melds: &[Meld], discard_pile: &[Tile]) -> Tile {
    *hand
        .iter()
        .min_by(|&&a, &&b| {
            score_discard_candidate(hand, melds, discard_pile, a)
                .cmp(&score_discard_candidate(hand, melds, discard_pile, b))
                .then(a.kind.order_value().cmp(&b.kind.order_value()))
                .then(group_rank(a.kind.group()).cmp(&group_rank(b.kind.group())))
        })
        .expect("choose_discard called with an empty hand")
}

/// Implements the §4.3 discard scoring formula. Lower scores are discarded
/// first, so every term here is a reason to *keep* the candidate.
pub fn score_discard_candidate(
    hand: &[Tile],
    melds: &[Meld],
    discard_pile: &[Tile],
    candidate: Tile,
) -> i32 {
    let held = hand.iter().filter(|t| t.kind == candidate.kind).count();

    let mut score = 0i32;
    if held >= 2 {
        score += 5;
    }
    if melds
        .iter()
        .any(|m| m.kind == crate::rules::MeldKind::Triplet && m.tiles[0].kind == candidate.kind)
    {
        score += 15;
    }
    if melds
        .iter()
        .any(|m| m.kind == crate::rules::MeldKind::Quad && m.tiles[0].kind == candidate.kind)
    {
        score += 25;
    }

    let rest: Vec<Tile> = hand
        .iter()
        .copied()
        .filter(|t| t.id != candidate.id)
        .collect();
    if !chi_options(&rest, candidate).is_empty() {
        score += 8;
    }

    score += 2 * candidate.kind.order_value() as i32;
    score += 2 * danger_estimate(discard_pile, candidate.kind);
    score -= 3 * discard_frequency(discard_pile, candidate.kind);

    score
}

/// 5 if `kind` has not appeared in the discard pile yet, 3/1/0 for one/two/
/// three-or-more prior occurrences; +2 if the kind belongs to a run group.
fn danger_estimate(discard_pile: &[Tile], kind: TileKind) -> i32 {
    let occurrences = discard_frequency(discard_pile, kind);
    let base = match occurrences {
        0 => 5,
        1 => 3,
        2 => 1,
        _ => 0,
    };
    let group_bonus = if kind.group() != Group::None { 2 } else { 0 };
    base + group_bonus
}

fn discard_frequency(discard_pile: &[Tile], kind: TileKind) -> i32 {
    discard_pile.iter().filter(|t| t.kind == kind).count() as i32
}

fn group_rank(group: Group) -> u8 {
    match group {
        Group::None => 0,
        Group::First => 1,
        Group::Second => 2,
    }
}
