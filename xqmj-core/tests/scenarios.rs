//! End-to-end scenarios exercising the room state machine and directory
//! together, the way a real client session would drive them.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use xqmj::ai;
use xqmj::directory::RoomDirectory;
use xqmj::messages::GameAction;
use xqmj::room::{ClaimAction, Phase, RoomSettings};
use xqmj::tile::{create_deck, Tile, TileKind};

fn tiles_of(kind: TileKind, n: usize) -> Vec<Tile> {
    create_deck().into_iter().filter(|t| t.kind == kind).take(n).collect()
}

fn settings(rounds: u8) -> RoomSettings {
    RoomSettings {
        room_name: "Scenario Table".into(),
        target_human_count: 1,
        fill_with_ai: true,
        password: None,
        number_of_rounds: rounds,
    }
}

/// S1: a seat declares a self-draw win off its own turn once its hand plus
/// the drawn tile decomposes into a pair and two complete groups.
#[test]
fn self_draw_win_ends_the_round_with_a_winner() {
    let mut directory = RoomDirectory::new();
    let room_id = directory.create_room(settings(4), "Alice".into(), 1, Pcg64Mcg::seed_from_u64(10));
    let room = directory.room_mut(&room_id).unwrap();
    room.start_match().unwrap();

    let dealer = room.dealer_index;
    {
        let seat = room.seats.iter_mut().find(|s| s.index == dealer).unwrap();
        seat.hand = tiles_of(TileKind::GeneralBlack, 2);
        seat.hand.extend(tiles_of(TileKind::AdvisorBlack, 3));
        seat.hand.extend(tiles_of(TileKind::ElephantBlack, 2));
    }
    room.phase = Phase::PlayerDrawn;
    room.last_drawn_tile = tiles_of(TileKind::ElephantBlack, 3).pop();
    room.seats
        .iter_mut()
        .find(|s| s.index == dealer)
        .unwrap()
        .hand
        .push(room.last_drawn_tile.unwrap());

    room.declare_self_draw_win(dealer).unwrap();

    assert_eq!(Some(dealer), room.winner);
    assert!(matches!(room.phase, Phase::RoundOver | Phase::GameOver));
}

/// S3: on a single discard, a Win candidate and a lower-priority Triplet
/// candidate both exist; the Win claimant is offered the decision first.
#[test]
fn win_claim_preempts_a_lower_priority_triplet_claim() {
    let mut directory = RoomDirectory::new();
    let room_id = directory.create_room(settings(4), "Alice".into(), 1, Pcg64Mcg::seed_from_u64(11));
    let room = directory.room_mut(&room_id).unwrap();
    room.start_match().unwrap();

    let discarder = room.dealer_index;
    let win_seat = (discarder + 1) % 4;
    let triplet_seat = (discarder + 2) % 4;
    let discard_kind = TileKind::ElephantRed;

    {
        let seat = room.seats.iter_mut().find(|s| s.index == win_seat).unwrap();
        seat.hand = tiles_of(TileKind::GeneralRed, 2);
        seat.hand.extend(tiles_of(TileKind::AdvisorRed, 3));
        seat.hand.extend(tiles_of(discard_kind, 2));
    }
    {
        let seat = room.seats.iter_mut().find(|s| s.index == triplet_seat).unwrap();
        seat.hand = tiles_of(discard_kind, 2);
    }

    let discard = tiles_of(discard_kind, 3).pop().unwrap();
    room.phase = Phase::PlayerDrawn;
    room.current_player_index = Some(discarder);
    {
        let seat = room.seats.iter_mut().find(|s| s.index == discarder).unwrap();
        seat.hand.push(discard);
    }

    room.discard_tile(discarder, discard.id).unwrap();
    assert_eq!(Phase::AwaitingPlayerClaimAction, room.phase);
    assert_eq!(Some(win_seat), room.player_making_claim_decision);

    room.submit_claim(win_seat, ClaimAction::DeclareWin).unwrap();
    assert_eq!(Some(win_seat), room.winner);
}

/// S5: a human seat disconnects mid-round (marked offline, retained) and
/// later reconnects under the same display name, recovering the same seat
/// and its in-progress hand.
#[test]
fn disconnecting_and_reconnecting_preserves_the_seat_and_hand() {
    let mut directory = RoomDirectory::new();
    let room_id = directory.create_room(settings(4), "Alice".into(), 1, Pcg64Mcg::seed_from_u64(12));
    directory.join_room(&room_id, None, "Bob", 2).unwrap();
    directory.room_mut(&room_id).unwrap().phase = Phase::PlayerTurnStart;

    directory
        .room_mut(&room_id)
        .unwrap()
        .seats
        .iter_mut()
        .find(|s| s.index == 1)
        .unwrap()
        .hand = tiles_of(TileKind::CannonBlack, 3);

    directory.leave(2);
    assert!(!directory.room(&room_id).unwrap().seats[1].is_online);

    let seat_index = directory.join_room(&room_id, None, "Bob", 42).unwrap();
    assert_eq!(1, seat_index);
    let seat = &directory.room(&room_id).unwrap().seats[1];
    assert!(seat.is_online);
    assert_eq!(3, seat.hand.iter().filter(|t| t.kind == TileKind::CannonBlack).count());
}

/// S6: the deck is exhausted at a draw attempt; the round ends as a draw
/// rather than stalling.
#[test]
fn deck_exhaustion_produces_a_draw_game() {
    let mut directory = RoomDirectory::new();
    let room_id = directory.create_room(settings(1), "Alice".into(), 1, Pcg64Mcg::seed_from_u64(13));
    let room = directory.room_mut(&room_id).unwrap();
    room.start_match().unwrap();

    room.phase = Phase::PlayerTurnStart;
    room.deck.clear();
    let actor = room.current_player_index.unwrap();

    room.draw_tile(actor).unwrap();

    assert!(room.is_draw_game);
    assert!(room.winner.is_none());
}

/// Sanity check that a room cannot be started with fewer than 4 seats when
/// AI fill is disabled (§4.6).
#[test]
fn start_without_ai_fill_requires_four_seats() {
    let mut directory = RoomDirectory::new();
    let mut no_fill = settings(4);
    no_fill.fill_with_ai = false;
    let room_id = directory.create_room(no_fill, "Alice".into(), 1, Pcg64Mcg::seed_from_u64(14));

    let result = directory.room_mut(&room_id).unwrap().start_match();
    assert!(result.is_err());
}

/// S2: two seats both hold a Win candidate against the same discard; both
/// are tracked for the multi-hu exception (§4.4.3), and the claimant who
/// resolves the round carries `isMultiHuTarget` in its announcement.
#[test]
fn multiple_win_candidates_on_one_discard_are_flagged_multi_hu() {
    let mut directory = RoomDirectory::new();
    let room_id = directory.create_room(settings(4), "Alice".into(), 1, Pcg64Mcg::seed_from_u64(20));
    let room = directory.room_mut(&room_id).unwrap();
    room.start_match().unwrap();

    let discarder = room.dealer_index;
    let win_seat_a = (discarder + 1) % 4;
    let win_seat_b = (discarder + 2) % 4;
    let discard_kind = TileKind::ElephantRed;

    for win_seat in [win_seat_a, win_seat_b] {
        let seat = room.seats.iter_mut().find(|s| s.index == win_seat).unwrap();
        seat.hand = tiles_of(TileKind::GeneralRed, 2);
        seat.hand.extend(tiles_of(TileKind::AdvisorRed, 3));
        seat.hand.extend(tiles_of(discard_kind, 2));
    }

    let discard = tiles_of(discard_kind, 3).pop().unwrap();
    room.phase = Phase::PlayerDrawn;
    room.current_player_index = Some(discarder);
    {
        let seat = room.seats.iter_mut().find(|s| s.index == discarder).unwrap();
        seat.hand.push(discard);
    }

    room.discard_tile(discarder, discard.id).unwrap();
    let claimant = room.player_making_claim_decision.unwrap();
    assert_eq!(win_seat_a.min(win_seat_b), claimant);

    room.submit_claim(claimant, ClaimAction::DeclareWin).unwrap();

    let announcements = room.drain_announcements();
    let win_announcement = announcements
        .iter()
        .find(|a| a.is_multi_hu_target.is_some())
        .expect("a Win claim on a discard always carries an isMultiHuTarget flag");
    assert_eq!(Some(true), win_announcement.is_multi_hu_target);
}

/// The `apply_action` dispatch seam routes `DeclareWin` to whichever
/// resolution actually applies: a pending discard claim when one is open,
/// a self-draw otherwise. This is the same seam the AI-substitution loop
/// submits through, so a claim-phase Win must resolve here too.
#[test]
fn apply_action_routes_declare_win_to_the_open_claim_when_one_is_pending() {
    let mut directory = RoomDirectory::new();
    let room_id = directory.create_room(settings(4), "Alice".into(), 1, Pcg64Mcg::seed_from_u64(21));
    let room = directory.room_mut(&room_id).unwrap();
    room.start_match().unwrap();

    let discarder = room.dealer_index;
    let win_seat = (discarder + 1) % 4;
    let discard_kind = TileKind::ElephantRed;
    {
        let seat = room.seats.iter_mut().find(|s| s.index == win_seat).unwrap();
        seat.hand = tiles_of(TileKind::GeneralRed, 2);
        seat.hand.extend(tiles_of(TileKind::AdvisorRed, 3));
        seat.hand.extend(tiles_of(discard_kind, 2));
    }
    let discard = tiles_of(discard_kind, 3).pop().unwrap();
    room.phase = Phase::PlayerDrawn;
    room.current_player_index = Some(discarder);
    {
        let seat = room.seats.iter_mut().find(|s| s.index == discarder).unwrap();
        seat.hand.push(discard);
    }
    room.discard_tile(discarder, discard.id).unwrap();
    assert_eq!(Some(win_seat), room.player_making_claim_decision);

    room.apply_action(win_seat, GameAction::DeclareWin).unwrap();
    assert_eq!(Some(win_seat), room.winner);
}

/// S5 (AI-substitution half): the AI policy's own decision plugs straight
/// into the room's action seam with no special-casing, the same way the
/// server's AI-think timer drives it.
#[test]
fn ai_policy_decision_drives_the_room_through_apply_action() {
    let mut directory = RoomDirectory::new();
    let room_id = directory.create_room(settings(4), "Alice".into(), 1, Pcg64Mcg::seed_from_u64(22));
    let room = directory.room_mut(&room_id).unwrap();
    room.start_match().unwrap();

    let actor = room.current_player_index.unwrap();
    {
        let seat = room.seats.iter_mut().find(|s| s.index == actor).unwrap();
        seat.hand = tiles_of(TileKind::SoldierBlack, 1);
        seat.hand.extend(tiles_of(TileKind::HorseBlack, 2));
        seat.hand.extend(tiles_of(TileKind::CannonBlack, 2));
        seat.hand.extend(tiles_of(TileKind::ChariotBlack, 2));
    }
    room.phase = Phase::PlayerTurnStart;

    let hand = room.seats.iter().find(|s| s.index == actor).unwrap().hand.clone();
    let action = ai::decide_before_draw(&hand);
    assert_eq!(GameAction::DrawTile, action);

    room.apply_action(actor, action).unwrap();
    assert_eq!(Phase::PlayerDrawn, room.phase);
}
