//! Timer roles and their default durations (C6, §4.5).
//!
//! The actual async scheduling (spawning a sleep future and dispatching a
//! synthetic message back into the room's mailbox) lives in the server
//! crate, which owns the `tokio` runtime; this module defines only the
//! closed set of roles, their default durations, and the generation-counter
//! bookkeeping a room uses to make a fired timer a no-op once it is stale.

use std::time::Duration;

/// One of the five timer roles a room can have in flight. At most one timer
/// of each role is live per room (§8 invariant 4); starting a new one
/// cancels the previous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerRole {
    Turn,
    Claim,
    AiThink,
    InterRound,
    EmptyRoom,
}

impl TimerRole {
    /// The fixed (non-randomised) default duration for this role, or `None`
    /// for [`TimerRole::AiThink`] whose duration is drawn per-fire from
    /// [`ai_think_bounds`].
    pub fn default_duration(self) -> Option<Duration> {
        match self {
            TimerRole::Turn => Some(Duration::from_secs(30)),
            TimerRole::Claim => Some(Duration::from_secs(30)),
            TimerRole::AiThink => None,
            TimerRole::InterRound => Some(Duration::from_secs(10)),
            TimerRole::EmptyRoom => Some(Duration::from_secs(60)),
        }
    }

    /// The configurable upper bound on the turn timer (§4.5: "configurable
    /// up to 60").
    pub fn max_turn_duration() -> Duration {
        Duration::from_secs(60)
    }
}

/// Bounds for the uniform-random AI-think delay (§4.5 defaults [700, 2000] ms).
pub fn ai_think_bounds() -> (Duration, Duration) {
    (Duration::from_millis(700), Duration::from_millis(2000))
}

/// Tracks the live generation of each timer role for one room. A timer
/// scheduled for generation `g` is honoured only if `g` still matches the
/// role's current generation when it fires; starting a new timer of a role
/// bumps that role's generation, silently invalidating any in-flight fire.
#[derive(Debug, Clone, Default)]
pub struct TimerGenerations {
    turn: u64,
    claim: u64,
    ai_think: u64,
    inter_round: u64,
    empty_room: u64,
}

impl TimerGenerations {
    fn slot(&mut self, role: TimerRole) -> &mut u64 {
        match role {
            TimerRole::Turn => &mut self.turn,
            TimerRole::Claim => &mut self.claim,
            TimerRole::AiThink => &mut self.ai_think,
            TimerRole::InterRound => &mut self.inter_round,
            TimerRole::EmptyRoom => &mut self.empty_room,
        }
    }

    fn slot_ref(&self, role: TimerRole) -> u64 {
        match role {
            TimerRole::Turn => self.turn,
            TimerRole::Claim => self.claim,
            TimerRole::AiThink => self.ai_think,
            TimerRole::InterRound => self.inter_round,
            TimerRole::EmptyRoom => self.empty_room,
        }
    }

    /// Bumps `role`'s generation and returns the new value, to be captured
    /// by the task that will sleep and then fire.
    pub fn start(&mut self, role: TimerRole) -> u64 {
        let slot = self.slot(role);
        *slot += 1;
        *slot
    }

    /// Whether a fire carrying `generation` for `role` is still current.
    pub fn is_current(&self, role: TimerRole, generation: u64) -> bool {
        self.slot_ref(role) == generation
    }

    /// Invalidates any in-flight timer of `role` without starting a
    /// replacement (used when an action completes and no new timer of that
    /// role is needed yet).
    pub fn cancel(&mut self, role: TimerRole) {
        *self.slot(role) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_a_timer_invalidates_the_previous_generation() {
        let mut gens = TimerGenerations::default();
        let first = gens.start(TimerRole::Turn);
        assert!(gens.is_current(TimerRole::Turn, first));

        let second = gens.start(TimerRole::Turn);
        assert!(!gens.is_current(TimerRole::Turn, first));
        assert!(gens.is_current(TimerRole::Turn, second));
    }

    #[test]
    fn roles_have_independent_generations() {
        let mut gens = TimerGenerations::default();
        gens.start(TimerRole::Turn);
        assert!(gens.is_current(TimerRole::Claim, 0));
    }

    #[test]
    fn cancel_invalidates_without_issuing_a_new_generation_to_anyone() {
        let mut gens = TimerGenerations::default();
        let g = gens.start(TimerRole::EmptyRoom);
        gens.cancel(TimerRole::EmptyRoom);
        assert!(!gens.is_current(TimerRole::EmptyRoom, g));
    }

    #[test]
    fn ai_think_bounds_are_ordered() {
        let (min, max) = ai_think_bounds();
        assert!(min < max);
    }
}
