//! Dijkstra–Safra coloured-token ring termination detection (`spec.md`
//! §4.5.2): rank 0 circulates a token that blackens on passing through a
//! process with outstanding requests; a white token surviving a full
//! traversal, with rank 0 itself idle, proves quiescence. There is no
//! single original header for this (the original links it in via a
//! third-party terminator); this module follows `spec.md` §4.5.2 directly.

use serde::{Deserialize, Serialize};

/// A process's colour: black if it has sent a request it has not yet
/// seen resolved since it last turned white.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Color {
    White,
    Black,
}

/// The token passed around the ring.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TokenMessage {
    pub color: Color,
}

/// Per-process bookkeeping the coloured-token protocol needs: whether
/// this process is currently "active" (has outstanding hard-sync client
/// requests), which taints the token it forwards.
#[derive(Default)]
pub struct TerminationState {
    inflight: u32,
    dirty: bool,
    done: bool,
}

impl TerminationState {
    pub fn new() -> Self {
        TerminationState::default()
    }

    /// Called when a client request is issued, before waiting on its
    /// response.
    pub fn request_started(&mut self) {
        self.inflight += 1;
        self.dirty = true;
    }

    /// Called once a client request's response has been fully received.
    pub fn request_finished(&mut self) {
        self.inflight = self.inflight.saturating_sub(1);
    }

    /// Whether this process currently has work in flight (and so would
    /// blacken a token passing through it).
    pub fn is_active(&self) -> bool {
        self.inflight > 0 || self.dirty
    }

    /// The colour this process contributes when it forwards the token:
    /// black if it is active or the incoming token was already black.
    /// Resets this process's own `dirty` flag, so a later request starts
    /// the next round fresh.
    pub fn forward_color(&mut self, incoming: Color) -> Color {
        let color = if self.is_active() || incoming == Color::Black { Color::Black } else { Color::White };
        self.dirty = false;
        color
    }

    pub fn mark_done(&mut self) {
        self.done = true;
    }

    pub fn take_done(&mut self) -> bool {
        std::mem::replace(&mut self.done, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_process_forwards_a_white_token_unchanged() {
        let mut state = TerminationState::new();
        assert_eq!(state.forward_color(Color::White), Color::White);
    }

    #[test]
    fn active_process_blackens_the_token() {
        let mut state = TerminationState::new();
        state.request_started();
        assert_eq!(state.forward_color(Color::White), Color::Black);
    }

    #[test]
    fn a_black_token_stays_black_through_an_idle_process() {
        let mut state = TerminationState::new();
        assert_eq!(state.forward_color(Color::Black), Color::Black);
    }

    #[test]
    fn finishing_all_requests_lets_the_next_round_go_white() {
        let mut state = TerminationState::new();
        state.request_started();
        state.forward_color(Color::White);
        state.request_finished();
        assert_eq!(state.forward_color(Color::White), Color::White);
    }
}
