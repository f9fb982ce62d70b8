//! Game-result classification for the search and the rollouts.

use crate::position::Position;
use crate::tablebase::TablebaseContext;

/// Outcome of a position from the perspective of the side to move.
/// The numeric values double as signed rollout outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayingResult {
    Win,
    Lose,
    Tie,
    Continue,
}

impl PlayingResult {
    pub fn value(self) -> i32 {
        match self {
            PlayingResult::Win => 1,
            PlayingResult::Lose => -1,
            PlayingResult::Tie => 0,
            PlayingResult::Continue => 2,
        }
    }

    /// The same outcome seen from the other side.
    pub fn flipped(self) -> PlayingResult {
        match self {
            PlayingResult::Win => PlayingResult::Lose,
            PlayingResult::Lose => PlayingResult::Win,
            other => other,
        }
    }
}

/// Classifies `pos` for the side to move; `num_moves` is the legal-move
/// count at `pos`. Does not mutate the position.
///
/// Variant rule: any piece other than a pawn or a king decides the game
/// immediately, in favor of the side to move when it owns one.
pub fn game_result(pos: &Position, num_moves: usize, tb: &TablebaseContext) -> PlayingResult {
    if let Some(result) = tb.probe_result(pos) {
        return result;
    }

    let promoted = pos.promoted_pieces();
    if promoted.any() {
        return if (promoted & pos.our_pieces()).any() {
            PlayingResult::Win
        } else {
            PlayingResult::Lose
        };
    }

    if num_moves == 0 {
        return if pos.in_check() {
            PlayingResult::Lose
        } else {
            PlayingResult::Tie
        };
    }

    if pos.is_draw() {
        return PlayingResult::Tie;
    }
    PlayingResult::Continue
}
