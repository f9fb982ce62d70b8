//! The simulation (rollout) phase.

use crate::eval::PstEval;
use crate::mcts::game_result::{game_result, PlayingResult};
use crate::mcts::prior::{calc_priors, SearchRng};
use crate::position::{Position, UndoStack, MAX_PLY};
use crate::tablebase::TablebaseContext;

/// Plays a prior-weighted game from `pos` until a terminal outcome, or a
/// forced tie when the undo stack runs out, then unwinds every move played
/// so the position is restored bit-exactly. The returned result is from
/// the perspective of the side to move at the start of the rollout.
pub fn rollout(
    pos: &mut Position,
    stack: &mut UndoStack,
    cursor: &mut usize,
    eval: &PstEval,
    tb: &TablebaseContext,
    rng: &mut SearchRng,
    nodes: &mut u64,
) -> PlayingResult {
    let start = *cursor;
    let mut moves = pos.legal_moves();
    let mut result = game_result(pos, moves.len(), tb);

    while result == PlayingResult::Continue {
        if *cursor == MAX_PLY {
            result = PlayingResult::Tie;
            break;
        }
        let priors = calc_priors(pos, eval, &moves);
        let mv = moves[rng.sample_index(&priors)].clone();
        pos.make_move(&mv, stack.slot(*cursor));
        *cursor += 1;
        *nodes += 1;

        moves = pos.legal_moves();
        result = game_result(pos, moves.len(), tb);
    }

    // Unwind, flipping the perspective once per ply.
    while *cursor > start {
        *cursor -= 1;
        pos.undo_move(stack.slot(*cursor));
        result = result.flipped();
    }
    result
}
