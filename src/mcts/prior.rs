//! Move priors and weighted sampling.
//!
//! Each legal move is scored by a *safe* static evaluation of the position
//! after it (checks are resolved through [`qeval`] first), and the scores
//! are turned into a probability distribution with a max-shifted softmax.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shakmaty::Move;

use crate::eval::PstEval;
use crate::eval_constants::{VALUE_INFINITE, VALUE_MATE};
use crate::position::{Position, StateInfo};

/// Pawn-scale temperature of the prior softmax, in centipawns. Dividing by
/// this keeps the eval spread O(1) so the softmax peaks stay meaningful.
pub const NORMALIZATION_FACTOR: f64 = 200.0;

/// The search's random source. Seeded from the wall clock by default; an
/// injected seed makes a whole search reproducible.
pub struct SearchRng {
    rng: StdRng,
    seed: u64,
}

impl SearchRng {
    pub fn from_clock() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9e37_79b9_7f4a_7c15);
        SearchRng::with_seed(seed)
    }

    pub fn with_seed(seed: u64) -> Self {
        SearchRng {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Draws an index from the categorical distribution given by `weights`.
    /// Weights must be non-negative with a positive sum S; a uniform draw
    /// from [0, S) picks the first index whose running sum exceeds it.
    pub fn sample_index(&mut self, weights: &[f64]) -> usize {
        let total: f64 = weights.iter().sum();
        assert!(total > 0.0, "sample_index requires a positive weight sum");
        let stop = self.rng.gen_range(0.0..total);
        let mut partial = 0.0;
        for (i, w) in weights.iter().enumerate() {
            partial += w;
            if partial > stop {
                return i;
            }
        }
        // Rounding can leave the running sum just below the draw.
        weights.len() - 1
    }
}

/// Evaluation of the position after `mv`, from the mover's perspective.
/// Checking moves are resolved through the quiescence evaluator so that a
/// spite check does not read as a good move.
pub fn safe_eval(pos: &mut Position, eval: &PstEval, mv: &Move) -> i32 {
    let mut st = StateInfo::default();
    let gives_check = pos.gives_check(mv);
    pos.make_move(mv, &mut st);
    let value = if gives_check {
        -qeval(pos, eval)
    } else {
        -eval.evaluate(pos)
    };
    pos.undo_move(&mut st);
    value
}

/// While the side to move is in check, expands every evasion and returns
/// the negamax of their evaluations; quiet positions fall back to the
/// static evaluation. Returns `-VALUE_MATE` when there is no evasion.
pub fn qeval(pos: &mut Position, eval: &PstEval) -> i32 {
    if !pos.in_check() {
        return eval.evaluate(pos);
    }
    let evasions = pos.legal_moves();
    if evasions.is_empty() {
        return -VALUE_MATE;
    }

    let mut best = -VALUE_INFINITE;
    let mut st = StateInfo::default();
    for mv in &evasions {
        let gives_check = pos.gives_check(mv);
        pos.make_move(mv, &mut st);
        let value = if gives_check {
            -qeval(pos, eval)
        } else {
            -eval.evaluate(pos)
        };
        pos.undo_move(&mut st);
        best = best.max(value);
    }
    best
}

/// Max-shifted exponentials e^(x - max): the softmax numerators.
/// Subtracting the maximum keeps the exponentials from overflowing and
/// makes the result invariant to a constant offset on the inputs.
pub fn shifted_exps(raw: &[f64]) -> Vec<f64> {
    let max = raw.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    raw.iter().map(|x| (x - max).exp()).collect()
}

/// Unnormalized softmax numerators e^(x/t - max) for every move.
pub fn calc_exp_evals(pos: &mut Position, eval: &PstEval, moves: &[Move]) -> Vec<f64> {
    let raw: Vec<f64> = moves
        .iter()
        .map(|mv| safe_eval(pos, eval, mv) as f64 / NORMALIZATION_FACTOR)
        .collect();
    shifted_exps(&raw)
}

/// Softmax priors over `moves`; sums to 1 for a non-empty move set.
pub fn calc_priors(pos: &mut Position, eval: &PstEval, moves: &[Move]) -> Vec<f64> {
    let exps = calc_exp_evals(pos, eval, moves);
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
