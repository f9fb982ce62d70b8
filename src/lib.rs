//! # Osprey chess engine library
//!
//! A chess engine whose search is a Monte Carlo Tree Search driver layered
//! on top of an external rules engine: tree selection by a PUCT-style
//! bound, softmax move priors derived from a static evaluation, weighted
//! rollouts, and negamax back-propagation over a single mutable position.
//!
//! It provides modules for:
//! - Position handling and move undo (`position`)
//! - Evaluation (`eval`, `eval_constants`)
//! - The search itself (`mcts`)
//! - Endgame tablebase probing (`tablebase`)
//! - Time management and the stop signal (`timeman`)
//! - UCI protocol handling (`uci`)

pub mod eval;
pub mod eval_constants;
pub mod mcts;
pub mod position;
pub mod tablebase;
pub mod timeman;
pub mod uci;
