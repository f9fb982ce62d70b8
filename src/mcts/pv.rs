//! Principal-variation extraction and the UCI info line.

use std::fmt::Write as _;
use std::time::Duration;

use shakmaty::{CastlingMode, Move};

use crate::eval::unit_to_cp;
use crate::eval_constants::VALUE_MATE;
use crate::mcts::node::SearchTree;
use crate::position::MAX_PLY;

pub struct MctsPv {
    pub moves: Vec<Move>,
    /// PV length; also reported as depth and seldepth.
    pub depth: usize,
    /// `overall_eval` of the root edge on the PV, if any.
    pub score: Option<f64>,
}

/// Walks the most-visited path from the root. The walk stops at a node
/// that is not fully opened, has fewer than `pv_threshold` visits, or has
/// no edge.
pub fn mcts_pv(tree: &SearchTree, pv_threshold: u32) -> MctsPv {
    let mut moves = Vec::new();
    let mut score = None;
    let mut node = tree.root();

    loop {
        let n = tree.node(node);
        if !n.fully_opened() || n.total_visits < pv_threshold {
            break;
        }
        let eid = match tree.best_child_by_rollouts(node) {
            Some(eid) => eid,
            None => break,
        };
        let edge = tree.edge(eid);
        if score.is_none() {
            score = Some(edge.overall_eval);
        }
        moves.push(edge.mv.clone());
        node = edge.child;
    }

    MctsPv {
        depth: moves.len(),
        moves,
        score,
    }
}

/// UCI score field: centipawns, or moves-to-mate inside the mate range.
fn value_string(v: i32) -> String {
    if v.abs() >= VALUE_MATE - MAX_PLY as i32 {
        let mate = if v > 0 {
            (VALUE_MATE - v + 1) / 2
        } else {
            -(VALUE_MATE + v) / 2
        };
        format!("mate {}", mate)
    } else {
        format!("cp {}", v)
    }
}

/// Formats one `info` line for the current PV, or an empty string when the
/// PV is not yet deeper than one ply.
pub fn mcts_pv_print(
    tree: &SearchTree,
    pv_threshold: u32,
    elapsed: Duration,
    nodes: u64,
    tbhits: u64,
) -> String {
    let pv = mcts_pv(tree, pv_threshold);
    if pv.depth <= 1 {
        return String::new();
    }

    let elapsed_ms = (elapsed.as_millis() as u64).max(1);
    let score = unit_to_cp(pv.score.unwrap_or(0.0));

    let mut line = String::new();
    let _ = write!(
        line,
        "info depth {} seldepth {} multipv 1 score {}",
        pv.depth,
        pv.depth,
        value_string(score)
    );
    let _ = write!(line, " nodes {} nps {}", nodes, nodes * 1000 / elapsed_ms);
    let _ = write!(line, " tbhits {} time {} pv", tbhits, elapsed_ms);
    for mv in &pv.moves {
        let _ = write!(line, " {}", mv.to_uci(CastlingMode::Standard));
    }
    line
}
