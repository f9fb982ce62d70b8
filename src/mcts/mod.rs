//! Monte Carlo Tree Search.
//!
//! One iteration walks the tree by UCT while nodes are fully opened, opens
//! one new edge at the leaf, scores the landing position with a rollout
//! plus a saturated static evaluation, and folds both results back up the
//! path with negamax sign flips. All moves are made and undone on a single
//! mutable [`Position`].

pub mod game_result;
pub mod node;
pub mod prior;
pub mod pv;
pub mod rollout;

use std::sync::Arc;

use crate::eval::{unit_eval, PstEval};
use crate::position::{Position, UndoStack, MAX_PLY};
use crate::tablebase::TablebaseContext;
use crate::timeman::{SearchLimits, SearchSignals, TimeManager};

pub use self::game_result::{game_result, PlayingResult};
pub use self::node::{EdgeId, MctsEdge, MctsNode, NodeId, SearchTree};
pub use self::prior::SearchRng;
pub use self::pv::{mcts_pv, mcts_pv_print};
pub use self::rollout::rollout;

/// Tunable search constants.
#[derive(Debug, Clone)]
pub struct MctsParams {
    /// Coefficient of the UCT exploration bonus.
    pub cpuct: f64,
    /// Exponent on the parent visit count in the exploration bonus.
    pub visit_exponent: f64,
    /// Weight of the evaluation mean against the rollout mean in an
    /// edge's combined score.
    pub eval_weight: f64,
    /// Minimum visits before a node contributes to the PV.
    pub pv_threshold: u32,
    /// Iterations between stop/time polls and PV prints.
    pub check_interval: u64,
}

impl Default for MctsParams {
    fn default() -> Self {
        MctsParams {
            cpuct: 0.01,
            visit_exponent: 0.5,
            eval_weight: 0.2,
            pv_threshold: 7,
            check_interval: 16,
        }
    }
}

/// Drives the search loop over one position and one tree.
pub struct MctsSearcher<'a> {
    eval: &'a PstEval,
    tb: TablebaseContext,
    limits: SearchLimits,
    signals: Arc<SearchSignals>,
    params: MctsParams,
    rng: SearchRng,
    stack: UndoStack,
    nodes_searched: u64,
}

impl<'a> MctsSearcher<'a> {
    pub fn new(
        eval: &'a PstEval,
        tb: TablebaseContext,
        limits: SearchLimits,
        signals: Arc<SearchSignals>,
        params: MctsParams,
        rng: SearchRng,
    ) -> Self {
        MctsSearcher {
            eval,
            tb,
            limits,
            signals,
            params,
            rng,
            stack: UndoStack::new(),
            nodes_searched: 0,
        }
    }

    pub fn nodes_searched(&self) -> u64 {
        self.nodes_searched
    }

    pub fn tb_hits(&self) -> u64 {
        self.tb.hits()
    }

    pub fn rng_seed(&self) -> u64 {
        self.rng.seed()
    }

    /// Runs iterations until the stop signal or the iteration cap fires,
    /// growing `tree` and emitting periodic info lines. The position is
    /// restored to its entry state between iterations and on return.
    pub fn search(&mut self, pos: &mut Position, tree: &mut SearchTree) {
        let mut time = TimeManager::new(&self.limits, pos.side_to_move());
        let mut last_pv_ms: u128 = 0;
        let mut iteration: u64 = 0;

        while !self.signals.stop() {
            if let Some(cap) = self.limits.iterations {
                if iteration >= cap {
                    break;
                }
            }
            iteration += 1;
            self.run_iteration(pos, tree);

            if iteration % self.params.check_interval == 0 {
                time.check_time(&self.limits, &self.signals, self.nodes_searched);
                let elapsed = time.elapsed();
                if elapsed.as_millis() >= last_pv_ms + 1000 {
                    last_pv_ms = elapsed.as_millis();
                    let line = pv::mcts_pv_print(
                        tree,
                        self.params.pv_threshold,
                        elapsed,
                        self.nodes_searched,
                        self.tb.hits(),
                    );
                    if !line.is_empty() {
                        println!("{}", line);
                    }
                }
            }
        }
    }

    /// One selection, expansion, evaluation and back-propagation cycle.
    fn run_iteration(&mut self, pos: &mut Position, tree: &mut SearchTree) {
        let mut cursor = 0usize;
        let mut node = tree.root();

        let num_moves = tree.num_moves(node, pos, self.eval);
        let mut result = game_result(pos, num_moves, &self.tb);

        // Descent through fully-opened nodes.
        while result == PlayingResult::Continue && tree.node(node).fully_opened() {
            if cursor == MAX_PLY {
                result = PlayingResult::Tie;
                break;
            }
            let edge = self.select_child_uct(tree, node);
            let mv = tree.edge(edge).mv.clone();
            pos.make_move(&mv, self.stack.slot(cursor));
            cursor += 1;
            self.nodes_searched += 1;
            node = tree.edge(edge).child;

            let num_moves = tree.num_moves(node, pos, self.eval);
            result = game_result(pos, num_moves, &self.tb);
        }

        let rollout_result;
        let eval_result;
        if result != PlayingResult::Continue {
            rollout_result = result.value();
            eval_result = f64::from(rollout_result);
        } else if cursor == MAX_PLY {
            // Leaf sits at the depth cap; the continuation counts as a tie.
            rollout_result = 0;
            eval_result = 0.0;
        } else {
            // Expansion: open one new edge and land on its child.
            let edge = tree.open_child(node, pos, self.eval, &mut self.rng);
            let mv = tree.edge(edge).mv.clone();
            pos.make_move(&mv, self.stack.slot(cursor));
            cursor += 1;
            self.nodes_searched += 1;
            node = tree.edge(edge).child;

            let landing = game_result(pos, pos.num_legal_moves(), &self.tb);
            if landing != PlayingResult::Continue {
                rollout_result = landing.value();
                eval_result = f64::from(rollout_result);
            } else {
                rollout_result = rollout::rollout(
                    pos,
                    &mut self.stack,
                    &mut cursor,
                    self.eval,
                    &self.tb,
                    &mut self.rng,
                    &mut self.nodes_searched,
                )
                .value();
                eval_result = unit_eval(self.eval.evaluate(pos));
            }
        }

        // Back-propagation with negamax sign flips.
        let mut rollout_value = rollout_result;
        let mut eval_value = eval_result;
        while let Some(edge) = tree.node(node).incoming_edge {
            tree.edge_mut(edge)
                .update_stats(rollout_value, eval_value, self.params.eval_weight);
            cursor -= 1;
            pos.undo_move(self.stack.slot(cursor));
            node = tree.edge(edge).parent;
            rollout_value = -rollout_value;
            eval_value = -eval_value;
            let child_rollouts = tree.edge(edge).num_rollouts;
            tree.node_mut(node).update_child_stats(child_rollouts);
        }
        debug_assert_eq!(cursor, 0, "make/undo pairing broke within an iteration");
    }

    /// PUCT-style pick among the opened edges of a fully-opened node.
    /// Ties break toward the first-seen edge.
    fn select_child_uct(&self, tree: &SearchTree, node: NodeId) -> EdgeId {
        let n = tree.node(node);
        let total = f64::from(n.total_visits);
        let mut best: Option<EdgeId> = None;
        let mut best_score = f64::NEG_INFINITY;
        for &eid in &n.edges {
            let edge = tree.edge(eid);
            let score = edge.overall_eval
                + self.params.cpuct * edge.prior * total.powf(self.params.visit_exponent)
                    / (1.0 + f64::from(edge.num_rollouts));
            if score > best_score {
                best_score = score;
                best = Some(eid);
            }
        }
        best.expect("UCT selection requires at least one opened edge")
    }
}
