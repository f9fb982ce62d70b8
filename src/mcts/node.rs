//! The search tree.
//!
//! Nodes and edges live in one arena owned by [`SearchTree`]; `NodeId` and
//! `EdgeId` indices stay valid while sibling vectors reallocate, so the
//! back-propagation up-walk can follow `incoming_edge` directly. An edge
//! owns its child node; the back-reference from a node to its incoming
//! edge is just an index, so the tree stays acyclic by construction.

use shakmaty::Move;

use crate::eval::PstEval;
use crate::mcts::prior::{self, SearchRng};
use crate::position::Position;

pub type NumVisits = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeId(u32);

/// A legal move that has not yet become an edge.
#[derive(Debug, Clone)]
pub struct UnopenedMove {
    pub mv: Move,
    /// e^(eval/t - max), the softmax numerator.
    pub exp_prior: f64,
    /// Normalized over the node's full move set; fixed once computed.
    pub absolute_prior: f64,
    /// Normalized over the moves still unopened; sums to 1 across them.
    pub relative_prior: f64,
}

/// The not-yet-opened moves of a node, with the running sum of their
/// softmax numerators.
#[derive(Debug, Default)]
pub struct UnopenedMoves {
    pub moves: Vec<UnopenedMove>,
    pub sum_exp_priors: f64,
}

impl UnopenedMoves {
    fn initialize(&mut self, pos: &mut Position, eval: &PstEval) {
        let legal = pos.legal_moves();
        let exps = prior::calc_exp_evals(pos, eval, &legal);
        let sum: f64 = exps.iter().sum();
        self.moves = legal
            .iter()
            .zip(exps)
            .map(|(mv, exp)| UnopenedMove {
                mv: mv.clone(),
                exp_prior: exp,
                absolute_prior: exp / sum,
                relative_prior: exp / sum,
            })
            .collect();
        self.sum_exp_priors = sum;
    }

    /// Removes the move at `idx` and renormalizes the remaining relative
    /// priors over the reduced numerator sum.
    fn remove(&mut self, idx: usize) -> UnopenedMove {
        let removed = self.moves.remove(idx);
        self.sum_exp_priors -= removed.exp_prior;
        for mv in &mut self.moves {
            mv.relative_prior = mv.exp_prior / self.sum_exp_priors;
        }
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }
}

#[derive(Debug)]
pub struct MctsNode {
    /// Set the first time the legal-move set at this node is needed.
    pub initialized: bool,
    pub edges: Vec<EdgeId>,
    pub unopened: UnopenedMoves,
    pub total_visits: NumVisits,
    pub max_child_visits: NumVisits,
    /// Back-reference to the parent edge; `None` for the root.
    pub incoming_edge: Option<EdgeId>,
}

impl MctsNode {
    fn new(incoming_edge: Option<EdgeId>) -> Self {
        MctsNode {
            initialized: false,
            edges: Vec::new(),
            unopened: UnopenedMoves::default(),
            total_visits: 0,
            max_child_visits: 0,
            incoming_edge,
        }
    }

    /// Every legal continuation has an owned edge.
    pub fn fully_opened(&self) -> bool {
        self.initialized && self.unopened.is_empty() && !self.edges.is_empty()
    }

    /// No legal continuation at all (checkmate or stalemate).
    pub fn is_terminal(&self) -> bool {
        self.initialized && self.unopened.is_empty() && self.edges.is_empty()
    }

    /// Back-propagation bookkeeping for one visit through a child edge.
    pub fn update_child_stats(&mut self, child_rollouts: NumVisits) {
        self.total_visits += 1;
        self.max_child_visits = self.max_child_visits.max(child_rollouts);
    }
}

#[derive(Debug)]
pub struct MctsEdge {
    pub mv: Move,
    /// Absolute prior at creation time; the UCT exploration weight.
    pub prior: f64,
    pub rollouts_sum: i64,
    pub num_rollouts: NumVisits,
    pub eval_sum: f64,
    pub num_evals: NumVisits,
    /// Cached combination of the rollout and evaluation means.
    pub overall_eval: f64,
    pub parent: NodeId,
    pub child: NodeId,
}

impl MctsEdge {
    fn new(mv: Move, prior: f64, parent: NodeId, child: NodeId) -> Self {
        MctsEdge {
            mv,
            prior,
            rollouts_sum: 0,
            num_rollouts: 0,
            eval_sum: 0.0,
            num_evals: 0,
            overall_eval: prior,
            parent,
            child,
        }
    }

    /// Folds one back-propagated (rollout, eval) pair into the accumulators
    /// and refreshes the combined score.
    pub fn update_stats(&mut self, rollout_result: i32, eval_result: f64, eval_weight: f64) {
        self.rollouts_sum += i64::from(rollout_result);
        self.num_rollouts += 1;
        self.eval_sum += eval_result;
        self.num_evals += 1;
        self.overall_eval = (1.0 - eval_weight)
            * (self.rollouts_sum as f64 / f64::from(self.num_rollouts))
            + eval_weight * (self.eval_sum / f64::from(self.num_evals));
    }
}

/// Arena-backed search tree; the root is created up front.
pub struct SearchTree {
    nodes: Vec<MctsNode>,
    edges: Vec<MctsEdge>,
}

impl SearchTree {
    pub fn new() -> Self {
        SearchTree {
            nodes: vec![MctsNode::new(None)],
            edges: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: NodeId) -> &MctsNode {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut MctsNode {
        &mut self.nodes[id.0 as usize]
    }

    pub fn edge(&self, id: EdgeId) -> &MctsEdge {
        &self.edges[id.0 as usize]
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> &mut MctsEdge {
        &mut self.edges[id.0 as usize]
    }

    /// Generates the legal moves and their priors at `id`. Idempotent.
    pub fn initialize(&mut self, id: NodeId, pos: &mut Position, eval: &PstEval) {
        let node = &mut self.nodes[id.0 as usize];
        if !node.initialized {
            node.initialized = true;
            node.unopened.initialize(pos, eval);
        }
    }

    /// Legal-move count at `id`, initializing the node first.
    pub fn num_moves(&mut self, id: NodeId, pos: &mut Position, eval: &PstEval) -> usize {
        self.initialize(id, pos, eval);
        let node = self.node(id);
        node.edges.len() + node.unopened.len()
    }

    /// Samples one unopened move by relative prior and turns it into an
    /// edge leading to a fresh uninitialized node.
    pub fn open_child(
        &mut self,
        id: NodeId,
        pos: &mut Position,
        eval: &PstEval,
        rng: &mut SearchRng,
    ) -> EdgeId {
        self.initialize(id, pos, eval);
        let idx = {
            let node = self.node(id);
            assert!(
                !node.unopened.is_empty(),
                "open_child called on a node without unopened moves"
            );
            let weights: Vec<f64> = node
                .unopened
                .moves
                .iter()
                .map(|mv| mv.relative_prior)
                .collect();
            rng.sample_index(&weights)
        };
        let picked = self.node_mut(id).unopened.remove(idx);

        let child = NodeId(self.nodes.len() as u32);
        let edge = EdgeId(self.edges.len() as u32);
        self.nodes.push(MctsNode::new(Some(edge)));
        self.edges
            .push(MctsEdge::new(picked.mv, picked.absolute_prior, id, child));
        self.node_mut(id).edges.push(edge);
        edge
    }

    /// The child edge of `id` with the most rollouts, first-seen on ties.
    pub fn best_child_by_rollouts(&self, id: NodeId) -> Option<EdgeId> {
        let node = self.node(id);
        let mut best: Option<EdgeId> = None;
        let mut best_rollouts = 0;
        for &eid in &node.edges {
            let rollouts = self.edge(eid).num_rollouts;
            if best.is_none() || rollouts > best_rollouts {
                best = Some(eid);
                best_rollouts = rollouts;
            }
        }
        best
    }

    /// The recommended move at the root, or `None` when the root has no
    /// opened edge (uninitialized or terminal).
    pub fn best_move(&self) -> Option<Move> {
        self.best_child_by_rollouts(self.root())
            .map(|eid| self.edge(eid).mv.clone())
    }
}

impl Default for SearchTree {
    fn default() -> Self {
        SearchTree::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAWN_ENDGAME: &str = "4k3/pppp4/8/8/8/8/PPPP4/4K3 w - - 0 1";

    fn prior_sums(tree: &SearchTree, id: NodeId) -> (f64, f64) {
        let node = tree.node(id);
        let absolute: f64 = node.unopened.moves.iter().map(|m| m.absolute_prior).sum();
        let relative: f64 = node.unopened.moves.iter().map(|m| m.relative_prior).sum();
        (absolute, relative)
    }

    #[test]
    fn initialize_is_idempotent() {
        let mut pos = Position::from_fen(PAWN_ENDGAME).unwrap();
        let eval = PstEval::new();
        let mut tree = SearchTree::new();
        let root = tree.root();

        tree.initialize(root, &mut pos, &eval);
        let count = tree.node(root).unopened.len();
        let sum = tree.node(root).unopened.sum_exp_priors;
        tree.initialize(root, &mut pos, &eval);
        assert_eq!(tree.node(root).unopened.len(), count);
        assert_eq!(tree.node(root).unopened.sum_exp_priors, sum);
    }

    #[test]
    fn node_arity_matches_legal_move_count() {
        let mut pos = Position::from_fen(PAWN_ENDGAME).unwrap();
        let eval = PstEval::new();
        let mut tree = SearchTree::new();
        let root = tree.root();
        let legal = pos.num_legal_moves();

        assert_eq!(tree.num_moves(root, &mut pos, &eval), legal);
        let mut rng = SearchRng::with_seed(1);
        tree.open_child(root, &mut pos, &eval, &mut rng);
        tree.open_child(root, &mut pos, &eval, &mut rng);
        let node = tree.node(root);
        assert_eq!(node.edges.len() + node.unopened.len(), legal);
    }

    #[test]
    fn open_child_renormalizes_relative_priors() {
        let mut pos = Position::from_fen(PAWN_ENDGAME).unwrap();
        let eval = PstEval::new();
        let mut tree = SearchTree::new();
        let root = tree.root();
        tree.initialize(root, &mut pos, &eval);

        let (absolute, relative) = prior_sums(&tree, root);
        assert!((absolute - 1.0).abs() < 1e-9);
        assert!((relative - 1.0).abs() < 1e-9);
        let before: Vec<f64> = tree
            .node(root)
            .unopened
            .moves
            .iter()
            .map(|m| m.absolute_prior)
            .collect();

        let mut rng = SearchRng::with_seed(5);
        let edge = tree.open_child(root, &mut pos, &eval, &mut rng);
        assert_eq!(tree.edge(edge).overall_eval, tree.edge(edge).prior);

        let (_, relative) = prior_sums(&tree, root);
        assert!((relative - 1.0).abs() < 1e-9);
        // Absolute priors of the remaining moves are untouched.
        let after: Vec<f64> = tree
            .node(root)
            .unopened
            .moves
            .iter()
            .map(|m| m.absolute_prior)
            .collect();
        for value in &after {
            assert!(before.contains(value));
        }
    }

    #[test]
    #[should_panic(expected = "open_child")]
    fn open_child_on_a_terminal_node_panics() {
        let mut pos = Position::from_fen("8/8/8/8/8/1p6/1p6/K1k5 w - - 0 1").unwrap();
        let eval = PstEval::new();
        let mut tree = SearchTree::new();
        let root = tree.root();
        let mut rng = SearchRng::with_seed(1);
        tree.open_child(root, &mut pos, &eval, &mut rng);
    }
}
