#[cfg(test)]
mod mcts_tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use osprey::eval::PstEval;
    use osprey::mcts::{MctsParams, MctsSearcher, SearchRng, SearchTree};
    use osprey::position::Position;
    use osprey::tablebase::TablebaseContext;
    use osprey::timeman::{SearchLimits, SearchSignals};

    use shakmaty::CastlingMode;

    // White to move, king on h1, black queen mating on h2, supported by
    // the black king on g3.
    const MATED_ROOT: &str = "8/8/8/8/8/6k1/7q/7K w - - 0 1";
    // Black to move with no legal moves and not in check.
    const STALEMATED_ROOT: &str = "k7/P7/K7/8/8/8/8/8 b - - 0 1";
    // White's only legal move is Kh2.
    const SINGLE_MOVE: &str = "8/p7/8/8/8/8/5k2/7K w - - 0 1";
    // A quiet pawn ending with plenty of play left.
    const PAWN_ENDGAME: &str = "4k3/pppp4/8/8/8/8/PPPP4/4K3 w - - 0 1";

    fn searcher(eval: &PstEval, iterations: u64, seed: u64) -> MctsSearcher<'_> {
        MctsSearcher::new(
            eval,
            TablebaseContext::disabled(),
            SearchLimits {
                iterations: Some(iterations),
                ..SearchLimits::default()
            },
            Arc::new(SearchSignals::new()),
            MctsParams::default(),
            SearchRng::with_seed(seed),
        )
    }

    /// Sum of `num_rollouts` over the root's edges; every back-propagation
    /// that reaches the root goes through exactly one of them.
    fn root_edge_rollouts(tree: &SearchTree) -> u64 {
        tree.node(tree.root())
            .edges
            .iter()
            .map(|&eid| u64::from(tree.edge(eid).num_rollouts))
            .sum()
    }

    #[test]
    fn checkmate_at_root_short_circuits() {
        let eval = PstEval::new();
        let mut pos = Position::from_fen(MATED_ROOT).unwrap();
        let mut tree = SearchTree::new();
        let key = pos.zobrist();

        searcher(&eval, 1, 1).search(&mut pos, &mut tree);

        let root = tree.node(tree.root());
        assert!(root.initialized);
        assert_eq!(root.edges.len() + root.unopened.len(), 0);
        assert!(root.is_terminal());
        // No incoming edge at the root, so nothing was back-propagated.
        assert_eq!(root.total_visits, 0);
        assert!(tree.best_move().is_none());
        assert_eq!(pos.zobrist(), key);
    }

    #[test]
    fn stalemate_at_root_short_circuits() {
        let eval = PstEval::new();
        let mut pos = Position::from_fen(STALEMATED_ROOT).unwrap();
        let mut tree = SearchTree::new();

        searcher(&eval, 1, 1).search(&mut pos, &mut tree);

        let root = tree.node(tree.root());
        assert!(root.initialized);
        assert_eq!(root.edges.len() + root.unopened.len(), 0);
        assert_eq!(root.total_visits, 0);
        assert!(tree.best_move().is_none());
    }

    #[test]
    fn single_legal_move_deepens_through_the_only_edge() {
        let eval = PstEval::new();

        let mut pos = Position::from_fen(SINGLE_MOVE).unwrap();
        let mut tree = SearchTree::new();
        searcher(&eval, 1, 9).search(&mut pos, &mut tree);
        let root = tree.node(tree.root());
        assert_eq!(root.edges.len(), 1);
        assert!(root.unopened.is_empty());
        assert_eq!(root.total_visits, 1);

        let mut pos = Position::from_fen(SINGLE_MOVE).unwrap();
        let mut tree = SearchTree::new();
        searcher(&eval, 2, 9).search(&mut pos, &mut tree);
        let root = tree.node(tree.root());
        assert_eq!(root.edges.len(), 1);
        assert_eq!(root.total_visits, 2);
        let only = tree.edge(root.edges[0]);
        assert_eq!(only.num_rollouts, 2);
        assert_eq!(only.num_evals, 2);
        // The second iteration went one ply deeper through the same edge.
        let child = tree.node(only.child);
        assert_eq!(child.edges.len(), 1);
    }

    #[test]
    fn position_is_restored_after_every_search() {
        let eval = PstEval::new();
        let mut pos = Position::from_fen(PAWN_ENDGAME).unwrap();
        let mut tree = SearchTree::new();
        let key = pos.zobrist();

        searcher(&eval, 200, 3).search(&mut pos, &mut tree);

        assert_eq!(pos.zobrist(), key);
        assert_eq!(pos.num_legal_moves(), Position::from_fen(PAWN_ENDGAME).unwrap().num_legal_moves());
    }

    #[test]
    fn tree_invariants_hold_after_a_search() {
        let eval = PstEval::new();
        let mut pos = Position::from_fen(PAWN_ENDGAME).unwrap();
        let legal = pos.num_legal_moves();
        let mut tree = SearchTree::new();

        searcher(&eval, 200, 3).search(&mut pos, &mut tree);

        let root = tree.node(tree.root());
        // Arity: opened edges plus unopened moves cover the legal moves.
        assert_eq!(root.edges.len() + root.unopened.len(), legal);
        // Each root visit passed through exactly one root edge.
        assert_eq!(root_edge_rollouts(&tree), u64::from(root.total_visits));
        for &eid in &root.edges {
            let edge = tree.edge(eid);
            assert_eq!(edge.num_rollouts, edge.num_evals);
            assert!(edge.overall_eval.abs() <= 1.0 + 1e-9);
        }
        assert!(tree.best_move().is_some());
    }

    #[test]
    fn fixed_seed_searches_are_identical() {
        let eval = PstEval::new();

        let run = |seed: u64| {
            let mut pos = Position::from_fen(PAWN_ENDGAME).unwrap();
            let mut tree = SearchTree::new();
            searcher(&eval, 150, seed).search(&mut pos, &mut tree);
            tree
        };
        let a = run(42);
        let b = run(42);

        assert_eq!(a.num_nodes(), b.num_nodes());
        assert_eq!(a.num_edges(), b.num_edges());

        // Walk both trees in lockstep; construction order is part of the
        // comparison, so edges must match position by position.
        let mut queue = vec![(a.root(), b.root())];
        while let Some((na, nb)) = queue.pop() {
            let node_a = a.node(na);
            let node_b = b.node(nb);
            assert_eq!(node_a.total_visits, node_b.total_visits);
            assert_eq!(node_a.max_child_visits, node_b.max_child_visits);
            assert_eq!(node_a.edges.len(), node_b.edges.len());
            assert_eq!(node_a.unopened.len(), node_b.unopened.len());
            for (&ea, &eb) in node_a.edges.iter().zip(&node_b.edges) {
                let edge_a = a.edge(ea);
                let edge_b = b.edge(eb);
                assert_eq!(
                    edge_a.mv.to_uci(CastlingMode::Standard).to_string(),
                    edge_b.mv.to_uci(CastlingMode::Standard).to_string()
                );
                assert_eq!(edge_a.num_rollouts, edge_b.num_rollouts);
                assert_eq!(edge_a.rollouts_sum, edge_b.rollouts_sum);
                assert_eq!(edge_a.num_evals, edge_b.num_evals);
                assert_eq!(edge_a.eval_sum, edge_b.eval_sum);
                assert_eq!(edge_a.overall_eval, edge_b.overall_eval);
                queue.push((edge_a.child, edge_b.child));
            }
        }
    }

    #[test]
    fn different_seeds_may_diverge_but_stay_consistent() {
        let eval = PstEval::new();
        for seed in [1, 2, 3] {
            let mut pos = Position::from_fen(PAWN_ENDGAME).unwrap();
            let legal = pos.num_legal_moves();
            let mut tree = SearchTree::new();
            searcher(&eval, 60, seed).search(&mut pos, &mut tree);
            let root = tree.node(tree.root());
            assert_eq!(root.edges.len() + root.unopened.len(), legal);
            assert_eq!(root_edge_rollouts(&tree), u64::from(root.total_visits));
        }
    }

    #[test]
    fn stop_signal_ends_the_search_promptly() {
        let eval = PstEval::new();
        let mut pos = Position::from_fen(PAWN_ENDGAME).unwrap();
        let legal = pos.num_legal_moves();
        let key = pos.zobrist();
        let mut tree = SearchTree::new();

        let signals = Arc::new(SearchSignals::new());
        let mut searcher = MctsSearcher::new(
            &eval,
            TablebaseContext::disabled(),
            SearchLimits::default(),
            Arc::clone(&signals),
            MctsParams::default(),
            SearchRng::with_seed(5),
        );

        let stopper = {
            let signals = Arc::clone(&signals);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(100));
                signals.set_stop(true);
            })
        };
        searcher.search(&mut pos, &mut tree);
        stopper.join().unwrap();

        // The loop exited on the flag and left everything consistent.
        assert_eq!(pos.zobrist(), key);
        let root = tree.node(tree.root());
        assert_eq!(root.edges.len() + root.unopened.len(), legal);
        assert_eq!(root_edge_rollouts(&tree), u64::from(root.total_visits));
    }

    #[test]
    fn best_move_is_the_most_rolled_out_root_edge() {
        let eval = PstEval::new();
        let mut pos = Position::from_fen(PAWN_ENDGAME).unwrap();
        let mut tree = SearchTree::new();
        searcher(&eval, 120, 8).search(&mut pos, &mut tree);

        let best = tree.best_move().unwrap();
        let root = tree.node(tree.root());
        let max_rollouts = root
            .edges
            .iter()
            .map(|&eid| tree.edge(eid).num_rollouts)
            .max()
            .unwrap();
        let best_edge = root
            .edges
            .iter()
            .map(|&eid| tree.edge(eid))
            .find(|e| e.mv == best)
            .unwrap();
        assert_eq!(best_edge.num_rollouts, max_rollouts);
    }
}
