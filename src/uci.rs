//! UCI protocol handling.
//!
//! `go` launches the search on its own thread so the input loop stays free
//! to deliver `stop`; the shared stop flag is the only state both threads
//! touch. The search thread prints its own info lines and the final
//! `bestmove`.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use shakmaty::{CastlingMode, Chess};
use shakmaty_syzygy::Tablebase;

use crate::eval::PstEval;
use crate::mcts::{MctsParams, MctsSearcher, SearchRng, SearchTree};
use crate::position::Position;
use crate::tablebase::{self, TablebaseContext};
use crate::timeman::{SearchLimits, SearchSignals};

/// Values of the registered UCI options.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub syzygy_path: Option<PathBuf>,
    pub syzygy_50_move_rule: bool,
    pub syzygy_probe_depth: i32,
    pub syzygy_probe_limit: usize,
    /// Weight of the evaluation mean in an edge's combined score, percent.
    pub mcts_eval_weight: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            syzygy_path: None,
            syzygy_50_move_rule: true,
            syzygy_probe_depth: 1,
            syzygy_probe_limit: 6,
            mcts_eval_weight: 20,
        }
    }
}

pub struct UciEngine {
    position: Position,
    options: EngineOptions,
    tables: Option<Arc<Tablebase<Chess>>>,
    eval: Arc<PstEval>,
    signals: Arc<SearchSignals>,
    search_thread: Option<JoinHandle<()>>,
}

impl UciEngine {
    pub fn new() -> Self {
        UciEngine {
            position: Position::new(),
            options: EngineOptions::default(),
            tables: None,
            eval: Arc::new(PstEval::new()),
            signals: Arc::new(SearchSignals::new()),
            search_thread: None,
        }
    }

    pub fn run(&mut self) {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let input = match line {
                Ok(input) => input,
                Err(_) => break,
            };
            let tokens: Vec<&str> = input.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }

            match tokens[0] {
                "uci" => {
                    println!("id name Osprey");
                    println!("id author Osprey developers");
                    println!("option name SyzygyPath type string default <empty>");
                    println!("option name Syzygy50MoveRule type check default true");
                    println!("option name SyzygyProbeDepth type spin default 1 min 1 max 100");
                    println!("option name SyzygyProbeLimit type spin default 6 min 0 max 7");
                    println!("option name MctsEvalWeight type spin default 20 min 0 max 100");
                    println!("uciok");
                }
                "isready" => println!("readyok"),
                "ucinewgame" => {
                    self.stop_search();
                    self.position = Position::new();
                }
                "position" => self.handle_position(&tokens[1..]),
                "setoption" => self.handle_setoption(&tokens[1..]),
                "go" => self.handle_go(&tokens[1..]),
                "stop" => self.stop_search(),
                "ponderhit" => {} // Pondering strategy is not implemented.
                "quit" => {
                    self.stop_search();
                    break;
                }
                _ => println!("info string Unknown command: {}", tokens[0]),
            }

            let _ = io::stdout().flush();
        }
        self.stop_search();
    }

    fn handle_position(&mut self, args: &[&str]) {
        if args.is_empty() {
            return;
        }
        self.stop_search();

        let (mut position, moves_at) = if args[0] == "startpos" {
            (Position::new(), 1)
        } else if args[0] == "fen" {
            let moves_idx = args.iter().position(|&t| t == "moves").unwrap_or(args.len());
            let fen = args[1..moves_idx].join(" ");
            match Position::from_fen(&fen) {
                Ok(position) => (position, moves_idx),
                Err(e) => {
                    println!("info string {}", e);
                    return;
                }
            }
        } else {
            println!("info string Invalid position command");
            return;
        };

        if args.get(moves_at) == Some(&"moves") {
            for token in &args[moves_at + 1..] {
                match position.parse_uci_move(token) {
                    Ok(mv) => position.apply_move(&mv),
                    Err(e) => {
                        println!("info string {}", e);
                        return;
                    }
                }
            }
        }
        self.position = position;
    }

    fn handle_setoption(&mut self, args: &[&str]) {
        // setoption name <id> [value <x>]
        if args.len() < 2 || args[0] != "name" {
            println!("info string Invalid setoption command format");
            return;
        }
        let value_idx = args.iter().position(|&t| t == "value");
        let name = args[1..value_idx.unwrap_or(args.len())].join(" ");
        let value = value_idx.map(|i| args[i + 1..].join(" ")).unwrap_or_default();

        match name.as_str() {
            "SyzygyPath" => {
                if value.is_empty() || value == "<empty>" {
                    self.options.syzygy_path = None;
                    self.tables = None;
                    return;
                }
                let path = PathBuf::from(&value);
                match tablebase::load_tablebase(&path) {
                    Ok(tables) => {
                        println!(
                            "info string Loaded Syzygy tables up to {} pieces",
                            tables.max_pieces()
                        );
                        self.options.syzygy_path = Some(path);
                        self.tables = Some(Arc::new(tables));
                    }
                    Err(e) => println!("info string {}", e),
                }
            }
            "Syzygy50MoveRule" => {
                self.options.syzygy_50_move_rule = value != "false";
            }
            "SyzygyProbeDepth" => {
                if let Ok(depth) = value.parse() {
                    self.options.syzygy_probe_depth = depth;
                }
            }
            "SyzygyProbeLimit" => {
                if let Ok(limit) = value.parse() {
                    self.options.syzygy_probe_limit = limit;
                }
            }
            "MctsEvalWeight" => {
                if let Ok(weight) = value.parse::<u32>() {
                    self.options.mcts_eval_weight = weight.min(100);
                }
            }
            _ => {}
        }
    }

    fn parse_go(&self, args: &[&str]) -> SearchLimits {
        let mut limits = SearchLimits::default();
        let mut i = 0;
        while i < args.len() {
            match args[i] {
                "wtime" => {
                    limits.wtime = parse_millis(args.get(i + 1));
                    i += 2;
                }
                "btime" => {
                    limits.btime = parse_millis(args.get(i + 1));
                    i += 2;
                }
                "winc" => {
                    limits.winc = parse_millis(args.get(i + 1));
                    i += 2;
                }
                "binc" => {
                    limits.binc = parse_millis(args.get(i + 1));
                    i += 2;
                }
                "movestogo" => {
                    limits.movestogo = args.get(i + 1).and_then(|t| t.parse().ok());
                    i += 2;
                }
                "movetime" => {
                    limits.movetime = parse_millis(args.get(i + 1));
                    i += 2;
                }
                "nodes" => {
                    limits.nodes = args.get(i + 1).and_then(|t| t.parse().ok());
                    i += 2;
                }
                "infinite" => {
                    limits.infinite = true;
                    i += 1;
                }
                "ponder" => {
                    limits.ponder = true;
                    i += 1;
                }
                _ => i += 1,
            }
        }
        limits
    }

    fn handle_go(&mut self, args: &[&str]) {
        self.stop_search();
        let mut limits = self.parse_go(args);

        // With no budget at all, think for a fixed five seconds.
        let unbounded = limits.wtime.is_none()
            && limits.btime.is_none()
            && limits.movetime.is_none()
            && limits.nodes.is_none()
            && !limits.infinite
            && !limits.ponder;
        if unbounded {
            limits.movetime = Some(Duration::from_secs(5));
        }

        self.signals.set_stop(false);
        let mut pos = self.position.clone();
        let eval = Arc::clone(&self.eval);
        let signals = Arc::clone(&self.signals);
        let tables = self.tables.clone();
        let options = self.options.clone();

        self.search_thread = Some(thread::spawn(move || {
            let tb = TablebaseContext::from_options(tables, &options);
            let params = MctsParams {
                eval_weight: f64::from(options.mcts_eval_weight) / 100.0,
                ..MctsParams::default()
            };
            let mut searcher = MctsSearcher::new(
                &eval,
                tb,
                limits,
                signals,
                params,
                SearchRng::from_clock(),
            );
            let mut tree = SearchTree::new();
            searcher.search(&mut pos, &mut tree);
            match tree.best_move() {
                Some(mv) => println!("bestmove {}", mv.to_uci(CastlingMode::Standard)),
                None => println!("bestmove 0000"),
            }
            let _ = io::stdout().flush();
        }));
    }

    fn stop_search(&mut self) {
        if let Some(handle) = self.search_thread.take() {
            self.signals.set_stop(true);
            let _ = handle.join();
        }
        self.signals.set_stop(false);
    }
}

impl Default for UciEngine {
    fn default() -> Self {
        UciEngine::new()
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        self.stop_search();
    }
}

fn parse_millis(token: Option<&&str>) -> Option<Duration> {
    token
        .and_then(|t| t.parse::<u64>().ok())
        .map(Duration::from_millis)
}
