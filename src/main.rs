//! Main entry point for the Osprey chess engine: a UCI loop on stdin.

use osprey::uci::UciEngine;

fn main() {
    UciEngine::new().run();
}
