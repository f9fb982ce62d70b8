//! Syzygy endgame tablebase probing.
//!
//! A [`TablebaseContext`] is prepared from the option values at the start
//! of every search: the probe cardinality is clamped to the largest loaded
//! table set, and the 50-move-rule flag decides whether cursed wins and
//! blessed losses count as draws.

use std::cell::Cell;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use shakmaty::Chess;
use shakmaty_syzygy::{Tablebase, Wdl};

use crate::mcts::game_result::PlayingResult;
use crate::position::Position;
use crate::uci::EngineOptions;

#[derive(Debug)]
pub enum TablebaseError {
    Load(String),
}

impl fmt::Display for TablebaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TablebaseError::Load(s) => write!(f, "tablebase load error: {}", s),
        }
    }
}

impl std::error::Error for TablebaseError {}

/// Loads all Syzygy tables found under `path`.
pub fn load_tablebase(path: &Path) -> Result<Tablebase<Chess>, TablebaseError> {
    let mut tables = Tablebase::new();
    tables
        .add_directory(path)
        .map_err(|e| TablebaseError::Load(format!("{}: {}", path.display(), e)))?;
    Ok(tables)
}

/// Per-search probe configuration plus the hit counter reported as `tbhits`.
pub struct TablebaseContext {
    tables: Option<Arc<Tablebase<Chess>>>,
    cardinality: usize,
    use_rule50: bool,
    probe_depth: i32,
    hits: Cell<u64>,
}

impl TablebaseContext {
    /// A context that never probes.
    pub fn disabled() -> Self {
        TablebaseContext {
            tables: None,
            cardinality: 0,
            use_rule50: true,
            probe_depth: 0,
            hits: Cell::new(0),
        }
    }

    /// Prepares the probe parameters from the current option values.
    pub fn from_options(tables: Option<Arc<Tablebase<Chess>>>, options: &EngineOptions) -> Self {
        let mut cardinality = options.syzygy_probe_limit;
        let mut probe_depth = options.syzygy_probe_depth;
        let max_pieces = tables.as_ref().map_or(0, |t| t.max_pieces());
        if cardinality > max_pieces {
            cardinality = max_pieces;
            probe_depth = 0;
        }
        TablebaseContext {
            tables,
            cardinality,
            use_rule50: options.syzygy_50_move_rule,
            probe_depth,
            hits: Cell::new(0),
        }
    }

    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    pub fn probe_depth(&self) -> i32 {
        self.probe_depth
    }

    pub fn hits(&self) -> u64 {
        self.hits.get()
    }

    /// WDL probe mapped to a game result for the side to move, or `None`
    /// when the position is not covered (too many pieces, missing table).
    pub fn probe_result(&self, pos: &Position) -> Option<PlayingResult> {
        let tables = self.tables.as_ref()?;
        if self.cardinality == 0 || pos.piece_count() > self.cardinality {
            return None;
        }
        let wdl = tables.probe_wdl(pos.chess()).ok()?.after_zeroing();
        self.hits.set(self.hits.get() + 1);

        let v = match wdl {
            Wdl::Loss => -2,
            Wdl::BlessedLoss => -1,
            Wdl::Draw => 0,
            Wdl::CursedWin => 1,
            Wdl::Win => 2,
        };
        let draw_score = if self.use_rule50 { 1 } else { 0 };
        Some(if v < -draw_score {
            PlayingResult::Lose
        } else if v > draw_score {
            PlayingResult::Win
        } else {
            PlayingResult::Tie
        })
    }
}
