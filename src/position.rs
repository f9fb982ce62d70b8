//! Position wrapper around the chess rules engine.
//!
//! The search owns exactly one mutable [`Position`] and a pre-sized
//! [`UndoStack`] of per-ply undo records. Every move made during an
//! iteration is undone before the next one starts, so the position nets
//! to identity between iterations; the key history doubles as the
//! repetition table.

use std::fmt;

use shakmaty::fen::Fen;
use shakmaty::uci::Uci;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{Bitboard, CastlingMode, Chess, Color, EnPassantMode, Move, MoveList, Position as _};

/// Maximum search depth in plies; also the size of the undo stack.
pub const MAX_PLY: usize = 128;

/// One move-undo record. A slot is written by `make_move` and consumed by
/// the matching `undo_move`.
#[derive(Debug, Default, Clone)]
pub struct StateInfo {
    saved: Option<Chess>,
}

/// Fixed-size stack of undo records, one per ply.
pub struct UndoStack {
    slots: Vec<StateInfo>,
}

impl UndoStack {
    pub fn new() -> Self {
        UndoStack {
            slots: vec![StateInfo::default(); MAX_PLY],
        }
    }

    pub fn slot(&mut self, ply: usize) -> &mut StateInfo {
        &mut self.slots[ply]
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        UndoStack::new()
    }
}

#[derive(Debug)]
pub enum PositionError {
    InvalidFen(String),
    IllegalMove(String),
}

impl fmt::Display for PositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionError::InvalidFen(s) => write!(f, "invalid FEN: {}", s),
            PositionError::IllegalMove(s) => write!(f, "illegal move: {}", s),
        }
    }
}

impl std::error::Error for PositionError {}

/// A mutable chess position with strict LIFO make/undo.
#[derive(Debug, Clone)]
pub struct Position {
    board: Chess,
    key_history: Vec<u64>,
}

impl Position {
    /// The standard starting position.
    pub fn new() -> Self {
        Position::from_board(Chess::default())
    }

    pub fn from_fen(fen: &str) -> Result<Self, PositionError> {
        let parsed: Fen = fen
            .parse()
            .map_err(|e| PositionError::InvalidFen(format!("{} ({})", fen, e)))?;
        let board: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| PositionError::InvalidFen(format!("{} ({})", fen, e)))?;
        Ok(Position::from_board(board))
    }

    fn from_board(board: Chess) -> Self {
        let mut pos = Position {
            board,
            key_history: Vec::with_capacity(MAX_PLY * 2),
        };
        pos.key_history.push(pos.compute_key());
        pos
    }

    fn compute_key(&self) -> u64 {
        let key: Zobrist64 = self.board.zobrist_hash(EnPassantMode::Legal);
        key.0
    }

    /// Zobrist key of the current position.
    pub fn zobrist(&self) -> u64 {
        *self.key_history.last().expect("key history never empty")
    }

    pub fn legal_moves(&self) -> MoveList {
        self.board.legal_moves()
    }

    pub fn num_legal_moves(&self) -> usize {
        self.board.legal_moves().len()
    }

    /// Plays `mv`, saving the undo record into `st`.
    pub fn make_move(&mut self, mv: &Move, st: &mut StateInfo) {
        st.saved = Some(self.board.clone());
        self.board.play_unchecked(mv);
        self.key_history.push(self.compute_key());
    }

    /// Reverts the most recent `make_move` whose record is in `st`.
    pub fn undo_move(&mut self, st: &mut StateInfo) {
        self.board = st
            .saved
            .take()
            .expect("undo_move without a matching make_move");
        self.key_history.pop();
    }

    /// Plays `mv` permanently (game setup; cannot be undone).
    pub fn apply_move(&mut self, mv: &Move) {
        self.board.play_unchecked(mv);
        self.key_history.push(self.compute_key());
    }

    /// Parses a UCI move string ("e2e4", "e7e8q") against this position.
    pub fn parse_uci_move(&self, s: &str) -> Result<Move, PositionError> {
        let uci: Uci = s
            .parse()
            .map_err(|_| PositionError::IllegalMove(s.to_string()))?;
        uci.to_move(&self.board)
            .map_err(|_| PositionError::IllegalMove(s.to_string()))
    }

    pub fn gives_check(&self, mv: &Move) -> bool {
        let mut next = self.board.clone();
        next.play_unchecked(mv);
        next.is_check()
    }

    pub fn in_check(&self) -> bool {
        self.board.is_check()
    }

    pub fn side_to_move(&self) -> Color {
        self.board.turn()
    }

    /// Fifty-move rule, insufficient material, or threefold repetition
    /// within the known history.
    pub fn is_draw(&self) -> bool {
        if self.board.halfmoves() >= 100 {
            return true;
        }
        if self.board.is_insufficient_material() {
            return true;
        }
        let key = self.zobrist();
        self.key_history.iter().filter(|k| **k == key).count() >= 3
    }

    pub fn piece_count(&self) -> usize {
        self.board.board().occupied().count()
    }

    /// Squares holding pieces that are neither pawns nor kings.
    pub fn promoted_pieces(&self) -> Bitboard {
        let board = self.board.board();
        board.occupied() & !board.pawns() & !board.kings()
    }

    pub fn our_pieces(&self) -> Bitboard {
        self.board.board().by_color(self.board.turn())
    }

    /// Access to the underlying rules-engine position (evaluation, probing).
    pub fn chess(&self) -> &Chess {
        &self.board
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::new()
    }
}
