//! Row-based placement legalization used after cell insertion.

pub mod legalize;

pub use legalize::tetris::TetrisLegalizer;
