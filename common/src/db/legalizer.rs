use crate::db::core::DesignDB;
use crate::db::indices::CellId;

/// Detailed-placement service used after cell insertion. Implementations
/// must leave `Firm` and `Fixed` instances where they are.
pub trait PlacementLegalizer {
    /// Legalizes every movable instance, returning how many were moved.
    fn legalize(&self, db: &mut DesignDB) -> anyhow::Result<usize>;

    /// Required free sites to the left of `cell`.
    fn pad_left(&self, db: &DesignDB, cell: CellId) -> i64;

    /// Required free sites to the right of `cell`.
    fn pad_right(&self, db: &DesignDB, cell: CellId) -> i64;
}
