pub mod astar;
pub mod steiner;
