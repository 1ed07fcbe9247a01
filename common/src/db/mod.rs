pub mod core;
pub mod error;
pub mod indices;
pub mod legalizer;
pub mod parser;
pub mod tech;

pub use error::DbError;
