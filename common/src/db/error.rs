use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },
    #[error("unknown master '{0}'")]
    UnknownMaster(String),
    #[error("instance '{cell}' has no pin '{pin}'")]
    UnknownPin { cell: String, pin: String },
    #[error("unknown routing layer '{0}'")]
    UnknownLayer(String),
}
