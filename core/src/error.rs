use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid world document: {reason}")]
    InvalidWorld { reason: String },

    #[error("Transition to tick {tick} panicked: {message}")]
    TransitionPanicked { tick: u64, message: String },

    #[error("Tile '{tile_id}' already exists")]
    TileExists { tile_id: String },

    #[error("Extension '{id}' not found")]
    ExtensionNotFound { id: String },

    #[error("Extension '{id}' failed to register: {reason}")]
    RegistrationFailed { id: String, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;
