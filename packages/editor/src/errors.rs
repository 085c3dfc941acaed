//! Error types for the editor

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Command error: {0}")]
    Command(#[from] crate::commands::CommandError),

    #[error("Normalization did not reach a fixed point after {passes} passes")]
    NormalizationDiverged { passes: usize },

    #[error("Editor is read-only after an invariant violation")]
    Poisoned,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
