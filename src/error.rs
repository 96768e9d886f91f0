use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while labeling, persisting or restoring images.
#[derive(Error, Debug)]
pub enum SelectorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Group has {undecided} undecided image(s); label every member before saving")]
    IncompleteGroup { undecided: usize },

    #[error("No image is focused")]
    NoFocusedImage,

    #[error("{0} is not part of the current group")]
    NotInGroup(String),

    #[error("Images can only be labeled keep or delete")]
    InvalidLabel,

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Grid size {0} is out of range (2-7)")]
    InvalidGridSize(usize),

    #[error("{0:?} not found in backup directory")]
    NotInBackup(PathBuf),

    #[error("Refusing to overwrite existing file {0:?}")]
    DestinationExists(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SelectorError>;
