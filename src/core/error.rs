//! Error types for storage, save and load operations

use std::io;

use thiserror::Error;

/// Errors raised by a storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    /// Storage is disabled or otherwise unusable
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Writing would exceed the backend's capacity
    #[error("storage quota exceeded: {needed} bytes needed, {quota} bytes allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    /// I/O error in a file-backed store
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The on-disk store could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reasons a save request did not persist the document
#[derive(Error, Debug)]
pub enum SaveError {
    /// Content is empty or whitespace only
    #[error("content is empty")]
    EmptyContent,

    /// Another save is still in flight
    #[error("a save is already in progress")]
    AlreadySaving,

    /// The disposable write/delete check failed
    #[error("storage is not writable: {0}")]
    StorageUnavailable(#[source] StorageError),

    /// The content key was missing when read back after the write
    #[error("saved content could not be read back")]
    VerificationFailed,

    /// Any other backend failure while writing
    #[error("backend failure: {0}")]
    Backend(#[from] StorageError),
}

/// Reasons a load request left the editor untouched
#[derive(Error, Debug)]
pub enum LoadError {
    /// No content has been saved
    #[error("no saved content")]
    NotFound,

    #[error("backend failure: {0}")]
    Backend(#[from] StorageError),
}
