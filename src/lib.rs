//! EMR Editor - medical-record document editor core
//!
//! Page geometry for paper-layout simulation and the save/load lifecycle of
//! the document being edited, persisted to a local key-value store.

pub mod app;
pub mod core;

pub use app::EmrApp;
pub use crate::core::autosave::AutoSaver;
pub use crate::core::config::AppConfig;
pub use crate::core::editor::{Editor, EditorState, SaveStatus};
pub use crate::core::error::{LoadError, SaveError, StorageError};
pub use crate::core::locale::Locale;
pub use crate::core::paper::{
    ContentDimensions, MarginPreset, Margins, MarginsUpdate, Orientation, PaperSize, PaperState,
    RegionSettings, RegionUpdate,
};
pub use crate::core::storage::{FileStorage, MemoryStorage, StorageBackend};
