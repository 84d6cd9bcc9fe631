//! Core functionality: document persistence, paper layout, storage and configuration

pub mod autosave;
pub mod config;
pub mod editor;
pub mod error;
pub mod format;
pub mod locale;
pub mod paper;
pub mod storage;
