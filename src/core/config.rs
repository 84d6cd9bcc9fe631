//! Application configuration management

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use super::editor::{EditorState, DEFAULT_AUTO_SAVE_INTERVAL, MIN_AUTO_SAVE_INTERVAL};
use super::locale::Locale;
use super::paper::{Margins, Orientation, PaperSize, PaperState, RegionSettings};
use super::storage::FileStorage;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Interface language
    pub locale: Locale,
    /// Editor settings
    pub editor: EditorConfig,
    /// Page setup
    pub paper: PaperConfig,
    /// Storage settings
    pub storage: StorageConfig,
}

/// Editor-specific settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Autosave on interval and on edit end
    pub auto_save_enabled: bool,
    /// Auto-save interval in seconds
    pub auto_save_interval: u64,
    /// Save this many milliseconds after typing stops (0 = disabled)
    pub auto_save_debounce_ms: u64,
}

/// Page setup restored at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    /// Key into the available paper sizes
    pub paper_size: String,
    pub orientation: Orientation,
    pub margins: Margins,
    /// User-defined sizes keyed by name
    pub custom_paper_sizes: BTreeMap<String, PaperSize>,
    /// Header band; the locale default when unset
    pub header: Option<RegionSettings>,
    /// Footer band; the locale default when unset
    pub footer: Option<RegionSettings>,
}

/// Storage settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage file; the platform data directory is used when unset
    pub path: Option<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            auto_save_enabled: true,
            auto_save_interval: DEFAULT_AUTO_SAVE_INTERVAL,
            auto_save_debounce_ms: 0,
        }
    }
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            paper_size: "A4".to_string(),
            orientation: Orientation::Portrait,
            margins: Margins::default(),
            custom_paper_sizes: BTreeMap::new(),
            header: None,
            footer: None,
        }
    }
}

impl EditorConfig {
    /// Initial editor state; an interval below the minimum falls back to
    /// the default
    pub fn initial_state(&self) -> EditorState {
        let auto_save_interval = if self.auto_save_interval >= MIN_AUTO_SAVE_INTERVAL {
            self.auto_save_interval
        } else {
            DEFAULT_AUTO_SAVE_INTERVAL
        };
        EditorState {
            auto_save_enabled: self.auto_save_enabled,
            auto_save_interval,
            ..EditorState::default()
        }
    }
}

impl PaperConfig {
    /// Initial paper state; an unknown size key leaves A4 selected.
    /// Custom sizes keep their map key, which is stamped onto the record.
    pub fn initial_state(&self, locale: Locale) -> PaperState {
        let mut paper = PaperState::new(locale);
        paper.custom_paper_sizes = self
            .custom_paper_sizes
            .iter()
            .map(|(key, size)| {
                let size = PaperSize {
                    name: key.clone(),
                    ..size.clone()
                };
                (key.clone(), size)
            })
            .collect();
        if let Some(header) = &self.header {
            paper.header_settings = header.clone();
        }
        if let Some(footer) = &self.footer {
            paper.footer_settings = footer.clone();
        }
        paper.set_paper_size(&self.paper_size);
        paper.set_orientation(self.orientation);
        paper.margins = self.margins;
        paper
    }
}

impl AppConfig {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "emr-editor", "EmrEditor")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Self::load_from(&path)
    }

    /// Load configuration from `path`, using defaults when it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        self.save_to(&path)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure config directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Record the current page setup so it is restored next start
    pub fn capture_paper(&mut self, paper: &PaperState) {
        self.paper = PaperConfig {
            paper_size: paper.current_paper_size.name.clone(),
            orientation: paper.orientation,
            margins: paper.margins,
            custom_paper_sizes: paper.custom_paper_sizes.clone(),
            header: Some(paper.header_settings.clone()),
            footer: Some(paper.footer_settings.clone()),
        };
    }

    /// Get the storage file path
    pub fn storage_path(&self) -> Result<PathBuf> {
        match &self.storage.path {
            Some(path) => Ok(path.clone()),
            None => FileStorage::default_path()
                .ok_or_else(|| anyhow::anyhow!("Could not determine data directory")),
        }
    }
}
