//! Application state: owns the editor, the page setup and the configuration

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::core::autosave::AutoSaver;
use crate::core::config::AppConfig;
use crate::core::editor::Editor;
use crate::core::error::LoadError;
use crate::core::paper::{mm_to_px, PaperState, CSS_DPI};
use crate::core::storage::{FileStorage, StorageBackend};

/// Main application state, built once at startup and handed to the UI
#[derive(Debug)]
pub struct EmrApp {
    /// Application configuration
    pub config: AppConfig,
    /// Document being edited
    pub editor: Editor,
    /// Page setup
    pub paper: PaperState,
    autosave: Option<AutoSaver>,
}

impl EmrApp {
    /// Create the application on top of `storage`
    pub fn new(config: AppConfig, storage: Arc<dyn StorageBackend>) -> Self {
        let editor = Editor::with_state(storage, config.locale, config.editor.initial_state());
        let paper = config.paper.initial_state(config.locale);

        Self {
            config,
            editor,
            paper,
            autosave: None,
        }
    }

    /// Create the application with the file-backed store the config points at
    pub fn with_file_storage(config: AppConfig) -> Result<Self> {
        let path = config.storage_path()?;
        tracing::info!("Using storage file: {}", path.display());
        Ok(Self::new(config, Arc::new(FileStorage::new(path))))
    }

    /// Load the previously saved document. Returns false when there is none.
    pub async fn restore(&self) -> Result<bool> {
        match self.editor.load_content().await {
            Ok(()) => Ok(true),
            Err(LoadError::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Start timed autosave on the current tokio runtime. Returns false
    /// when there is no runtime to run it on.
    pub fn start_autosave(&mut self) -> bool {
        let debounce = match self.config.editor.auto_save_debounce_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        self.autosave = AutoSaver::spawn(self.editor.clone(), debounce);
        self.autosave.is_some()
    }

    pub fn stop_autosave(&mut self) {
        self.autosave = None;
    }

    pub fn is_autosave_running(&self) -> bool {
        self.autosave.as_ref().is_some_and(AutoSaver::is_running)
    }

    /// Apply an edit from the editing surface
    pub fn edit(&mut self, content: impl Into<String>) {
        if self.editor.set_content(content) {
            if let Some(autosave) = self.autosave.as_mut() {
                autosave.content_changed();
            }
        }
    }

    /// Copy runtime settings back into the config and write it
    pub fn save_settings(&mut self) -> Result<()> {
        self.capture_settings();
        self.config.save()
    }

    /// Copy runtime settings back into the config
    pub fn capture_settings(&mut self) {
        self.config.capture_paper(&self.paper);
        self.config.editor.auto_save_enabled = self.editor.auto_save_enabled();
        self.config.editor.auto_save_interval = self.editor.auto_save_interval();
    }

    /// Human-readable page geometry
    pub fn geometry_report(&self) -> String {
        let paper = &self.paper;
        let content = paper.content_dimensions();
        let mut lines = vec![
            format!(
                "Paper: {} ({:?})",
                paper.current_paper_size.name, paper.orientation
            ),
            format!(
                "Page: {} x {} mm ({:.0} x {:.0} px)",
                paper.effective_width(),
                paper.effective_height(),
                mm_to_px(paper.effective_width(), CSS_DPI),
                mm_to_px(paper.effective_height(), CSS_DPI),
            ),
            format!(
                "Margins: top {} right {} bottom {} left {} mm",
                paper.margins.top, paper.margins.right, paper.margins.bottom, paper.margins.left
            ),
            format!("Content area: {} x {} mm", content.width, content.height),
        ];
        if content.is_degenerate() {
            lines.push("Warning: margins and header/footer leave no content area".to_string());
        }
        for (label, region) in [("Header", &paper.header_settings), ("Footer", &paper.footer_settings)] {
            if region.enabled {
                lines.push(format!("{label}: {} mm, page 1: {}", region.height, region.render(1, 1)));
            }
        }
        lines.join("\n")
    }
}
