//! Timer and debounce driven autosave

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::editor::Editor;
use super::format::Debouncer;

async fn save_if_needed(editor: Editor, trigger: &'static str) {
    // Detached so stopping the driver never interrupts a write
    let save = tokio::spawn(async move { editor.auto_save().await });
    match save.await {
        Ok(Some(Ok(saved_at))) => tracing::debug!("Autosave ({}) completed at {}", trigger, saved_at),
        Ok(Some(Err(e))) => tracing::warn!("Autosave ({}) failed: {}", trigger, e),
        Ok(None) => {}
        Err(e) => tracing::error!("Autosave ({}) task failed: {}", trigger, e),
    }
}

/// Periodically saves a dirty document, and optionally shortly after the
/// last edit. Every save goes through [`Editor::auto_save`], so it never
/// overlaps another save. Dropping the handle stops both triggers.
#[derive(Debug)]
pub struct AutoSaver {
    editor: Editor,
    timer: JoinHandle<()>,
    debouncer: Option<Debouncer>,
}

impl AutoSaver {
    /// Start the interval timer on the current tokio runtime. The interval
    /// is re-read from the editor before each wait. Returns `None` outside
    /// a runtime.
    pub fn spawn(editor: Editor, debounce: Option<Duration>) -> Option<Self> {
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("No async runtime available, autosave not started");
            return None;
        };
        let timer = runtime.spawn({
            let editor = editor.clone();
            async move {
                loop {
                    let interval = Duration::from_secs(editor.auto_save_interval());
                    tokio::time::sleep(interval).await;
                    save_if_needed(editor.clone(), "interval").await;
                }
            }
        });
        tracing::debug!("Autosave started");

        Some(Self {
            editor,
            timer,
            debouncer: debounce.map(|delay| Debouncer::on_runtime(delay, runtime)),
        })
    }

    /// Report an edit; with a debounce configured, a save follows once
    /// edits pause for that long
    pub fn content_changed(&mut self) {
        if let Some(debouncer) = self.debouncer.as_mut() {
            let editor = self.editor.clone();
            debouncer.call(save_if_needed(editor, "debounce"));
        }
    }

    pub fn is_running(&self) -> bool {
        !self.timer.is_finished()
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        self.timer.abort();
        tracing::debug!("Autosave stopped");
    }
}
