//! Document content, dirty tracking and local persistence

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local, SecondsFormat, SubsecRound, Utc};
use tokio::task::JoinHandle;

use super::error::{LoadError, SaveError};
use super::format::{format_date_time, DEFAULT_DATE_FORMAT};
use super::locale::Locale;
use super::storage::{StorageBackend, CONTENT_KEY, LAST_SAVED_KEY};

/// Smallest accepted autosave interval, in seconds
pub const MIN_AUTO_SAVE_INTERVAL: u64 = 5;
/// Autosave interval used until the user picks another
pub const DEFAULT_AUTO_SAVE_INTERVAL: u64 = 30;

/// Snapshot of the editor
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    /// Serialized rich text, opaque to the editor
    pub content: String,
    /// Whether an edit session is active
    pub is_editing: bool,
    /// Whether a save is in flight
    pub is_saving: bool,
    /// Time of the last successful save, millisecond precision
    pub last_saved: Option<DateTime<Utc>>,
    /// Whether content changed since the last successful save or load
    pub is_dirty: bool,
    pub auto_save_enabled: bool,
    /// Seconds between timed autosaves
    pub auto_save_interval: u64,
}

impl Default for EditorState {
    fn default() -> Self {
        Self {
            content: String::new(),
            is_editing: false,
            is_saving: false,
            last_saved: None,
            is_dirty: false,
            auto_save_enabled: true,
            auto_save_interval: DEFAULT_AUTO_SAVE_INTERVAL,
        }
    }
}

impl EditorState {
    pub fn save_status(&self) -> SaveStatus {
        if self.is_saving {
            SaveStatus::Saving
        } else if self.is_dirty {
            SaveStatus::Unsaved
        } else {
            SaveStatus::Saved
        }
    }
}

/// Save indicator shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Saved,
    Saving,
    Unsaved,
}

/// Format used for the stored timestamp (`2024-01-31T08:15:00.250Z`)
pub fn to_iso_timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_iso_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(time) => Some(time.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!("Ignoring unreadable save timestamp {:?}: {}", raw, e);
            None
        }
    }
}

struct Shared {
    state: Mutex<EditorState>,
    storage: Arc<dyn StorageBackend>,
    locale: Locale,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, EditorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears `is_saving` on every exit from a save
struct SavingGuard<'a> {
    shared: &'a Shared,
}

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        self.shared.lock().is_saving = false;
    }
}

/// Handle to the document being edited.
///
/// Clones share the same state and storage. At most one save runs at a
/// time; a save requested while another is in flight is rejected.
#[derive(Clone)]
pub struct Editor {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("state", &*self.shared.lock())
            .field("locale", &self.shared.locale)
            .finish_non_exhaustive()
    }
}

impl Editor {
    /// Create an editor with default state on top of `storage`
    pub fn new(storage: Arc<dyn StorageBackend>, locale: Locale) -> Self {
        Self::with_state(storage, locale, EditorState::default())
    }

    /// Create an editor starting from `state`
    pub fn with_state(storage: Arc<dyn StorageBackend>, locale: Locale, state: EditorState) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                storage,
                locale,
            }),
        }
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> EditorState {
        self.shared.lock().clone()
    }

    pub fn content(&self) -> String {
        self.shared.lock().content.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.shared.lock().is_dirty
    }

    pub fn is_saving(&self) -> bool {
        self.shared.lock().is_saving
    }

    pub fn is_editing(&self) -> bool {
        self.shared.lock().is_editing
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.shared.lock().last_saved
    }

    pub fn save_status(&self) -> SaveStatus {
        self.shared.lock().save_status()
    }

    /// Last save time in local time, or the "not yet saved" label
    pub fn formatted_last_saved(&self) -> String {
        match self.last_saved() {
            Some(time) => format_date_time(&time.with_timezone(&Local), DEFAULT_DATE_FORMAT),
            None => self.shared.locale.not_saved_label().to_string(),
        }
    }

    /// Replace the content; marks the document dirty only if it changed.
    /// Returns whether it changed.
    pub fn set_content(&self, content: impl Into<String>) -> bool {
        let content = content.into();
        let mut state = self.shared.lock();
        if state.content == content {
            return false;
        }
        tracing::debug!("Content updated ({} bytes)", content.len());
        state.content = content;
        state.is_dirty = true;
        true
    }

    pub fn start_editing(&self) {
        self.shared.lock().is_editing = true;
    }

    /// End the edit session. When autosave is on and there are unsaved
    /// changes, a save is spawned on the current tokio runtime; the handle
    /// reports completion only, not the outcome.
    pub fn stop_editing(&self) -> Option<JoinHandle<()>> {
        let should_save = {
            let mut state = self.shared.lock();
            state.is_editing = false;
            state.auto_save_enabled && state.is_dirty
        };
        if !should_save {
            return None;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime available, skipping save on edit end");
            return None;
        };
        let editor = self.clone();
        Some(runtime.spawn(async move {
            if let Err(e) = editor.save_content().await {
                tracing::debug!("Save on edit end did not complete: {}", e);
            }
        }))
    }

    /// Save if autosave is enabled, the content is dirty and no save is
    /// running. Returns `None` when nothing was attempted.
    pub async fn auto_save(&self) -> Option<Result<DateTime<Utc>, SaveError>> {
        {
            let state = self.shared.lock();
            if !state.auto_save_enabled || !state.is_dirty || state.is_saving {
                return None;
            }
        }
        Some(self.save_content().await)
    }

    /// Persist the content and its timestamp.
    ///
    /// Fails without touching storage when the content is blank or another
    /// save is running. A throwaway key is written and removed first, so an
    /// unusable store leaves the real keys alone. On success the returned
    /// time is stored as `last_saved`; the document stays dirty if it was
    /// edited while the save was in flight.
    pub async fn save_content(&self) -> Result<DateTime<Utc>, SaveError> {
        let content = {
            let mut state = self.shared.lock();
            if state.content.trim().is_empty() {
                tracing::warn!("Save rejected: content is empty");
                return Err(SaveError::EmptyContent);
            }
            if state.is_saving {
                tracing::warn!("Save rejected: another save is in progress");
                return Err(SaveError::AlreadySaving);
            }
            state.is_saving = true;
            state.content.clone()
        };
        let _saving = SavingGuard {
            shared: &self.shared,
        };

        tracing::debug!("Saving content ({} bytes)", content.len());
        let saved_at = match self.persist(&content).await {
            Ok(time) => time,
            Err(e) => {
                tracing::error!("Failed to save content: {}", e);
                return Err(e);
            }
        };

        let mut state = self.shared.lock();
        state.last_saved = Some(saved_at);
        if state.content == content {
            state.is_dirty = false;
        }
        tracing::info!("Saved content at {}", to_iso_timestamp(&saved_at));
        Ok(saved_at)
    }

    async fn persist(&self, content: &str) -> Result<DateTime<Utc>, SaveError> {
        let storage = &self.shared.storage;
        storage.check_writable().await.map_err(SaveError::StorageUnavailable)?;

        storage.set(CONTENT_KEY, content).await?;
        let saved_at = Utc::now().trunc_subsecs(3);
        storage
            .set(LAST_SAVED_KEY, &to_iso_timestamp(&saved_at))
            .await?;

        match storage.get(CONTENT_KEY).await? {
            Some(stored) if !stored.is_empty() => Ok(saved_at),
            _ => Err(SaveError::VerificationFailed),
        }
    }

    /// Restore content and save time from storage. Fails without changing
    /// anything when nothing has been saved.
    pub async fn load_content(&self) -> Result<(), LoadError> {
        match self.read_saved().await {
            Ok((content, last_saved)) => {
                let mut state = self.shared.lock();
                tracing::info!("Loaded saved content ({} bytes)", content.len());
                state.content = content;
                if last_saved.is_some() {
                    state.last_saved = last_saved;
                }
                state.is_dirty = false;
                Ok(())
            }
            Err(LoadError::NotFound) => {
                tracing::info!("No saved content found");
                Err(LoadError::NotFound)
            }
            Err(e) => {
                tracing::error!("Failed to load content: {}", e);
                Err(e)
            }
        }
    }

    async fn read_saved(&self) -> Result<(String, Option<DateTime<Utc>>), LoadError> {
        let storage = &self.shared.storage;
        let content = storage
            .get(CONTENT_KEY)
            .await?
            .filter(|content| !content.is_empty())
            .ok_or(LoadError::NotFound)?;
        let last_saved = storage
            .get(LAST_SAVED_KEY)
            .await?
            .and_then(|raw| parse_iso_timestamp(&raw));
        Ok((content, last_saved))
    }

    /// Ignored when below the minimum
    pub fn set_auto_save_interval(&self, seconds: u64) {
        if seconds >= MIN_AUTO_SAVE_INTERVAL {
            self.shared.lock().auto_save_interval = seconds;
        } else {
            tracing::debug!("Ignoring autosave interval of {}s", seconds);
        }
    }

    pub fn set_auto_save_enabled(&self, enabled: bool) {
        self.shared.lock().auto_save_enabled = enabled;
    }

    pub fn auto_save_interval(&self) -> u64 {
        self.shared.lock().auto_save_interval
    }

    pub fn auto_save_enabled(&self) -> bool {
        self.shared.lock().auto_save_enabled
    }

    /// Delete the saved content and timestamp. The in-memory document is
    /// left as is.
    pub async fn clear_saved_content(&self) -> Result<(), SaveError> {
        let storage = &self.shared.storage;
        storage.remove(CONTENT_KEY).await?;
        storage.remove(LAST_SAVED_KEY).await?;
        self.shared.lock().last_saved = None;
        tracing::info!("Cleared saved content");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::core::error::StorageError;
    use crate::core::storage::{MemoryStorage, CHECK_KEY};

    fn editor_with(storage: Arc<MemoryStorage>) -> Editor {
        Editor::new(storage, Locale::English)
    }

    /// Memory store whose writes take a while to land
    struct SlowStorage {
        inner: MemoryStorage,
        delay: Duration,
    }

    #[async_trait]
    impl StorageBackend for SlowStorage {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            tokio::time::sleep(self.delay).await;
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key).await
        }
    }

    /// Accepts every write but never keeps the document body
    struct ForgetfulStorage(MemoryStorage);

    #[async_trait]
    impl StorageBackend for ForgetfulStorage {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.0.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == CONTENT_KEY {
                return Ok(());
            }
            self.0.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.0.remove(key).await
        }
    }

    async fn wait_until_saving(editor: &Editor) {
        while !editor.is_saving() {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_set_content_marks_dirty_once() {
        let editor = editor_with(Arc::new(MemoryStorage::new()));
        assert_eq!(editor.save_status(), SaveStatus::Saved);

        editor.set_content("<p>a</p>");
        assert!(editor.is_dirty());
        assert_eq!(editor.save_status(), SaveStatus::Unsaved);

        let before = editor.snapshot();
        editor.set_content("<p>a</p>");
        assert_eq!(editor.snapshot(), before);
    }

    #[test]
    fn test_auto_save_interval_minimum() {
        let editor = editor_with(Arc::new(MemoryStorage::new()));
        editor.set_auto_save_interval(4);
        assert_eq!(editor.auto_save_interval(), DEFAULT_AUTO_SAVE_INTERVAL);
        editor.set_auto_save_interval(5);
        assert_eq!(editor.auto_save_interval(), 5);

        editor.set_auto_save_enabled(false);
        assert!(!editor.auto_save_enabled());
    }

    #[test]
    fn test_formatted_last_saved_unset() {
        let editor = editor_with(Arc::new(MemoryStorage::new()));
        assert_eq!(editor.formatted_last_saved(), "Not yet saved");

        let zh = Editor::new(Arc::new(MemoryStorage::new()), Locale::SimplifiedChinese);
        assert_eq!(zh.formatted_last_saved(), "尚未保存");
    }

    #[test]
    fn test_status_precedence() {
        let state = EditorState {
            is_saving: true,
            is_dirty: true,
            ..Default::default()
        };
        assert_eq!(state.save_status(), SaveStatus::Saving);
    }

    #[tokio::test]
    async fn test_empty_content_never_touches_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let editor = editor_with(storage.clone());

        for blank in ["", "  \n\t "] {
            editor.set_content(blank);
            assert!(matches!(
                editor.save_content().await,
                Err(SaveError::EmptyContent)
            ));
        }
        assert_eq!(storage.used_bytes(), 0);
        assert!(editor.last_saved().is_none());
        assert!(!editor.is_saving());
    }

    #[tokio::test]
    async fn test_save_success_updates_state_and_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let editor = editor_with(storage.clone());
        editor.set_content("<p>patient note</p>");

        let saved_at = editor.save_content().await.unwrap();
        assert!(!editor.is_dirty());
        assert!(!editor.is_saving());
        assert_eq!(editor.last_saved(), Some(saved_at));
        assert_eq!(
            storage.get(CONTENT_KEY).await.unwrap().as_deref(),
            Some("<p>patient note</p>")
        );
        assert_eq!(
            storage.get(LAST_SAVED_KEY).await.unwrap(),
            Some(to_iso_timestamp(&saved_at))
        );
        assert!(!storage.contains_key(CHECK_KEY));
        assert_eq!(editor.formatted_last_saved().len(), DEFAULT_DATE_FORMAT.len());
    }

    #[tokio::test]
    async fn test_unavailable_storage_leaves_keys_untouched() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(CONTENT_KEY, "old").await.unwrap();
        storage.set_disabled(true);

        let editor = editor_with(storage.clone());
        editor.set_content("new");
        assert!(matches!(
            editor.save_content().await,
            Err(SaveError::StorageUnavailable(_))
        ));
        assert!(!editor.is_saving());
        assert!(editor.is_dirty());
        assert!(editor.last_saved().is_none());

        storage.set_disabled(false);
        assert_eq!(storage.get(CONTENT_KEY).await.unwrap().as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_quota_failure_is_reported() {
        let storage = Arc::new(MemoryStorage::with_quota(64));
        let editor = editor_with(storage);
        editor.set_content("x".repeat(100));

        let err = editor.save_content().await.unwrap_err();
        assert!(matches!(
            err,
            SaveError::Backend(StorageError::QuotaExceeded { .. })
        ));
        assert!(!editor.is_saving());
        assert_eq!(editor.content().len(), 100);
    }

    #[tokio::test]
    async fn test_missing_read_back_fails() {
        let editor = Editor::new(
            Arc::new(ForgetfulStorage(MemoryStorage::new())),
            Locale::English,
        );
        editor.set_content("body");
        assert!(matches!(
            editor.save_content().await,
            Err(SaveError::VerificationFailed)
        ));
        assert!(editor.is_dirty());
        assert!(editor.last_saved().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_save_rejected_while_in_flight() {
        let storage = Arc::new(SlowStorage {
            inner: MemoryStorage::new(),
            delay: Duration::from_millis(50),
        });
        let editor = Editor::new(storage, Locale::English);
        editor.set_content("first");

        let first = tokio::spawn({
            let editor = editor.clone();
            async move { editor.save_content().await }
        });
        wait_until_saving(&editor).await;
        assert_eq!(editor.save_status(), SaveStatus::Saving);

        assert!(matches!(
            editor.save_content().await,
            Err(SaveError::AlreadySaving)
        ));
        assert!(editor.auto_save().await.is_none());

        first.await.unwrap().unwrap();
        assert!(!editor.is_saving());
        assert!(!editor.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_during_save_stays_dirty() {
        let storage = Arc::new(SlowStorage {
            inner: MemoryStorage::new(),
            delay: Duration::from_millis(50),
        });
        let editor = Editor::new(storage, Locale::English);
        editor.set_content("v1");

        let save = tokio::spawn({
            let editor = editor.clone();
            async move { editor.save_content().await }
        });
        wait_until_saving(&editor).await;
        editor.set_content("v2");

        save.await.unwrap().unwrap();
        assert!(editor.is_dirty());
        assert_eq!(editor.save_status(), SaveStatus::Unsaved);
    }

    #[tokio::test]
    async fn test_round_trip_into_fresh_editor() {
        let storage = Arc::new(MemoryStorage::new());
        let editor = editor_with(storage.clone());
        editor.set_content("<h1>Admission</h1>");
        let saved_at = editor.save_content().await.unwrap();

        let fresh = editor_with(storage);
        fresh.load_content().await.unwrap();
        assert_eq!(fresh.content(), "<h1>Admission</h1>");
        assert_eq!(fresh.last_saved(), Some(saved_at));
        assert!(!fresh.is_dirty());
    }

    #[tokio::test]
    async fn test_load_without_saved_content() {
        let editor = editor_with(Arc::new(MemoryStorage::new()));
        editor.set_content("draft");
        assert!(matches!(
            editor.load_content().await,
            Err(LoadError::NotFound)
        ));
        assert_eq!(editor.content(), "draft");
        assert!(editor.is_dirty());
    }

    #[tokio::test]
    async fn test_load_ignores_bad_timestamp() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(CONTENT_KEY, "body").await.unwrap();
        storage.set(LAST_SAVED_KEY, "yesterday").await.unwrap();

        let editor = editor_with(storage);
        editor.load_content().await.unwrap();
        assert_eq!(editor.content(), "body");
        assert!(editor.last_saved().is_none());
    }

    #[tokio::test]
    async fn test_stop_editing_saves_in_background() {
        let storage = Arc::new(MemoryStorage::new());
        let editor = editor_with(storage.clone());
        editor.start_editing();
        assert!(editor.is_editing());
        editor.set_content("typed");

        let handle = editor.stop_editing().expect("save should be spawned");
        assert!(!editor.is_editing());
        handle.await.unwrap();
        assert!(!editor.is_dirty());
        assert!(storage.contains_key(CONTENT_KEY));

        // Nothing dirty, nothing spawned
        editor.start_editing();
        assert!(editor.stop_editing().is_none());
    }

    #[tokio::test]
    async fn test_stop_editing_respects_disabled_autosave() {
        let editor = editor_with(Arc::new(MemoryStorage::new()));
        editor.set_auto_save_enabled(false);
        editor.set_content("typed");
        editor.start_editing();
        assert!(editor.stop_editing().is_none());
        assert!(editor.is_dirty());
    }

    #[tokio::test]
    async fn test_clear_saved_content_keeps_document() {
        let storage = Arc::new(MemoryStorage::new());
        let editor = editor_with(storage.clone());
        editor.set_content("keep me");
        editor.save_content().await.unwrap();
        editor.set_content("keep me too");

        editor.clear_saved_content().await.unwrap();
        assert!(editor.last_saved().is_none());
        assert_eq!(editor.content(), "keep me too");
        assert!(editor.is_dirty());
        assert_eq!(storage.used_bytes(), 0);
    }

    #[tokio::test]
    async fn test_disabled_storage_leaves_editor_untouched() {
        let storage = Arc::new(MemoryStorage::new());
        let editor = editor_with(storage.clone());
        editor.set_content("first draft");
        let saved_at = editor.save_content().await.unwrap();
        editor.set_content("second draft");
        storage.set_disabled(true);

        assert!(matches!(
            editor.load_content().await,
            Err(LoadError::Backend(StorageError::Unavailable(_)))
        ));
        assert_eq!(editor.content(), "second draft");
        assert!(editor.is_dirty());

        assert!(matches!(
            editor.clear_saved_content().await,
            Err(SaveError::Backend(StorageError::Unavailable(_)))
        ));
        assert_eq!(editor.last_saved(), Some(saved_at));

        storage.set_disabled(false);
        assert_eq!(
            storage.get(CONTENT_KEY).await.unwrap().as_deref(),
            Some("first draft")
        );
    }
}
