//! Client-side state: the authenticated session and the color theme.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use siad_core::model::User;

// ── Auth ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Shared holder of the current session. Cloning yields a handle to the
/// same session; the API client reads the token from it on every request.
#[derive(Debug, Clone, Default)]
pub struct AuthStore {
    session: Arc<RwLock<Option<Session>>>,
}

impl AuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_session(&self, token: impl Into<String>, user: User) {
        let mut slot = self.session.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Session {
            token: token.into(),
            user,
        });
    }

    pub fn clear(&self) {
        let mut slot = self.session.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn token(&self) -> Option<String> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.token.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.user.clone())
    }
}

// ── Persistence ──────────────────────────────────────────────────────────────

/// Small string key/value persistence used by the client stores.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }
}

/// Key/value store persisted as a JSON object in one file. Write failures
/// are logged and otherwise ignored.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileKeyValueStore {
    /// Open the store, starting empty when the file is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        let written = serde_json::to_string_pretty(&*entries)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(&self.path, json).map_err(|e| e.to_string()));
        if let Err(e) = written {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "could not persist client settings"
            );
        }
    }
}

// ── Theme ────────────────────────────────────────────────────────────────────

/// Storage key of the persisted theme.
pub const THEME_KEY: &str = "siad-theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }

    pub fn parse(raw: &str) -> Option<Theme> {
        match raw {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            "system" => Some(Theme::System),
            _ => None,
        }
    }
}

/// Theme actually applied after resolving `system`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppliedTheme {
    Light,
    Dark,
}

/// OS color-scheme preference.
pub trait ColorScheme: Send + Sync {
    fn prefers_dark(&self) -> bool;
}

/// Color scheme with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedScheme {
    pub dark: bool,
}

impl ColorScheme for FixedScheme {
    fn prefers_dark(&self) -> bool {
        self.dark
    }
}

/// Theme preference with persistence.
///
/// `System` is persisted as the literal `system` token and resolved through
/// the OS color scheme each time it is applied, so a later OS change is picked up.
pub struct ThemeStore<S, P> {
    storage: S,
    scheme: P,
    theme: Theme,
    applied: AppliedTheme,
}

impl<S: KeyValueStore, P: ColorScheme> ThemeStore<S, P> {
    /// Restore the persisted theme, defaulting to `System`.
    pub fn load(storage: S, scheme: P) -> Self {
        let theme = storage
            .get(THEME_KEY)
            .and_then(|raw| Theme::parse(&raw))
            .unwrap_or_default();
        let applied = resolve(theme, &scheme);
        Self {
            storage,
            scheme,
            theme,
            applied,
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn applied(&self) -> AppliedTheme {
        self.applied
    }

    pub fn set_theme(&mut self, theme: Theme) -> AppliedTheme {
        self.theme = theme;
        self.applied = resolve(theme, &self.scheme);
        self.storage.set(THEME_KEY, theme.as_str());
        self.applied
    }

    /// Re-read the OS preference; only affects `System`.
    pub fn refresh(&mut self) -> AppliedTheme {
        self.applied = resolve(self.theme, &self.scheme);
        self.applied
    }
}

fn resolve(theme: Theme, scheme: &impl ColorScheme) -> AppliedTheme {
    match theme {
        Theme::Light => AppliedTheme::Light,
        Theme::Dark => AppliedTheme::Dark,
        Theme::System if scheme.prefers_dark() => AppliedTheme::Dark,
        Theme::System => AppliedTheme::Light,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use siad_core::model::Role;

    struct SharedScheme(Arc<AtomicBool>);

    impl ColorScheme for SharedScheme {
        fn prefers_dark(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn user() -> User {
        User {
            id: "u1".to_string(),
            email: "ana@salud.gob".to_string(),
            name: "Ana".to_string(),
            role: Role::Signer,
            is_active: true,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn system_theme_persists_token_and_resolves_to_os() {
        let mut store = ThemeStore::load(MemoryKeyValueStore::new(), FixedScheme { dark: true });
        let applied = store.set_theme(Theme::System);
        assert_eq!(applied, AppliedTheme::Dark);
        assert_eq!(store.storage.get(THEME_KEY).as_deref(), Some("system"));
    }

    #[test]
    fn explicit_theme_persists_itself() {
        let mut store = ThemeStore::load(MemoryKeyValueStore::new(), FixedScheme { dark: true });
        assert_eq!(store.set_theme(Theme::Light), AppliedTheme::Light);
        assert_eq!(store.storage.get(THEME_KEY).as_deref(), Some("light"));
    }

    #[test]
    fn system_follows_os_changes_on_refresh() {
        let dark = Arc::new(AtomicBool::new(false));
        let mut store = ThemeStore::load(MemoryKeyValueStore::new(), SharedScheme(dark.clone()));
        assert_eq!(store.theme(), Theme::System);
        assert_eq!(store.applied(), AppliedTheme::Light);
        dark.store(true, Ordering::SeqCst);
        assert_eq!(store.refresh(), AppliedTheme::Dark);
    }

    #[test]
    fn unknown_persisted_value_defaults_to_system() {
        let kv = MemoryKeyValueStore::new();
        kv.set(THEME_KEY, "sepia");
        let store = ThemeStore::load(kv, FixedScheme { dark: false });
        assert_eq!(store.theme(), Theme::System);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        {
            let mut store =
                ThemeStore::load(FileKeyValueStore::open(&path), FixedScheme { dark: false });
            store.set_theme(Theme::Dark);
        }
        let store = ThemeStore::load(FileKeyValueStore::open(&path), FixedScheme { dark: false });
        assert_eq!(store.theme(), Theme::Dark);
        assert_eq!(store.applied(), AppliedTheme::Dark);
    }

    #[test]
    fn auth_store_handles_share_session() {
        let auth = AuthStore::new();
        let handle = auth.clone();
        assert!(!handle.is_authenticated());
        auth.set_session("tok", user());
        assert!(handle.is_authenticated());
        assert_eq!(handle.token().as_deref(), Some("tok"));
        assert_eq!(handle.user().map(|u| u.id), Some("u1".to_string()));
        handle.clear();
        assert!(!auth.is_authenticated());
    }
}
