//! Watched apps and their persistence
//!
//! The watch list is ordered: registration order is the matcher's
//! tie-break order. It is loaded once at engine startup and saved on
//! every mutation.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An application registered for notification monitoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedApp {
    /// Unique identity, the bundle identifier where one exists
    pub id: String,
    /// Name matched against notification text
    pub display_name: String,
    /// Icon shown by the host shell, if one was picked
    #[serde(default)]
    pub icon_path: Option<PathBuf>,
    /// When the app was registered
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
}

impl WatchedApp {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            icon_path: None,
            added_at: Utc::now(),
        }
    }
}

/// Ordered collection of watched apps, unique by id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchList {
    apps: Vec<WatchedApp>,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an app. Returns false without modifying the list when the
    /// id is already registered or the id/name is empty.
    pub fn add(&mut self, app: WatchedApp) -> bool {
        if app.id.is_empty() || app.display_name.is_empty() {
            return false;
        }
        if self.contains(&app.id) {
            return false;
        }
        self.apps.push(app);
        true
    }

    /// Remove by id, returning the removed entry if it was present.
    pub fn remove(&mut self, id: &str) -> Option<WatchedApp> {
        let index = self.apps.iter().position(|app| app.id == id)?;
        Some(self.apps.remove(index))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.apps.iter().any(|app| app.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&WatchedApp> {
        self.apps.iter().find(|app| app.id == id)
    }

    /// Apps in registration order.
    pub fn apps(&self) -> &[WatchedApp] {
        &self.apps
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

/// On-disk JSON store for the watch list
#[derive(Debug, Clone)]
pub struct WatchListStore {
    path: PathBuf,
}

impl WatchListStore {
    /// Store at the default per-user data location.
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("com", "camlight", "CamLight")
            .context("Failed to determine data directory")?;
        Ok(Self {
            path: proj_dirs.data_dir().join("watchlist.json"),
        })
    }

    /// Store at an explicit path.
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the watch list. A missing file is an empty list.
    pub fn load(&self) -> Result<WatchList> {
        if !self.path.exists() {
            return Ok(WatchList::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read watch list file: {:?}", self.path))?;
        let list: WatchList = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse watch list file: {:?}", self.path))?;
        Ok(list)
    }

    /// Save the watch list, creating parent directories if needed.
    pub fn save(&self, list: &WatchList) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {:?}", parent))?;
        }
        let content =
            serde_json::to_string_pretty(list).context("Failed to serialize watch list")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write watch list file: {:?}", self.path))?;
        Ok(())
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_preserves_order() {
        let mut list = WatchList::new();
        assert!(list.add(WatchedApp::new("com.apple.mail", "Mail")));
        assert!(list.add(WatchedApp::new("com.tinyspeck.slackmacgap", "Slack")));
        let ids: Vec<&str> = list.apps().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["com.apple.mail", "com.tinyspeck.slackmacgap"]);
    }

    #[test]
    fn test_add_rejects_duplicate_id() {
        let mut list = WatchList::new();
        assert!(list.add(WatchedApp::new("com.apple.mail", "Mail")));
        assert!(!list.add(WatchedApp::new("com.apple.mail", "Mail 2")));
        assert_eq!(list.len(), 1);
        assert_eq!(list.get("com.apple.mail").unwrap().display_name, "Mail");
    }

    #[test]
    fn test_add_rejects_empty_fields() {
        let mut list = WatchList::new();
        assert!(!list.add(WatchedApp::new("", "Mail")));
        assert!(!list.add(WatchedApp::new("com.apple.mail", "")));
        assert!(list.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut list = WatchList::new();
        list.add(WatchedApp::new("com.apple.mail", "Mail"));
        let removed = list.remove("com.apple.mail");
        assert_eq!(removed.unwrap().display_name, "Mail");
        assert!(list.remove("com.apple.mail").is_none());
    }

    #[test]
    fn test_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = WatchListStore::with_path(dir.path().join("watchlist.json"));

        let mut list = WatchList::new();
        list.add(WatchedApp::new("com.apple.mail", "Mail"));
        list.add(WatchedApp::new("com.tinyspeck.slackmacgap", "Slack"));
        store.save(&list).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        let ids: Vec<&str> = loaded.apps().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["com.apple.mail", "com.tinyspeck.slackmacgap"]);
    }

    #[test]
    fn test_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = WatchListStore::with_path(dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_store_parses_minimal_entries() {
        // Older files carry only id and display_name
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchlist.json");
        std::fs::write(
            &path,
            r#"[{"id": "com.apple.mail", "display_name": "Mail"}]"#,
        )
        .unwrap();

        let store = WatchListStore::with_path(path);
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.get("com.apple.mail").unwrap().icon_path.is_none());
    }
}
