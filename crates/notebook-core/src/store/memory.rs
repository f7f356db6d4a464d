use super::{encode_dir, move_conflicts, Store, StoreJob, StoreNode};
use crate::error::{NotebookError, Result};
use crate::model::PathName;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

// In memory
#[derive(Default)]
struct MemoryState {
    pages: BTreeMap<PathName, String>,
    trash: Vec<(PathName, String)>,
}

/// Store keeping page text in memory, used for tests and scratch notebooks.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    attachments_root: Option<PathBuf>,
    trash_enabled: bool,
    readonly: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            attachments_root: None,
            trash_enabled: true,
            readonly: false,
        }
    }

    /// Attachment folders are reported below `root` (nothing is created).
    pub fn with_attachments_root(mut self, root: PathBuf) -> Self {
        self.attachments_root = Some(root);
        self
    }

    pub fn without_trash(mut self) -> Self {
        self.trash_enabled = false;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn page_text(&self, path: &PathName) -> Option<String> {
        self.state.read().unwrap().pages.get(path).cloned()
    }

    pub fn trashed(&self) -> Vec<PathName> {
        let state = self.state.read().unwrap();
        state.trash.iter().map(|(name, _)| name.clone()).collect()
    }

    fn check_writable(&self, path: &PathName) -> Result<()> {
        if self.readonly {
            return Err(NotebookError::ReadOnly(path.clone()));
        }
        Ok(())
    }

    fn remove_subtree(state: &mut MemoryState, path: &PathName) -> Vec<(PathName, String)> {
        let names: Vec<PathName> = subtree_range(&state.pages, path).cloned().collect();
        names
            .into_iter()
            .filter_map(|name| state.pages.remove(&name).map(|text| (name, text)))
            .collect()
    }
}

/// Keys equal to or below `path`, which sort right after `path` itself.
fn subtree_range<'a>(
    pages: &'a BTreeMap<PathName, String>,
    path: &'a PathName,
) -> impl Iterator<Item = &'a PathName> + 'a {
    pages
        .range((Bound::Included(path), Bound::Unbounded))
        .map(|(name, _)| name)
        .take_while(move |name| name.is_within(path))
}

impl Store for MemoryStore {
    fn get_node(&self, path: &PathName) -> Result<StoreNode> {
        let state = self.state.read().unwrap();
        let has_children = state
            .pages
            .range((Bound::Excluded(path), Bound::Unbounded))
            .next()
            .map_or(false, |(name, _)| name.is_child_of(path));

        Ok(StoreNode {
            source: state.pages.get(path).cloned(),
            has_children,
            attachments_dir: self.attachments_dir(path),
            readonly: self.readonly,
        })
    }

    fn store_page(&self, path: &PathName, text: &str) -> Result<()> {
        self.check_writable(path)?;
        let mut state = self.state.write().unwrap();
        state.pages.insert(path.clone(), text.to_string());
        Ok(())
    }

    fn store_page_async(&self, path: &PathName, text: String) -> Result<Option<StoreJob>> {
        self.check_writable(path)?;
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.store_page(path, &text)?;
            return Ok(None);
        };

        let state = self.state.clone();
        let path = path.clone();
        Ok(Some(runtime.spawn_blocking(move || {
            state.write().unwrap().pages.insert(path, text);
            Ok(())
        })))
    }

    fn move_page(&self, path: &PathName, newpath: &PathName) -> Result<()> {
        self.check_writable(path)?;
        if path == newpath {
            return Ok(());
        }

        let mut state = self.state.write().unwrap();
        if move_conflicts(state.pages.keys().cloned(), path, newpath) {
            return Err(NotebookError::PageExists(newpath.clone()));
        }

        for (name, text) in Self::remove_subtree(&mut state, path) {
            state.pages.insert(name.reparent(path, newpath), text);
        }
        Ok(())
    }

    fn delete_page(&self, path: &PathName) -> Result<bool> {
        self.check_writable(path)?;
        let mut state = self.state.write().unwrap();
        Ok(!Self::remove_subtree(&mut state, path).is_empty())
    }

    fn trash_page(&self, path: &PathName) -> Result<bool> {
        if !self.trash_enabled {
            return Err(NotebookError::TrashNotSupported(
                "trash disabled for this store".to_string(),
            ));
        }
        self.check_writable(path)?;
        let mut state = self.state.write().unwrap();
        let removed = Self::remove_subtree(&mut state, path);
        let existed = !removed.is_empty();
        state.trash.extend(removed);
        Ok(existed)
    }

    fn list_pages(&self, namespace: &PathName) -> Result<Vec<PathName>> {
        let state = self.state.read().unwrap();
        Ok(subtree_range(&state.pages, namespace).cloned().collect())
    }

    fn attachments_dir(&self, path: &PathName) -> Option<PathBuf> {
        self.attachments_root
            .as_ref()
            .map(|root| encode_dir(root, path))
    }

    fn is_readonly(&self) -> bool {
        self.readonly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(name: &str) -> PathName {
        PathName::new(name).unwrap()
    }

    fn store_with(pages: &[(&str, &str)]) -> MemoryStore {
        let store = MemoryStore::new();
        for (name, text) in pages {
            store.store_page(&path(name), text).unwrap();
        }
        store
    }

    #[test]
    fn test_get_node_reports_content_and_children() {
        let store = store_with(&[("a:b", "text")]);
        let node = store.get_node(&path("a")).unwrap();
        assert!(node.source.is_none());
        assert!(node.has_children);

        let node = store.get_node(&path("a:b")).unwrap();
        assert_eq!(node.source.as_deref(), Some("text"));
        assert!(!node.has_children);
    }

    #[test]
    fn test_children_check_ignores_name_prefixes() {
        let store = store_with(&[("a", "x"), ("ab:c", "y")]);
        assert!(!store.get_node(&path("a")).unwrap().has_children);
    }

    #[test]
    fn test_move_takes_subtree_along() {
        let store = store_with(&[("a", "A"), ("a:b", "B"), ("ab", "other")]);
        store.move_page(&path("a"), &path("x:y")).unwrap();

        assert_eq!(
            store.list_pages(&PathName::root()).unwrap(),
            vec![path("ab"), path("x:y"), path("x:y:b")]
        );
        assert_eq!(store.page_text(&path("x:y:b")).as_deref(), Some("B"));
    }

    #[test]
    fn test_move_into_own_subtree() {
        let store = store_with(&[("a", "A"), ("a:b", "B")]);
        store.move_page(&path("a"), &path("a:b:c")).unwrap();
        assert_eq!(
            store.list_pages(&PathName::root()).unwrap(),
            vec![path("a:b:c"), path("a:b:c:b")]
        );
    }

    #[test]
    fn test_move_onto_existing_page_fails() {
        let store = store_with(&[("a", "A"), ("b", "B")]);
        let result = store.move_page(&path("a"), &path("b"));
        assert!(matches!(result, Err(NotebookError::PageExists(_))));
        assert_eq!(store.page_text(&path("a")).as_deref(), Some("A"));
    }

    #[test]
    fn test_delete_and_trash() {
        let store = store_with(&[("a", "A"), ("a:b", "B"), ("c", "C")]);
        assert!(store.delete_page(&path("a")).unwrap());
        assert!(!store.delete_page(&path("a")).unwrap());

        assert!(store.trash_page(&path("c")).unwrap());
        assert_eq!(store.trashed(), vec![path("c")]);
        assert!(store.list_pages(&PathName::root()).unwrap().is_empty());
    }

    #[test]
    fn test_trash_can_be_disabled() {
        let store = store_with(&[("a", "A")]).without_trash();
        let result = store.trash_page(&path("a"));
        assert!(matches!(result, Err(NotebookError::TrashNotSupported(_))));
        assert!(store.page_text(&path("a")).is_some());
    }

    #[test]
    fn test_readonly_store_refuses_writes() {
        let store = MemoryStore::new().readonly();
        let result = store.store_page(&path("a"), "x");
        assert!(matches!(result, Err(NotebookError::ReadOnly(_))));
    }

    #[test]
    fn test_store_page_async_outside_runtime_is_synchronous() {
        let store = MemoryStore::new();
        let job = store.store_page_async(&path("a"), "A".into()).unwrap();
        assert!(job.is_none());
        assert_eq!(store.page_text(&path("a")).as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_store_page_async_runs_in_background() {
        let store = MemoryStore::new();
        let job = store
            .store_page_async(&path("a"), "A".into())
            .unwrap()
            .expect("background job inside a runtime");
        job.await.unwrap().unwrap();
        assert_eq!(store.page_text(&path("a")).as_deref(), Some("A"));
    }
}
