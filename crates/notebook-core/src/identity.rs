use crate::error::Result;
use crate::model::PathName;
use crate::page::Page;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// PathName => live Page handle
///
/// The registry does not own pages: callers keep them alive through the
/// `Arc` they receive, and an entry is gone once the last handle is
/// dropped. While a handle is valid every lookup of its name returns that
/// same handle. Invalidation only happens through [`PageCache::flush`].
#[derive(Default)]
pub struct PageCache {
    pages: Mutex<HashMap<PathName, Weak<Page>>>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live, valid handle for `name`, if any.
    pub fn lookup(&self, name: &PathName) -> Option<Arc<Page>> {
        let pages = self.pages.lock().unwrap();
        pages
            .get(name)
            .and_then(Weak::upgrade)
            .filter(|page| page.is_valid())
    }

    /// Return the cached handle for `name` or register the one built by
    /// `create`.
    pub fn get_or_create(
        &self,
        name: &PathName,
        create: impl FnOnce() -> Result<Page>,
    ) -> Result<Arc<Page>> {
        let mut pages = self.pages.lock().unwrap();
        if let Some(page) = pages.get(name).and_then(Weak::upgrade) {
            if page.is_valid() {
                return Ok(page);
            }
        }

        let page = Arc::new(create()?);
        pages.retain(|_, weak| weak.strong_count() > 0);
        pages.insert(name.clone(), Arc::downgrade(&page));
        Ok(page)
    }

    /// Invalidate and forget the handles for `name` and everything below
    /// it. Returns the names that had a live handle.
    ///
    /// # Panics
    ///
    /// When one of those pages has unsaved changes.
    pub fn flush(&self, name: &PathName) -> Vec<PathName> {
        let mut pages = self.pages.lock().unwrap();
        let names: Vec<PathName> = pages
            .keys()
            .filter(|key| key.is_within(name))
            .cloned()
            .collect();

        let mut flushed = Vec::new();
        for key in names {
            if let Some(page) = pages.get(&key).and_then(Weak::upgrade) {
                assert!(
                    !page.is_modified(),
                    "BUG: Flushing page {} with unsaved changes",
                    key
                );
                page.invalidate();
                flushed.push(key.clone());
            }
            pages.remove(&key);
        }
        flushed
    }

    /// Cached handles still held somewhere.
    pub fn live_names(&self) -> Vec<PathName> {
        let pages = self.pages.lock().unwrap();
        pages
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .map(|(name, _)| name.clone())
            .collect()
    }
}
