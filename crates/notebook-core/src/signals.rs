use crate::config::NotebookConfig;
use crate::error::Result;
use crate::model::PathName;
use crate::properties::PageTemplate;
use std::sync::{Arc, RwLock};

/// Observer of notebook changes.
///
/// All methods have empty defaults. `will_*` methods run before the store
/// is touched; returning an error aborts the operation.
pub trait NotebookListener: Send + Sync {
    fn will_store(&self, _path: &PathName) -> Result<()> {
        Ok(())
    }

    fn did_store(&self, _path: &PathName) {}

    fn will_move(&self, _path: &PathName, _newpath: &PathName) -> Result<()> {
        Ok(())
    }

    fn did_move(&self, _path: &PathName, _newpath: &PathName) {}

    fn will_delete(&self, _path: &PathName) -> Result<()> {
        Ok(())
    }

    fn did_delete(&self, _path: &PathName) {}

    fn properties_changed(&self, _config: &NotebookConfig) {}

    /// Page to link for `word` typed in `source`.
    fn suggest_link(&self, _source: &PathName, _word: &str) -> Option<PathName> {
        None
    }

    fn new_page_template(&self, _path: &PathName, _template: &mut PageTemplate) {}
}

/// Listeners in connection order.
#[derive(Default)]
pub struct Listeners {
    list: RwLock<Vec<Arc<dyn NotebookListener>>>,
}

impl Listeners {
    pub fn connect(&self, listener: Arc<dyn NotebookListener>) {
        self.list.write().unwrap().push(listener);
    }

    pub fn disconnect(&self, listener: &Arc<dyn NotebookListener>) -> bool {
        let mut list = self.list.write().unwrap();
        let before = list.len();
        list.retain(|l| !Arc::ptr_eq(l, listener));
        list.len() != before
    }

    pub fn len(&self) -> usize {
        self.list.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Listeners may call back into the notebook, so never hold the lock
    // while one runs.
    fn snapshot(&self) -> Vec<Arc<dyn NotebookListener>> {
        self.list.read().unwrap().clone()
    }

    pub(crate) fn emit(&self, mut f: impl FnMut(&dyn NotebookListener)) {
        for listener in self.snapshot() {
            f(listener.as_ref());
        }
    }

    /// Stops at the first error.
    pub(crate) fn try_emit(&self, mut f: impl FnMut(&dyn NotebookListener) -> Result<()>) -> Result<()> {
        for listener in self.snapshot() {
            f(listener.as_ref())?;
        }
        Ok(())
    }

    /// First answer wins.
    pub(crate) fn first<T>(&self, mut f: impl FnMut(&dyn NotebookListener) -> Option<T>) -> Option<T> {
        self.snapshot().into_iter().find_map(|listener| f(listener.as_ref()))
    }
}
