//! Page storage backends.

use crate::error::{NotebookError, Result};
use crate::model::PathName;
use std::path::{Path, PathBuf};

mod files;
mod memory;

pub use files::FilesStore;
pub use memory::MemoryStore;

/// Background write started by [`Store::store_page_async`].
pub type StoreJob = tokio::task::JoinHandle<Result<()>>;

/// What the store knows about one page name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreNode {
    /// Page source, `None` when the page has no content.
    pub source: Option<String>,
    pub has_children: bool,
    pub attachments_dir: Option<PathBuf>,
    pub readonly: bool,
}

/// Abstract interface for persisting page text.
///
/// Moves and deletes act on the page together with its children and its
/// attachment folder.
pub trait Store: Send + Sync {
    fn get_node(&self, path: &PathName) -> Result<StoreNode>;

    fn store_page(&self, path: &PathName, text: &str) -> Result<()>;

    /// Write in the background when the store can. Returns `None` when the
    /// write already happened in the foreground.
    fn store_page_async(&self, path: &PathName, text: String) -> Result<Option<StoreJob>> {
        self.store_page(path, &text)?;
        Ok(None)
    }

    /// Fails with `PageExists` when `newpath` is occupied by pages that are
    /// not part of the moved subtree.
    fn move_page(&self, path: &PathName, newpath: &PathName) -> Result<()>;

    /// Returns whether there was anything to delete.
    fn delete_page(&self, path: &PathName) -> Result<bool>;

    fn trash_page(&self, _path: &PathName) -> Result<bool> {
        Err(NotebookError::TrashNotSupported(
            "store has no trash".to_string(),
        ))
    }

    /// Pages with content at or below `namespace`.
    fn list_pages(&self, namespace: &PathName) -> Result<Vec<PathName>>;

    fn attachments_dir(&self, path: &PathName) -> Option<PathBuf>;

    fn is_readonly(&self) -> bool {
        false
    }
}

/// Folder for a page below a storage root, e.g. `Foo Bar:Baz` -> `Foo_Bar/Baz`.
pub(crate) fn encode_dir(root: &Path, path: &PathName) -> PathBuf {
    let mut dir = root.to_path_buf();
    for part in path.parts() {
        dir.push(part.replace(' ', "_"));
    }
    dir
}

pub(crate) fn decode_part(part: &str) -> String {
    part.replace('_', " ")
}

/// Names below `path` that would collide with a move of `path` to `newpath`.
pub(crate) fn move_conflicts(
    existing: impl IntoIterator<Item = PathName>,
    path: &PathName,
    newpath: &PathName,
) -> bool {
    existing
        .into_iter()
        .any(|name| name.is_within(newpath) && !name.is_within(path))
}
