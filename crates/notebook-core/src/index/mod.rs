//! Link and page index.
//!
//! The notebook asks the index which names exist (for floating link
//! resolution) and which pages link where (for link repair). The index
//! only has to be *reasonably* up to date: [`Index::probably_up_to_date`]
//! tells whether link repair can rely on it.

use crate::error::Result;
use crate::model::{IndexEntry, LinkDirection, LinkEdge, PathName};

mod memory;

pub use memory::MemoryIndex;

pub trait Index: Send + Sync {
    fn probably_up_to_date(&self) -> bool;

    /// Page `path` was written with source `text`.
    fn on_store_page(&self, path: &PathName, text: &str) -> Result<()>;

    /// `path` and everything below it are gone from the store.
    fn on_delete_page(&self, path: &PathName) -> Result<()>;

    /// Re-read `path` and everything below it from the store.
    fn update(&self, path: &PathName) -> Result<()>;

    /// Entry for a page, a namespace or a placeholder; `None` when nothing
    /// is known about `path`.
    fn lookup_by_name(&self, path: &PathName) -> Option<IndexEntry>;

    /// Links from (`Forward`) or to (`Backward`) `path` and its children.
    fn list_links(&self, path: &PathName, direction: LinkDirection) -> Vec<LinkEdge>;

    fn count_links(&self, path: &PathName, direction: LinkDirection) -> usize {
        self.list_links(path, direction).len()
    }

    /// Floating links anchored on `word`, e.g. `Foo` and `Foo:Bar` for `foo`.
    fn list_floating_links(&self, word: &str) -> Vec<LinkEdge>;
}
