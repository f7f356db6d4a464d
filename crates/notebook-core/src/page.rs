use crate::error::{NotebookError, Result};
use crate::formats::ParseTree;
use crate::model::PathName;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// In-memory representation of one page.
///
/// Handles are shared as `Arc<Page>` and handed out by the notebook's
/// identity cache, which guarantees a single live handle per name. Once the
/// page (or one of its ancestors) is moved or deleted the handle is marked
/// invalid; using the content of an invalid handle is a bug and panics.
pub struct Page {
    name: PathName,
    valid: AtomicBool,
    state: Mutex<PageState>,
}

#[derive(Debug, Default)]
struct PageState {
    tree: Option<ParseTree>,
    has_content: bool,
    has_children: bool,
    modified: bool,
    readonly: bool,
    attachments_dir: Option<PathBuf>,
}

impl Page {
    pub(crate) fn new(
        name: PathName,
        tree: Option<ParseTree>,
        has_children: bool,
        readonly: bool,
        attachments_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            name,
            valid: AtomicBool::new(true),
            state: Mutex::new(PageState {
                has_content: tree.is_some(),
                tree,
                has_children,
                modified: false,
                readonly,
                attachments_dir,
            }),
        }
    }

    pub fn name(&self) -> &PathName {
        &self.name
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    pub(crate) fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    fn assert_valid(&self) {
        assert!(self.is_valid(), "BUG: page object for {} no longer valid", self.name);
    }

    pub fn has_content(&self) -> bool {
        self.state.lock().unwrap().has_content
    }

    pub fn has_children(&self) -> bool {
        self.state.lock().unwrap().has_children
    }

    pub(crate) fn set_has_children(&self, has_children: bool) {
        self.state.lock().unwrap().has_children = has_children;
    }

    /// Unsaved changes pending.
    pub fn is_modified(&self) -> bool {
        self.state.lock().unwrap().modified
    }

    pub fn is_readonly(&self) -> bool {
        self.state.lock().unwrap().readonly
    }

    pub fn attachments_dir(&self) -> Option<PathBuf> {
        self.state.lock().unwrap().attachments_dir.clone()
    }

    /// Copy of the document tree, `None` for a page without content.
    pub fn parse_tree(&self) -> Option<ParseTree> {
        self.assert_valid();
        self.state.lock().unwrap().tree.clone()
    }

    pub fn set_parse_tree(&self, tree: ParseTree) -> Result<()> {
        self.assert_valid();
        let mut state = self.state.lock().unwrap();
        if state.readonly {
            return Err(NotebookError::ReadOnly(self.name.clone()));
        }
        state.tree = Some(tree);
        state.has_content = true;
        state.modified = true;
        Ok(())
    }

    pub(crate) fn mark_saved(&self) {
        self.state.lock().unwrap().modified = false;
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("name", &self.name)
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::Node;

    fn page(name: &str) -> Page {
        Page::new(PathName::new(name).unwrap(), None, false, false, None)
    }

    #[test]
    fn test_new_page_without_tree_has_no_content() {
        let page = page("a");
        assert!(!page.has_content());
        assert!(page.parse_tree().is_none());
        assert!(!page.is_modified());
    }

    #[test]
    fn test_set_parse_tree_marks_modified() {
        let page = page("a");
        page.set_parse_tree(ParseTree::new(vec![Node::Text("x".into())])).unwrap();
        assert!(page.has_content());
        assert!(page.is_modified());
        page.mark_saved();
        assert!(!page.is_modified());
    }

    #[test]
    fn test_readonly_page_rejects_edits() {
        let page = Page::new(PathName::new("a").unwrap(), None, false, true, None);
        let result = page.set_parse_tree(ParseTree::default());
        assert!(matches!(result, Err(NotebookError::ReadOnly(_))));
    }

    #[test]
    #[should_panic(expected = "no longer valid")]
    fn test_invalid_page_fails_fast() {
        let page = page("a");
        page.invalidate();
        let _ = page.parse_tree();
    }
}
