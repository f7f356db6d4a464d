use std::sync::Arc;

use super::Notebook;
use crate::error::{NotebookError, Result};
use crate::link::{relative_notation, LinkReference, LinkRelation};
use crate::model::PathName;
use crate::page::Page;
use crate::store::StoreJob;

impl Notebook {
    /// The page object for `path`, also when there is no such page yet.
    pub fn get_page(&self, path: &PathName) -> Result<Arc<Page>> {
        self.cache.get_or_create(path, || {
            let node = self.store.get_node(path)?;
            let tree = node.source.as_deref().map(|text| self.format.parse(text));
            // Parent of a placeholder: the index knows about children the
            // store does not have
            let indexed_children = self
                .index
                .lookup_by_name(path)
                .map_or(false, |entry| entry.has_children);

            Ok(Page::new(
                path.clone(),
                tree,
                node.has_children || indexed_children,
                node.readonly,
                node.attachments_dir,
            ))
        })
    }

    /// Like [`get_page`](Notebook::get_page) but never returns a page that
    /// has content or children: `Name 1`, `Name 2`, ... are tried until a
    /// free name is found.
    pub fn get_new_page(&self, path: &PathName) -> Result<Arc<Page>> {
        let base = path.name();
        let mut page = self.get_page(path)?;
        let mut i = 0;
        while page.has_content() || page.has_children() {
            i += 1;
            let name = PathName::new(&format!("{} {}", base, i))?;
            page = self.get_page(&name)?;
        }
        Ok(page)
    }

    /// Forget cached page objects for `path` and below; old handles turn
    /// invalid.
    pub fn flush_page_cache(&self, path: &PathName) -> Vec<PathName> {
        self.cache.flush(path)
    }

    pub fn get_home_page(&self) -> Result<Arc<Page>> {
        let home = self.config.read().unwrap().home_page.clone();
        self.get_page(&home)
    }

    /// Write the page content to the store and index it.
    ///
    /// # Panics
    ///
    /// When `page` is no longer valid.
    pub fn store_page(&self, page: &Page) -> Result<()> {
        assert!(page.is_valid(), "BUG: page object for {} no longer valid", page.name());
        let path = page.name();
        self.listeners.try_emit(|l| l.will_store(path))?;

        let text = self.dump_page(page);
        self.store.store_page(path, &text)?;
        page.mark_saved();
        self.index.on_store_page(path, &text)?;
        self.mark_parents_have_children(path);

        self.listeners.emit(|l| l.did_store(path));
        Ok(())
    }

    /// Like [`store_page`](Notebook::store_page) but the store may write in
    /// the background. `did_store` is emitted right away, before the write
    /// finished; await the returned job when durability matters.
    pub fn store_page_async(&self, page: &Page) -> Result<Option<StoreJob>> {
        assert!(page.is_valid(), "BUG: page object for {} no longer valid", page.name());
        let path = page.name();
        self.listeners.try_emit(|l| l.will_store(path))?;

        let text = self.dump_page(page);
        let job = self.store.store_page_async(path, text.clone())?;
        page.mark_saved();
        self.index.on_store_page(path, &text)?;
        self.mark_parents_have_children(path);

        self.listeners.emit(|l| l.did_store(path));
        Ok(job)
    }

    fn dump_page(&self, page: &Page) -> String {
        page.parse_tree()
            .map(|tree| self.format.dump(&tree))
            .unwrap_or_default()
    }

    fn mark_parents_have_children(&self, path: &PathName) {
        for ancestor in path.ancestors() {
            if let Some(parent) = self.cache.lookup(&ancestor) {
                parent.set_has_children(true);
            }
        }
    }

    /// Page name for a name typed by the user. Relative input (`+Child`,
    /// `Sibling`) is resolved against `reference` when given.
    pub fn lookup_from_user_input(&self, name: &str, reference: Option<&PathName>) -> Result<PathName> {
        let link = LinkReference::parse(name)?;
        match reference {
            Some(source) => Ok(self.resolve_reference(&link, source)),
            None if link.relation() == LinkRelation::Relative => {
                Err(NotebookError::InvalidName(name.to_string()))
            }
            None => Ok(link.names().clone()),
        }
    }

    /// Target of the link text `href` in page `source`.
    pub fn resolve_link(&self, href: &str, source: &PathName) -> Result<PathName> {
        let link = LinkReference::parse(href)?;
        Ok(self.resolve_reference(&link, source))
    }

    pub(crate) fn resolve_reference(&self, link: &LinkReference, source: &PathName) -> PathName {
        link.resolve(source, |name| self.index.lookup_by_name(name).is_some())
    }

    /// Shortest link text from `source` to `target`.
    pub fn relative_link(&self, source: &PathName, target: &PathName) -> String {
        relative_notation(source, target).to_wiki_link()
    }

    /// Ask the listeners for a page to link `word` to.
    pub fn suggest_link(&self, source: &PathName, word: &str) -> Option<PathName> {
        self.listeners.first(|l| l.suggest_link(source, word))
    }
}
