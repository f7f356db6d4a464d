use std::collections::{BTreeSet, HashSet};

use super::Notebook;
use crate::error::{NotebookError, Result};
use crate::formats::{LinkNode, Node, NodeKind, ParseTree, Visit};
use crate::link::{link_type, relative_notation, LinkReference, LinkRelation, LinkType};
use crate::model::{LinkDirection, PathName};
use crate::page::Page;
use crate::report::{MutationKind, MutationReport, MutationStage};

/// Page link in `node`, parsed; `None` for anything else.
fn page_link(node: &Node) -> Option<(&LinkNode, LinkReference)> {
    let Node::Link(link) = node else {
        return None;
    };
    if link_type(&link.href) != LinkType::Page {
        return None;
    }
    LinkReference::parse(&link.href).ok().map(|href| (link, href))
}

fn check_not_root(path: &PathName) -> Result<()> {
    if path.is_root() {
        return Err(NotebookError::InvalidName(path.to_string()));
    }
    Ok(())
}

/// Structural changes
impl Notebook {
    /// Move a page, with its children and attachments, to `newpath`.
    ///
    /// With `update_links` links from the moved pages to the rest of the
    /// notebook and links from the rest of the notebook into the moved
    /// pages are rewritten to keep pointing at the same pages. This needs
    /// an up to date index. `path` does not need to exist: moving a
    /// placeholder only updates links.
    ///
    /// # Errors
    ///
    /// Errors from listeners or the store leave the notebook as it was.
    /// An index error after the store moved the pages does not undo the
    /// move: the pages are at `newpath` and no links were repaired. Link
    /// repair failures are not errors, they end up in the report.
    ///
    /// # Panics
    ///
    /// When a cached page below `path` or `newpath` has unsaved changes.
    /// Structural changes on this notebook panic from then on.
    pub fn move_page(&self, path: &PathName, newpath: &PathName, update_links: bool) -> Result<MutationReport> {
        let _guard = self.mutation_lock.lock().unwrap();
        self.move_page_locked(MutationKind::Move, path, newpath, update_links)
    }

    fn move_page_locked(
        &self,
        kind: MutationKind,
        path: &PathName,
        newpath: &PathName,
        update_links: bool,
    ) -> Result<MutationReport> {
        check_not_root(path)?;
        check_not_root(newpath)?;
        if update_links && !self.index.probably_up_to_date() {
            return Err(NotebookError::IndexStale);
        }
        log::debug!("Move page {} to {}", path, newpath);

        let mut report = MutationReport::new(kind, path, Some(newpath));
        let n_links = self.index.count_links(path, LinkDirection::Backward);
        let node = self.store.get_node(path)?;
        report.existed = node.source.is_some() || node.has_children;

        self.listeners
            .try_emit(|l| l.will_move(path, newpath))
            .map_err(|e| report.fail(e))?;
        report.advance(MutationStage::PreNotified);

        self.store
            .move_page(path, newpath)
            .map_err(|e| report.fail(e))?;
        report.advance(MutationStage::StoreMutated);

        if newpath.is_child_of(path) {
            // The old section holds the new one
            self.index.update(path).map_err(|e| report.fail(e))?;
        } else {
            if newpath != path {
                self.index.on_delete_page(path).map_err(|e| report.fail(e))?;
            }
            self.index.update(newpath).map_err(|e| report.fail(e))?;
        }
        report.advance(MutationStage::IndexUpdated);

        self.flush_page_cache(path);
        // Cached objects for the new names still show the old state
        self.flush_page_cache(newpath);

        if update_links {
            self.update_links_in_moved_page(path, newpath, &mut report);
            self.update_links_to_moved_page(path, newpath, &mut report);

            let new_n_links = self.index.count_links(newpath, LinkDirection::Backward);
            if new_n_links != n_links {
                report.warn(format!(
                    "Number of links after move ({}) does not match number before move ({})",
                    new_n_links, n_links
                ));
            } else {
                log::debug!("Number of links after move does match number before move ({})", n_links);
            }
            report.advance(MutationStage::LinksRepaired);
        }

        self.listeners.emit(|l| l.did_move(path, newpath));
        report.advance(MutationStage::PostNotified);
        Ok(report)
    }

    /// Floating links inside the moved pages may resolve differently from
    /// the new location; pin them to what they resolved to before.
    fn update_links_in_moved_page(&self, oldroot: &PathName, newroot: &PathName, report: &mut MutationReport) {
        let mut seen = HashSet::new();
        for edge in self.index.list_links(newroot, LinkDirection::Forward) {
            if edge.target.is_within(newroot) || !seen.insert(edge.source.clone()) {
                continue;
            }
            let oldpath = edge.source.reparent(newroot, oldroot);
            match self.update_moved_page(&edge.source, &oldpath, newroot) {
                Ok(true) => report.page_updated(&edge.source),
                Ok(false) => {}
                Err(e) => report.repair_failed(&edge.source, &e),
            }
        }
    }

    fn update_moved_page(&self, path: &PathName, oldpath: &PathName, newroot: &PathName) -> Result<bool> {
        log::debug!("Updating links in page moved from {} to {}", oldpath, path);
        let page = self.get_page(path)?;
        let Some(mut tree) = page.parse_tree() else {
            return Ok(false);
        };

        let replaced = tree.replace(NodeKind::Link, |node| {
            let Some((link, href)) = page_link(node) else {
                return Visit::Skip;
            };
            if href.relation() != LinkRelation::Floating {
                return Visit::Skip;
            }
            let newtarget = self.resolve_reference(&href, path);
            if newtarget.is_within(newroot) {
                return Visit::Skip;
            }
            let oldtarget = self.resolve_reference(&href, oldpath);
            if newtarget == oldtarget {
                return Visit::Skip;
            }
            Visit::Replace(self.update_link_node(link, path, &oldtarget, &href))
        });
        if replaced == 0 {
            return Ok(false);
        }
        self.store_repaired(&page, tree)?;
        Ok(true)
    }

    /// Links elsewhere that point into the moved pages, directly or
    /// through a floating link anchored on the moved page.
    fn update_links_to_moved_page(&self, oldroot: &PathName, newroot: &PathName, report: &mut MutationReport) {
        let mut seen = HashSet::new();
        let mut sources = Vec::new();

        // Pages keeping a placeholder at the old name alive
        if self.index.lookup_by_name(oldroot).is_some() {
            for edge in self.index.list_links(oldroot, LinkDirection::Backward) {
                if seen.insert(edge.source.clone()) {
                    sources.push(edge.source);
                }
            }
        }

        // Links anchored on the old basename from below the old parent
        // that now resolve further up the tree
        let parent = oldroot.parent();
        for edge in self.index.list_floating_links(oldroot.basename()) {
            if !seen.contains(&edge.source)
                && edge.source.is_child_of(&parent)
                && !(edge.target.is_child_of(&parent) || edge.target.is_within(newroot))
            {
                seen.insert(edge.source.clone());
                sources.push(edge.source);
            }
        }

        for source in sources {
            match self.move_links_in_page(&source, oldroot, newroot) {
                Ok(true) => report.page_updated(&source),
                Ok(false) => {}
                Err(e) => report.repair_failed(&source, &e),
            }
        }
    }

    fn move_links_in_page(&self, path: &PathName, oldroot: &PathName, newroot: &PathName) -> Result<bool> {
        log::debug!("Updating page {} to move link from {} to {}", path, oldroot, newroot);
        let page = self.get_page(path)?;
        let Some(mut tree) = page.parse_tree() else {
            return Ok(false);
        };
        let old_parent = oldroot.parent();

        let replaced = tree.replace(NodeKind::Link, |node| {
            let Some((link, href)) = page_link(node) else {
                return Visit::Skip;
            };
            let target = self.resolve_reference(&href, path);

            let newtarget = if target.is_within(newroot) {
                // Already right
                return Visit::Skip;
            } else if target.is_within(oldroot) {
                target.reparent(oldroot, newroot)
            } else if href.relation() == LinkRelation::Floating
                && href.anchor() == newroot.basename()
                && path.is_child_of(&old_parent)
                && !target.is_child_of(&old_parent)
            {
                // Anchored on the moved page, now resolves higher up
                let rest = &href.names().parts()[1..];
                newroot.child(&PathName::from_parts(rest.to_vec()))
            } else {
                return Visit::Skip;
            };
            Visit::Replace(self.update_link_node(link, path, &newtarget, &href))
        });
        if replaced == 0 {
            return Ok(false);
        }
        self.store_repaired(&page, tree)?;
        Ok(true)
    }

    fn store_repaired(&self, page: &Page, tree: ParseTree) -> Result<()> {
        page.set_parse_tree(tree)?;
        if let Err(e) = self.store_page(page) {
            // Drop the unsaved copy, the store still has the old text
            page.mark_saved();
            self.flush_page_cache(page.name());
            return Err(e);
        }
        Ok(())
    }

    /// Link node pointing at `target`. Absolute links stay absolute, the
    /// label follows the link when it was the link text itself.
    fn update_link_node(&self, link: &LinkNode, source: &PathName, target: &PathName, href: &LinkReference) -> Node {
        let reference = if href.relation() == LinkRelation::Absolute {
            LinkReference::absolute(target)
        } else {
            relative_notation(source, target)
        };
        let text = reference.to_wiki_link();
        let label = if link.text == link.href { text.clone() } else { link.text.clone() };
        Node::Link(LinkNode::with_text(&text, &label))
    }

    /// Give a page a new basename within the same namespace.
    ///
    /// With `update_heading` the first heading of the page is set to the
    /// new basename as well.
    ///
    /// Errors and panics as for [`move_page`](Notebook::move_page).
    pub fn rename_page(
        &self,
        path: &PathName,
        newbasename: &str,
        update_heading: bool,
        update_links: bool,
    ) -> Result<MutationReport> {
        log::debug!("Rename {} to {:?} ({}, {})", path, newbasename, update_heading, update_links);
        let newbasename = PathName::valid_segment(newbasename)?;
        let newpath = path.parent().child_name(&newbasename)?;

        let _guard = self.mutation_lock.lock().unwrap();
        let mut report = self.move_page_locked(MutationKind::Rename, path, &newpath, update_links)?;

        if update_heading {
            let page = self.get_page(&newpath)?;
            if let Some(mut tree) = page.parse_tree() {
                tree.set_heading(&newbasename);
                page.set_parse_tree(tree)?;
                self.store_page(&page)?;
                report.page_updated(&newpath);
            }
        }
        Ok(report)
    }

    /// Delete a page with its children and attachments.
    ///
    /// With `update_links` links to the deleted pages are replaced by
    /// their text.
    ///
    /// # Errors
    ///
    /// An index error after the store deleted the pages does not bring
    /// them back, links to them are then left as they are.
    ///
    /// # Panics
    ///
    /// When a cached page below `path` has unsaved changes. Structural
    /// changes on this notebook panic from then on.
    pub fn delete_page(&self, path: &PathName, update_links: bool) -> Result<MutationReport> {
        log::debug!("Delete page: {}", path);
        let _guard = self.mutation_lock.lock().unwrap();
        self.delete_page_locked(MutationKind::Delete, path, update_links)
    }

    /// Like [`delete_page`](Notebook::delete_page) but through the store's
    /// trash. Fails with `TrashNotSupported` when the notebook disables
    /// the trash or the store has none.
    /// Otherwise errors and panics as for
    /// [`delete_page`](Notebook::delete_page).
    pub fn trash_page(&self, path: &PathName, update_links: bool) -> Result<MutationReport> {
        log::debug!("Trash page: {}", path);
        if self.config.read().unwrap().disable_trash {
            return Err(NotebookError::TrashNotSupported("disable_trash is set".to_string()));
        }
        let _guard = self.mutation_lock.lock().unwrap();
        self.delete_page_locked(MutationKind::Trash, path, update_links)
    }

    fn delete_page_locked(&self, kind: MutationKind, path: &PathName, update_links: bool) -> Result<MutationReport> {
        check_not_root(path)?;
        let mut report = MutationReport::new(kind, path, None);

        self.listeners
            .try_emit(|l| l.will_delete(path))
            .map_err(|e| report.fail(e))?;
        report.advance(MutationStage::PreNotified);

        let existed = match kind {
            MutationKind::Trash => self.store.trash_page(path),
            _ => self.store.delete_page(path),
        }
        .map_err(|e| report.fail(e))?;
        report.existed = existed;
        report.advance(MutationStage::StoreMutated);

        self.flush_page_cache(path);
        self.index.on_delete_page(path).map_err(|e| report.fail(e))?;
        report.advance(MutationStage::IndexUpdated);

        // Without a placeholder left nothing links here
        if update_links && self.index.lookup_by_name(path).is_some() {
            let sources: BTreeSet<PathName> = self
                .index
                .list_links(path, LinkDirection::Backward)
                .into_iter()
                .map(|edge| edge.source)
                .collect();
            for source in sources {
                match self.remove_links_in_page(&source, path) {
                    Ok(true) => report.page_updated(&source),
                    Ok(false) => {}
                    Err(e) => report.repair_failed(&source, &e),
                }
            }
            report.advance(MutationStage::LinksRepaired);
        }

        self.listeners.emit(|l| l.did_delete(path));
        report.advance(MutationStage::PostNotified);
        Ok(report)
    }

    fn remove_links_in_page(&self, path: &PathName, target: &PathName) -> Result<bool> {
        log::debug!("Removing links in {} to {}", path, target);
        let page = self.get_page(path)?;
        let Some(mut tree) = page.parse_tree() else {
            return Ok(false);
        };

        let replaced = tree.replace(NodeKind::Link, |node| match page_link(node) {
            Some((link, href)) if self.resolve_reference(&href, path).is_within(target) => {
                Visit::Replace(Node::Text(link.text.clone()))
            }
            _ => Visit::Skip,
        });
        if replaced == 0 {
            return Ok(false);
        }
        self.store_repaired(&page, tree)?;
        Ok(true)
    }
}
