use super::Index;
use crate::error::Result;
use crate::formats::Format;
use crate::link::{link_type, LinkReference, LinkRelation, LinkType};
use crate::model::{IndexEntry, LinkDirection, LinkEdge, PathName};
use crate::store::Store;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::{Arc, RwLock};

struct PageRecord {
    digest: String,
    /// Page links as written, other link types are left out
    hrefs: Vec<String>,
}

#[derive(Default)]
struct IndexState {
    pages: BTreeMap<PathName, PageRecord>,
    edges: Vec<LinkEdge>,
    up_to_date: bool,
}

fn digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text);
    format!("{:x}", hasher.finalize())
}

impl IndexState {
    /// Returns false when the page did not change.
    fn record(&mut self, format: &dyn Format, path: &PathName, text: &str) -> bool {
        let digest = digest(text);
        if self.pages.get(path).map_or(false, |r| r.digest == digest) {
            return false;
        }

        let hrefs = format
            .parse(text)
            .links()
            .filter(|link| link_type(&link.href) == LinkType::Page)
            .map(|link| link.href.clone())
            .collect();
        self.pages.insert(path.clone(), PageRecord { digest, hrefs });
        true
    }

    fn remove_section(&mut self, path: &PathName) {
        let names: Vec<PathName> = self
            .pages
            .range((Bound::Included(path), Bound::Unbounded))
            .map(|(name, _)| name.clone())
            .take_while(|name| name.is_within(path))
            .collect();
        for name in names {
            self.pages.remove(&name);
        }
    }

    /// Resolve all links again.
    ///
    /// A name exists when it has content, when something below it has
    /// content, or when it was a link target before (a placeholder).
    fn refresh(&mut self) {
        let mut known: HashSet<PathName> = HashSet::new();
        let mut add = |name: &PathName| {
            known.insert(name.clone());
            for ancestor in name.ancestors() {
                if ancestor.is_root() || !known.insert(ancestor) {
                    break;
                }
            }
        };
        self.pages.keys().for_each(&mut add);
        self.edges.iter().for_each(|edge| add(&edge.target));

        let mut edges = Vec::new();
        for (source, record) in &self.pages {
            for href in &record.hrefs {
                let Ok(reference) = LinkReference::parse(href) else {
                    log::debug!("Skipping unparsable link {:?} in {}", href, source);
                    continue;
                };
                let target = reference.resolve(source, |name| known.contains(name));
                edges.push(LinkEdge {
                    source: source.clone(),
                    target,
                    href: href.clone(),
                });
            }
        }
        self.edges = edges;
    }

    fn has_page_below(&self, path: &PathName) -> bool {
        self.pages
            .range((Bound::Excluded(path), Bound::Unbounded))
            .next()
            .map_or(false, |(name, _)| name.is_child_of(path))
    }
}

/// Index kept in memory, filled from a [`Store`].
pub struct MemoryIndex {
    store: Arc<dyn Store>,
    format: Arc<dyn Format>,
    state: RwLock<IndexState>,
}

impl MemoryIndex {
    /// Empty and stale until [`MemoryIndex::rebuild`] runs.
    pub fn new(store: Arc<dyn Store>, format: Arc<dyn Format>) -> Self {
        Self {
            store,
            format,
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Index all pages of the store from scratch.
    pub fn rebuild(&self) -> Result<()> {
        let names = self.store.list_pages(&PathName::root())?;
        let mut state = IndexState::default();
        for name in &names {
            if let Some(text) = self.store.get_node(name)?.source {
                state.record(self.format.as_ref(), name, &text);
            }
        }
        state.refresh();
        state.up_to_date = true;
        log::info!("Indexed {} pages, {} links", state.pages.len(), state.edges.len());

        *self.state.write().unwrap() = state;
        Ok(())
    }

    /// Mark the index as not to be trusted, e.g. after outside changes.
    pub fn mark_stale(&self) {
        self.state.write().unwrap().up_to_date = false;
    }

    pub fn page_count(&self) -> usize {
        self.state.read().unwrap().pages.len()
    }
}

impl Index for MemoryIndex {
    fn probably_up_to_date(&self) -> bool {
        self.state.read().unwrap().up_to_date
    }

    fn on_store_page(&self, path: &PathName, text: &str) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.record(self.format.as_ref(), path, text) {
            state.refresh();
        }
        Ok(())
    }

    fn on_delete_page(&self, path: &PathName) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.remove_section(path);
        state.refresh();
        Ok(())
    }

    fn update(&self, path: &PathName) -> Result<()> {
        // Read before locking, the store may be slow
        let mut pages = Vec::new();
        for name in self.store.list_pages(path)? {
            if let Some(text) = self.store.get_node(&name)?.source {
                pages.push((name, text));
            }
        }

        let mut state = self.state.write().unwrap();
        state.remove_section(path);
        for (name, text) in &pages {
            state.record(self.format.as_ref(), name, text);
        }
        state.refresh();
        Ok(())
    }

    fn lookup_by_name(&self, path: &PathName) -> Option<IndexEntry> {
        let state = self.state.read().unwrap();
        let has_content = state.pages.contains_key(path);
        let has_children = state.has_page_below(path)
            || state.edges.iter().any(|edge| edge.target.is_child_of(path));
        let is_placeholder = !has_content && state.edges.iter().any(|edge| &edge.target == path);

        if !(path.is_root() || has_content || has_children || is_placeholder) {
            return None;
        }
        Some(IndexEntry {
            name: path.clone(),
            has_content,
            has_children,
            is_placeholder,
        })
    }

    fn list_links(&self, path: &PathName, direction: LinkDirection) -> Vec<LinkEdge> {
        let state = self.state.read().unwrap();
        state
            .edges
            .iter()
            .filter(|edge| match direction {
                LinkDirection::Forward => edge.source.is_within(path),
                LinkDirection::Backward => edge.target.is_within(path),
                LinkDirection::Both => edge.source.is_within(path) || edge.target.is_within(path),
            })
            .cloned()
            .collect()
    }

    fn list_floating_links(&self, word: &str) -> Vec<LinkEdge> {
        let word = word.to_lowercase();
        let state = self.state.read().unwrap();
        state
            .edges
            .iter()
            .filter(|edge| {
                LinkReference::parse(&edge.href).map_or(false, |reference| {
                    reference.relation() == LinkRelation::Floating
                        && reference.anchor().to_lowercase() == word
                })
            })
            .cloned()
            .collect()
    }
}
