use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use crate::config::{EndOfLine, NotebookConfig, CONFIG_FILE};
use crate::error::Result;
use crate::formats::{Format, MarkdownFormat};
use crate::identity::PageCache;
use crate::index::{Index, MemoryIndex};
use crate::model::PathName;
use crate::properties::{NamespaceProperties, PageTemplate};
use crate::resolver::FileResolver;
use crate::signals::{Listeners, NotebookListener};
use crate::store::{FilesStore, MemoryStore, Store};

mod files;
mod mutations;
mod pages;

#[cfg(test)]
mod tests;

/// A collection of pages with the store, index and format behind it.
///
/// Pages are handed out through an identity cache: while a handle is
/// valid, every `get_page` for that name returns the same `Arc<Page>`.
/// Structural changes (move, rename, delete) go through this type so that
/// links in other pages can be kept pointing at the same targets.
pub struct Notebook {
    pub(crate) dir: Option<PathBuf>,
    pub(crate) config: RwLock<NotebookConfig>,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) index: Arc<dyn Index>,
    pub(crate) format: Arc<dyn Format>,
    pub(crate) cache: PageCache,
    pub(crate) listeners: Listeners,
    pub(crate) properties: RwLock<NamespaceProperties>,
    pub(crate) resolver: RwLock<FileResolver>,
    // Serialises move, rename and delete
    mutation_lock: Mutex<()>,
}

/// Changes for [`Notebook::save_properties`]; `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct PropertiesUpdate {
    pub name: Option<String>,
    pub interwiki_keyword: Option<String>,
    pub home_page: Option<PathName>,
    pub icon: Option<PathBuf>,
    pub document_root: Option<PathBuf>,
    pub shared: Option<bool>,
    pub end_of_line: Option<EndOfLine>,
    pub disable_trash: Option<bool>,
    pub profile: Option<String>,
}

fn file_resolver(dir: Option<&Path>, config: &NotebookConfig) -> FileResolver {
    let resolved = config.resolve_relative(dir);
    FileResolver::new(dir.map(Path::to_path_buf), resolved.document_root)
}

impl Notebook {
    pub fn new(
        dir: Option<PathBuf>,
        config: NotebookConfig,
        store: Arc<dyn Store>,
        index: Arc<dyn Index>,
        format: Arc<dyn Format>,
    ) -> Self {
        let resolver = file_resolver(dir.as_deref(), &config);
        Self {
            dir,
            config: RwLock::new(config),
            store,
            index,
            format,
            cache: PageCache::new(),
            listeners: Listeners::default(),
            properties: RwLock::new(NamespaceProperties::new()),
            resolver: RwLock::new(resolver),
            mutation_lock: Mutex::new(()),
        }
    }

    /// Notebook over `store` with a freshly built in-memory index.
    pub fn from_store(store: Arc<dyn Store>, config: NotebookConfig) -> Result<Self> {
        let format: Arc<dyn Format> = Arc::new(MarkdownFormat);
        let index = MemoryIndex::new(store.clone(), format.clone());
        index.rebuild()?;
        Ok(Self::new(None, config, store, Arc::new(index), format))
    }

    pub fn new_in_memory() -> Result<Self> {
        Self::from_store(Arc::new(MemoryStore::new()), NotebookConfig::default())
    }

    /// Open the notebook stored in `dir`, reading `notebook.yml` if present.
    pub fn new_from_dir(dir: &Path) -> Result<Self> {
        let config = NotebookConfig::load_dir(dir)?;
        if config.needs_upgrade() {
            log::warn!(
                "Notebook {} uses data format {}, consider upgrading",
                dir.display(),
                config.version
            );
        }

        let store: Arc<dyn Store> =
            Arc::new(FilesStore::new(dir.to_path_buf()).with_end_of_line(config.end_of_line));
        if store.is_readonly() {
            log::info!("Notebook {} is read-only", dir.display());
        }

        let format: Arc<dyn Format> = Arc::new(MarkdownFormat);
        let index = MemoryIndex::new(store.clone(), format.clone());
        index.rebuild()?;
        Ok(Self::new(
            Some(dir.to_path_buf()),
            config,
            store,
            Arc::new(index),
            format,
        ))
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn config(&self) -> NotebookConfig {
        self.config.read().unwrap().clone()
    }

    pub fn name(&self) -> String {
        self.config.read().unwrap().name.clone()
    }

    pub fn index(&self) -> &Arc<dyn Index> {
        &self.index
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn format(&self) -> &Arc<dyn Format> {
        &self.format
    }

    pub fn is_readonly(&self) -> bool {
        self.store.is_readonly()
    }

    pub fn cache_dir(&self) -> Option<PathBuf> {
        let dir = self.dir.as_deref()?;
        self.config.read().unwrap().cache_dir_for(dir)
    }

    pub fn connect(&self, listener: Arc<dyn NotebookListener>) {
        self.listeners.connect(listener);
    }

    pub fn disconnect(&self, listener: &Arc<dyn NotebookListener>) -> bool {
        self.listeners.disconnect(listener)
    }

    pub fn set_namespace_property(&self, namespace: &PathName, key: &str, value: serde_json::Value) {
        self.properties.write().unwrap().set(namespace, key, value);
    }

    /// Template for the initial content of a new page at `path`.
    pub fn get_template(&self, path: &PathName) -> PageTemplate {
        let name = self.properties.read().unwrap().template_for(path);
        log::debug!("Found template '{}' for {}", name, path);

        let mut template = PageTemplate::new(&name, path);
        self.listeners
            .emit(|l| l.new_page_template(path, &mut template));
        template
    }

    /// Update the notebook settings and write them to the settings file.
    ///
    /// Icon and document root inside the notebook folder are stored as
    /// `./relative` paths.
    pub fn save_properties(&self, update: PropertiesUpdate) -> Result<()> {
        let mut config = self.config();
        if let Some(name) = update.name {
            config.name = name;
        }
        if let Some(keyword) = update.interwiki_keyword {
            config.interwiki_keyword = Some(keyword).filter(|k| !k.is_empty());
        }
        if let Some(home) = update.home_page {
            config.home_page = home;
        }
        if let Some(icon) = update.icon {
            config.icon = Some(self.config_path_value(&icon));
        }
        if let Some(root) = update.document_root {
            config.document_root = Some(self.config_path_value(&root));
        }
        if let Some(shared) = update.shared {
            config.shared = shared;
        }
        if let Some(end_of_line) = update.end_of_line {
            config.end_of_line = end_of_line;
        }
        if let Some(disable_trash) = update.disable_trash {
            config.disable_trash = disable_trash;
        }
        if let Some(profile) = update.profile {
            config.profile = Some(profile).filter(|p| !p.is_empty());
        }
        config.validate()?;

        *self.resolver.write().unwrap() = file_resolver(self.dir.as_deref(), &config);
        *self.config.write().unwrap() = config.clone();
        self.listeners.emit(|l| l.properties_changed(&config));

        // Written last, a failing listener must not leave a bad file behind
        if let Some(dir) = &self.dir {
            config.save(&dir.join(CONFIG_FILE))?;
        }
        Ok(())
    }

    fn config_path_value(&self, path: &Path) -> String {
        let relative = self
            .dir
            .as_deref()
            .and_then(|dir| path.strip_prefix(dir).ok())
            .filter(|rel| !rel.as_os_str().is_empty());
        match relative {
            Some(rel) => {
                let parts: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                format!("./{}", parts.join("/"))
            }
            None => path.to_string_lossy().into_owned(),
        }
    }
}
