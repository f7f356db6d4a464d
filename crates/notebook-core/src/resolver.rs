//! File links: from link text to a file path and back.
//!
//! Resolution is purely lexical. Nothing here looks at the file system.

use crate::error::{NotebookError, Result};
use crate::link::is_win32_path;
use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` without touching the file system.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Components of `path` below `dir`; `None` unless strictly below it.
fn relpath(path: &Path, dir: &Path) -> Option<Vec<String>> {
    let rel = path.strip_prefix(dir).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts)
    }
}

fn is_child(path: &Path, dir: &Path) -> bool {
    relpath(path, dir).is_some()
}

fn common_parent(a: &Path, b: &Path) -> PathBuf {
    a.components()
        .zip(b.components())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x.as_os_str().to_os_string())
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct FileResolver {
    notebook_dir: Option<PathBuf>,
    document_root: Option<PathBuf>,
    home: Option<PathBuf>,
}

impl FileResolver {
    pub fn new(notebook_dir: Option<PathBuf>, document_root: Option<PathBuf>) -> Self {
        Self {
            notebook_dir,
            document_root,
            home: dirs::home_dir(),
        }
    }

    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    pub fn notebook_dir(&self) -> Option<&Path> {
        self.notebook_dir.as_deref()
    }

    pub fn document_root(&self) -> Option<&Path> {
        self.document_root.as_deref()
    }

    /// Absolute path for the file link `text`.
    ///
    /// * `~/x`, `~user/x` and `file:` URIs are absolute
    /// * `/x` is below the document root (or the file system root)
    /// * `C:/x` is absolute, on unix it gets a leading `/`
    /// * anything else is below `attachments_dir` or, without one, below
    ///   the notebook folder
    pub fn resolve(&self, text: &str, attachments_dir: Option<&Path>) -> Result<PathBuf> {
        let text = text.replace('\\', "/");

        if text.starts_with("file:/") {
            return url::Url::parse(&text)
                .ok()
                .and_then(|uri| uri.to_file_path().ok())
                .ok_or(NotebookError::InvalidName(text));
        }
        if let Some(rest) = text.strip_prefix('~') {
            return Ok(self.expand_home(rest).unwrap_or_else(|| PathBuf::from(&text)));
        }
        if text.starts_with('/') {
            let dir = self.document_root.clone().unwrap_or_else(|| PathBuf::from("/"));
            return Ok(normalize_path(&dir.join(text.trim_start_matches('/'))));
        }
        if is_win32_path(&text) {
            if cfg!(windows) {
                return Ok(PathBuf::from(text));
            }
            return Ok(PathBuf::from(format!("/{}", text)));
        }

        let dir = attachments_dir
            .or(self.notebook_dir.as_deref())
            .ok_or(NotebookError::NoRootFolder)?;
        Ok(normalize_path(&dir.join(text)))
    }

    fn expand_home(&self, rest: &str) -> Option<PathBuf> {
        let home = self.home.as_ref()?;
        let (user, sub) = match rest.split_once('/') {
            Some((user, sub)) => (user, sub),
            None => (rest, ""),
        };
        let base = if user.is_empty() {
            home.clone()
        } else {
            home.parent()?.join(user)
        };
        Some(normalize_path(&base.join(sub)))
    }

    /// Shortest link text for `file`, the counterpart of [`resolve`].
    ///
    /// Tried in order: below the attachment folder (`./x`), below a
    /// document root that sits inside the notebook (`/x`), elsewhere in
    /// the notebook (`../x`, or `./x` without attachment folder), below
    /// the document root (`/x`), below the home folder (`~/x`).
    ///
    /// [`resolve`]: FileResolver::resolve
    pub fn relative_filepath(&self, file: &Path, attachments_dir: Option<&Path>) -> Option<String> {
        let notebook_root = self.notebook_dir.as_deref();
        let document_root = self.document_root.as_deref();
        let inner_document_root = match (document_root, notebook_root) {
            (Some(doc), Some(nb)) if is_child(doc, nb) => Some(doc),
            _ => None,
        };

        match attachments_dir {
            Some(attachments) => {
                if let Some(rel) = relpath(file, attachments) {
                    return Some(format!("./{}", rel.join("/")));
                }
                if let Some(doc) = inner_document_root {
                    if !is_child(attachments, doc) {
                        if let Some(rel) = relpath(file, doc) {
                            return Some(format!("/{}", rel.join("/")));
                        }
                    }
                }
                if let Some(nb) = notebook_root {
                    if is_child(file, nb) && is_child(attachments, nb) {
                        let parent = common_parent(file, attachments);
                        let up = relpath(attachments, &parent).map_or(0, |parts| parts.len());
                        let down = relpath(file, &parent).unwrap_or_default();
                        return Some(format!("{}{}", "../".repeat(up), down.join("/")));
                    }
                }
            }
            None => {
                if let Some(doc) = inner_document_root {
                    if let Some(rel) = relpath(file, doc) {
                        return Some(format!("/{}", rel.join("/")));
                    }
                }
                if let Some(rel) = notebook_root.and_then(|nb| relpath(file, nb)) {
                    return Some(format!("./{}", rel.join("/")));
                }
            }
        }

        if let Some(rel) = document_root.and_then(|doc| relpath(file, doc)) {
            return Some(format!("/{}", rel.join("/")));
        }
        self.home
            .as_deref()
            .and_then(|home| relpath(file, home))
            .map(|rel| format!("~/{}", rel.join("/")))
    }
}
