use super::{decode_part, encode_dir, move_conflicts, Store, StoreJob, StoreNode};
use crate::config::EndOfLine;
use crate::error::{NotebookError, Result};
use crate::model::PathName;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const PAGE_EXTENSION: &str = "md";

/// Pages as markdown files below a root folder.
///
/// `Foo Bar:Baz` is stored in `Foo_Bar/Baz.md`, its attachments and child
/// pages live in the folder `Foo_Bar/Baz/`.
pub struct FilesStore {
    root: PathBuf,
    end_of_line: EndOfLine,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn write_page_file(file: &Path, text: &str) -> Result<()> {
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(file, text)?;
    Ok(())
}

fn already_exists(target: &Path) -> NotebookError {
    NotebookError::Io(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("{} already exists", target.display()),
    ))
}

/// Move the entries of `src` into the existing folder `dst`.
fn merge_dir(src: &Path, dst: &Path) -> Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if target.is_dir() && entry.path().is_dir() {
            merge_dir(&entry.path(), &target)?;
        } else if target.exists() {
            return Err(already_exists(&target));
        } else {
            fs::rename(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// First entry below `dst` that merging `src` into it would run into.
/// Entries inside `src` itself move along and never clash.
fn merge_clash(src: &Path, dst: &Path) -> Option<PathBuf> {
    if !src.is_dir() || !dst.is_dir() {
        return None;
    }
    WalkDir::new(src)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .find_map(|entry| {
            let target = dst.join(entry.path().strip_prefix(src).ok()?);
            if target.starts_with(src) {
                return None;
            }
            let clash = if entry.file_type().is_dir() {
                target.exists() && !target.is_dir()
            } else {
                target.exists()
            };
            clash.then_some(target)
        })
}

/// Page file and folder parked in a staging folder during a move.
struct Staged {
    file: PathBuf,
    dir: PathBuf,
}

impl Staged {
    fn new(stage: &Path) -> Self {
        Self {
            file: stage.join("page.md"),
            dir: stage.join("page"),
        }
    }

    fn take(&self, file: &Path, dir: &Path) -> Result<()> {
        if file.exists() {
            fs::rename(file, &self.file)?;
        }
        if dir.exists() {
            fs::rename(dir, &self.dir)?;
        }
        Ok(())
    }

    fn place(&self, file: &Path, dir: &Path) -> Result<()> {
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        if self.dir.exists() {
            if dir.exists() {
                merge_dir(&self.dir, dir)?;
            } else {
                fs::rename(&self.dir, dir)?;
            }
        }
        if self.file.exists() {
            fs::rename(&self.file, file)?;
        }
        Ok(())
    }
}

impl FilesStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            end_of_line: EndOfLine::default(),
        }
    }

    pub fn with_end_of_line(mut self, end_of_line: EndOfLine) -> Self {
        self.end_of_line = end_of_line;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_for(&self, path: &PathName) -> PathBuf {
        encode_dir(&self.root, path)
    }

    fn file_for(&self, path: &PathName) -> PathBuf {
        // Not with_extension(): page names may contain dots
        let mut file = self.dir_for(path).into_os_string();
        file.push(".");
        file.push(PAGE_EXTENSION);
        PathBuf::from(file)
    }

    fn page_name(&self, file: &Path) -> Option<PathName> {
        let rel = file.strip_prefix(&self.root).ok()?.with_extension("");
        let parts: Result<Vec<String>> = rel
            .components()
            .map(|c| PathName::valid_segment(&decode_part(&c.as_os_str().to_string_lossy())))
            .collect();
        parts.ok().filter(|p| !p.is_empty()).map(PathName::from_parts)
    }

    fn page_files(&self, dir: &Path) -> Vec<PathBuf> {
        if !dir.is_dir() {
            return Vec::new();
        }
        WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().map_or(false, |ext| ext == PAGE_EXTENSION))
            .collect()
    }

    fn remove_empty_parents(&self, dir: Option<&Path>) {
        let mut current = dir.map(Path::to_path_buf);
        while let Some(dir) = current {
            if dir == self.root || !dir.starts_with(&self.root) {
                break;
            }
            let empty = fs::read_dir(&dir).map_or(false, |mut entries| entries.next().is_none());
            if !empty || fs::remove_dir(&dir).is_err() {
                break;
            }
            current = dir.parent().map(Path::to_path_buf);
        }
    }

    fn check_writable(&self, path: &PathName) -> Result<()> {
        if self.is_readonly() {
            return Err(NotebookError::ReadOnly(path.clone()));
        }
        Ok(())
    }
}

impl Store for FilesStore {
    fn get_node(&self, path: &PathName) -> Result<StoreNode> {
        if path.is_root() {
            return Ok(StoreNode {
                source: None,
                has_children: !self.page_files(&self.root).is_empty(),
                attachments_dir: Some(self.root.clone()),
                readonly: self.is_readonly(),
            });
        }

        let file = self.file_for(path);
        let source = match fs::read_to_string(&file) {
            Ok(text) => Some(EndOfLine::normalize(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        let readonly = match fs::metadata(&file) {
            Ok(meta) => meta.permissions().readonly(),
            Err(_) => self.is_readonly(),
        };

        Ok(StoreNode {
            source,
            has_children: !self.page_files(&self.dir_for(path)).is_empty(),
            attachments_dir: self.attachments_dir(path),
            readonly,
        })
    }

    fn store_page(&self, path: &PathName, text: &str) -> Result<()> {
        self.check_writable(path)?;
        log::debug!("Writing page {} to {}", path, self.file_for(path).display());
        write_page_file(&self.file_for(path), &self.end_of_line.apply(text))
    }

    fn store_page_async(&self, path: &PathName, text: String) -> Result<Option<StoreJob>> {
        self.check_writable(path)?;
        let file = self.file_for(path);
        let text = self.end_of_line.apply(&text);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => Ok(Some(
                runtime.spawn_blocking(move || write_page_file(&file, &text)),
            )),
            Err(_) => {
                write_page_file(&file, &text)?;
                Ok(None)
            }
        }
    }

    fn move_page(&self, path: &PathName, newpath: &PathName) -> Result<()> {
        if path == newpath {
            return Ok(());
        }
        self.check_writable(path)?;
        if move_conflicts(self.list_pages(&PathName::root())?, path, newpath) {
            return Err(NotebookError::PageExists(newpath.clone()));
        }

        let (old_file, old_dir) = (self.file_for(path), self.dir_for(path));
        if !old_file.exists() && !old_dir.exists() {
            return Ok(());
        }
        let (new_file, new_dir) = (self.file_for(newpath), self.dir_for(newpath));
        if let Some(target) = merge_clash(&old_dir, &new_dir) {
            return Err(already_exists(&target));
        }

        // Stage first so moves into the own subtree or onto the parent
        // never see their own files.
        let stage = self.root.join(format!(".move-{}", nanoid::nanoid!()));
        fs::create_dir_all(&stage)?;
        let staged = Staged::new(&stage);
        if let Err(e) = staged
            .take(&old_file, &old_dir)
            .and_then(|()| staged.place(&new_file, &new_dir))
        {
            log::warn!("Moving {} to {} failed, putting it back: {}", path, newpath, e);
            // The stage is only removed once it is empty again
            match staged.place(&old_file, &old_dir) {
                Ok(()) => {
                    if let Err(cleanup) = fs::remove_dir_all(&stage) {
                        log::warn!("Could not remove {}: {}", stage.display(), cleanup);
                    }
                }
                Err(restore) => {
                    log::warn!("Could not restore {} from {}: {}", path, stage.display(), restore);
                }
            }
            return Err(e);
        }
        fs::remove_dir_all(&stage)?;

        self.remove_empty_parents(old_dir.parent());
        Ok(())
    }

    fn delete_page(&self, path: &PathName) -> Result<bool> {
        self.check_writable(path)?;
        let (file, dir) = (self.file_for(path), self.dir_for(path));
        let existed = file.exists() || dir.exists();
        if file.exists() {
            fs::remove_file(&file)?;
        }
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        self.remove_empty_parents(dir.parent());
        Ok(existed)
    }

    fn list_pages(&self, namespace: &PathName) -> Result<Vec<PathName>> {
        let mut files = self.page_files(&self.dir_for(namespace));
        if !namespace.is_root() {
            let file = self.file_for(namespace);
            if file.is_file() {
                files.push(file);
            }
        }

        let mut names: Vec<PathName> = files.iter().filter_map(|f| self.page_name(f)).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn attachments_dir(&self, path: &PathName) -> Option<PathBuf> {
        Some(self.dir_for(path))
    }

    fn is_readonly(&self) -> bool {
        fs::metadata(&self.root).map_or(false, |meta| meta.permissions().readonly())
    }
}
