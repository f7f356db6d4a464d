use std::path::{Path, PathBuf};

use super::Notebook;
use crate::error::Result;
use crate::model::PathName;

/// File links
impl Notebook {
    /// Attachment folder of a page. The folder does not need to exist;
    /// `None` when the store has no attachment folders.
    pub fn get_attachments_dir(&self, path: &PathName) -> Option<PathBuf> {
        self.store.attachments_dir(path)
    }

    /// Absolute path for the file link `text`, relative to the attachment
    /// folder of `page` or to the notebook folder.
    pub fn resolve_file(&self, text: &str, page: Option<&PathName>) -> Result<PathBuf> {
        let attachments = page.and_then(|path| self.get_attachments_dir(path));
        self.resolver.read().unwrap().resolve(text, attachments.as_deref())
    }

    /// Link text for `file` as seen from `page`, `None` when the file can
    /// only be linked with an absolute path.
    pub fn relative_filepath(&self, file: &Path, page: Option<&PathName>) -> Option<String> {
        let attachments = page.and_then(|path| self.get_attachments_dir(path));
        self.resolver
            .read()
            .unwrap()
            .relative_filepath(file, attachments.as_deref())
    }
}
