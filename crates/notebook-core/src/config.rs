use crate::error::{NotebookError, Result};
use crate::model::PathName;
use crate::resolver::normalize_path;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Version of the notebook data format written by this crate.
pub const DATA_FORMAT_VERSION: (u32, u32) = (0, 4);

/// Settings file inside a notebook folder.
pub const CONFIG_FILE: &str = "notebook.yml";

/// Line endings used when writing page files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndOfLine {
    Unix,
    Dos,
}

impl Default for EndOfLine {
    fn default() -> Self {
        if cfg!(windows) {
            EndOfLine::Dos
        } else {
            EndOfLine::Unix
        }
    }
}

impl EndOfLine {
    /// Convert `\n` separated text for writing.
    pub fn apply(&self, text: &str) -> String {
        match self {
            EndOfLine::Unix => text.to_string(),
            EndOfLine::Dos => text.replace("\r\n", "\n").replace('\n', "\r\n"),
        }
    }

    /// Text as read from disk, back to `\n` separators.
    pub fn normalize(text: &str) -> String {
        text.replace("\r\n", "\n")
    }
}

/// Per notebook settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotebookConfig {
    /// Data format version, dotted
    pub version: String,
    pub name: String,
    /// Keyword other notebooks use to link here, e.g. `wp?Page`
    pub interwiki_keyword: Option<String>,
    pub home_page: PathName,
    /// Icon file, may be relative to the notebook folder
    pub icon: Option<String>,
    /// Folder for `/file` links, may be relative to the notebook folder
    pub document_root: Option<String>,
    /// Keep the cache outside the notebook folder
    pub shared: bool,
    pub end_of_line: EndOfLine,
    pub disable_trash: bool,
    pub profile: Option<String>,
}

impl Default for NotebookConfig {
    fn default() -> Self {
        Self {
            version: format!("{}.{}", DATA_FORMAT_VERSION.0, DATA_FORMAT_VERSION.1),
            name: "Notebook".to_string(),
            interwiki_keyword: None,
            home_page: PathName::from_parts(vec!["Home".to_string()]),
            icon: None,
            document_root: None,
            shared: true,
            end_of_line: EndOfLine::default(),
            disable_trash: false,
            profile: None,
        }
    }
}

/// Icon and document root after resolving relative values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub icon: Option<PathBuf>,
    pub document_root: Option<PathBuf>,
}

impl NotebookConfig {
    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Settings for the notebook in `dir`; defaults named after the folder
    /// when there is no settings file yet.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            return Self::load(&path);
        }

        let mut config = Self::default();
        if let Some(name) = dir.file_name() {
            config.name = name.to_string_lossy().into_owned();
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        match &self.interwiki_keyword {
            Some(keyword) if !is_interwiki_keyword(keyword) => Err(
                NotebookError::InvalidConfig(format!("bad interwiki keyword {:?}", keyword)),
            ),
            _ => Ok(()),
        }
    }

    /// Older data format than the one this crate writes. Unreadable
    /// versions count as old.
    pub fn needs_upgrade(&self) -> bool {
        let parsed: std::result::Result<Vec<u32>, _> =
            self.version.trim().split('.').map(str::parse::<u32>).collect();
        match parsed {
            Ok(version) => version < vec![DATA_FORMAT_VERSION.0, DATA_FORMAT_VERSION.1],
            Err(_) => true,
        }
    }

    /// Resolve icon and document root against the notebook folder.
    /// Absolute values, and all values when there is no folder, are taken
    /// as they are.
    pub fn resolve_relative(&self, dir: Option<&Path>) -> ResolvedPaths {
        let resolve = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| resolve_config_path(dir, v))
        };
        ResolvedPaths {
            icon: resolve(&self.icon),
            document_root: resolve(&self.document_root),
        }
    }

    /// Cache folder for the notebook in `dir`.
    ///
    /// Private notebooks keep their cache in `<dir>/.zim`; shared ones use
    /// the user cache folder so the notebook folder stays clean.
    pub fn cache_dir_for(&self, dir: &Path) -> Option<PathBuf> {
        if !self.shared {
            return Some(dir.join(".zim"));
        }
        let flat: String = dir
            .to_string_lossy()
            .chars()
            .map(|c| if c == '/' || c == '\\' || c == ':' { '_' } else { c })
            .collect();
        let flat = flat.trim_start_matches('_');
        dirs::cache_dir().map(|cache| cache.join("notebook").join(format!("notebook-{}", flat)))
    }
}

fn resolve_config_path(dir: Option<&Path>, value: &str) -> PathBuf {
    if let Some(rest) = value.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return normalize_path(&home.join(rest.trim_start_matches(['/', '\\'])));
        }
    }
    let path = Path::new(value);
    match dir {
        Some(dir) if !path.is_absolute() => normalize_path(&dir.join(path)),
        _ => path.to_path_buf(),
    }
}

/// `^\w[\w+\-.]*$`
fn is_interwiki_keyword(keyword: &str) -> bool {
    let mut chars = keyword.chars();
    let word = |c: char| c.is_alphanumeric() || c == '_';
    match chars.next() {
        Some(first) if word(first) => chars.all(|c| word(c) || matches!(c, '+' | '-' | '.')),
        _ => false,
    }
}
