use crate::error::{NotebookError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the segments of a page name.
pub const SEPARATOR: char = ':';

const INVALID_CHARS: &[char] = &['?', '#', '/', '\\', '*', '"', '<', '>', '|', '%', '\t', '\n', '\r'];

/// Hierarchical page name, e.g. `Projects:Notebook:Todo`.
///
/// The root is the name without segments. Segments are never empty and
/// keep their case; equality is exact, case-insensitive comparison is only
/// used for collision checks (see [`PathName::eq_ignore_case`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathName {
    parts: Vec<String>,
}

impl PathName {
    pub fn root() -> Self {
        Self { parts: Vec::new() }
    }

    /// Build a name from user input.
    ///
    /// Characters that are not allowed in page names are dropped, empty
    /// segments collapse and surrounding whitespace is trimmed. Fails with
    /// `InvalidName` when nothing is left.
    pub fn new(input: &str) -> Result<Self> {
        let cleaned: String = input.chars().filter(|c| !INVALID_CHARS.contains(c)).collect();
        let parts: Vec<String> = cleaned
            .split(SEPARATOR)
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();

        if parts.is_empty() {
            return Err(NotebookError::InvalidName(input.to_string()));
        }
        Ok(Self { parts })
    }

    /// Clean up input meant to be a single segment (a basename).
    pub fn valid_segment(input: &str) -> Result<String> {
        let cleaned: String = input
            .chars()
            .filter(|c| *c != SEPARATOR && !INVALID_CHARS.contains(c))
            .collect();
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return Err(NotebookError::InvalidName(input.to_string()));
        }
        Ok(cleaned.to_string())
    }

    pub(crate) fn from_parts(parts: Vec<String>) -> Self {
        debug_assert!(parts.iter().all(|p| !p.is_empty()));
        Self { parts }
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn depth(&self) -> usize {
        self.parts.len()
    }

    pub fn is_root(&self) -> bool {
        self.parts.is_empty()
    }

    /// Full name with `:` separators, empty for the root.
    pub fn name(&self) -> String {
        self.parts.join(":")
    }

    /// Last segment, empty for the root.
    pub fn basename(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or("")
    }

    /// Name of the parent namespace.
    pub fn namespace(&self) -> String {
        self.parent().name()
    }

    /// The parent of the root is the root itself.
    pub fn parent(&self) -> PathName {
        let mut parts = self.parts.clone();
        parts.pop();
        Self { parts }
    }

    /// Parent, grand parent, ... up to and including the root.
    pub fn ancestors(&self) -> impl Iterator<Item = PathName> + '_ {
        (0..self.parts.len()).rev().map(move |len| Self {
            parts: self.parts[..len].to_vec(),
        })
    }

    /// True when `self` lies strictly below `ancestor`.
    pub fn is_child_of(&self, ancestor: &PathName) -> bool {
        self.parts.len() > ancestor.parts.len() && self.parts.starts_with(&ancestor.parts)
    }

    /// `self` equals `other` or lies below it.
    pub fn is_within(&self, other: &PathName) -> bool {
        self == other || self.is_child_of(other)
    }

    /// Name of `self` relative to one of its ancestors.
    pub fn relative_to(&self, ancestor: &PathName) -> Result<PathName> {
        if !self.is_child_of(ancestor) {
            return Err(NotebookError::NotDescendant {
                path: self.clone(),
                ancestor: ancestor.clone(),
            });
        }
        Ok(Self {
            parts: self.parts[ancestor.parts.len()..].to_vec(),
        })
    }

    pub fn child(&self, suffix: &PathName) -> PathName {
        let mut parts = self.parts.clone();
        parts.extend(suffix.parts.iter().cloned());
        Self { parts }
    }

    pub fn child_name(&self, basename: &str) -> Result<PathName> {
        Ok(self.child(&PathName::new(basename)?))
    }

    pub fn common_ancestor(&self, other: &PathName) -> PathName {
        let parts = self
            .parts
            .iter()
            .zip(other.parts.iter())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| a.clone())
            .collect();
        Self { parts }
    }

    /// Move `self` from below `old` to below `new`; names outside `old`
    /// are returned unchanged.
    pub fn reparent(&self, old: &PathName, new: &PathName) -> PathName {
        if self == old {
            new.clone()
        } else if let Ok(rel) = self.relative_to(old) {
            new.child(&rel)
        } else {
            self.clone()
        }
    }

    pub fn eq_ignore_case(&self, other: &PathName) -> bool {
        self.parts.len() == other.parts.len()
            && self
                .parts
                .iter()
                .zip(other.parts.iter())
                .all(|(a, b)| a.to_lowercase() == b.to_lowercase())
    }
}

impl fmt::Display for PathName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, ":")
        } else {
            write!(f, "{}", self.name())
        }
    }
}

impl TryFrom<String> for PathName {
    type Error = NotebookError;

    fn try_from(value: String) -> Result<Self> {
        if value.trim_matches(SEPARATOR).is_empty() {
            return Ok(Self::root());
        }
        Self::new(&value)
    }
}

impl From<PathName> for String {
    fn from(path: PathName) -> Self {
        path.name()
    }
}

/// Direction of a link query relative to the given page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    /// Links originating from the page (or its children).
    Forward,
    /// Links pointing to the page (or its children).
    Backward,
    Both,
}

/// A resolved page link as known to the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEdge {
    pub source: PathName,
    pub target: PathName,
    /// Link text as written in the source page.
    pub href: String,
}

/// What the index knows about a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: PathName,
    pub has_content: bool,
    pub has_children: bool,
    /// Linked to, but without content of its own.
    pub is_placeholder: bool,
}
