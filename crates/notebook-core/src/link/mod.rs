//! Page links as written in documents.
//!
//! A link is stored as text (`href`). [`LinkReference`] is the parsed form:
//! a relation kind plus the names it refers to. Resolution against a source
//! page lives in `resolve`, the inverse (shortest text for a target) in
//! `notation`.

use crate::error::{NotebookError, Result};
use crate::model::PathName;
use std::fmt;

mod notation;
mod resolve;

pub use notation::relative_notation;

const ABSOLUTE_MARKER: char = ':';
const RELATIVE_MARKER: char = '+';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRelation {
    /// `:a:b`, taken from the root.
    Absolute,
    /// `+a:b`, below the source page.
    Relative,
    /// `a:b`, anchor `a` searched from the source upward.
    Floating,
}

/// Kind of target a link text points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Page,
    File,
    Url,
    Mailto,
    Interwiki,
}

/// Classify link text. Only `Page` links are resolved against the notebook.
pub fn link_type(href: &str) -> LinkType {
    let href = href.trim();
    if is_url(href) {
        LinkType::Url
    } else if href.starts_with("mailto:") || is_email(href) {
        LinkType::Mailto
    } else if is_file_link(href) {
        LinkType::File
    } else if is_interwiki(href) {
        LinkType::Interwiki
    } else {
        LinkType::Page
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_url(href: &str) -> bool {
    let Some((scheme, _)) = href.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if is_word_char(c))
        && scheme.len() > 1
        && chars.all(|c| is_word_char(c) || matches!(c, '+' | '-' | '.'))
}

fn is_email(href: &str) -> bool {
    match href.split_once('@') {
        Some((user, domain)) => {
            !user.is_empty()
                && domain.contains('.')
                && !href.contains(ABSOLUTE_MARKER)
                && !href.contains(char::is_whitespace)
        }
        None => false,
    }
}

pub(crate) fn is_win32_path(href: &str) -> bool {
    let bytes = href.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}

fn is_file_link(href: &str) -> bool {
    href.starts_with('/')
        || href.starts_with("./")
        || href.starts_with("../")
        || href.starts_with('~')
        || href.starts_with("file:/")
        || is_win32_path(href)
}

fn is_interwiki(href: &str) -> bool {
    let Some((keyword, _)) = href.split_once('?') else {
        return false;
    };
    let mut chars = keyword.chars();
    matches!(chars.next(), Some(c) if is_word_char(c))
        && chars.all(|c| is_word_char(c) || matches!(c, '+' | '-' | '.'))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReference {
    relation: LinkRelation,
    names: PathName,
}

impl LinkReference {
    /// Parse link text, e.g. `:Foo:Bar`, `+Child` or `Sibling:Child`.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let text = text.split('#').next().unwrap_or_default();

        let (relation, rest) = if let Some(rest) = text.strip_prefix(ABSOLUTE_MARKER) {
            (LinkRelation::Absolute, rest)
        } else if let Some(rest) = text.strip_prefix(RELATIVE_MARKER) {
            (LinkRelation::Relative, rest)
        } else {
            (LinkRelation::Floating, text)
        };

        let names = PathName::new(rest).map_err(|_| NotebookError::InvalidName(text.to_string()))?;
        Ok(Self { relation, names })
    }

    pub fn absolute(target: &PathName) -> Self {
        Self {
            relation: LinkRelation::Absolute,
            names: target.clone(),
        }
    }

    pub fn relative(names: PathName) -> Self {
        Self {
            relation: LinkRelation::Relative,
            names,
        }
    }

    pub fn floating(names: PathName) -> Self {
        Self {
            relation: LinkRelation::Floating,
            names,
        }
    }

    pub fn relation(&self) -> LinkRelation {
        self.relation
    }

    pub fn names(&self) -> &PathName {
        &self.names
    }

    /// First segment, the part a floating link is anchored on.
    pub fn anchor(&self) -> &str {
        self.names.parts().first().map(String::as_str).unwrap_or("")
    }

    pub fn to_wiki_link(&self) -> String {
        match self.relation {
            LinkRelation::Absolute => format!("{}{}", ABSOLUTE_MARKER, self.names.name()),
            LinkRelation::Relative => format!("{}{}", RELATIVE_MARKER, self.names.name()),
            LinkRelation::Floating => self.names.name(),
        }
    }
}

impl fmt::Display for LinkReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wiki_link())
    }
}
