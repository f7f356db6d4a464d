//! Notebook Core Library
//!
//! Hierarchical pages with wiki links: page names, link resolution and
//! notation, the page identity cache, and moving, renaming and deleting
//! pages without breaking links.
//!

pub mod config;
pub mod error;
pub mod formats;
pub mod identity;
pub mod index;
pub mod link;
pub mod model;
pub mod notebook;
pub mod page;
pub mod properties;
pub mod report;
pub mod resolver;
pub mod signals;
pub mod store;

pub use config::{EndOfLine, NotebookConfig};
pub use error::{NotebookError, Result};
pub use link::{link_type, relative_notation, LinkReference, LinkRelation, LinkType};
pub use model::{IndexEntry, LinkDirection, LinkEdge, PathName};
pub use notebook::{Notebook, PropertiesUpdate};
pub use page::Page;
pub use report::{Diagnostic, DiagnosticSeverity, MutationKind, MutationReport, MutationStage};
pub use signals::NotebookListener;
