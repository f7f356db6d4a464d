use crate::model::PathName;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NotebookError>;

#[derive(Error, Debug)]
pub enum NotebookError {
    #[error("Invalid page name: {0:?}")]
    InvalidName(String),

    #[error("{path} is not below {ancestor}")]
    NotDescendant { path: PathName, ancestor: PathName },

    #[error("Page already exists: {0}")]
    PageExists(PathName),

    #[error("Index not up to date")]
    IndexStale,

    #[error("Trash not supported: {0}")]
    TrashNotSupported(String),

    #[error("Can not resolve relative file path for notebook without root folder")]
    NoRootFolder,

    #[error("Page is read-only: {0}")]
    ReadOnly(PathName),

    #[error("Operation aborted: {0}")]
    Aborted(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] serde_yaml::Error),
}
