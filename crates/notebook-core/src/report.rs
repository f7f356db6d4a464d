use crate::error::NotebookError;
use crate::model::PathName;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MutationKind {
    Move,
    Rename,
    Delete,
    Trash,
}

/// Progress of a structural mutation. `PostNotified` and `Failed` are
/// terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum MutationStage {
    Requested,
    PreNotified,
    StoreMutated,
    IndexUpdated,
    LinksRepaired,
    PostNotified,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub page: Option<PathName>,
}

/// Outcome of a move, rename or delete.
///
/// Failures before the store changed are returned as errors. Failures
/// while repairing links afterwards end up in `diagnostics`; the store
/// change itself stays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MutationReport {
    pub kind: MutationKind,
    pub stage: MutationStage,
    pub old_path: PathName,
    pub new_path: Option<PathName>,
    /// Whether there was a page (or namespace) at `old_path`
    pub existed: bool,
    /// Pages rewritten by link repair, in order
    pub updated_pages: Vec<PathName>,
    pub diagnostics: Vec<Diagnostic>,
}

impl MutationReport {
    pub(crate) fn new(kind: MutationKind, old_path: &PathName, new_path: Option<&PathName>) -> Self {
        Self {
            kind,
            stage: MutationStage::Requested,
            old_path: old_path.clone(),
            new_path: new_path.cloned(),
            existed: false,
            updated_pages: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn advance(&mut self, stage: MutationStage) {
        debug_assert!(stage > self.stage, "stages only move forward");
        log::debug!("{:?} {}: {:?} -> {:?}", self.kind, self.old_path, self.stage, stage);
        self.stage = stage;
    }

    /// Mark the mutation failed and hand back the error for `?`.
    pub(crate) fn fail(&mut self, error: NotebookError) -> NotebookError {
        log::warn!("{:?} of {} failed at {:?}: {}", self.kind, self.old_path, self.stage, error);
        self.stage = MutationStage::Failed;
        error
    }

    pub(crate) fn page_updated(&mut self, page: &PathName) {
        if !self.updated_pages.contains(page) {
            self.updated_pages.push(page.clone());
        }
    }

    pub(crate) fn repair_failed(&mut self, page: &PathName, error: &NotebookError) {
        log::warn!("Could not update links in {}: {}", page, error);
        self.diagnostics.push(Diagnostic {
            severity: DiagnosticSeverity::Error,
            message: format!("Could not update links: {}", error),
            page: Some(page.clone()),
        });
    }

    pub(crate) fn warn(&mut self, message: String) {
        log::warn!("{}", message);
        self.diagnostics.push(Diagnostic {
            severity: DiagnosticSeverity::Warning,
            message,
            page: None,
        });
    }

    pub fn is_complete(&self) -> bool {
        self.stage == MutationStage::PostNotified
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == DiagnosticSeverity::Error)
    }
}
