//! Non-fatal problems recorded during a build.
//!
//! These are returned alongside a successful build instead of being raised.

use std::path::PathBuf;

use serde::Serialize;
use tracing::warn;

/// What kind of resource was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Directory,
    Template,
    SourceFile,
    /// The file exists but could not be decoded as a PDF
    UnreadablePdf,
}

impl ResourceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Template => "template",
            Self::SourceFile => "source file",
            Self::UnreadablePdf => "readable PDF",
        }
    }
}

/// A directory or file referenced by the report that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingResource {
    pub kind: ResourceKind,
    pub node_id: String,
    pub path: PathBuf,
}

impl MissingResource {
    pub fn new(kind: ResourceKind, node_id: &str, path: PathBuf) -> Self {
        Self {
            kind,
            node_id: node_id.to_string(),
            path,
        }
    }
}

/// A template the renderer could not produce; a placeholder was used instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderFailure {
    pub node_id: String,
    pub template: PathBuf,
    pub message: String,
    pub placeholder_pages: usize,
}

/// A source PDF whose embedded outline had entries that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProblemFile {
    pub path: PathBuf,
    pub unparseable_bookmarks: usize,
}

/// Everything recoverable that went wrong during one build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub missing: Vec<MissingResource>,
    pub render_failures: Vec<RenderFailure>,
    pub problem_files: Vec<ProblemFile>,
}

impl Diagnostics {
    pub fn record_missing(&mut self, resource: MissingResource) {
        warn!(
            "Skipping '{}': missing {} {}",
            resource.node_id,
            resource.kind.as_str(),
            resource.path.display()
        );
        self.missing.push(resource);
    }

    pub fn record_render_failure(&mut self, failure: RenderFailure) {
        warn!(
            "Template '{}' replaced by {} placeholder page(s): {}",
            failure.node_id, failure.placeholder_pages, failure.message
        );
        self.render_failures.push(failure);
    }

    pub fn record_problem_file(&mut self, path: PathBuf, unparseable_bookmarks: usize) {
        if unparseable_bookmarks == 0 {
            return;
        }
        warn!(
            "{} unreadable bookmark(s) dropped from {}",
            unparseable_bookmarks,
            path.display()
        );
        self.problem_files.push(ProblemFile {
            path,
            unparseable_bookmarks,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.render_failures.is_empty() && self.problem_files.is_empty()
    }
}
