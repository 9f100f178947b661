//! Report tree: sections, template items and file groups.
//!
//! The tree is deserialized from JSON and treated as read-only input by the
//! build. Field aliases accept the legacy report layout.

mod validate;

pub use validate::{check_paths, filter_by_method_codes, validate_report};

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One node of the report tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReportNode {
    Section(Section),
    #[serde(rename = "TemplateItem", alias = "DocxTemplate")]
    Template(TemplateItem),
    #[serde(rename = "FileGroup", alias = "FileType")]
    FileGroup(FileGroup),
}

impl ReportNode {
    pub fn id(&self) -> &str {
        match self {
            Self::Section(s) => &s.id,
            Self::Template(t) => &t.id,
            Self::FileGroup(g) => &g.id,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Section(s) => s.title.as_deref(),
            Self::Template(t) => t.title.as_deref(),
            Self::FileGroup(g) => g.title.as_deref(),
        }
    }

    /// Whether the subtree holds at least one existing template or non-empty file group.
    pub fn has_content(&self) -> bool {
        match self {
            Self::Section(s) => s.children.iter().any(Self::has_content),
            Self::Template(t) => t.exists,
            Self::FileGroup(g) => !g.files.is_empty(),
        }
    }

    /// Depth-first, pre-order visit of every node.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Self)) {
        f(self);
        if let Self::Section(section) = self {
            for child in &section.children {
                child.visit(f);
            }
        }
    }

    /// Parse a report from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::ReportParse(e.to_string()))
    }

    /// Read and parse a report file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ReportParse(format!(
                "failed to read {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_json(&content)
    }
}

/// A key/value substitution inherited by every template below the section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateVariable {
    #[serde(alias = "template_text")]
    pub key: String,
    #[serde(default, alias = "constant_value")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    #[serde(default, alias = "bookmark_name")]
    pub title: Option<String>,
    /// Relative to the enclosing section's resolved directory
    #[serde(default)]
    pub base_directory: String,
    #[serde(default)]
    pub variables: Vec<TemplateVariable>,
    /// Empty means the section applies to every method
    #[serde(default)]
    pub method_codes: Vec<String>,
    #[serde(default)]
    pub children: Vec<ReportNode>,
}

impl Section {
    /// Overlay this section's variables on the inherited ones.
    ///
    /// Variables without a value are not substituted.
    pub fn merged_variables(&self, inherited: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut merged = inherited.clone();
        for var in &self.variables {
            if let Some(value) = &var.value {
                merged.insert(var.key.clone(), value.clone());
            }
        }
        merged
    }
}

const fn default_page_start_col() -> usize {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateItem {
    pub id: String,
    #[serde(default, alias = "bookmark_name")]
    pub title: Option<String>,
    /// Template path relative to the enclosing section's directory
    #[serde(alias = "docx_path")]
    pub template: String,
    #[serde(default)]
    pub exists: bool,
    #[serde(default, alias = "is_table_of_contents")]
    pub is_toc: bool,
    /// Added to every page number printed in the table of contents
    #[serde(default)]
    pub page_number_offset: i64,
    /// 1-indexed table column receiving the start page; column 1 holds the title
    #[serde(default = "default_page_start_col")]
    pub page_start_col: usize,
    /// 1-indexed table column receiving the end page
    #[serde(default)]
    pub page_end_col: Option<usize>,
}

/// Page-level bookmark rule: pages whose text satisfies `rule` get a bookmark titled `title`.
///
/// A rule whose text is exactly `SAMPLEID` bookmarks each page with the sample
/// identifier found on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkRule {
    #[serde(alias = "bookmark_name")]
    pub title: String,
    pub rule: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: String,
    /// Path relative to the group's source directory
    #[serde(alias = "file_path")]
    pub path: String,
    #[serde(default, alias = "bookmark_name")]
    pub title: Option<String>,
    #[serde(default)]
    pub bookmark_rules: Vec<BookmarkRule>,
}

/// How the pages of a file group are ordered in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReorderPolicy {
    /// Files are concatenated as listed
    None,
    /// Pages sorted by lab sample id then data set id
    ByAttribute,
    /// Pages grouped by acquisition timestamp and sorted
    ByDatetime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileGroup {
    pub id: String,
    #[serde(default, alias = "bookmark_name")]
    pub title: Option<String>,
    /// Relative to the enclosing section's directory
    #[serde(alias = "directory_source")]
    pub source_directory: String,
    #[serde(default)]
    pub files: Vec<FileEntry>,
    /// Rules applied to every file of the group
    #[serde(default)]
    pub bookmark_rules: Vec<BookmarkRule>,
    #[serde(default, alias = "reorder_pages_metals")]
    pub reorder_by_attribute: bool,
    #[serde(default, alias = "reorder_pages_datetime")]
    pub reorder_by_datetime: bool,
    #[serde(default, alias = "keep_existing_bookmarks")]
    pub preserve_bookmarks: bool,
}

impl FileGroup {
    /// The single reorder policy selected by the group's flags.
    pub fn reorder_policy(&self) -> Result<ReorderPolicy> {
        match (self.reorder_by_attribute, self.reorder_by_datetime) {
            (false, false) => Ok(ReorderPolicy::None),
            (true, false) => Ok(ReorderPolicy::ByAttribute),
            (false, true) => Ok(ReorderPolicy::ByDatetime),
            (true, true) => Err(Error::IncompatibleReorder {
                node_id: self.id.clone(),
                reason: "attribute and datetime reordering are mutually exclusive".to_string(),
            }),
        }
    }

    /// Rules that apply to `entry`: the group's rules followed by the file's own.
    pub fn rules_for<'a>(&'a self, entry: &'a FileEntry) -> impl Iterator<Item = &'a BookmarkRule> {
        self.bookmark_rules.iter().chain(entry.bookmark_rules.iter())
    }
}
