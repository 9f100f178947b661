//! Pre-build checks and tree filtering.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use tracing::debug;

use super::{ReorderPolicy, ReportNode, Section, TemplateItem};
use crate::diagnostics::{MissingResource, ResourceKind};
use crate::error::{Error, Result};
use crate::rules::CompiledRule;
use crate::util::resolve_path;

/// Check every configuration invariant of the report.
///
/// Runs before anything is rendered; the first violation is returned.
pub fn validate_report(report: &ReportNode) -> Result<()> {
    let mut ids: HashSet<&str> = HashSet::new();
    let mut toc: Option<&str> = None;
    let mut failure: Option<Error> = None;

    report.visit(&mut |node| {
        if failure.is_some() {
            return;
        }
        if !ids.insert(node.id()) {
            failure = Some(Error::DuplicateId(node.id().to_string()));
            return;
        }
        let checked = match node {
            ReportNode::Section(_) => Ok(()),
            ReportNode::Template(item) => {
                if item.is_toc {
                    if let Some(first) = toc {
                        failure = Some(Error::DuplicateToc {
                            first: first.to_string(),
                            second: item.id.clone(),
                        });
                        return;
                    }
                    toc = Some(&item.id);
                }
                check_toc_columns(item)
            }
            ReportNode::FileGroup(group) => group.reorder_policy().and_then(|policy| {
                if policy == ReorderPolicy::ByAttribute && group.preserve_bookmarks {
                    return Err(Error::IncompatibleReorder {
                        node_id: group.id.clone(),
                        reason: "attribute reordering cannot preserve embedded bookmarks"
                            .to_string(),
                    });
                }
                group
                    .bookmark_rules
                    .iter()
                    .chain(group.files.iter().flat_map(|entry| entry.bookmark_rules.iter()))
                    .try_for_each(|rule| CompiledRule::compile(rule).map(|_| ()))
            }),
        };
        if let Err(e) = checked {
            failure = Some(e);
        }
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn check_toc_columns(item: &TemplateItem) -> Result<()> {
    if !item.is_toc {
        return Ok(());
    }
    let invalid = |reason: &str| Error::InvalidTocColumns {
        node_id: item.id.clone(),
        reason: reason.to_string(),
    };
    if item.page_start_col < 2 {
        return Err(invalid("start column must be 2 or greater (column 1 holds titles)"));
    }
    if let Some(end) = item.page_end_col {
        if end < 2 {
            return Err(invalid("end column must be 2 or greater (column 1 holds titles)"));
        }
        if end == item.page_start_col {
            return Err(invalid("start and end columns must differ"));
        }
    }
    Ok(())
}

/// List every directory, template and source file the report references that
/// does not exist under `root`. Subtrees below a missing directory are not inspected.
pub fn check_paths(report: &ReportNode, root: &Path) -> Vec<MissingResource> {
    let mut missing = Vec::new();
    check_node(report, root, &mut missing);
    missing
}

fn check_node(node: &ReportNode, dir: &Path, missing: &mut Vec<MissingResource>) {
    match node {
        ReportNode::Section(section) => {
            let section_dir = resolve_path(dir, &section.base_directory);
            if !section_dir.is_dir() {
                missing.push(MissingResource::new(ResourceKind::Directory, &section.id, section_dir));
                return;
            }
            for child in &section.children {
                check_node(child, &section_dir, missing);
            }
        }
        ReportNode::Template(item) => {
            if !item.exists {
                return;
            }
            let path = resolve_path(dir, &item.template);
            if !path.is_file() {
                missing.push(MissingResource::new(ResourceKind::Template, &item.id, path));
            }
        }
        ReportNode::FileGroup(group) => {
            let source_dir = resolve_path(dir, &group.source_directory);
            if !source_dir.is_dir() {
                missing.push(MissingResource::new(ResourceKind::Directory, &group.id, source_dir));
                return;
            }
            for entry in &group.files {
                let path = resolve_path(&source_dir, &entry.path);
                if !path.is_file() {
                    missing.push(MissingResource::new(ResourceKind::SourceFile, &entry.id, path));
                }
            }
        }
    }
}

/// Drop sections whose method codes share nothing with `available`.
///
/// Sections without method codes are always kept. Returns `None` when the root
/// itself is filtered out.
pub fn filter_by_method_codes(report: &ReportNode, available: &BTreeSet<String>) -> Option<ReportNode> {
    match report {
        ReportNode::Section(section) => filter_section(section, available).map(ReportNode::Section),
        other => Some(other.clone()),
    }
}

fn filter_section(section: &Section, available: &BTreeSet<String>) -> Option<Section> {
    if !section.method_codes.is_empty()
        && !section.method_codes.iter().any(|code| available.contains(code))
    {
        debug!("Dropping section '{}' (no matching method code)", section.id);
        return None;
    }

    let children = section
        .children
        .iter()
        .filter_map(|child| match child {
            ReportNode::Section(inner) => filter_section(inner, available).map(ReportNode::Section),
            other => Some(other.clone()),
        })
        .collect();

    Some(Section {
        children,
        ..section.clone()
    })
}
