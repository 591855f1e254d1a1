//! Root-to-target path tracing over one project's built tree, used to
//! explain why an instance is present and to enumerate diamond variants.

use serde::Serialize;

use crate::dep_tree::{DependencyTreeNode, DepKind, ProjectTrees};
use crate::error::AuditError;
use crate::package_id;

/// One edge on a root-to-target path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyPathStep {
    pub id: String,
    pub kind: DepKind,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub specifier: String,
}

impl DependencyPathStep {
    fn of(node: &DependencyTreeNode) -> Self {
        Self {
            id: node.id(),
            kind: node.kind,
            specifier: node.specifier.clone(),
        }
    }
}

/// First pre-order path from `project`'s root to a node matching `target`.
///
/// Missing tree is a `ProjectNotFound` error; a tree with no matching node
/// answers `Ok(None)`, which the caller can tell apart from "not used at
/// all" by consulting the index.
pub fn first_path(
    trees: &ProjectTrees,
    project: &str,
    target: &str,
) -> Result<Option<Vec<DependencyPathStep>>, AuditError> {
    let roots = trees
        .get(project)
        .ok_or_else(|| AuditError::ProjectNotFound(project.to_string()))?;
    let target_name = package_id::bare_name(target)?;

    // exact/qualifier matches win, bare-name fuzz only when no instance
    // matches verbatim
    for fuzzy in [false, true] {
        let mut path = Vec::new();
        for node in roots {
            if dfs_first(node, target, &target_name, fuzzy, &mut path) {
                return Ok(Some(path));
            }
        }
    }
    Ok(None)
}

/// Every path from `project`'s root to a matching node, in pre-order. Same
/// matching rule as [`first_path`]; supports diamond-dependency enumeration.
pub fn all_paths(
    trees: &ProjectTrees,
    project: &str,
    target: &str,
) -> Result<Vec<Vec<DependencyPathStep>>, AuditError> {
    let roots = trees
        .get(project)
        .ok_or_else(|| AuditError::ProjectNotFound(project.to_string()))?;
    let target_name = package_id::bare_name(target)?;

    for fuzzy in [false, true] {
        let mut found = Vec::new();
        let mut path = Vec::new();
        for node in roots {
            dfs_all(node, target, &target_name, fuzzy, &mut path, &mut found);
        }
        if !found.is_empty() {
            return Ok(found);
        }
    }
    Ok(Vec::new())
}

fn matches(node: &DependencyTreeNode, target: &str, target_name: &str, fuzzy: bool) -> bool {
    if node.is_link() {
        return false;
    }
    if fuzzy {
        return node.name == target_name;
    }
    let id = node.id();
    id == target
        || (id.len() > target.len()
            && id.starts_with(target)
            && id.as_bytes()[target.len()] == b'(')
}

fn dfs_first(
    node: &DependencyTreeNode,
    target: &str,
    target_name: &str,
    fuzzy: bool,
    path: &mut Vec<DependencyPathStep>,
) -> bool {
    path.push(DependencyPathStep::of(node));
    if matches(node, target, target_name, fuzzy) {
        return true;
    }
    for child in &node.children {
        if dfs_first(child, target, target_name, fuzzy, path) {
            return true;
        }
    }
    path.pop();
    false
}

fn dfs_all(
    node: &DependencyTreeNode,
    target: &str,
    target_name: &str,
    fuzzy: bool,
    path: &mut Vec<DependencyPathStep>,
    found: &mut Vec<Vec<DependencyPathStep>>,
) {
    path.push(DependencyPathStep::of(node));
    if matches(node, target, target_name, fuzzy) {
        found.push(path.clone());
    }
    for child in &node.children {
        dfs_all(child, target, target_name, fuzzy, path, found);
    }
    path.pop();
}
