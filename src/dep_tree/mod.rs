//! Builds, per importer, the fully resolved dependency tree from the
//! lockfile's declarative tables. Workspace links and injected packages are
//! followed through to the linked project, bounded by cycle guards.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::lockfile::Lockfile;

mod r#impl;

pub const DEFAULT_MAX_DEPTH: usize = 10;

/// One project's built trees, keyed by project path.
pub type ProjectTrees = BTreeMap<String, Vec<DependencyTreeNode>>;

/// Dependency kind an instance was reached through. Variant order is the
/// detector's priority order, `min` across importers wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DepKind {
    Dependencies,
    OptionalDependencies,
    PeerDependencies,
    DevDependencies,
    Transitive,
    Link,
}

impl DepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dependencies => "dependencies",
            Self::OptionalDependencies => "optionalDependencies",
            Self::PeerDependencies => "peerDependencies",
            Self::DevDependencies => "devDependencies",
            Self::Transitive => "transitive",
            Self::Link => "link",
        }
    }
}

impl std::fmt::Display for DepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resolved instance as it appears under one project. Trees own their
/// nodes exclusively, the same instance reached from two projects gets two
/// nodes because its provenance differs.
#[derive(Debug, Clone)]
pub struct DependencyTreeNode {
    pub name: String,
    /// Resolved version token, `link:`/`file:` tokens included verbatim.
    pub version: String,
    pub kind: DepKind,
    /// Raw specifier for direct entries, empty for transitive edges.
    pub specifier: String,
    /// Set when no snapshot entry exists for this instance.
    pub missing: bool,
    pub children: Vec<DependencyTreeNode>,
}

impl DependencyTreeNode {
    /// Canonical instance id; link nodes yield their `name@link:...` form,
    /// which the index never records as an instance.
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    pub fn is_link(&self) -> bool {
        matches!(self.kind, DepKind::Link)
    }
}

/// A recorded workspace-link edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedDependencyInfo {
    pub source_importer: String,
    pub link_name: String,
    pub resolved_importer: String,
}

/// External collaborator that can compute a verified hierarchy from the
/// installed package tree. A `None` or empty answer means no usable install
/// is present and the pure-lockfile algorithm runs instead.
pub trait HierarchySource {
    fn project_hierarchy(&self, project: &str) -> Option<Vec<DependencyTreeNode>>;
}

pub struct TreeBuilder<'l> {
    lockfile: &'l Lockfile,
    max_depth: usize,
    source: Option<&'l dyn HierarchySource>,

    // collected while building
    warnings: Vec<String>,
    links: Vec<LinkedDependencyInfo>,
}

impl<'l> TreeBuilder<'l> {
    pub fn new(lockfile: &'l Lockfile) -> Self {
        Self {
            lockfile,
            max_depth: DEFAULT_MAX_DEPTH,
            source: None,
            warnings: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_source(mut self, source: &'l dyn HierarchySource) -> Self {
        self.source = Some(source);
        self
    }

    /// Non-fatal issues met while building, e.g. unresolvable links.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Every workspace-link edge crossed during the build.
    pub fn links(&self) -> &[LinkedDependencyInfo] {
        &self.links
    }
}
