//! Global index over every built tree: which projects transitively reach a
//! resolved instance, and which instances directly depend on it. Built in a
//! single pass, queried through a memoized store.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use fxhash::FxHashMap as HashMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::dep_tree::{DependencyTreeNode, ProjectTrees};
use crate::package_id;

/// Cached answer for one instance id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDependencyInfo {
    /// Projects that transitively reach this instance, sorted.
    pub importers: Vec<String>,
    /// Instance ids that directly depend on this instance, sorted.
    pub direct_dependents: Vec<String>,
}

pub struct DependencyIndex {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
    importers: HashMap<String, BTreeSet<String>>,
    by_name: BTreeMap<String, BTreeSet<String>>,

    memo: RefCell<HashMap<String, Rc<PackageDependencyInfo>>>,
}

impl DependencyIndex {
    pub fn build(trees: &ProjectTrees) -> Self {
        let mut index = Self {
            graph: DiGraph::new(),
            nodes: HashMap::default(),
            importers: HashMap::default(),
            by_name: BTreeMap::new(),
            memo: RefCell::new(HashMap::default()),
        };

        for (project, roots) in trees {
            for node in roots {
                index.record(project, node, None);
            }
        }
        index
    }

    fn record(&mut self, project: &str, node: &DependencyTreeNode, parent: Option<NodeIndex>) {
        if node.is_link() {
            // a link step is project indirection, not an instance; its
            // children are direct entries of the linked project and so have
            // no package dependent
            for child in &node.children {
                self.record(project, child, None);
            }
            return;
        }

        let id = node.id();
        let nx = self.intern(&id);
        self.importers
            .entry(id)
            .or_default()
            .insert(project.to_string());
        if let Some(parent) = parent {
            self.graph.update_edge(parent, nx, ());
        }

        // recurse into every child even when the instance was seen before,
        // another project's tree may extend its importer set
        for child in &node.children {
            self.record(project, child, Some(nx));
        }
    }

    fn intern(&mut self, id: &str) -> NodeIndex {
        if let Some(&nx) = self.nodes.get(id) {
            return nx;
        }
        let nx = self.graph.add_node(id.to_string());
        self.nodes.insert(id.to_string(), nx);
        // unparsable ids are skipped during bulk grouping, per-id queries
        // still work on them
        if let Ok(name) = package_id::bare_name(id) {
            self.by_name.entry(name).or_default().insert(id.to_string());
        }
        nx
    }

    /// Memoized index record for one id; repeated queries return the same
    /// cached collection.
    pub fn info(&self, id: &str) -> Rc<PackageDependencyInfo> {
        if let Some(hit) = self.memo.borrow().get(id) {
            return Rc::clone(hit);
        }

        let importers = self
            .importers
            .get(id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        let direct_dependents = match self.nodes.get(id) {
            Some(&nx) => {
                let mut dependents: Vec<String> = self
                    .graph
                    .edges_directed(nx, Direction::Incoming)
                    .map(|edge| self.graph[edge.source()].clone())
                    .collect();
                dependents.sort();
                dependents.dedup();
                dependents
            }
            None => Vec::new(),
        };

        let info = Rc::new(PackageDependencyInfo {
            importers,
            direct_dependents,
        });
        self.memo
            .borrow_mut()
            .insert(id.to_string(), Rc::clone(&info));
        info
    }

    pub fn importers_of(&self, id: &str) -> Vec<String> {
        self.info(id).importers.clone()
    }

    pub fn direct_dependents_of(&self, id: &str) -> Vec<String> {
        self.info(id).direct_dependents.clone()
    }

    pub fn is_used(&self, id: &str) -> bool {
        !self.info(id).importers.is_empty()
    }

    /// Indexed instances grouped by bare package name, name-sorted.
    pub fn by_name(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.by_name
    }

    pub fn instances_of(&self, name: &str) -> Vec<String> {
        self.by_name
            .get(name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dep_tree::TreeBuilder;
    use crate::testutil::{lock, WORKSPACE};

    fn index() -> DependencyIndex {
        let lf = lock(WORKSPACE);
        let trees = TreeBuilder::new(&lf).build_all();
        DependencyIndex::build(&trees)
    }

    #[test]
    fn importers_include_transitive_reach() {
        let index = index();
        assert_eq!(index.importers_of("body-parser@1.20.0"), vec!["."]);
    }

    #[test]
    fn sibling_projects_sorted() {
        let index = index();
        assert_eq!(
            index.importers_of("shared@1.0.0"),
            vec!["packages/a-app", "packages/m-app", "packages/z-app"]
        );
    }

    #[test]
    fn multi_level_links_propagate_importers() {
        let index = index();
        let importers = index.importers_of("react@19.1.1");
        for project in ["apps/web", "packages/logger", "packages/fetch-utils"] {
            assert!(importers.contains(&project.to_string()), "{project}");
        }
        assert!(importers.contains(&".".to_string()));
    }

    #[test]
    fn direct_dependents_are_instances_not_projects() {
        let index = index();
        assert_eq!(
            index.direct_dependents_of("body-parser@1.20.0"),
            vec!["express@4.18.2"]
        );
        assert_eq!(
            index.direct_dependents_of("react@18.2.0"),
            vec!["react-dom@18.2.0(react@18.2.0)"]
        );
        assert!(index.direct_dependents_of("express@4.18.2").is_empty());
    }

    #[test]
    fn unknown_ids_answer_empty() {
        let index = index();
        assert!(index.importers_of("ghost@0.0.1").is_empty());
        assert!(!index.is_used("ghost@0.0.1"));
        assert!(index.is_used("react@18.2.0"));
    }

    #[test]
    fn repeated_queries_hit_the_memo() {
        let index = index();
        let first = index.info("shared@1.0.0");
        let second = index.info("shared@1.0.0");
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn groups_instances_by_bare_name() {
        let index = index();
        let reacts = index.instances_of("react");
        assert_eq!(reacts, vec!["react@18.2.0", "react@19.1.1"]);
        assert_eq!(index.instances_of("react-dom").len(), 1);
    }
}
