use fxhash::FxHashSet as HashSet;
use log::debug;

use crate::link::{resolve_injected_path, resolve_link_path};

use super::{DepKind, DependencyTreeNode, LinkedDependencyInfo, ProjectTrees, TreeBuilder};

impl TreeBuilder<'_> {
    /// Build one root-level tree per declared importer. Each tree is fully
    /// materialized (or its failures collected as warnings) before the next
    /// project starts, so a consumer never sees a half-built tree.
    pub fn build_all(&mut self) -> ProjectTrees {
        let projects: Vec<String> = self.lockfile.importers.keys().cloned().collect();

        let mut trees = ProjectTrees::new();
        for project in projects {
            let tree = self.build_project(&project);
            trees.insert(project, tree);
        }
        trees
    }

    fn build_project(&mut self, project: &str) -> Vec<DependencyTreeNode> {
        if let Some(source) = self.source {
            if let Some(tree) = source.project_hierarchy(project) {
                if !tree.is_empty() {
                    return tree;
                }
                // empty answer means no install present, use the lockfile
                debug!("empty hierarchy for '{project}', falling back to lockfile tables");
            }
        }

        let mut visited = HashSet::default();
        let mut link_stack = vec![project.to_string()];
        self.expand_importer(project, project, &mut link_stack, &mut visited, 0)
    }

    /// Materialize a project's direct entries of every kind. Also used to
    /// splice a linked project's entries under a link node.
    fn expand_importer(
        &mut self,
        root: &str,
        project: &str,
        link_stack: &mut Vec<String>,
        visited: &mut HashSet<String>,
        depth: usize,
    ) -> Vec<DependencyTreeNode> {
        let lockfile = self.lockfile;
        let Some(importer) = lockfile.importers.get(project) else {
            return Vec::new();
        };

        let kinds = [
            (DepKind::Dependencies, &importer.dependencies),
            (DepKind::DevDependencies, &importer.dev_dependencies),
            (DepKind::OptionalDependencies, &importer.optional_dependencies),
            (DepKind::PeerDependencies, &importer.peer_dependencies),
        ];

        let mut nodes = Vec::new();
        for (kind, entries) in kinds {
            for (name, entry) in entries {
                if let Some(node) = self.resolve_edge(
                    root,
                    project,
                    name,
                    &entry.version,
                    &entry.specifier,
                    kind,
                    link_stack,
                    visited,
                    depth,
                ) {
                    nodes.push(node);
                }
            }
        }
        nodes
    }

    /// Turn one `name -> resolved token` edge into a tree node at `depth`.
    /// Unresolvable links are dropped with a warning, never a hard error.
    #[allow(clippy::too_many_arguments)]
    fn resolve_edge(
        &mut self,
        root: &str,
        source_project: &str,
        name: &str,
        token: &str,
        specifier: &str,
        kind: DepKind,
        link_stack: &mut Vec<String>,
        visited: &mut HashSet<String>,
        depth: usize,
    ) -> Option<DependencyTreeNode> {
        if token.starts_with("link:") {
            let Some(target) = resolve_link_path(source_project, token) else {
                self.warnings.push(format!(
                    "cannot resolve link '{name}' ({token}) declared in '{source_project}'"
                ));
                return None;
            };
            return self.link_node(root, name, token, specifier, &target, source_project, link_stack, visited, depth);
        }

        if token.starts_with("file:") {
            // injected workspace package, reach through to its project so deep
            // transitive links stay visible
            if let Some(target) = resolve_injected_path(source_project, token) {
                if self.lockfile.importers.contains_key(&target) {
                    return self.link_node(root, name, token, specifier, &target, source_project, link_stack, visited, depth);
                }
            }
            // not an importer: fall through, a snapshot may exist verbatim
        }

        let id = format!("{name}@{token}");
        let (children, missing) = self.expand_instance(&id, root, link_stack, visited, depth);

        Some(DependencyTreeNode {
            name: name.to_string(),
            version: token.to_string(),
            kind,
            specifier: specifier.to_string(),
            missing,
            children,
        })
    }

    /// An explicit link step: the node stays visible in every path and its
    /// children are the linked project's own entries.
    #[allow(clippy::too_many_arguments)]
    fn link_node(
        &mut self,
        root: &str,
        name: &str,
        token: &str,
        specifier: &str,
        target: &str,
        source_project: &str,
        link_stack: &mut Vec<String>,
        visited: &mut HashSet<String>,
        depth: usize,
    ) -> Option<DependencyTreeNode> {
        if !self.lockfile.importers.contains_key(target) {
            self.warnings.push(format!(
                "link '{name}' in '{source_project}' points at unknown project '{target}'"
            ));
            return None;
        }

        self.links.push(LinkedDependencyInfo {
            source_importer: source_project.to_string(),
            link_name: name.to_string(),
            resolved_importer: target.to_string(),
        });

        let children = if link_stack.iter().any(|p| p == target) {
            // link cycle, the revisited project gets no further children
            debug!("link cycle on '{target}' under '{root}'");
            Vec::new()
        } else if depth >= self.max_depth {
            Vec::new()
        } else {
            link_stack.push(target.to_string());
            let children = self.expand_importer(root, target, link_stack, visited, depth + 1);
            link_stack.pop();
            children
        };

        Some(DependencyTreeNode {
            name: name.to_string(),
            version: token.to_string(),
            kind: DepKind::Link,
            specifier: specifier.to_string(),
            missing: false,
            children,
        })
    }

    /// Expand a normal instance's own edges from its snapshot entry. Returns
    /// `(children, missing)`; a revisited id gets no children, a missing
    /// snapshot yields a flagged leaf.
    fn expand_instance(
        &mut self,
        id: &str,
        root: &str,
        link_stack: &mut Vec<String>,
        visited: &mut HashSet<String>,
        depth: usize,
    ) -> (Vec<DependencyTreeNode>, bool) {
        let lockfile = self.lockfile;

        if depth >= self.max_depth {
            return (Vec::new(), false);
        }
        if !visited.insert(id.to_string()) {
            // dependency cycle or diamond revisit within this root
            return (Vec::new(), false);
        }

        let Some(snapshot) = lockfile.snapshots.get(id) else {
            // lockfiles legitimately omit snapshots for some targets
            self.warnings.push(format!("no snapshot entry for '{id}'"));
            return (Vec::new(), true);
        };

        let mut children = Vec::new();
        let edges = snapshot
            .dependencies
            .iter()
            .chain(snapshot.optional_dependencies.iter());
        for (dep_name, dep_token) in edges {
            if let Some(node) = self.resolve_edge(
                root,
                root,
                dep_name,
                dep_token,
                "",
                DepKind::Transitive,
                link_stack,
                visited,
                depth + 1,
            ) {
                children.push(node);
            }
        }
        (children, false)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{DepKind, DependencyTreeNode, HierarchySource, TreeBuilder};
    use crate::testutil::{lock, CYCLIC, WORKSPACE};

    fn depth_of(nodes: &[DependencyTreeNode]) -> usize {
        nodes
            .iter()
            .map(|n| 1 + depth_of(&n.children))
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn expands_transitive_snapshot_edges() {
        let lf = lock(WORKSPACE);
        let trees = TreeBuilder::new(&lf).build_all();

        let root = &trees["."];
        let express = root.iter().find(|n| n.name == "express").unwrap();
        assert_eq!(express.kind, DepKind::Dependencies);
        assert_eq!(express.specifier, "^4.18.2");
        assert_eq!(express.children.len(), 1);
        assert_eq!(express.children[0].id(), "body-parser@1.20.0");
        assert_eq!(express.children[0].kind, DepKind::Transitive);
    }

    #[test]
    fn link_steps_stay_visible_and_splice_target_entries() {
        let lf = lock(WORKSPACE);
        let mut builder = TreeBuilder::new(&lf);
        let trees = builder.build_all();

        let web = &trees["apps/web"];
        let logger = web.iter().find(|n| n.name == "logger").unwrap();
        assert!(logger.is_link());
        // logger links fetch-utils, which depends on react@19.1.1
        let fetch = &logger.children[0];
        assert!(fetch.is_link());
        assert_eq!(fetch.children[0].id(), "react@19.1.1");

        assert!(builder
            .links()
            .iter()
            .any(|l| l.source_importer == "apps/web"
                && l.link_name == "logger"
                && l.resolved_importer == "packages/logger"));
    }

    #[test]
    fn terminates_on_dependency_cycles() {
        let lf = lock(CYCLIC);
        let trees = TreeBuilder::new(&lf).build_all();

        let root = &trees["."];
        // pkg-a -> pkg-b -> pkg-c -> pkg-a, the revisit is childless
        let a = &root[0];
        let b = &a.children[0];
        let c = &b.children[0];
        let a_again = &c.children[0];
        assert_eq!(a_again.id(), "pkg-a@1.0.0");
        assert!(a_again.children.is_empty());
    }

    #[test]
    fn respects_max_depth() {
        let lf = lock(CYCLIC);
        let trees = TreeBuilder::new(&lf).with_max_depth(2).build_all();
        assert!(depth_of(&trees["."]) <= 3);
    }

    #[test]
    fn missing_snapshot_is_a_flagged_leaf_with_warning() {
        let lf = lock(
            r#"
lockfileVersion: '9.0'
importers:
  .:
    dependencies:
      ghost: {specifier: ^1.0.0, version: 1.0.0}
"#,
        );
        let mut builder = TreeBuilder::new(&lf);
        let trees = builder.build_all();

        let ghost = &trees["."][0];
        assert!(ghost.missing);
        assert!(ghost.children.is_empty());
        assert!(builder.warnings().iter().any(|w| w.contains("ghost@1.0.0")));
    }

    #[test]
    fn unresolvable_link_is_dropped_with_warning() {
        let lf = lock(
            r#"
lockfileVersion: '9.0'
importers:
  .:
    dependencies:
      missing-proj: {specifier: 'workspace:*', version: 'link:packages/nowhere'}
"#,
        );
        let mut builder = TreeBuilder::new(&lf);
        let trees = builder.build_all();

        assert!(trees["."].is_empty());
        assert!(builder
            .warnings()
            .iter()
            .any(|w| w.contains("packages/nowhere")));
    }

    #[test]
    fn terminates_on_link_cycles() {
        let lf = lock(
            r#"
lockfileVersion: '9.0'
importers:
  packages/a:
    dependencies:
      b: {specifier: 'workspace:*', version: 'link:../b'}
  packages/b:
    dependencies:
      a: {specifier: 'workspace:*', version: 'link:../a'}
"#,
        );
        let trees = TreeBuilder::new(&lf).build_all();

        let a = &trees["packages/a"];
        let b_link = &a[0];
        assert!(b_link.is_link());
        // b links back to a, the revisited project has no further children
        let a_link = &b_link.children[0];
        assert!(a_link.is_link());
        assert!(a_link.children.is_empty());
    }

    #[test]
    fn injected_package_reaches_through_to_its_project() {
        let lf = lock(
            r#"
lockfileVersion: '9.0'
importers:
  .:
    dependencies:
      ui: {specifier: 'workspace:*', version: 'file:packages/ui(react@18.2.0)'}
  packages/ui:
    dependencies:
      react: {specifier: ^18.2.0, version: 18.2.0}
snapshots:
  react@18.2.0: {}
"#,
        );
        let trees = TreeBuilder::new(&lf).build_all();

        let ui = &trees["."][0];
        assert!(ui.is_link());
        assert_eq!(ui.children[0].id(), "react@18.2.0");
    }

    struct Canned(Vec<DependencyTreeNode>);

    impl HierarchySource for Canned {
        fn project_hierarchy(&self, project: &str) -> Option<Vec<DependencyTreeNode>> {
            (project == ".").then(|| self.0.clone())
        }
    }

    #[test]
    fn prefers_external_hierarchy_and_falls_back_when_empty() {
        let lf = lock(WORKSPACE);

        let canned = Canned(vec![DependencyTreeNode {
            name: "verified".to_string(),
            version: "1.0.0".to_string(),
            kind: DepKind::Dependencies,
            specifier: String::new(),
            missing: false,
            children: Vec::new(),
        }]);
        let trees = TreeBuilder::new(&lf).with_source(&canned).build_all();
        assert_eq!(trees["."][0].name, "verified");
        // other projects fall back to the lockfile tables
        assert!(!trees["packages/fetch-utils"].is_empty());

        let empty = Canned(Vec::new());
        let trees = TreeBuilder::new(&lf).with_source(&empty).build_all();
        assert!(trees["."].iter().any(|n| n.name == "express"));
    }
}
