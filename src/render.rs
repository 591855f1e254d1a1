//! Rendering of detector output: compact merged path trees for humans, or a
//! direct structural serialization for `--format json`. All numbering and
//! labeling state lives here, recomputed per render call.

use serde::Serialize;

use crate::dep_tree::DepKind;
use crate::detect::{
    DuplicateGroup, HoistConflict, OutputFormat, PackagesExist, PerProjectGroup, SearchResult,
};
use crate::paths::DependencyPathStep;
use crate::utils::{BOLD_CYAN, BOLD_RED};

const ELLIPSIS: &str = "…";

pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).expect("Fatal, result records always serialize")
}

/// Merge several root-to-leaf paths for one target into one multi-branch
/// tree. Paths are sorted by their (id, kind) step sequences, shared
/// prefixes are emitted once, and each distinct target instance gets a
/// stable small integer label when there is more than one.
pub fn format_paths(paths: &[Vec<DependencyPathStep>], max_depth: usize) -> String {
    if paths.is_empty() {
        return String::new();
    }

    fn sort_key(p: &[DependencyPathStep]) -> Vec<(&str, DepKind)> {
        p.iter().map(|s| (s.id.as_str(), s.kind)).collect()
    }

    let mut sorted: Vec<&Vec<DependencyPathStep>> = paths.iter().filter(|p| !p.is_empty()).collect();
    sorted.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));

    // label distinct target instances, assigned over the sorted tokens
    let mut targets: Vec<&str> = sorted
        .iter()
        .filter_map(|p| p.last())
        .map(|s| s.id.as_str())
        .collect();
    targets.sort_unstable();
    targets.dedup();
    let labeled = targets.len() > 1;

    let mut roots: Vec<PathNode> = Vec::new();
    for path in sorted {
        let truncated = truncate(path, max_depth);
        let label = if labeled {
            truncated
                .last()
                .and_then(|s| targets.iter().position(|t| *t == s.id))
                .map(|i| i + 1)
        } else {
            None
        };
        insert(&mut roots, &truncated, label);
    }

    let mut out = String::new();
    let count = roots.len();
    for (i, node) in roots.iter().enumerate() {
        render_node(node, "", i + 1 == count, &mut out);
    }
    out
}

pub fn render_duplicates(groups: &[DuplicateGroup], format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return to_json(&groups);
    }

    let mut out = String::new();
    for group in groups {
        out.push_str(&format!("{}\n", BOLD_CYAN.paint(&group.name)));
        let count = group.instances.len();
        for (i, instance) in group.instances.iter().enumerate() {
            let connector = if i + 1 == count { "└─" } else { "├─" };
            let tail = if i + 1 == count { "   " } else { "│  " };
            out.push_str(&format!(
                "{connector} {} ({}) [{}]\n",
                instance.id,
                i + 1,
                instance.kind
            ));
            out.push_str(&format!(
                "{tail}  used by: {}\n",
                instance.projects.join(", ")
            ));
        }
    }
    out
}

pub fn render_per_project(groups: &[PerProjectGroup], format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return to_json(&groups);
    }

    let mut out = String::new();
    for group in groups {
        out.push_str(&format!("{}\n", BOLD_CYAN.paint(&group.project)));
        let count = group.packages.len();
        for (i, package) in group.packages.iter().enumerate() {
            let connector = if i + 1 == count { "└─" } else { "├─" };
            let versions: Vec<&str> = package
                .instances
                .iter()
                .map(|inst| inst.id.as_str())
                .collect();
            out.push_str(&format!(
                "{connector} {}: {}\n",
                package.name,
                versions.join(", ")
            ));
        }
    }
    out
}

pub fn render_hoist_conflicts(conflicts: &[HoistConflict], format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return to_json(&conflicts);
    }

    let mut out = String::new();
    for conflict in conflicts {
        out.push_str(&format!(
            "{} {}: hoisted [{}], lockfile resolves [{}] (projects: {})\n",
            BOLD_RED.paint("hoist conflict"),
            conflict.name,
            conflict.hoisted_versions.join(", "),
            conflict.lockfile_versions.join(", "),
            conflict.projects.join(", ")
        ));
    }
    out
}

pub fn render_search(results: &[SearchResult], format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return to_json(&results);
    }

    let mut out = String::new();
    for result in results {
        out.push_str(&format!("{}\n", BOLD_CYAN.paint(&result.name)));
        let count = result.instances.len();
        for (i, instance) in result.instances.iter().enumerate() {
            let connector = if i + 1 == count { "└─" } else { "├─" };
            out.push_str(&format!(
                "{connector} {} (projects: {})\n",
                instance.id,
                instance.projects.join(", ")
            ));
        }
    }
    out
}

pub fn render_exists(exists: &PackagesExist, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return to_json(&exists);
    }

    let mut out = String::new();
    for name in &exists.existing {
        out.push_str(&format!("{name}: found\n"));
    }
    for name in &exists.missing {
        out.push_str(&format!("{name}: not in lockfile\n"));
    }
    out
}

struct PathNode {
    step: DependencyPathStep,
    label: Option<usize>,
    children: Vec<PathNode>,
}

fn insert(roots: &mut Vec<PathNode>, path: &[DependencyPathStep], label: Option<usize>) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };

    // an already-emitted prefix step is reused, never re-emitted
    let pos = roots
        .iter()
        .position(|n| n.step.id == head.id && n.step.kind == head.kind);
    let node = match pos {
        Some(pos) => &mut roots[pos],
        None => {
            roots.push(PathNode {
                step: head.clone(),
                label: None,
                children: Vec::new(),
            });
            roots.last_mut().expect("just pushed")
        }
    };

    if rest.is_empty() {
        node.label = label;
    } else {
        insert(&mut node.children, rest, label);
    }
}

fn render_node(node: &PathNode, prefix: &str, is_last: bool, out: &mut String) {
    let connector = if is_last { "└─" } else { "├─" };
    let label = node
        .label
        .map(|l| format!(" ({l})"))
        .unwrap_or_default();
    if node.step.id == ELLIPSIS {
        out.push_str(&format!("{prefix}{connector} {ELLIPSIS}\n"));
    } else {
        out.push_str(&format!(
            "{prefix}{connector} {} [{}]{label}\n",
            node.step.id, node.step.kind
        ));
    }

    let child_prefix = format!("{prefix}{}  ", if is_last { " " } else { "│" });
    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        render_node(child, &child_prefix, i + 1 == count, out);
    }
}

/// Keep a path inside the depth budget: interior segments collapse to one
/// ellipsis step, the first and the final (target) step always survive.
fn truncate(path: &[DependencyPathStep], max_depth: usize) -> Vec<DependencyPathStep> {
    if path.len() <= max_depth.max(3) {
        return path.to_vec();
    }

    let keep_front = max_depth.saturating_sub(2).max(1);
    let mut out: Vec<DependencyPathStep> = path[..keep_front].to_vec();
    out.push(DependencyPathStep {
        id: ELLIPSIS.to_string(),
        kind: path[keep_front].kind,
        specifier: String::new(),
    });
    out.push(path.last().expect("non-empty path").clone());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dep_tree::DepKind;

    fn step(id: &str, kind: DepKind) -> DependencyPathStep {
        DependencyPathStep {
            id: id.to_string(),
            kind,
            specifier: String::new(),
        }
    }

    #[test]
    fn merges_shared_prefixes() {
        let paths = vec![
            vec![
                step("lib-a@1.0.0", DepKind::Dependencies),
                step("common@2.0.0", DepKind::Transitive),
            ],
            vec![
                step("lib-a@1.0.0", DepKind::Dependencies),
                step("other@3.0.0", DepKind::Transitive),
            ],
        ];
        let out = format_paths(&paths, 10);

        // the shared prefix appears once
        assert_eq!(out.matches("lib-a@1.0.0").count(), 1);
        assert!(out.contains("├─ common@2.0.0"));
        assert!(out.contains("└─ other@3.0.0"));
    }

    #[test]
    fn labels_distinct_target_versions() {
        let paths = vec![
            vec![
                step("lib-a@1.0.0", DepKind::Dependencies),
                step("react@18.2.0", DepKind::Transitive),
            ],
            vec![
                step("lib-b@1.0.0", DepKind::Dependencies),
                step("react@19.1.1", DepKind::Transitive),
            ],
        ];
        let out = format_paths(&paths, 10);
        assert!(out.contains("react@18.2.0 [transitive] (1)"));
        assert!(out.contains("react@19.1.1 [transitive] (2)"));

        // a single target version carries no label
        let out = format_paths(&paths[..1], 10);
        assert!(!out.contains("(1)"));
    }

    #[test]
    fn truncates_interior_segments() {
        let long: Vec<DependencyPathStep> = (0..8)
            .map(|i| step(&format!("p{i}@1.0.0"), DepKind::Transitive))
            .collect();
        let out = format_paths(&[long.clone()], 4);

        assert!(out.contains("p0@1.0.0"));
        assert!(out.contains(ELLIPSIS));
        assert!(out.contains("p7@1.0.0"));
        assert!(!out.contains("p4@1.0.0"));
        assert_eq!(out.lines().count(), 4);
    }

    #[test]
    fn paths_sorted_before_merging() {
        let paths = vec![
            vec![step("zeta@1.0.0", DepKind::Dependencies)],
            vec![step("alpha@1.0.0", DepKind::Dependencies)],
        ];
        let out = format_paths(&paths, 10);
        let first = out.lines().next().unwrap();
        assert!(first.contains("alpha@1.0.0"));
        assert!(first.starts_with("├─"));
        assert!(out.lines().nth(1).unwrap().starts_with("└─"));
    }
}
