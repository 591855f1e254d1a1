//! Duplicate and hoist detection over the dependency index, plus the plain
//! query surface (search / list / exists) the CLI layer consumes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Serialize;

use crate::dep_tree::{DepKind, DEFAULT_MAX_DEPTH};
use crate::error::AuditError;
use crate::index::DependencyIndex;
use crate::lockfile::{Lockfile, ModulesManifest};
use crate::package_id;
use crate::utils::glob_to_regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Tree,
    Json,
}

/// Per-invocation options, one named field per knob.
#[derive(Debug, Clone)]
pub struct AuditOptions {
    /// Path of the lockfile to analyze.
    pub lockfile_path: PathBuf,
    /// Exact or `*`-glob package name filter.
    pub package_filter: Option<String>,
    /// Restrict reported project sets to these paths.
    pub project_filter: Option<Vec<String>>,
    /// Direct-dependency kinds dropped from results.
    pub omit_kinds: Vec<DepKind>,
    /// Report every indexed package, not only duplicated ones.
    pub show_all: bool,
    /// Group results by project instead of by package.
    pub per_project: bool,
    /// Reconcile against the hoisted install state.
    pub check_hoist: bool,
    /// Directory holding `.modules.yaml`.
    pub modules_dir: PathBuf,
    /// Depth bound for tree building.
    pub max_depth: usize,
    /// Print one explaining path per instance, or every diamond variant.
    pub show_paths: bool,
    pub all_paths: bool,
    pub format: OutputFormat,
    pub verbose: bool,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            lockfile_path: PathBuf::from(crate::lockfile::LOCKFILE_NAME),
            package_filter: None,
            project_filter: None,
            omit_kinds: Vec::new(),
            show_all: false,
            per_project: false,
            check_hoist: false,
            modules_dir: PathBuf::from("node_modules"),
            max_depth: DEFAULT_MAX_DEPTH,
            show_paths: false,
            all_paths: false,
            format: OutputFormat::Tree,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateInstance {
    pub id: String,
    pub version: String,
    pub projects: Vec<String>,
    pub kind: DepKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub name: String,
    pub instances: Vec<DuplicateInstance>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerProjectGroup {
    pub project: String,
    pub packages: Vec<DuplicateGroup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub name: String,
    pub instances: Vec<DuplicateInstance>,
}

#[derive(Debug, Serialize)]
pub struct PackagesExist {
    pub existing: Vec<String>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoistConflict {
    pub name: String,
    pub hoisted_versions: Vec<String>,
    pub lockfile_versions: Vec<String>,
    pub projects: Vec<String>,
}

/// Group indexed instances by bare name and report names resolved to more
/// than one instance (or everything under `show_all`).
///
/// Duplicate-ness is decided on the unfiltered group; the project filter may
/// then shrink a group, and instances whose project set empties out are
/// dropped. A group that loses every instance disappears.
pub fn find_duplicates(
    lockfile: &Lockfile,
    index: &DependencyIndex,
    opts: &AuditOptions,
) -> Result<Vec<DuplicateGroup>, AuditError> {
    let name_filter = opts
        .package_filter
        .as_deref()
        .map(glob_to_regex)
        .transpose()?;

    let mut groups = Vec::new();
    for (name, ids) in index.by_name() {
        if let Some(re) = &name_filter {
            if !re.is_match(name) {
                continue;
            }
        }
        if !opts.show_all && ids.len() <= 1 {
            continue;
        }

        let mut instances = Vec::new();
        for id in ids {
            if let Some(instance) = build_instance(lockfile, index, name, id, opts) {
                if !opts.omit_kinds.contains(&instance.kind) {
                    instances.push(instance);
                }
            }
        }
        if !instances.is_empty() {
            groups.push(DuplicateGroup {
                name: name.clone(),
                instances,
            });
        }
    }
    Ok(groups)
}

/// Same data regrouped by importer: (project, package) pairs where one
/// project reaches more than one instance of the same name.
pub fn find_per_project_duplicates(
    lockfile: &Lockfile,
    index: &DependencyIndex,
    opts: &AuditOptions,
) -> Result<Vec<PerProjectGroup>, AuditError> {
    let name_filter = opts
        .package_filter
        .as_deref()
        .map(glob_to_regex)
        .transpose()?;

    let mut per_project: BTreeMap<String, BTreeMap<String, Vec<DuplicateInstance>>> =
        BTreeMap::new();
    for (name, ids) in index.by_name() {
        if let Some(re) = &name_filter {
            if !re.is_match(name) {
                continue;
            }
        }
        for id in ids {
            for project in index.importers_of(id) {
                if let Some(filter) = &opts.project_filter {
                    if !filter.iter().any(|f| f == &project) {
                        continue;
                    }
                }
                let projects = vec![project.clone()];
                let kind = kind_of(lockfile, name, id, &projects);
                if opts.omit_kinds.contains(&kind) {
                    continue;
                }
                per_project
                    .entry(project)
                    .or_default()
                    .entry(name.clone())
                    .or_default()
                    .push(DuplicateInstance {
                        id: id.clone(),
                        version: version_of(id),
                        projects,
                        kind,
                    });
            }
        }
    }

    let mut out = Vec::new();
    for (project, packages) in per_project {
        let packages: Vec<DuplicateGroup> = packages
            .into_iter()
            .filter(|(_, instances)| opts.show_all || instances.len() > 1)
            .map(|(name, instances)| DuplicateGroup { name, instances })
            .collect();
        if !packages.is_empty() {
            out.push(PerProjectGroup { project, packages });
        }
    }
    Ok(out)
}

/// Split `names` into those the index knows and those it does not.
pub fn packages_exist(index: &DependencyIndex, names: &[String]) -> PackagesExist {
    let mut existing = Vec::new();
    let mut missing = Vec::new();
    for name in names {
        if index.by_name().contains_key(name) {
            existing.push(name.clone());
        } else {
            missing.push(name.clone());
        }
    }
    PackagesExist { existing, missing }
}

/// Names matching `term` (substring, or `*`-glob when the term carries one),
/// with every resolved instance and its filtered project set.
pub fn search(
    lockfile: &Lockfile,
    index: &DependencyIndex,
    term: &str,
    opts: &AuditOptions,
) -> Result<Vec<SearchResult>, AuditError> {
    let glob = term.contains('*').then(|| glob_to_regex(term)).transpose()?;

    let mut results = Vec::new();
    for (name, ids) in index.by_name() {
        let hit = match &glob {
            Some(re) => re.is_match(name),
            None => name.contains(term),
        };
        if !hit {
            continue;
        }

        let instances: Vec<DuplicateInstance> = ids
            .iter()
            .filter_map(|id| build_instance(lockfile, index, name, id, opts))
            .collect();
        if !instances.is_empty() {
            results.push(SearchResult {
                name: name.clone(),
                instances,
            });
        }
    }
    Ok(results)
}

/// Every indexed package, filters applied.
pub fn list_all(
    lockfile: &Lockfile,
    index: &DependencyIndex,
    opts: &AuditOptions,
) -> Result<Vec<SearchResult>, AuditError> {
    search(lockfile, index, "", opts)
}

/// Reconcile the lockfile-resolved instances against the hoisted install
/// state. A name conflicts when several distinct versions are hoisted into
/// the same slot, or when a resolved version is missing from the hoisted set.
pub fn find_hoist_conflicts(
    index: &DependencyIndex,
    manifest: &ModulesManifest,
) -> Vec<HoistConflict> {
    let mut hoisted: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for id in manifest.hoisted_dependencies.keys() {
        // unparsable manifest keys are skipped, not fatal
        let Ok(parsed) = package_id::parse(id) else {
            continue;
        };
        hoisted
            .entry(parsed.name)
            .or_default()
            .insert(parsed.version.unwrap_or_default());
    }

    let mut conflicts = Vec::new();
    for (name, hoisted_versions) in &hoisted {
        let lock_ids = index.instances_of(name);
        let mut projects = BTreeSet::new();
        let mut lockfile_versions = BTreeSet::new();
        let mut conflict = hoisted_versions.len() > 1;

        for id in &lock_ids {
            let version = version_of(id);
            if !hoisted_versions.contains(&version) {
                // install state disagrees with the lockfile
                conflict = true;
                projects.extend(index.importers_of(id));
            } else if hoisted_versions.len() > 1 {
                projects.extend(index.importers_of(id));
            }
            lockfile_versions.insert(version);
        }

        if conflict {
            conflicts.push(HoistConflict {
                name: name.clone(),
                hoisted_versions: hoisted_versions.iter().cloned().collect(),
                lockfile_versions: lockfile_versions.into_iter().collect(),
                projects: projects.into_iter().collect(),
            });
        }
    }
    conflicts
}

fn build_instance(
    lockfile: &Lockfile,
    index: &DependencyIndex,
    name: &str,
    id: &str,
    opts: &AuditOptions,
) -> Option<DuplicateInstance> {
    let importers = index.importers_of(id);
    let projects: Vec<String> = match &opts.project_filter {
        Some(filter) => importers
            .into_iter()
            .filter(|p| filter.iter().any(|f| f == p))
            .collect(),
        None => importers,
    };
    if projects.is_empty() {
        return None;
    }

    Some(DuplicateInstance {
        id: id.to_string(),
        version: version_of(id),
        kind: kind_of(lockfile, name, id, &projects),
        projects,
    })
}

fn version_of(id: &str) -> String {
    package_id::parse(id)
        .ok()
        .and_then(|p| p.version)
        .unwrap_or_default()
}

/// Whether a declared `name -> token` entry resolves to exactly this
/// instance id; a declared token without qualifiers still denotes the
/// qualified instance.
fn denotes(name: &str, token: &str, id: &str) -> bool {
    let full = format!("{name}@{token}");
    id == full
        || (id.len() > full.len() && id.starts_with(&full) && id.as_bytes()[full.len()] == b'(')
}

/// Highest-priority kind under which the given projects declare *this
/// instance*: dependencies > optionalDependencies > peerDependencies >
/// devDependencies. A project that only reaches the instance transitively
/// (or through a link while declaring a different instance of the same
/// name) contributes `Transitive`.
fn kind_of(lockfile: &Lockfile, name: &str, id: &str, projects: &[String]) -> DepKind {
    let mut best = DepKind::Transitive;
    for project in projects {
        let Some(importer) = lockfile.importers.get(project) else {
            continue;
        };
        let tables = [
            (DepKind::Dependencies, &importer.dependencies),
            (DepKind::OptionalDependencies, &importer.optional_dependencies),
            (DepKind::PeerDependencies, &importer.peer_dependencies),
            (DepKind::DevDependencies, &importer.dev_dependencies),
        ];
        for (kind, table) in tables {
            if table
                .get(name)
                .map_or(false, |entry| denotes(name, &entry.version, id))
            {
                best = best.min(kind);
                break;
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dep_tree::TreeBuilder;
    use crate::testutil::{lock, WORKSPACE};

    fn fixture() -> (Lockfile, DependencyIndex) {
        let lf = lock(WORKSPACE);
        let trees = TreeBuilder::new(&lf).build_all();
        let index = DependencyIndex::build(&trees);
        (lf, index)
    }

    #[test]
    fn reports_only_multi_instance_names_by_default() {
        let (lf, index) = fixture();
        let groups = find_duplicates(&lf, &index, &AuditOptions::default()).unwrap();

        assert_eq!(groups.len(), 1);
        let react = &groups[0];
        assert_eq!(react.name, "react");
        let ids: Vec<&str> = react.instances.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["react@18.2.0", "react@19.1.1"]);
        assert!(react.instances.iter().all(|i| !i.projects.is_empty()));
        assert_eq!(react.instances[0].version, "18.2.0");
        assert_eq!(react.instances[0].projects, vec!["apps/web"]);
        assert_eq!(react.instances[0].kind, DepKind::Dependencies);
    }

    #[test]
    fn show_all_reports_singletons_too() {
        let (lf, index) = fixture();
        let opts = AuditOptions {
            show_all: true,
            ..Default::default()
        };
        let groups = find_duplicates(&lf, &index, &opts).unwrap();
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["body-parser", "express", "react", "react-dom", "shared"]
        );
    }

    #[test]
    fn name_glob_and_project_filters() {
        let (lf, index) = fixture();

        let opts = AuditOptions {
            show_all: true,
            package_filter: Some("react*".to_string()),
            ..Default::default()
        };
        let groups = find_duplicates(&lf, &index, &opts).unwrap();
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["react", "react-dom"]);

        // a project that reaches neither react instance empties the group
        let opts = AuditOptions {
            project_filter: Some(vec!["packages/a-app".to_string()]),
            ..Default::default()
        };
        assert!(find_duplicates(&lf, &index, &opts).unwrap().is_empty());
    }

    #[test]
    fn kind_priority_spans_importers() {
        let (lf, index) = fixture();
        let opts = AuditOptions {
            show_all: true,
            package_filter: Some("shared".to_string()),
            ..Default::default()
        };
        let groups = find_duplicates(&lf, &index, &opts).unwrap();
        // declared under dependencies in a-app/m-app, devDependencies in z-app
        assert_eq!(groups[0].instances[0].kind, DepKind::Dependencies);

        let opts = AuditOptions {
            show_all: true,
            package_filter: Some("shared".to_string()),
            project_filter: Some(vec!["packages/z-app".to_string()]),
            ..Default::default()
        };
        let groups = find_duplicates(&lf, &index, &opts).unwrap();
        assert_eq!(groups[0].instances[0].kind, DepKind::DevDependencies);

        // omitting dev drops it entirely
        let opts = AuditOptions {
            show_all: true,
            package_filter: Some("shared".to_string()),
            project_filter: Some(vec!["packages/z-app".to_string()]),
            omit_kinds: vec![DepKind::DevDependencies],
            ..Default::default()
        };
        assert!(find_duplicates(&lf, &index, &opts).unwrap().is_empty());
    }

    #[test]
    fn kind_is_per_instance_not_per_name() {
        let (lf, index) = fixture();
        // apps/web declares react -> 18.2.0; it reaches react@19.1.1 only
        // through the logger/fetch-utils link chain
        let opts = AuditOptions {
            project_filter: Some(vec!["apps/web".to_string()]),
            ..Default::default()
        };
        let groups = find_duplicates(&lf, &index, &opts).unwrap();
        assert_eq!(groups.len(), 1);
        let kinds: Vec<(&str, DepKind)> = groups[0]
            .instances
            .iter()
            .map(|i| (i.id.as_str(), i.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("react@18.2.0", DepKind::Dependencies),
                ("react@19.1.1", DepKind::Transitive),
            ]
        );

        let groups = find_per_project_duplicates(&lf, &index, &opts).unwrap();
        let react = &groups[0].packages[0];
        assert_eq!(react.instances[1].id, "react@19.1.1");
        assert_eq!(react.instances[1].kind, DepKind::Transitive);
    }

    #[test]
    fn qualified_instance_matches_its_declaration() {
        let (lf, index) = fixture();
        let opts = AuditOptions {
            show_all: true,
            package_filter: Some("react-dom".to_string()),
            ..Default::default()
        };
        let groups = find_duplicates(&lf, &index, &opts).unwrap();
        // declared token carries the bound qualifier verbatim
        assert_eq!(groups[0].instances[0].id, "react-dom@18.2.0(react@18.2.0)");
        assert_eq!(groups[0].instances[0].kind, DepKind::Dependencies);
    }

    #[test]
    fn per_project_regrouping() {
        let (lf, index) = fixture();
        let groups = find_per_project_duplicates(&lf, &index, &AuditOptions::default()).unwrap();

        // apps/web reaches react@18.2.0 directly and react@19.1.1 via links
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].project, "apps/web");
        assert_eq!(groups[0].packages.len(), 1);
        assert_eq!(groups[0].packages[0].name, "react");
        assert_eq!(groups[0].packages[0].instances.len(), 2);
    }

    #[test]
    fn exists_search_and_list() {
        let (lf, index) = fixture();

        let exist = packages_exist(&index, &["react".to_string(), "ghost".to_string()]);
        assert_eq!(exist.existing, vec!["react"]);
        assert_eq!(exist.missing, vec!["ghost"]);

        let opts = AuditOptions::default();
        let hits = search(&lf, &index, "body", &opts).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "body-parser");

        let hits = search(&lf, &index, "react*", &opts).unwrap();
        assert_eq!(hits.len(), 2);

        let all = list_all(&lf, &index, &opts).unwrap();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn hoist_mismatch_flags_without_lockfile_duplicate() {
        let lf = lock(
            r#"
lockfileVersion: '9.0'
importers:
  .:
    dependencies:
      react: {specifier: ^19.1.1, version: 19.1.1}
snapshots:
  react@19.1.1: {}
"#,
        );
        let trees = TreeBuilder::new(&lf).build_all();
        let index = DependencyIndex::build(&trees);

        let manifest: ModulesManifest = serde_yaml::from_str(
            "hoistedDependencies:\n  react@18.2.0:\n    react: private\n",
        )
        .unwrap();

        let conflicts = find_hoist_conflicts(&index, &manifest);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].name, "react");
        assert_eq!(conflicts[0].hoisted_versions, vec!["18.2.0"]);
        assert_eq!(conflicts[0].lockfile_versions, vec!["19.1.1"]);
        assert_eq!(conflicts[0].projects, vec!["."]);
    }

    #[test]
    fn multiple_hoisted_versions_conflict() {
        let (_, index) = fixture();
        let manifest: ModulesManifest = serde_yaml::from_str(
            "hoistedDependencies:\n  react@18.2.0:\n    react: private\n  react@19.1.1:\n    react: private\n",
        )
        .unwrap();

        let conflicts = find_hoist_conflicts(&index, &manifest);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].hoisted_versions, vec!["18.2.0", "19.1.1"]);
    }

    #[test]
    fn agreeing_hoist_state_is_quiet() {
        let (_, index) = fixture();
        let manifest: ModulesManifest = serde_yaml::from_str(
            "hoistedDependencies:\n  body-parser@1.20.0:\n    body-parser: private\n",
        )
        .unwrap();
        assert!(find_hoist_conflicts(&index, &manifest).is_empty());
    }
}
