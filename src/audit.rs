//! The main audit driver: load the lockfile, build every project tree,
//! index them once, then answer the requested query.

use log::debug;

use crate::dep_tree::TreeBuilder;
use crate::detect::{self, AuditOptions, DuplicateGroup};
use crate::error::AuditError;
use crate::index::DependencyIndex;
use crate::lockfile::{self, LockfileCache};
use crate::paths;
use crate::render;
use crate::utils::{error_print, info_print, warn_print};

/// What the CLI layer asked for.
#[derive(Debug, Clone)]
pub enum AuditCommand {
    /// Duplicate detection, optionally with hoist reconciliation.
    Duplicates,
    Search(String),
    ListAll,
    Exists(Vec<String>),
}

/// Run one analysis request end to end. Returns the process exit code:
/// 0 clean, 1 issues found, negative on errors.
pub fn run(command: &AuditCommand, opts: &AuditOptions) -> i32 {
    let cache = LockfileCache::new();
    let lockfile = match cache.get_or_load(&opts.lockfile_path) {
        Ok(lockfile) => lockfile,
        Err(err) => {
            error_print(&format!("cannot load lockfile: {err}"));
            return err.exit_code();
        }
    };
    info_print(
        "Loaded",
        &format!(
            "{} ({} projects, {} snapshots)",
            opts.lockfile_path.display(),
            lockfile.importers.len(),
            lockfile.snapshots.len()
        ),
    );

    let mut builder = TreeBuilder::new(&lockfile).with_max_depth(opts.max_depth);
    let trees = builder.build_all();
    debug!(
        "built {} project trees, {} link edges",
        trees.len(),
        builder.links().len()
    );
    if opts.verbose {
        for warning in builder.warnings() {
            warn_print("Warning", warning);
        }
    }

    let index = DependencyIndex::build(&trees);

    match command {
        AuditCommand::Search(term) => match detect::search(&lockfile, &index, term, opts) {
            Ok(results) => {
                print!("{}", render::render_search(&results, opts.format));
                0
            }
            Err(err) => {
                error_print(&err.to_string());
                err.exit_code()
            }
        },
        AuditCommand::ListAll => match detect::list_all(&lockfile, &index, opts) {
            Ok(results) => {
                print!("{}", render::render_search(&results, opts.format));
                0
            }
            Err(err) => {
                error_print(&err.to_string());
                err.exit_code()
            }
        },
        AuditCommand::Exists(names) => {
            let exists = detect::packages_exist(&index, names);
            print!("{}", render::render_exists(&exists, opts.format));
            0
        }
        AuditCommand::Duplicates => duplicates(&lockfile, &index, &trees, opts),
    }
}

fn duplicates(
    lockfile: &lockfile::Lockfile,
    index: &DependencyIndex,
    trees: &crate::dep_tree::ProjectTrees,
    opts: &AuditOptions,
) -> i32 {
    let mut issues = false;

    if opts.per_project {
        let groups = match detect::find_per_project_duplicates(lockfile, index, opts) {
            Ok(groups) => groups,
            Err(err) => {
                error_print(&err.to_string());
                return err.exit_code();
            }
        };
        if groups.is_empty() {
            info_print("Finished", "no per-project duplicates found");
        } else {
            issues = true;
            print!("{}", render::render_per_project(&groups, opts.format));
        }
    } else {
        let groups = match detect::find_duplicates(lockfile, index, opts) {
            Ok(groups) => groups,
            Err(err) => {
                error_print(&err.to_string());
                return err.exit_code();
            }
        };
        if groups.is_empty() {
            info_print("Finished", "no duplicated packages found");
        } else {
            issues = true;
            print!("{}", render::render_duplicates(&groups, opts.format));
            if opts.show_paths || opts.all_paths {
                print_paths(&groups, trees, opts);
            }
        }
    }

    if opts.check_hoist {
        match lockfile::load_modules_manifest(&opts.modules_dir) {
            Ok(manifest) => {
                let conflicts = detect::find_hoist_conflicts(index, &manifest);
                if conflicts.is_empty() {
                    info_print("Finished", "hoisted install state agrees with the lockfile");
                } else {
                    issues = true;
                    print!("{}", render::render_hoist_conflicts(&conflicts, opts.format));
                }
            }
            Err(err) => {
                error_print(&err.to_string());
                return err.exit_code();
            }
        }
    }

    i32::from(issues)
}

/// Explain each reported instance with its dependency path(s) from the
/// first project that reaches it.
fn print_paths(groups: &[DuplicateGroup], trees: &crate::dep_tree::ProjectTrees, opts: &AuditOptions) {
    for group in groups {
        for instance in &group.instances {
            let Some(project) = instance.projects.first() else {
                continue;
            };

            let found = if opts.all_paths {
                paths::all_paths(trees, project, &instance.id)
            } else {
                paths::first_path(trees, project, &instance.id)
                    .map(|path| path.into_iter().collect())
            };

            match found {
                Ok(found) if found.is_empty() => {
                    // indexed but unreachable is a real inconsistency, keep
                    // it apart from "not used at all"
                    warn_print(
                        "Warning",
                        &AuditError::PathNotFound {
                            project: project.clone(),
                            id: instance.id.clone(),
                        }
                        .to_string(),
                    );
                }
                Ok(found) => {
                    info_print("Why", &format!("{} in {}", instance.id, project));
                    print!("{}", render::format_paths(&found, opts.max_depth));
                }
                Err(err) => warn_print("Warning", &err.to_string()),
            }
        }
    }
}
