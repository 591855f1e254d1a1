use std::env;
use std::path::PathBuf;
use std::process::exit;

use getopts::Options;
use log::info;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use dup_audit::audit::{run, AuditCommand};
use dup_audit::dep_tree::DepKind;
use dup_audit::detect::{AuditOptions, OutputFormat};
use dup_audit::utils::error_print;

fn build_options() -> Options {
    let mut opts = Options::new();
    opts.optopt("p", "package", "only report packages matching NAME ('*' globs)", "NAME");
    opts.optmulti("", "project", "restrict results to project PATH (repeatable)", "PATH");
    opts.optflag("a", "all", "report every package, not only duplicated ones");
    opts.optflag("", "per-project", "group results by project instead of by package");
    opts.optmulti("", "omit", "omit direct dependencies of KIND: dev, optional or peer", "KIND");
    opts.optflag("", "hoist", "reconcile against the hoisted install state (.modules.yaml)");
    opts.optopt("", "dir", "workspace directory holding pnpm-lock.yaml and node_modules", "DIR");
    opts.optopt("", "lockfile", "path to pnpm-lock.yaml (default: ./pnpm-lock.yaml)", "PATH");
    opts.optopt("", "modules-dir", "directory holding .modules.yaml (default: node_modules)", "DIR");
    opts.optopt("d", "depth", "maximum dependency depth when building trees", "N");
    opts.optflag("", "paths", "show one dependency path per reported instance");
    opts.optflag("", "all-paths", "show every dependency path, including diamonds");
    opts.optopt("f", "format", "output format: tree (default) or json", "FMT");
    opts.optopt("s", "search", "search packages by TERM instead of detecting duplicates", "TERM");
    opts.optflag("l", "list", "list every package in the lockfile");
    opts.optmulti("e", "exists", "check whether NAME appears in the lockfile (repeatable)", "NAME");
    opts.optflag("v", "verbose", "print tree-building warnings and debug logs");
    opts.optflag("h", "help", "print this help message");
    opts
}

fn parse_omit(kinds: &[String]) -> Result<Vec<DepKind>, String> {
    kinds
        .iter()
        .map(|kind| match kind.as_str() {
            "dev" => Ok(DepKind::DevDependencies),
            "optional" => Ok(DepKind::OptionalDependencies),
            "peer" => Ok(DepKind::PeerDependencies),
            other => Err(format!("unknown --omit kind `{other}`, expected dev, optional or peer")),
        })
        .collect()
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let opts = build_options();

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(err) => {
            error_print(&err.to_string());
            exit(-1);
        }
    };
    if matches.opt_present("help") {
        print!("{}", opts.usage("Usage: dup_audit [options]"));
        return;
    }

    let verbose = matches.opt_present("verbose");
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let _ = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );
    info!("startup command line: {args:?}");

    let mut options = AuditOptions {
        package_filter: matches.opt_str("package"),
        show_all: matches.opt_present("all"),
        per_project: matches.opt_present("per-project"),
        check_hoist: matches.opt_present("hoist"),
        show_paths: matches.opt_present("paths"),
        all_paths: matches.opt_present("all-paths"),
        verbose,
        ..Default::default()
    };

    let projects = matches.opt_strs("project");
    if !projects.is_empty() {
        options.project_filter = Some(projects);
    }
    if let Some(dir) = matches.opt_str("dir") {
        let dir = PathBuf::from(dir);
        options.lockfile_path = dir.join(dup_audit::lockfile::LOCKFILE_NAME);
        options.modules_dir = dir.join("node_modules");
    }
    // explicit paths win over --dir
    if let Some(path) = matches.opt_str("lockfile") {
        options.lockfile_path = PathBuf::from(path);
    }
    if let Some(dir) = matches.opt_str("modules-dir") {
        options.modules_dir = PathBuf::from(dir);
    }
    match parse_omit(&matches.opt_strs("omit")) {
        Ok(kinds) => options.omit_kinds = kinds,
        Err(err) => {
            error_print(&err);
            exit(-1);
        }
    }
    if let Some(depth) = matches.opt_str("depth") {
        match depth.parse::<usize>() {
            Ok(depth) => options.max_depth = depth,
            Err(_) => {
                error_print(&format!("invalid --depth value `{depth}`"));
                exit(-1);
            }
        }
    }
    if let Some(format) = matches.opt_str("format") {
        options.format = match format.as_str() {
            "tree" => OutputFormat::Tree,
            "json" => OutputFormat::Json,
            other => {
                error_print(&format!("unknown --format `{other}`, expected tree or json"));
                exit(-1);
            }
        };
    }

    let exists = matches.opt_strs("exists");
    let command = if let Some(term) = matches.opt_str("search") {
        AuditCommand::Search(term)
    } else if matches.opt_present("list") {
        AuditCommand::ListAll
    } else if !exists.is_empty() {
        AuditCommand::Exists(exists)
    } else {
        AuditCommand::Duplicates
    };

    exit(run(&command, &options));
}
