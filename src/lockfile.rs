//! Data model of the pnpm workspace lockfile and the installed-state
//! manifest, plus the process-wide loader cache.
//!
//! Only the fields this tool reasons about are modeled; unknown fields are
//! ignored on decode. Version tokens stay opaque strings here, the codec in
//! `package_id` decomposes them on demand.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use fxhash::FxHashMap as HashMap;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

use crate::error::AuditError;

pub const LOCKFILE_NAME: &str = "pnpm-lock.yaml";
pub const MODULES_MANIFEST_NAME: &str = ".modules.yaml";

/// One direct declaration of an importer: the user-facing range plus the
/// resolved token (a package id suffix, a `link:` path or a `file:` path).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResolvedEntry {
    #[serde(default)]
    pub specifier: String,
    pub version: String,
}

/// One workspace project's direct declarations, partitioned by kind.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Importer {
    #[serde(default)]
    pub dependencies: BTreeMap<String, ResolvedEntry>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, ResolvedEntry>,
    #[serde(default)]
    pub optional_dependencies: BTreeMap<String, ResolvedEntry>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, ResolvedEntry>,
}

/// Resolved direct dependency edges of one exact package instance.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub optional_dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    #[serde(default, deserialize_with = "de_version_token")]
    pub lockfile_version: String,
    #[serde(default)]
    pub importers: BTreeMap<String, Importer>,
    #[serde(default)]
    pub snapshots: HashMap<String, Snapshot>,
}

/// The part of `node_modules/.modules.yaml` this tool consults: only the key
/// set of `hoistedDependencies` matters, keys are package ids.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModulesManifest {
    #[serde(default)]
    pub hoisted_dependencies: BTreeMap<String, BTreeMap<String, String>>,
}

// pnpm writes the version as a quoted string since v6, older files carry a
// bare number; both are opaque tokens to us.
fn de_version_token<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Decode and shape-check a lockfile document.
pub fn parse_lockfile(text: &str) -> Result<Lockfile, AuditError> {
    let lockfile: Lockfile =
        serde_yaml::from_str(text).map_err(|e| AuditError::MalformedLockfile(e.to_string()))?;

    if lockfile.lockfile_version.is_empty() {
        return Err(AuditError::MalformedLockfile(
            "missing lockfileVersion".to_string(),
        ));
    }
    if lockfile.importers.is_empty() {
        return Err(AuditError::MalformedLockfile(
            "no importers declared".to_string(),
        ));
    }

    Ok(lockfile)
}

/// Load `node_modules/.modules.yaml` from the given modules directory.
pub fn load_modules_manifest(modules_dir: &Path) -> Result<ModulesManifest, AuditError> {
    let path = modules_dir.join(MODULES_MANIFEST_NAME);
    let text = fs::read_to_string(&path)
        .map_err(|e| AuditError::Unexpected(format!("cannot read {}: {e}", path.display())))?;

    serde_yaml::from_str(&text)
        .map_err(|e| AuditError::Unexpected(format!("cannot decode {}: {e}", path.display())))
}

/// Read-through cache of parsed lockfiles keyed by resolved path, so repeated
/// queries in one process decode the file once.
#[derive(Default)]
pub struct LockfileCache {
    loaded: RefCell<HashMap<PathBuf, Rc<Lockfile>>>,
}

impl LockfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&self, path: &Path) -> Result<Rc<Lockfile>, AuditError> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if let Some(lockfile) = self.loaded.borrow().get(&key) {
            return Ok(Rc::clone(lockfile));
        }

        let text = fs::read_to_string(path)
            .map_err(|e| AuditError::Unexpected(format!("cannot read {}: {e}", path.display())))?;
        let lockfile = Rc::new(parse_lockfile(&text)?);

        self.loaded
            .borrow_mut()
            .insert(key, Rc::clone(&lockfile));
        Ok(lockfile)
    }

    pub fn clear(&self) {
        self.loaded.borrow_mut().clear();
    }
}
