//! Shared fixtures for the unit tests: a small multi-project workspace and a
//! deliberately cyclic snapshot graph.

use crate::lockfile::{parse_lockfile, Lockfile};

pub fn lock(yaml: &str) -> Lockfile {
    parse_lockfile(yaml).unwrap()
}

/// Workspace with a link chain (`apps/web` -> `packages/logger` ->
/// `packages/fetch-utils`), two resolved `react` instances and three sibling
/// projects sharing one `shared` instance.
pub const WORKSPACE: &str = r#"
lockfileVersion: '9.0'

importers:
  .:
    dependencies:
      express:
        specifier: ^4.18.2
        version: 4.18.2
      react:
        specifier: ^19.1.1
        version: 19.1.1
  apps/web:
    dependencies:
      logger:
        specifier: 'workspace:*'
        version: 'link:../../packages/logger'
      react:
        specifier: ^18.2.0
        version: 18.2.0
      react-dom:
        specifier: ^18.2.0
        version: 18.2.0(react@18.2.0)
  packages/logger:
    dependencies:
      fetch-utils:
        specifier: 'workspace:*'
        version: 'link:../fetch-utils'
  packages/fetch-utils:
    dependencies:
      react:
        specifier: ^19.1.1
        version: 19.1.1
  packages/a-app:
    dependencies:
      shared:
        specifier: ^1.0.0
        version: 1.0.0
  packages/m-app:
    dependencies:
      shared:
        specifier: ^1.0.0
        version: 1.0.0
  packages/z-app:
    devDependencies:
      shared:
        specifier: ^1.0.0
        version: 1.0.0

snapshots:
  express@4.18.2:
    dependencies:
      body-parser: 1.20.0
  body-parser@1.20.0: {}
  react@19.1.1: {}
  react@18.2.0: {}
  react-dom@18.2.0(react@18.2.0):
    dependencies:
      react: 18.2.0
  shared@1.0.0: {}
"#;

/// `pkg-a -> pkg-b -> pkg-c -> pkg-a`.
pub const CYCLIC: &str = r#"
lockfileVersion: '9.0'

importers:
  .:
    dependencies:
      pkg-a:
        specifier: ^1.0.0
        version: 1.0.0

snapshots:
  pkg-a@1.0.0:
    dependencies:
      pkg-b: 1.0.0
  pkg-b@1.0.0:
    dependencies:
      pkg-c: 1.0.0
  pkg-c@1.0.0:
    dependencies:
      pkg-a: 1.0.0
"#;
