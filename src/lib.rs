//! Duplicate and hoisting-conflict analysis over pnpm workspace lockfiles.
//!
//! The pipeline is: parse `pnpm-lock.yaml` ([`lockfile`]), build one
//! dependency tree per workspace project with link splicing and cycle
//! guards ([`dep_tree`]), index every tree into a reverse-reachability
//! graph ([`index`]), then run detectors and path tracing on top
//! ([`detect`], [`paths`]). [`audit`] wires the stages together for the
//! CLI in `main.rs`.

pub mod audit;
pub mod dep_tree;
pub mod detect;
pub mod error;
pub mod index;
pub mod link;
pub mod lockfile;
pub mod package_id;
pub mod paths;
pub mod render;
pub mod utils;

#[cfg(test)]
mod testutil;

pub use audit::{run, AuditCommand};
pub use detect::{AuditOptions, OutputFormat};
pub use error::AuditError;
