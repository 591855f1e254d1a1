//! This file describe errors may meet.

use std::fmt::Display;

#[derive(Debug)]
pub enum AuditError {
    /// Lockfile misses its required top-level shape, nothing can be analyzed.
    MalformedLockfile(String),
    /// One package id string cannot be decomposed.
    PackageIdParse(String),
    /// No built tree for the requested project path.
    ProjectNotFound(String),
    /// The id is indexed, but no path from the requested project reaches it.
    PathNotFound { project: String, id: String },
    /// Not our issues, e.g. the lockfile cannot be read at all.
    Unexpected(String),
}

impl AuditError {
    /// Fatal errors abort the whole analysis, others are per-query.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::MalformedLockfile(_) | Self::Unexpected(_) => true,
            _ => false,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unexpected(_) => -1,
            _ => -2,
        }
    }
}

impl Display for AuditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedLockfile(msg) => write!(f, "malformed lockfile: {msg}"),
            Self::PackageIdParse(msg) => write!(f, "cannot parse package id: {msg}"),
            Self::ProjectNotFound(path) => write!(f, "project not found in lockfile: {path}"),
            Self::PathNotFound { project, id } => {
                write!(f, "no dependency path from '{project}' reaches '{id}'")
            }
            Self::Unexpected(msg) => write!(f, "unexpected error: {msg}"),
        }
    }
}
