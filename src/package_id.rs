//! Codec for the canonical textual id of one resolved package instance,
//! e.g. `react-dom@18.2.0(react@18.2.0)`. Two ids with the same name but
//! different version/qualifier strings are different instances of the same
//! logical package.

use crate::error::AuditError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPackage {
    pub name: String,
    pub version: Option<String>,
    pub scope: Option<String>,
    /// Embedded peer-dependency qualifiers, in declaration order.
    pub dependencies: Vec<(String, String)>,
}

impl ParsedPackage {
    /// Serialize back to the canonical `name[@version](dep@ver)...` form.
    pub fn encode(&self) -> String {
        let mut out = self.name.clone();
        if let Some(ver) = &self.version {
            out.push('@');
            out.push_str(ver);
        }
        for (dep, ver) in &self.dependencies {
            out.push('(');
            out.push_str(dep);
            if !ver.is_empty() {
                out.push('@');
                out.push_str(ver);
            }
            out.push(')');
        }
        out
    }
}

/// Decompose a package id string.
///
/// First strips the right-anchored sequence of balanced top-level paren
/// groups (each one a `depName@depVersion` qualifier), then splits the
/// remaining `name[@version]` prefix on its last `@`. A leading `@` marks a
/// scoped name, never a version separator.
pub fn parse(id: &str) -> Result<ParsedPackage, AuditError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AuditError::PackageIdParse("empty id".to_string()));
    }

    let mut rest = id;
    let mut groups = Vec::new();
    while rest.ends_with(')') {
        let open = matching_open(rest).ok_or_else(|| {
            AuditError::PackageIdParse(format!("unbalanced parentheses in '{id}'"))
        })?;
        groups.push(&rest[open + 1..rest.len() - 1]);
        rest = &rest[..open];
    }
    // groups were collected right-to-left
    groups.reverse();

    let mut dependencies = Vec::with_capacity(groups.len());
    for group in groups {
        // split on the *last* `@`, scoped dependency names keep their own
        match group.rfind('@') {
            Some(at) if at > 0 => {
                dependencies.push((group[..at].to_string(), group[at + 1..].to_string()))
            }
            _ => dependencies.push((group.to_string(), String::new())),
        }
    }

    let (name, version) = match rest.rfind('@') {
        Some(at) if at > 0 && at + 1 < rest.len() => {
            (&rest[..at], Some(rest[at + 1..].to_string()))
        }
        Some(at) if at > 0 => (&rest[..at], None),
        _ => (rest, None),
    };

    if name.is_empty() {
        return Err(AuditError::PackageIdParse(format!(
            "no package name in '{id}'"
        )));
    }

    let scope = if name.starts_with('@') {
        name.find('/').map(|slash| name[..slash].to_string())
    } else {
        None
    };

    Ok(ParsedPackage {
        name: name.to_string(),
        version,
        scope,
        dependencies,
    })
}

/// Bare package name of an id, e.g. `react-dom` for `react-dom@18.2.0(react@18.2.0)`.
pub fn bare_name(id: &str) -> Result<String, AuditError> {
    Ok(parse(id)?.name)
}

/// Byte offset of the `(` matching the final `)` of `s`.
fn matching_open(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in s.bytes().enumerate().rev() {
        match b {
            b')' => depth += 1,
            b'(' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
