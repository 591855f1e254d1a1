//! Workspace link resolution. Pure string arithmetic over project paths,
//! no filesystem access: the lockfile is the only source of truth.

/// Resolve a `link:`-style specifier declared in `source` to the target
/// project path, or `None` when nothing sensible can be made of it.
///
/// Standard segment-wise `..`/`.` resolution relative to the source's own
/// path, with ascent clamped at the workspace root. The root project (`.`)
/// starts from an empty segment list, so `./x`, `../x` and any deeper
/// `../../x` all collapse to `x` (the root has no parent to ascend past,
/// a lockfile authoring convention).
pub fn resolve_link_path(source: &str, spec: &str) -> Option<String> {
    let target = spec.strip_prefix("link:").unwrap_or(spec);
    if target.is_empty() {
        return None;
    }

    let mut segs: Vec<&str> = source.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    for part in target.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                // cannot ascend past the workspace root
                segs.pop();
            }
            seg => segs.push(seg),
        }
    }

    Some(if segs.is_empty() {
        ".".to_string()
    } else {
        segs.join("/")
    })
}

/// Resolve a `file:` token denoting an injected workspace package to its
/// originating project path. The token may carry bound peer qualifiers,
/// everything from the first unmatched `(` on is dropped before resolution.
pub fn resolve_injected_path(source: &str, spec: &str) -> Option<String> {
    let target = spec.strip_prefix("file:")?;
    let target = match target.find('(') {
        Some(paren) => &target[..paren],
        None => target,
    };
    if target.is_empty() {
        return None;
    }

    resolve_link_path(source, target)
}
