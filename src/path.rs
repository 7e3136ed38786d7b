//! Flat path helpers.
//!
//! Paths are `:`-joined segments (`db:servers:2:host`). Comparisons fold ASCII
//! case, so `Db:Host` and `db:host` address the same entry.

pub const SEPARATOR: char = ':';

/// Join a prefix and a segment. An empty prefix yields the bare segment.
pub fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}{SEPARATOR}{segment}")
    }
}

/// Case-folded lookup key for a path.
pub fn key_of(path: &str) -> String {
    path.to_ascii_lowercase()
}

/// Translate an external section address (`db/servers/0`) into the internal
/// form (`db:servers:0`), trimming stray separators at either end.
pub fn normalize(external: &str) -> String {
    external
        .trim()
        .replace('/', ":")
        .trim_matches(SEPARATOR)
        .to_string()
}

/// True when `path` is `section` itself or lies underneath it.
/// An empty section contains every path.
pub fn is_within(path: &str, section: &str) -> bool {
    if section.is_empty() {
        return true;
    }
    if path.len() < section.len() || !path.is_char_boundary(section.len()) {
        return false;
    }
    let (head, tail) = path.split_at(section.len());
    head.eq_ignore_ascii_case(section) && (tail.is_empty() || tail.starts_with(SEPARATOR))
}

/// True when `path` lies strictly underneath `ancestor`.
pub fn is_below(path: &str, ancestor: &str) -> bool {
    is_within(path, ancestor) && path.len() > ancestor.len()
}

/// Path of `path` relative to `section`, or `None` if it lies outside it.
/// The section itself maps to the empty path.
pub fn relative<'a>(path: &'a str, section: &str) -> Option<&'a str> {
    if !is_within(path, section) {
        return None;
    }
    if section.is_empty() {
        return Some(path);
    }
    Some(path[section.len()..].trim_start_matches(SEPARATOR))
}

/// Every prefix of `path` that ends right before an array index segment.
/// `a:items:2:tags:0` yields `a:items` and `a:items:2:tags`.
pub fn collection_prefixes(path: &str) -> Vec<&str> {
    let mut prefixes = Vec::new();
    let mut offset = 0;
    for segment in path.split(SEPARATOR) {
        if offset > 0 && is_index(segment) {
            prefixes.push(&path[..offset - 1]);
        }
        offset += segment.len() + 1;
    }
    prefixes
}

pub fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// First segment of a path, i.e. the top-level section it belongs to.
pub fn root_segment(path: &str) -> &str {
    path.split(SEPARATOR).next().unwrap_or(path)
}
