use crate::path;
use crate::snapshot::Snapshot;

/// Layer `overlay` on top of `base`, key by key; `overlay`'s entries win.
///
/// Two structural rules keep the result bindable:
/// - a null in `overlay` clears everything `base` holds beneath that path;
/// - a collection `overlay` touches replaces `base`'s collection wholesale,
///   so a shorter list never inherits trailing elements from below.
pub fn overlay(base: Snapshot, overlay: &Snapshot) -> Snapshot {
    if overlay.is_empty() {
        return base;
    }

    let cleared: Vec<&str> = overlay
        .iter()
        .filter(|e| e.value.is_none())
        .map(|e| e.path.as_str())
        .collect();

    let mut merged: Snapshot = base
        .into_iter()
        .filter(|entry| {
            if overlay.contains(&entry.path) {
                return false;
            }
            if cleared.iter().any(|c| path::is_below(&entry.path, c)) {
                return false;
            }
            !path::collection_prefixes(&entry.path)
                .into_iter()
                .any(|collection| overlay.paths().any(|p| path::is_below(p, collection)))
        })
        .collect();

    for entry in overlay {
        merged.insert(entry.clone());
    }
    merged
}
