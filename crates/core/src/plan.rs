//! Deploy planning: diff two tree states into ordered operation lists

use std::cmp::Ordering;

use crate::filemap::FileMap;

/// Planned operations for one deploy.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Paths to upload: each directory's contents contiguous, directories
    /// before the files beside them, the manifest strictly last
    pub uploads: Vec<String>,
    /// Paths to delete, children before their parents
    pub deletes: Vec<String>,
    /// Whether local and remote state differ at all
    pub manifest_changed: bool,
}

/// Diff `local` against `remote`.
///
/// `allow_delete` gates the delete list. Presence-only differences still
/// mark the manifest as changed; when it changed, `manifest_path` is
/// appended as the final upload so it commits only after every content
/// upload did.
#[must_use]
pub fn plan(local: &FileMap, remote: &FileMap, allow_delete: bool, manifest_path: &str) -> Plan {
    let mut uploads: Vec<String> = local
        .iter()
        .filter(|(path, fingerprint)| remote.get(path) != Some(*fingerprint))
        .map(|(path, _)| path.to_string())
        .collect();
    uploads.sort_by(|a, b| upload_order(a, b));

    let mut deletes: Vec<String> = if allow_delete {
        remote
            .iter()
            .filter(|(path, _)| !local.contains(path))
            .map(|(path, _)| path.to_string())
            .collect()
    } else {
        Vec::new()
    };
    deletes.sort_by(|a, b| b.cmp(a));

    let manifest_changed = local != remote;
    if manifest_changed {
        uploads.push(manifest_path.to_string());
    }

    Plan {
        uploads,
        deletes,
        manifest_changed,
    }
}

/// Depth-first order with directories before files, so directories are
/// created at most once and always before their contents.
fn upload_order(a: &str, b: &str) -> Ordering {
    let mut left = components(a).into_iter();
    let mut right = components(b).into_iter();
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match x.cmp(&y) {
                Ordering::Equal => {}
                other => return other,
            },
        }
    }
}

/// Path components tagged `(is_file, name)`; only the final component of a
/// file path is a file component, and `false < true` puts directories first.
fn components(path: &str) -> Vec<(bool, &str)> {
    let is_dir_path = path.ends_with('/');
    let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
    let last = parts.len() - 1;
    parts
        .iter()
        .enumerate()
        .map(|(i, name)| (i == last && !is_dir_path, *name))
        .collect()
}
