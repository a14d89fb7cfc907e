use std::path::Path;
use walkdir::WalkDir;

/// Every leaf file below `root`, as `/`-separated paths relative to `root`.
/// Directories are descended into but never returned. Unreadable entries are
/// skipped with a warning.
pub fn scan_leaves(root: &Path) -> Vec<String> {
    let mut ids = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let id = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !id.is_empty() {
            ids.push(id);
        }
    }

    ids
}
