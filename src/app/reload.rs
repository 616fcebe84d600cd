use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Detects changes by comparing modification times between polls.
///
/// Directories are scanned recursively. A path that appears, disappears or
/// gets a new modification time counts as a change.
#[derive(Debug)]
pub struct FileWatcher {
    paths: Vec<PathBuf>,
    snapshot: BTreeMap<PathBuf, SystemTime>,
}

impl FileWatcher {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        let snapshot = scan(&paths);
        debug!("Watching {} files", snapshot.len());
        Self { paths, snapshot }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Rescans and returns the paths that changed since the last call.
    pub fn poll(&mut self) -> Vec<PathBuf> {
        let current = scan(&self.paths);

        let mut changed: Vec<PathBuf> = current
            .iter()
            .filter(|(path, modified)| self.snapshot.get(*path) != Some(*modified))
            .map(|(path, _)| path.clone())
            .collect();
        changed.extend(
            self.snapshot
                .keys()
                .filter(|path| !current.contains_key(*path))
                .cloned(),
        );

        self.snapshot = current;
        changed
    }
}

fn scan(paths: &[PathBuf]) -> BTreeMap<PathBuf, SystemTime> {
    let mut snapshot = BTreeMap::new();
    for path in paths {
        collect(path, &mut snapshot);
    }
    snapshot
}

fn collect(path: &Path, snapshot: &mut BTreeMap<PathBuf, SystemTime>) {
    let Ok(metadata) = std::fs::metadata(path) else {
        return;
    };

    if metadata.is_dir() {
        let Ok(entries) = std::fs::read_dir(path) else {
            return;
        };
        for entry in entries.flatten() {
            collect(&entry.path(), snapshot);
        }
    } else if let Ok(modified) = metadata.modified() {
        snapshot.insert(path.to_path_buf(), modified);
    }
}
