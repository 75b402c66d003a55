//! Local tree scanning

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::DeployError;
use crate::filemap::FileMap;
use crate::fingerprint::Fingerprint;
use crate::logger::{Logger, Severity};
use crate::pattern::PatternSet;
use crate::preprocess::Preprocessor;

/// Scanner for the local deployment root.
pub struct Scanner {
    root: PathBuf,
    ignore: PatternSet,
}

impl Scanner {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore: PatternSet::empty(),
        }
    }

    /// Set the ignore masks.
    #[must_use]
    pub fn ignore(mut self, masks: PatternSet) -> Self {
        self.ignore = masks;
        self
    }

    /// Walk the tree depth-first and fingerprint every surviving file.
    ///
    /// Ignored entries emit a log line and, for directories, prune the whole
    /// subtree. Unreadable and non-UTF-8 entries are skipped; symlinks are
    /// not replicated. Output is deterministic for a given filesystem state.
    ///
    /// # Errors
    /// Returns an error if preprocessing fails.
    pub fn scan(
        &self,
        preprocessor: &Preprocessor,
        logger: &dyn Logger,
    ) -> Result<FileMap, DeployError> {
        let mut map = FileMap::new();
        let mut files: Vec<(String, PathBuf)> = Vec::new();

        let mut walker = WalkDir::new(&self.root).sort_by_file_name().into_iter();
        loop {
            let entry = match walker.next() {
                None => break,
                Some(Ok(entry)) => entry,
                // unreadable entry
                Some(Err(_)) => continue,
            };
            if entry.depth() == 0 {
                continue;
            }
            let Some(rel) = rooted_path(&self.root, entry.path()) else {
                continue;
            };

            let is_dir = entry.file_type().is_dir();
            if self.ignore.matches(&rel, is_dir) {
                logger.log(&format!("Ignoring {rel}"), Severity::Ignored);
                if is_dir {
                    walker.skip_current_dir();
                }
                continue;
            }

            if is_dir {
                map.insert(format!("{rel}/"), Fingerprint::Dir);
            } else if entry.file_type().is_file() {
                files.push((rel, entry.into_path()));
            }
        }

        let total = files.len();
        for (n, (rel, abs)) in files.into_iter().enumerate() {
            logger.step(n + 1, total, &rel);
            let processed = preprocessor.run(&abs, &rel)?;
            match Fingerprint::from_file(&processed) {
                Ok(fingerprint) => map.insert(rel, fingerprint),
                // vanished or unreadable since the walk
                Err(_) => continue,
            }
        }

        Ok(map)
    }
}

/// `/`-rooted relative path of `path` under `root`; `None` when the path is
/// outside the root or not valid UTF-8.
fn rooted_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let rel = rel.to_str()?;
    Some(format!("/{}", rel.replace('\\', "/")))
}
