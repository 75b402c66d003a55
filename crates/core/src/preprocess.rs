//! Extension-keyed filter pipeline
//!
//! Files whose path matches a preprocess mask are run through the filters
//! registered for their extension before fingerprinting and upload. Output
//! is memoized per source path for the duration of a deploy, so the
//! fingerprint pass and the upload pass observe identical bytes even when a
//! filter is not pure.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use md5::{Digest, Md5};

use crate::error::DeployError;
use crate::pattern::PatternSet;

/// A content transformation, e.g. a minifier.
///
/// Implemented for any `Fn(&[u8], &Path) -> Vec<u8>` closure; `path` is the
/// original source path for filters that care about it.
pub trait ContentFilter: Send + Sync {
    fn apply(&self, content: &[u8], path: &Path) -> Vec<u8>;
}

impl<F> ContentFilter for F
where
    F: Fn(&[u8], &Path) -> Vec<u8> + Send + Sync,
{
    fn apply(&self, content: &[u8], path: &Path) -> Vec<u8> {
        self(content, path)
    }
}

struct FilterEntry {
    filter: Arc<dyn ContentFilter>,
    cached: bool,
}

/// Applies registered filter pipelines and owns the resulting temp files
/// until [`Preprocessor::cleanup`].
pub struct Preprocessor {
    temp_dir: PathBuf,
    masks: PatternSet,
    filters: HashMap<String, Vec<FilterEntry>>,
    /// source path → preprocessed temp file, for the current deploy
    memo: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl Preprocessor {
    #[must_use]
    pub fn new(temp_dir: impl Into<PathBuf>, masks: PatternSet) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            masks,
            filters: HashMap::new(),
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Register `filter` for files with `extension` (without the dot).
    /// Filters run in registration order; `cached` steps serve repeated
    /// content from an on-disk cache that survives across deploys.
    pub fn register(&mut self, extension: &str, filter: Arc<dyn ContentFilter>, cached: bool) {
        self.filters
            .entry(extension.to_lowercase())
            .or_default()
            .push(FilterEntry { filter, cached });
    }

    /// Run the pipeline for `abs_path`; the rooted `rel_path` decides mask
    /// eligibility. Returns `abs_path` untouched when no filter applies, so
    /// most files never touch the temp directory.
    ///
    /// # Errors
    /// Returns an error if the file or the temp directory cannot be used.
    pub fn run(&self, abs_path: &Path, rel_path: &str) -> Result<PathBuf, DeployError> {
        let extension = abs_path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        let Some(pipeline) = extension.as_deref().and_then(|e| self.filters.get(e)) else {
            return Ok(abs_path.to_path_buf());
        };
        if !self.masks.matches(rel_path, false) {
            return Ok(abs_path.to_path_buf());
        }

        if let Some(output) = self.memo.lock().unwrap().get(abs_path) {
            return Ok(output.clone());
        }

        let err = |e| DeployError::local(abs_path, e);
        let mut content = fs::read(abs_path).map_err(err)?;

        fs::create_dir_all(&self.temp_dir).map_err(|e| DeployError::local(&self.temp_dir, e))?;
        for (position, entry) in pipeline.iter().enumerate() {
            if entry.cached {
                let cache_path = self.temp_dir.join(cache_key(position, &content));
                if let Ok(hit) = fs::read(&cache_path) {
                    content = hit;
                    continue;
                }
                content = entry.filter.apply(&content, abs_path);
                fs::write(&cache_path, &content)
                    .map_err(|e| DeployError::local(&cache_path, e))?;
            } else {
                content = entry.filter.apply(&content, abs_path);
            }
        }

        let output = self.write_temp(&content)?;
        self.memo
            .lock()
            .unwrap()
            .insert(abs_path.to_path_buf(), output.clone());
        Ok(output)
    }

    fn write_temp(&self, content: &[u8]) -> Result<PathBuf, DeployError> {
        let err = |e| DeployError::local(&self.temp_dir, e);
        let mut file = tempfile::Builder::new()
            .prefix("preprocess-")
            .tempfile_in(&self.temp_dir)
            .map_err(err)?;
        file.write_all(content).map_err(err)?;
        let (_, path) = file.keep().map_err(|e| DeployError::local(&self.temp_dir, e.error))?;
        Ok(path)
    }

    /// Delete the temp files produced during this deploy. The content cache
    /// stays in place for the next run.
    pub fn cleanup(&self) {
        let mut memo = self.memo.lock().unwrap();
        for (_, output) in memo.drain() {
            let _ = fs::remove_file(output);
        }
    }
}

fn cache_key(position: usize, content: &[u8]) -> String {
    let digest = Md5::digest(content);
    format!("cache-{position}-{}", hex::encode(digest))
}
