//! The deploy protocol
//!
//! One deploy runs: connect, local pre-jobs, remote manifest load, scan,
//! plan, running marker, remote pre-jobs, staged uploads to `.deploytmp`,
//! rename-to-commit with the manifest last, gated deletes, purges,
//! post-jobs, marker removal. Up to the rename phase the live remote tree
//! is untouched; after it, the tree is fully the new one minus pending
//! deletes and purges.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::DeployError;
use crate::filemap::FileMap;
use crate::job::{run_jobs, Job};
use crate::logger::{Logger, Severity};
use crate::manifest::{self, MANIFEST_NAME, RUNNING_SUFFIX, TEMP_SUFFIX};
use crate::pattern::PatternSet;
use crate::plan::{plan, Plan};
use crate::preprocess::{ContentFilter, Preprocessor};
use crate::scan::Scanner;
use crate::server::Server;

/// Outcome summary of a successful deploy.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployReport {
    /// Entries uploaded, directories and manifest included
    pub uploaded: usize,
    /// Entries removed from the remote
    pub deleted: usize,
    pub elapsed: Duration,
}

/// Orchestrates one end-to-end deploy. Owns the server and logger for its
/// duration; construct with [`Deployer::builder`].
pub struct Deployer {
    server: Box<dyn Server>,
    logger: Box<dyn Logger>,
    local_dir: PathBuf,
    ignore: PatternSet,
    preprocessor: Preprocessor,
    pre_jobs: Vec<Job>,
    post_jobs: Vec<Job>,
    purge_paths: Vec<String>,
    manifest_name: String,
    temp_dir: PathBuf,
    allow_delete: bool,
    test_mode: bool,
}

/// Wires a [`Deployer`] together from the injected server and logger plus
/// the deploy options.
pub struct DeployerBuilder {
    server: Box<dyn Server>,
    logger: Box<dyn Logger>,
    local_dir: PathBuf,
    ignore_masks: Vec<String>,
    preprocess_masks: Vec<String>,
    filters: Vec<(String, Arc<dyn ContentFilter>, bool)>,
    pre_jobs: Vec<Job>,
    post_jobs: Vec<Job>,
    purge_paths: Vec<String>,
    manifest_name: String,
    temp_dir: Option<PathBuf>,
    allow_delete: bool,
    test_mode: bool,
}

impl DeployerBuilder {
    #[must_use]
    pub fn ignore_masks(mut self, masks: Vec<String>) -> Self {
        self.ignore_masks = masks;
        self
    }

    #[must_use]
    pub fn preprocess_masks(mut self, masks: Vec<String>) -> Self {
        self.preprocess_masks = masks;
        self
    }

    /// Register a content filter for `extension` (without the dot).
    #[must_use]
    pub fn filter(mut self, extension: &str, filter: Arc<dyn ContentFilter>, cached: bool) -> Self {
        self.filters.push((extension.to_string(), filter, cached));
        self
    }

    #[must_use]
    pub fn pre_jobs(mut self, jobs: Vec<Job>) -> Self {
        self.pre_jobs = jobs;
        self
    }

    #[must_use]
    pub fn post_jobs(mut self, jobs: Vec<Job>) -> Self {
        self.post_jobs = jobs;
        self
    }

    /// Remote directories whose contents are cleared after deletes, the
    /// directories themselves kept.
    #[must_use]
    pub fn purge(mut self, paths: Vec<String>) -> Self {
        self.purge_paths = paths;
        self
    }

    #[must_use]
    pub fn manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    #[must_use]
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn allow_delete(mut self, allow: bool) -> Self {
        self.allow_delete = allow;
        self
    }

    /// Plan and log only; make no remote change.
    #[must_use]
    pub fn test_mode(mut self, test: bool) -> Self {
        self.test_mode = test;
        self
    }

    /// Validate the configuration and build the deployer.
    ///
    /// # Errors
    /// Returns a config error if the local directory is missing, a mask does
    /// not compile, or the temp directory cannot be created.
    pub fn build(self) -> Result<Deployer, DeployError> {
        if !self.local_dir.is_dir() {
            return Err(DeployError::Config(format!(
                "local directory not found: {}",
                self.local_dir.display()
            )));
        }

        let ignore = PatternSet::new(&self.ignore_masks)?;
        let preprocess = PatternSet::new(&self.preprocess_masks)?;

        let temp_dir = self
            .temp_dir
            .unwrap_or_else(|| std::env::temp_dir().join("htdeploy"));
        std::fs::create_dir_all(&temp_dir).map_err(|e| DeployError::local(&temp_dir, e))?;

        let mut preprocessor = Preprocessor::new(&temp_dir, preprocess);
        for (extension, filter, cached) in self.filters {
            preprocessor.register(&extension, filter, cached);
        }

        Ok(Deployer {
            server: self.server,
            logger: self.logger,
            local_dir: self.local_dir,
            ignore,
            preprocessor,
            pre_jobs: self.pre_jobs,
            post_jobs: self.post_jobs,
            purge_paths: self.purge_paths,
            manifest_name: self.manifest_name,
            temp_dir,
            allow_delete: self.allow_delete,
            test_mode: self.test_mode,
        })
    }
}

impl Deployer {
    #[must_use]
    pub fn builder(
        local_dir: impl Into<PathBuf>,
        server: Box<dyn Server>,
        logger: Box<dyn Logger>,
    ) -> DeployerBuilder {
        DeployerBuilder {
            server,
            logger,
            local_dir: local_dir.into(),
            ignore_masks: Vec::new(),
            preprocess_masks: Vec::new(),
            filters: Vec::new(),
            pre_jobs: Vec::new(),
            post_jobs: Vec::new(),
            purge_paths: Vec::new(),
            manifest_name: MANIFEST_NAME.to_string(),
            temp_dir: None,
            allow_delete: false,
            test_mode: false,
        }
    }

    /// Run one deploy.
    ///
    /// # Errors
    /// Fatal failures unwind immediately; the running marker is left in
    /// place so the next operator sees evidence of the failure.
    pub fn deploy(&mut self) -> Result<DeployReport, DeployError> {
        let started = Instant::now();

        self.server.connect()?;
        let root = self.server.get_dir();
        let manifest_path = format!("/{}", self.manifest_name);
        let running_path = format!("{manifest_path}{RUNNING_SUFFIX}");

        let (local_jobs, before_jobs): (Vec<_>, Vec<_>) =
            self.pre_jobs.clone().into_iter().partition(Job::is_local);
        run_jobs(&local_jobs, self.server.as_mut(), self.logger.as_ref())?;

        let remote = self.load_remote_manifest(&root, &manifest_path);

        self.logger.log(
            &format!("Scanning {}", self.local_dir.display()),
            Severity::Info,
        );
        let mut local = Scanner::new(&self.local_dir)
            .ignore(self.ignore.clone())
            .scan(&self.preprocessor, self.logger.as_ref())?;
        local.remove(&manifest_path);
        local.remove(&running_path);

        let plan = plan(&local, &remote, self.allow_delete, &manifest_path);
        if plan.uploads.is_empty() && plan.deletes.is_empty() {
            self.logger.log("Already synchronized.", Severity::Success);
            return Ok(DeployReport {
                uploaded: 0,
                deleted: 0,
                elapsed: started.elapsed(),
            });
        }

        let staged_manifest = if plan.manifest_changed {
            Some(self.stage_manifest(&local)?)
        } else {
            None
        };

        if self.test_mode {
            self.log_test_plan(&plan);
            if let Some(staged) = staged_manifest {
                let _ = std::fs::remove_file(staged);
            }
            self.preprocessor.cleanup();
            return Ok(DeployReport {
                uploaded: 0,
                deleted: 0,
                elapsed: started.elapsed(),
            });
        }

        self.write_running_marker(&root, &running_path)?;
        run_jobs(&before_jobs, self.server.as_mut(), self.logger.as_ref())?;

        let renames = self.upload_phase(&root, &plan, staged_manifest.as_deref())?;
        self.rename_phase(&root, &renames)?;
        let deleted = self.delete_phase(&root, &plan.deletes);
        self.purge_phase(&root);

        let post_jobs = self.post_jobs.clone();
        run_jobs(&post_jobs, self.server.as_mut(), self.logger.as_ref())?;

        if let Err(err) = self.server.remove_file(&format!("{root}{running_path}")) {
            // the deploy itself has committed at this point
            self.logger.log(
                &format!("Unable to remove running marker: {err}"),
                Severity::Warning,
            );
        }

        self.preprocessor.cleanup();
        if let Some(staged) = staged_manifest {
            let _ = std::fs::remove_file(staged);
        }

        Ok(DeployReport {
            uploaded: plan.uploads.len(),
            deleted,
            elapsed: started.elapsed(),
        })
    }

    /// Absent, unreadable or malformed manifests read as an empty map,
    /// turning the run into a first-time deploy.
    fn load_remote_manifest(&mut self, root: &str, manifest_path: &str) -> FileMap {
        let Ok(dest) = tempfile::NamedTempFile::new_in(&self.temp_dir) else {
            return FileMap::new();
        };
        if self
            .server
            .read_file(&format!("{root}{manifest_path}"), dest.path())
            .is_err()
        {
            self.logger.log(
                "Remote manifest not found, assuming first deployment.",
                Severity::Warning,
            );
            return FileMap::new();
        }
        let Ok(bytes) = std::fs::read(dest.path()) else {
            return FileMap::new();
        };
        match manifest::decode(&bytes) {
            Ok(map) => map,
            Err(err) => {
                self.logger.log(
                    &format!("Malformed remote manifest ({err}), assuming first deployment."),
                    Severity::Warning,
                );
                FileMap::new()
            }
        }
    }

    fn stage_manifest(&self, local: &FileMap) -> Result<PathBuf, DeployError> {
        let err = |e| DeployError::local(&self.temp_dir, e);
        let bytes = manifest::encode(local).map_err(err)?;
        let mut file = tempfile::Builder::new()
            .prefix("manifest-")
            .tempfile_in(&self.temp_dir)
            .map_err(err)?;
        file.write_all(&bytes).map_err(err)?;
        let (_, path) = file.keep().map_err(|e| DeployError::local(&self.temp_dir, e.error))?;
        Ok(path)
    }

    fn log_test_plan(&self, plan: &Plan) {
        self.logger
            .log("Test mode, no remote changes made.", Severity::Warning);
        for path in &plan.uploads {
            self.logger.log(&format!("Would upload {path}"), Severity::Info);
        }
        for path in &plan.deletes {
            self.logger
                .log(&format!("Would delete {path}"), Severity::Warning);
        }
    }

    fn write_running_marker(&mut self, root: &str, running_path: &str) -> Result<(), DeployError> {
        let marker = tempfile::NamedTempFile::new_in(&self.temp_dir)
            .map_err(|e| DeployError::local(&self.temp_dir, e))?;
        self.server
            .write_file(marker.path(), &format!("{root}{running_path}"), None)?;
        Ok(())
    }

    /// Upload every planned entry to its `.deploytmp` twin, creating parent
    /// directories at most once. Returns the rename list in upload order.
    fn upload_phase(
        &mut self,
        root: &str,
        plan: &Plan,
        staged_manifest: Option<&Path>,
    ) -> Result<Vec<String>, DeployError> {
        let manifest_path = format!("/{}", self.manifest_name);
        let Self {
            server,
            logger,
            preprocessor,
            local_dir,
            ..
        } = self;

        let total = plan.uploads.len();
        let mut created: HashSet<String> = HashSet::new();
        let mut renames = Vec::new();

        for (n, path) in plan.uploads.iter().enumerate() {
            logger.step(n + 1, total, path);

            if path.ends_with('/') {
                server.create_dir(&format!("{root}{path}"))?;
                created.insert(path.clone());
                continue;
            }

            let parent = parent_dir(path);
            if parent != "/" && created.insert(parent.clone()) {
                server.create_dir(&format!("{root}{parent}"))?;
            }

            let source = if *path == manifest_path {
                match staged_manifest {
                    Some(staged) => staged.to_path_buf(),
                    // the manifest is only planned when it changed
                    None => continue,
                }
            } else {
                let abs = local_dir.join(&path[1..]);
                preprocessor.run(&abs, path)?
            };

            let logger_ref = logger.as_ref();
            server.write_file(
                &source,
                &format!("{root}{path}{TEMP_SUFFIX}"),
                Some(&mut |percent| logger_ref.bytes(percent)),
            )?;
            renames.push(path.clone());
        }

        Ok(renames)
    }

    /// Rename every staged upload onto its target, in upload order. The
    /// manifest is the final entry, making its rename the commit point.
    fn rename_phase(&mut self, root: &str, renames: &[String]) -> Result<(), DeployError> {
        for path in renames {
            self.server.rename_file(
                &format!("{root}{path}{TEMP_SUFFIX}"),
                &format!("{root}{path}"),
            )?;
        }
        Ok(())
    }

    /// Per-entry failures are logged and do not abort.
    fn delete_phase(&mut self, root: &str, deletes: &[String]) -> usize {
        let Self { server, logger, .. } = self;

        let mut deleted = 0;
        for path in deletes {
            logger.log(&format!("Deleting {path}"), Severity::Info);
            let result = if path.ends_with('/') {
                server.remove_dir(&format!("{root}{path}"))
            } else {
                server.remove_file(&format!("{root}{path}"))
            };
            match result {
                Ok(()) => deleted += 1,
                Err(err) => logger.log(&format!("Unable to delete: {err}"), Severity::Error),
            }
        }
        deleted
    }

    /// Per-path failures are logged and do not abort.
    fn purge_phase(&mut self, root: &str) {
        let Self {
            server,
            logger,
            purge_paths,
            ..
        } = self;

        for path in purge_paths {
            let remote = format!("{root}/{}", path.trim_matches('/'));
            logger.log(&format!("Purging {remote}"), Severity::Info);
            let logger_ref = logger.as_ref();
            if let Err(err) = server.purge(&remote, &mut |entry| {
                logger_ref.log(&format!("Purging {entry}"), Severity::Ignored);
            }) {
                logger.log(&format!("Unable to purge: {err}"), Severity::Error);
            }
        }
    }
}

/// Parent directory of a rooted path, with trailing `/`; `/` for top-level
/// entries.
fn parent_dir(path: &str) -> String {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => format!("{}/", &path[..idx]),
    }
}
