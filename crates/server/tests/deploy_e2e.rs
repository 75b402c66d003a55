//! End-to-end deploy scenarios against a real filesystem target

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use htdeploy_core::{
    manifest, Deployer, DeployerBuilder, Fingerprint, Job, Logger, NullLogger, Severity,
};
use htdeploy_server::LocalServer;

struct RecordingLogger {
    lines: Arc<Mutex<Vec<(String, Severity)>>>,
}

impl Logger for RecordingLogger {
    fn log(&self, message: &str, severity: Severity) {
        self.lines
            .lock()
            .unwrap()
            .push((message.to_string(), severity));
    }
}

struct Site {
    /// holds local tree, remote tree and temp dir
    root: TempDir,
}

impl Site {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("web/sub")).unwrap();
        fs::write(root.path().join("web/a.txt"), "").unwrap();
        fs::write(root.path().join("web/sub/b.txt"), "").unwrap();
        Self { root }
    }

    fn local(&self) -> std::path::PathBuf {
        self.root.path().join("web")
    }

    fn remote(&self) -> std::path::PathBuf {
        self.root.path().join("remote")
    }

    fn builder(&self) -> DeployerBuilder {
        self.builder_with(Box::new(NullLogger))
    }

    fn builder_with(&self, logger: Box<dyn Logger>) -> DeployerBuilder {
        Deployer::builder(self.local(), Box::new(LocalServer::new(self.remote())), logger)
            .temp_dir(self.root.path().join("tmp"))
    }

    fn remote_manifest(&self) -> htdeploy_core::FileMap {
        let bytes = fs::read(self.remote().join(".htdeployment")).unwrap();
        manifest::decode(&bytes).unwrap()
    }
}

fn recording_logger() -> (Box<RecordingLogger>, Arc<Mutex<Vec<(String, Severity)>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    (
        Box::new(RecordingLogger {
            lines: Arc::clone(&lines),
        }),
        lines,
    )
}

fn assert_no_deploy_residue(remote: &Path) {
    for entry in walk(remote) {
        let name = entry.file_name().unwrap().to_string_lossy().into_owned();
        assert!(!name.ends_with(".deploytmp"), "staged file left: {name}");
        assert!(!name.ends_with(".running"), "running marker left: {name}");
    }
}

fn walk(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut paths = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                paths.extend(walk(&path));
            }
            paths.push(path);
        }
    }
    paths
}

#[test]
fn test_first_deploy_publishes_tree() {
    let site = Site::new();
    let report = site.builder().build().unwrap().deploy().unwrap();

    // /sub/, /sub/b.txt, /a.txt, manifest
    assert_eq!(report.uploaded, 4);
    assert_eq!(report.deleted, 0);

    assert_eq!(fs::read(site.remote().join("a.txt")).unwrap(), b"");
    assert_eq!(fs::read(site.remote().join("sub/b.txt")).unwrap(), b"");
    assert_no_deploy_residue(&site.remote());

    let map = site.remote_manifest();
    assert_eq!(map.len(), 3);
    assert_eq!(map.get("/sub/"), Some(&Fingerprint::Dir));
    assert_eq!(
        map.get("/a.txt").unwrap().to_tag(),
        "d41d8cd98f00b204e9800998ecf8427e"
    );
}

#[test]
fn test_redeploy_is_idempotent() {
    let site = Site::new();
    site.builder().build().unwrap().deploy().unwrap();

    let (logger, lines) = recording_logger();
    let report = site.builder_with(logger).build().unwrap().deploy().unwrap();

    assert_eq!(report.uploaded, 0);
    assert!(lines
        .lock()
        .unwrap()
        .iter()
        .any(|(m, s)| m == "Already synchronized." && *s == Severity::Success));
    assert_no_deploy_residue(&site.remote());
}

#[test]
fn test_modified_file_uploads_file_and_manifest() {
    let site = Site::new();
    site.builder().build().unwrap().deploy().unwrap();

    fs::write(site.local().join("a.txt"), "changed").unwrap();
    let report = site.builder().build().unwrap().deploy().unwrap();

    // the file plus the manifest
    assert_eq!(report.uploaded, 2);
    assert_eq!(fs::read(site.remote().join("a.txt")).unwrap(), b"changed");
    assert_eq!(
        site.remote_manifest().get("/a.txt"),
        Some(&Fingerprint::from_bytes(b"changed"))
    );
}

#[test]
fn test_delete_gated_off_keeps_remote_file() {
    let site = Site::new();
    site.builder().build().unwrap().deploy().unwrap();

    fs::remove_file(site.local().join("sub/b.txt")).unwrap();
    fs::remove_dir(site.local().join("sub")).unwrap();

    // manifest reflects the new state, nothing is removed
    let report = site.builder().build().unwrap().deploy().unwrap();
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.deleted, 0);
    assert!(site.remote().join("sub/b.txt").exists());
    assert!(!site.remote_manifest().contains("/sub/b.txt"));
}

#[test]
fn test_delete_allowed_removes_children_then_parent() {
    let site = Site::new();
    site.builder().build().unwrap().deploy().unwrap();

    fs::remove_file(site.local().join("sub/b.txt")).unwrap();
    fs::remove_dir(site.local().join("sub")).unwrap();

    let report = site
        .builder()
        .allow_delete(true)
        .build()
        .unwrap()
        .deploy()
        .unwrap();

    // only the manifest uploads, the file and its directory go away
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.deleted, 2);
    assert!(!site.remote().join("sub").exists());
    assert!(!site.remote_manifest().contains("/sub/"));
}

#[test]
fn test_ignore_masks_with_negation() {
    let site = Site::new();
    fs::write(site.local().join("a.log"), "noise").unwrap();
    fs::write(site.local().join("keep.log"), "keep").unwrap();

    site.builder()
        .ignore_masks(vec!["*.log".to_string(), "!keep.log".to_string()])
        .build()
        .unwrap()
        .deploy()
        .unwrap();

    assert!(!site.remote().join("a.log").exists());
    assert_eq!(fs::read(site.remote().join("keep.log")).unwrap(), b"keep");
}

#[cfg(unix)]
#[test]
fn test_failing_pre_job_leaves_remote_untouched() {
    let site = Site::new();
    let result = site
        .builder()
        .pre_jobs(vec![
            Job::parse("local: true").unwrap(),
            Job::parse("local: false").unwrap(),
        ])
        .build()
        .unwrap()
        .deploy();

    assert!(result.is_err());
    // the target directory exists (connect creates it) but is empty
    assert_eq!(fs::read_dir(site.remote()).unwrap().count(), 0);
}

#[test]
fn test_purge_clears_directory_contents() {
    let site = Site::new();
    fs::create_dir_all(site.local().join("cache")).unwrap();
    site.builder().build().unwrap().deploy().unwrap();

    // something accumulates inside the deployed cache dir, and a local
    // change makes the next run a real deploy
    fs::write(site.remote().join("cache/stale.bin"), "x").unwrap();
    fs::write(site.local().join("a.txt"), "v2").unwrap();

    site.builder()
        .purge(vec!["cache".to_string()])
        .build()
        .unwrap()
        .deploy()
        .unwrap();

    assert!(site.remote().join("cache").is_dir());
    assert_eq!(fs::read_dir(site.remote().join("cache")).unwrap().count(), 0);
}

#[test]
fn test_preprocessed_content_is_uploaded() {
    let site = Site::new();
    fs::write(site.local().join("site.css"), "body  {}").unwrap();

    let uppercase =
        Arc::new(|content: &[u8], _path: &Path| content.to_ascii_uppercase());

    site.builder()
        .preprocess_masks(vec!["*.css".to_string()])
        .filter("css", uppercase, true)
        .build()
        .unwrap()
        .deploy()
        .unwrap();

    assert_eq!(fs::read(site.remote().join("site.css")).unwrap(), b"BODY  {}");
    assert_eq!(
        site.remote_manifest().get("/site.css"),
        Some(&Fingerprint::from_bytes(b"BODY  {}"))
    );

    // a re-deploy sees no change: fingerprints are over preprocessed bytes
    let (logger, lines) = recording_logger();
    site.builder_with(logger)
        .preprocess_masks(vec!["*.css".to_string()])
        .filter(
            "css",
            Arc::new(|content: &[u8], _path: &Path| content.to_ascii_uppercase()),
            true,
        )
        .build()
        .unwrap()
        .deploy()
        .unwrap();
    assert!(lines
        .lock()
        .unwrap()
        .iter()
        .any(|(m, _)| m == "Already synchronized."));
}

#[test]
fn test_custom_manifest_name() {
    let site = Site::new();
    site.builder()
        .manifest_name(".deployed.state")
        .build()
        .unwrap()
        .deploy()
        .unwrap();

    assert!(site.remote().join(".deployed.state").exists());
    assert!(!site.remote().join(".htdeployment").exists());
}

#[cfg(unix)]
#[test]
fn test_remote_post_job_runs_in_target() {
    let site = Site::new();
    site.builder()
        .post_jobs(vec![Job::parse("remote: touch deployed.flag").unwrap()])
        .build()
        .unwrap()
        .deploy()
        .unwrap();

    assert!(site.remote().join("deployed.flag").exists());
}
