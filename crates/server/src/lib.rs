//! htdeploy-server: filesystem-backed server implementation
//!
//! [`LocalServer`] implements the [`Server`] contract directly against a
//! local (or mounted) directory. It serves deploys onto mounted targets and
//! doubles as the reference implementation for end-to-end tests.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use htdeploy_core::{ProgressFn, Server, ServerError};

/// Server rooted at a base directory on the local filesystem.
///
/// Remote path strings are resolved beneath the base, so [`Server::get_dir`]
/// reports an empty root.
pub struct LocalServer {
    base: PathBuf,
}

impl LocalServer {
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn resolve(&self, remote: &str) -> PathBuf {
        self.base.join(remote.trim_matches('/'))
    }
}

impl Server for LocalServer {
    fn connect(&mut self) -> Result<(), ServerError> {
        fs::create_dir_all(&self.base)
            .map_err(|e| ServerError::new("connect", self.base.display(), e))
    }

    fn get_dir(&self) -> String {
        String::new()
    }

    fn read_file(&mut self, remote_path: &str, local_dest: &Path) -> Result<(), ServerError> {
        fs::copy(self.resolve(remote_path), local_dest)
            .map(|_| ())
            .map_err(|e| ServerError::new("download", remote_path, e))
    }

    fn write_file(
        &mut self,
        local_source: &Path,
        remote_path: &str,
        mut progress: Option<ProgressFn<'_>>,
    ) -> Result<(), ServerError> {
        let err = |e| ServerError::new("upload", remote_path, e);

        let mut input = fs::File::open(local_source).map_err(err)?;
        let total = input.metadata().map_err(err)?.len();
        let mut output = fs::File::create(self.resolve(remote_path)).map_err(err)?;

        let mut buffer = [0u8; 64 * 1024];
        let mut written = 0u64;
        loop {
            let bytes_read = input.read(&mut buffer).map_err(err)?;
            if bytes_read == 0 {
                break;
            }
            output.write_all(&buffer[..bytes_read]).map_err(err)?;
            written += bytes_read as u64;
            if let Some(on_progress) = progress.as_mut() {
                let percent = (written * 100 / total.max(1)).min(100) as u8;
                on_progress(percent);
            }
        }
        Ok(())
    }

    fn rename_file(&mut self, from: &str, to: &str) -> Result<(), ServerError> {
        let target = self.resolve(to);
        // fs::rename does not replace an existing target on Windows
        #[cfg(windows)]
        if target.is_file() {
            fs::remove_file(&target).map_err(|e| ServerError::new("rename", to, e))?;
        }
        fs::rename(self.resolve(from), &target).map_err(|e| ServerError::new("rename", from, e))
    }

    fn remove_file(&mut self, path: &str) -> Result<(), ServerError> {
        fs::remove_file(self.resolve(path)).map_err(|e| ServerError::new("delete", path, e))
    }

    fn remove_dir(&mut self, path: &str) -> Result<(), ServerError> {
        fs::remove_dir(self.resolve(path)).map_err(|e| ServerError::new("rmdir", path, e))
    }

    fn create_dir(&mut self, path: &str) -> Result<(), ServerError> {
        fs::create_dir_all(self.resolve(path)).map_err(|e| ServerError::new("mkdir", path, e))
    }

    fn purge(&mut self, path: &str, on_entry: &mut dyn FnMut(&str)) -> Result<(), ServerError> {
        let err = |e| ServerError::new("purge", path, e);

        let dir = self.resolve(path);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            // nothing to purge
            Err(_) => return Ok(()),
        };
        for entry in entries {
            let entry = entry.map_err(err)?;
            on_entry(&entry.file_name().to_string_lossy());
            let file_type = entry.file_type().map_err(err)?;
            if file_type.is_dir() {
                fs::remove_dir_all(entry.path()).map_err(err)?;
            } else {
                fs::remove_file(entry.path()).map_err(err)?;
            }
        }
        Ok(())
    }

    fn execute(&mut self, command: &str) -> Result<String, ServerError> {
        #[cfg(unix)]
        let output = Command::new("sh")
            .args(["-c", command])
            .current_dir(&self.base)
            .output();
        #[cfg(windows)]
        let output = Command::new("cmd")
            .args(["/C", command])
            .current_dir(&self.base)
            .output();

        let output = output.map_err(|e| ServerError::new("exec", command, e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ServerError::new("exec", command, stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
