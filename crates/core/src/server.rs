//! The file-transfer server contract
//!
//! Concrete transports (a mounted filesystem, FTP, SFTP) implement this
//! trait; the deployer drives it strictly sequentially and owns it for the
//! duration of a deploy. All operations are synchronous and may block on
//! network I/O.

use std::path::Path;

use crate::error::ServerError;

/// Byte-progress callback for uploads, called with `0..=100`.
pub type ProgressFn<'a> = &'a mut dyn FnMut(u8);

pub trait Server {
    /// Establish the session.
    fn connect(&mut self) -> Result<(), ServerError>;

    /// Absolute remote root path, without a trailing `/`.
    fn get_dir(&self) -> String;

    /// Download `remote_path` into `local_dest`. Fails if the remote file
    /// is absent.
    fn read_file(&mut self, remote_path: &str, local_dest: &Path) -> Result<(), ServerError>;

    /// Create or overwrite `remote_path` with the content of `local_source`.
    fn write_file(
        &mut self,
        local_source: &Path,
        remote_path: &str,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<(), ServerError>;

    /// Atomically rename `from` onto `to`, replacing `to` if present.
    fn rename_file(&mut self, from: &str, to: &str) -> Result<(), ServerError>;

    fn remove_file(&mut self, path: &str) -> Result<(), ServerError>;

    /// Remove an empty directory.
    fn remove_dir(&mut self, path: &str) -> Result<(), ServerError>;

    /// Create a directory, parents included. Idempotent.
    fn create_dir(&mut self, path: &str) -> Result<(), ServerError>;

    /// Remove every entry inside `path`, preserving `path` itself.
    /// `on_entry` observes each entry as it is removed.
    fn purge(&mut self, path: &str, on_entry: &mut dyn FnMut(&str)) -> Result<(), ServerError>;

    /// Run a shell command on the remote, returning its output.
    fn execute(&mut self, command: &str) -> Result<String, ServerError>;
}
