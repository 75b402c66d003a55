//! Pre- and post-deploy jobs

use std::fmt;
use std::process::Command;
use std::sync::Arc;

use crate::error::DeployError;
use crate::logger::{Logger, Severity};
use crate::server::Server;

/// User-supplied job hook, run in-process.
///
/// Implemented for any `Fn() -> Result<(), String>` closure.
pub trait JobCallback: Send + Sync {
    /// # Errors
    /// Returns the failure reason.
    fn run(&self) -> Result<(), String>;
}

impl<F> JobCallback for F
where
    F: Fn() -> Result<(), String> + Send + Sync,
{
    fn run(&self) -> Result<(), String> {
        self()
    }
}

/// One pre- or post-deploy job. Parsed once at configuration load; any
/// failure at run time aborts the deploy.
#[derive(Clone)]
pub enum Job {
    /// Shell command on the deploying machine
    Local(String),
    /// Shell command on the server
    Remote(String),
    /// HTTP GET, failing on transport error or non-success status
    Http(String),
    /// In-process hook
    Callback(Arc<dyn JobCallback>),
}

impl Job {
    /// Parse a scheme-prefixed job string: `local:<cmd>`, `remote:<cmd>`,
    /// or an `http(s)://` URL.
    ///
    /// # Errors
    /// Returns a config error for any other shape.
    pub fn parse(spec: &str) -> Result<Self, DeployError> {
        let spec = spec.trim();
        if spec.starts_with("http://") || spec.starts_with("https://") {
            Ok(Self::Http(spec.to_string()))
        } else if let Some(cmd) = spec.strip_prefix("local:") {
            Ok(Self::Local(cmd.trim().to_string()))
        } else if let Some(cmd) = spec.strip_prefix("remote:") {
            Ok(Self::Remote(cmd.trim().to_string()))
        } else {
            Err(DeployError::Config(format!(
                "invalid job specification: {spec}"
            )))
        }
    }

    /// Local jobs run before the server is touched for any mutation.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(cmd) => write!(f, "local: {cmd}"),
            Self::Remote(cmd) => write!(f, "remote: {cmd}"),
            Self::Http(url) => write!(f, "{url}"),
            Self::Callback(_) => write!(f, "callback"),
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job({self})")
    }
}

/// Run `jobs` in order; the first failure aborts with a fatal error.
///
/// # Errors
/// Returns [`DeployError::Job`] naming the failing job and reason.
pub fn run_jobs(
    jobs: &[Job],
    server: &mut dyn Server,
    logger: &dyn Logger,
) -> Result<(), DeployError> {
    for job in jobs {
        logger.log(&format!("Running {job}"), Severity::Info);
        let outcome = match job {
            Job::Local(cmd) => run_shell(cmd),
            Job::Remote(cmd) => server.execute(cmd).map_err(|e| e.to_string()),
            Job::Http(url) => http_get(url),
            Job::Callback(callback) => callback.run().map(|()| String::new()),
        };
        match outcome {
            Ok(output) => {
                let output = output.trim();
                if !output.is_empty() {
                    logger.log(output, Severity::Info);
                }
            }
            Err(reason) => {
                return Err(DeployError::Job {
                    job: job.to_string(),
                    reason,
                })
            }
        }
    }
    Ok(())
}

fn run_shell(cmd: &str) -> Result<String, String> {
    #[cfg(unix)]
    let output = Command::new("sh").args(["-c", cmd]).output();
    #[cfg(windows)]
    let output = Command::new("cmd").args(["/C", cmd]).output();

    let output = output.map_err(|e| e.to_string())?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        match output.status.code() {
            Some(code) => Err(format!("exit code {code}: {}", stderr.trim())),
            None => Err(format!("terminated by signal: {}", stderr.trim())),
        }
    }
}

fn http_get(url: &str) -> Result<String, String> {
    let response = reqwest::blocking::get(url).map_err(|e| e.to_string())?;
    let status = response.status();
    if status.is_success() {
        Ok(String::new())
    } else {
        Err(format!("HTTP {status}"))
    }
}
