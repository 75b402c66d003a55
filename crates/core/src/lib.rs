//! htdeploy-core: Deployment sync engine
//!
//! Computes the minimal set of create/update/delete operations between a
//! local tree and the remote state recorded in a manifest, and applies them
//! through a file-transfer server abstraction with a rename-last commit
//! protocol.

pub mod deploy;
pub mod error;
pub mod filemap;
pub mod fingerprint;
pub mod job;
pub mod logger;
pub mod manifest;
pub mod pattern;
pub mod plan;
pub mod preprocess;
pub mod scan;
pub mod server;

pub use deploy::{DeployReport, Deployer, DeployerBuilder};
pub use error::{DeployError, ManifestError, ServerError};
pub use filemap::FileMap;
pub use fingerprint::Fingerprint;
pub use job::{Job, JobCallback};
pub use logger::{Logger, NullLogger, Severity};
pub use manifest::{MANIFEST_NAME, RUNNING_SUFFIX, TEMP_SUFFIX};
pub use pattern::PatternSet;
pub use plan::{plan, Plan};
pub use preprocess::{ContentFilter, Preprocessor};
pub use scan::Scanner;
pub use server::{ProgressFn, Server};
