//! Deployment configuration file parsing (htdeploy.toml)

use std::path::{Path, PathBuf};

use color_eyre::eyre::{eyre, WrapErr};
use serde::Deserialize;

use htdeploy_core::MANIFEST_NAME;

/// One deployment definition.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeployConfig {
    /// Local directory to publish, relative to the config file
    pub local: PathBuf,

    /// Deploy target: a local or mounted directory
    pub target: PathBuf,

    /// Ignore masks (`*.log`, `!keep.log`, `temp/`, ...)
    pub ignore: Vec<String>,

    /// Masks selecting files for the preprocess filter pipeline
    pub preprocess: Vec<String>,

    /// Remove remote entries that no longer exist locally
    pub allow_delete: bool,

    /// Remote directories to empty after deletes, kept in place
    pub purge: Vec<String>,

    /// Jobs before upload: `local: cmd`, `remote: cmd`, or an URL
    pub before: Vec<String>,

    /// Jobs after the deploy committed
    pub after: Vec<String>,

    /// Manifest file name at the target root
    pub manifest: String,

    /// Staging area for preprocessed files and the content cache
    pub temp_dir: Option<PathBuf>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            local: PathBuf::from("."),
            target: PathBuf::new(),
            ignore: Vec::new(),
            preprocess: Vec::new(),
            allow_delete: false,
            purge: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
            manifest: MANIFEST_NAME.to_string(),
            temp_dir: None,
        }
    }
}

impl DeployConfig {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    /// Returns an error if the file is missing, malformed, or names no
    /// target.
    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("cannot read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .wrap_err_with(|| format!("cannot parse {}", path.display()))?;
        if config.target.as_os_str().is_empty() {
            return Err(eyre!("`target` must be set in {}", path.display()));
        }
        Ok(config)
    }
}
