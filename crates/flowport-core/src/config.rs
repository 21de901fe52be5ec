//! Project configuration
//!
//! An optional `flowport.yaml` at the project root sets where converted
//! workflows are written and how the converter treats structural problems.
//! Every key has a default, so a missing file behaves like an empty one.
//!
//! ```yaml
//! name: my-migration
//! output_dir: converted
//! cycle_policy: degrade
//! artifacts:
//!   pipeline: pipeline.py
//!   config: config.yaml
//!   report: report.json
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// File name looked up when a directory is given
pub const CONFIG_FILE_NAME: &str = "flowport.yaml";

/// Root project configuration from `flowport.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    #[serde(default = "default_name")]
    pub name: String,

    /// Directory converted workflows are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// What to do when the workflow graph has a cycle
    #[serde(default)]
    pub cycle_policy: CyclePolicy,

    /// Artifact file names
    #[serde(default)]
    pub artifacts: ArtifactNames,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            output_dir: default_output_dir(),
            cycle_policy: CyclePolicy::default(),
            artifacts: ArtifactNames::default(),
        }
    }
}

fn default_name() -> String {
    "flowport-project".to_string()
}

fn default_output_dir() -> String {
    "converted".to_string()
}

/// Handling of cyclic workflow graphs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Fall back to ascending tool id order and record an anomaly
    #[default]
    Degrade,
    /// Refuse to convert
    Fail,
}

/// File names of the three conversion artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactNames {
    /// Generated pipeline source
    #[serde(default = "default_pipeline")]
    pub pipeline: String,

    /// Externalized configuration
    #[serde(default = "default_config")]
    pub config: String,

    /// Conversion report
    #[serde(default = "default_report")]
    pub report: String,
}

impl Default for ArtifactNames {
    fn default() -> Self {
        Self {
            pipeline: default_pipeline(),
            config: default_config(),
            report: default_report(),
        }
    }
}

fn default_pipeline() -> String {
    "pipeline.py".to_string()
}

fn default_config() -> String {
    "config.yaml".to_string()
}

fn default_report() -> String {
    "report.json".to_string()
}

/// Main configuration container
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Base path of the project
    pub base_path: PathBuf,
}

impl Config {
    /// Load configuration from a directory or a `flowport.yaml` path
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = Config::load("./migration")?;
    /// println!("Writing to {}", config.output_dir().display());
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (config_path, base_path) = resolve(path.as_ref());

        if !config_path.exists() {
            return Err(Error::ConfigNotFound {
                path: config_path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(&config_path)?;
        let project: ProjectConfig = if contents.trim().is_empty() {
            ProjectConfig::default()
        } else {
            serde_yaml::from_str(&contents)?
        };

        tracing::debug!("Loaded configuration from {}", config_path.display());
        Ok(Self { project, base_path })
    }

    /// Like [`Config::load`], but a missing file yields the defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        match Self::load(path.as_ref()) {
            Err(Error::ConfigNotFound { .. }) => {
                let (_, base_path) = resolve(path.as_ref());
                Ok(Self {
                    project: ProjectConfig::default(),
                    base_path,
                })
            }
            other => other,
        }
    }

    /// Output directory, resolved against the project base path
    pub fn output_dir(&self) -> PathBuf {
        self.base_path.join(&self.project.output_dir)
    }

    /// Write a default `flowport.yaml` into `dir`
    pub fn write_default(dir: &Path, name: &str) -> Result<PathBuf> {
        let project = ProjectConfig {
            name: name.to_string(),
            ..Default::default()
        };
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, serde_yaml::to_string(&project)?)?;
        Ok(path)
    }
}

fn resolve(path: &Path) -> (PathBuf, PathBuf) {
    if path.is_dir() {
        (path.join(CONFIG_FILE_NAME), path.to_path_buf())
    } else {
        (
            path.to_path_buf(),
            path.parent().unwrap_or(Path::new(".")).to_path_buf(),
        )
    }
}
