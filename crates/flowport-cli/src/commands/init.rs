//! Initialize a new Flowport project

use anyhow::Result;
use std::fs;
use std::path::Path;

use flowport_core::Config;
use flowport_core::config::CONFIG_FILE_NAME;

/// Run the init command
pub fn run(path: &str, name: Option<&str>) -> Result<()> {
    let project_dir = Path::new(path);

    if !project_dir.exists() {
        fs::create_dir_all(project_dir)?;
    }

    let abs_path = project_dir.canonicalize()?;

    // Derive project name from directory name if not provided
    let project_name = match name {
        Some(n) => n.to_string(),
        None => abs_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Could not determine project name from path"))?,
    };

    if project_dir.join(CONFIG_FILE_NAME).exists() {
        anyhow::bail!(
            "Directory '{}' already contains a {}",
            project_dir.display(),
            CONFIG_FILE_NAME
        );
    }

    tracing::info!("Creating new Flowport project: {}", project_name);

    fs::create_dir_all(project_dir.join("workflows"))?;
    let config_path = Config::write_default(project_dir, &project_name)?;

    let gitignore = "# Flowport output\nconverted/\n";
    fs::write(project_dir.join(".gitignore"), gitignore)?;

    tracing::info!("Created {}", config_path.display());
    tracing::info!("Next steps:");
    tracing::info!("  copy workflow files into {}", project_dir.join("workflows").display());
    tracing::info!("  flowport --config {} convert workflows", config_path.display());

    Ok(())
}
