//! Flowport CLI
//!
//! Converts workflow documents into pandas pipelines.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Flowport - translate visual ETL workflows into pandas pipelines
#[derive(Parser)]
#[command(name = "flowport")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file or project directory
    #[arg(short, long, default_value = "flowport.yaml", env = "FLOWPORT_CONFIG")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a flowport.yaml with default settings
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,

        /// Project name (defaults to directory name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Convert a workflow file, or every workflow under a directory
    Convert {
        /// Workflow file or directory
        path: String,

        /// Output directory (overrides output_dir from the configuration)
        #[arg(short, long)]
        output: Option<String>,

        /// Refuse workflows whose graph has a cycle
        #[arg(long)]
        fail_on_cycle: bool,

        /// Leave tool annotations out of the generated code
        #[arg(long)]
        no_annotations: bool,
    },

    /// Classify a workflow without generating code
    Validate {
        /// Workflow file
        path: String,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the step order a conversion would use
    Plan {
        /// Workflow file
        path: String,

        /// Refuse workflows whose graph has a cycle
        #[arg(long)]
        fail_on_cycle: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match cli.command {
        Commands::Init { path, name } => {
            commands::init::run(&path, name.as_deref())?;
        }
        Commands::Convert {
            path,
            output,
            fail_on_cycle,
            no_annotations,
        } => {
            commands::convert::run(
                &cli.config,
                &path,
                output.as_deref(),
                fail_on_cycle,
                no_annotations,
            )?;
        }
        Commands::Validate { path, json } => {
            commands::validate::run(&path, json)?;
        }
        Commands::Plan { path, fail_on_cycle } => {
            commands::plan::run(&cli.config, &path, fail_on_cycle)?;
        }
    }

    Ok(())
}
