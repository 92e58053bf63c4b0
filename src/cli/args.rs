// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the main CLI structure and subcommands for lockstep

use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lockstep")]
#[command(about = "Run YAML scripts that interpolate, prompt and emit rows from session arrays")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a script from a YAML file
    Run {
        #[arg(help = "Path to script YAML file")]
        script: PathBuf,

        #[arg(
            short = 'V',
            long = "var",
            help = "Set session values (key=value, value parsed as YAML)"
        )]
        vars: Vec<String>,

        #[arg(short, long, help = "Default output destination (stdout or file://path)")]
        output: Option<String>,

        #[arg(long, help = "Write the run result as JSON to this file")]
        result: Option<PathBuf>,

        #[arg(long, help = "Keep running after a step fails")]
        continue_on_error: bool,

        #[arg(long, help = "Dry run - validate without executing")]
        dry_run: bool,
    },

    /// Validate a script file without executing
    Validate {
        #[arg(help = "Path to script YAML file")]
        script: PathBuf,

        #[arg(long, help = "Treat warnings as errors")]
        strict: bool,
    },

    /// Interpolate a single template and print the result
    Render {
        #[arg(help = "Template text, e.g. 'Hello <% name %>'")]
        template: String,

        #[arg(short = 'V', long = "var", help = "Session values (key=value)")]
        vars: Vec<String>,

        #[arg(short, long, help = "YAML file with initial session values")]
        session: Option<PathBuf>,
    },

    /// Create a starter script
    Init {
        #[arg(help = "Name of the script to create")]
        name: String,

        #[arg(short, long, help = "Output directory", default_value = ".")]
        output_dir: PathBuf,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parse `key=value` pairs. Values are read as YAML so `-V names=[Al,Bo]`
    /// yields an array; anything that is not valid YAML stays a string.
    pub fn parse_variables(vars: &[String]) -> anyhow::Result<IndexMap<String, serde_yaml::Value>> {
        let mut variables = IndexMap::new();

        for var in vars {
            let Some((key, value)) = var.split_once('=') else {
                return Err(anyhow::anyhow!(
                    "Invalid variable format '{}'. Expected 'key=value'",
                    var
                ));
            };
            if key.trim().is_empty() {
                return Err(anyhow::anyhow!("Variable '{}' has an empty key", var));
            }

            let parsed = match serde_yaml::from_str::<serde_yaml::Value>(value) {
                Ok(serde_yaml::Value::Null) | Err(_) => serde_yaml::Value::from(value),
                Ok(parsed) => parsed,
            };
            variables.insert(key.trim().to_string(), parsed);
        }

        Ok(variables)
    }
}
