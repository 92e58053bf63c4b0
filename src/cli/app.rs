// ABOUTME: Main application orchestration for lockstep CLI
// ABOUTME: Coordinates between CLI arguments, configuration, and command execution

use anyhow::Result;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use super::commands;
use super::{Args, Commands, Config};

pub struct App {
    config: Config,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Initialize logging based on configuration. Logs go to stderr so
    /// emitted lines on stdout stay clean.
    pub fn init_logging(&self, verbose: bool, no_color: bool) -> Result<()> {
        let log_level = if verbose {
            "debug"
        } else {
            &self.config.logging.level
        };

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let result = match self.config.logging.format.as_str() {
            "compact" => tracing_subscriber::fmt()
                .compact()
                .with_env_filter(env_filter)
                .with_ansi(!no_color)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init(),
            _ => tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_ansi(!no_color)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init(),
        };
        result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

        debug!("Logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Run the application with parsed arguments
    pub async fn run(&mut self, args: Args) -> Result<()> {
        self.init_logging(args.verbose, args.no_color)?;

        info!("Starting lockstep v{}", env!("CARGO_PKG_VERSION"));
        debug!("Configuration loaded from: {:?}", args.config);

        match args.command {
            Commands::Run {
                script,
                vars,
                output,
                result,
                continue_on_error,
                dry_run,
            } => {
                commands::run_script(
                    script,
                    vars,
                    output,
                    result,
                    continue_on_error,
                    dry_run,
                    &self.config,
                )
                .await
            }

            Commands::Validate { script, strict } => {
                commands::validate_script(script, strict, &self.config).await
            }

            Commands::Render {
                template,
                vars,
                session,
            } => commands::render_template(template, vars, session, &self.config).await,

            Commands::Init { name, output_dir } => commands::init_script(name, output_dir).await,
        }
    }

    /// Create application from parsed arguments
    pub fn from_args(args: &Args) -> Result<Self> {
        let config = Config::load(args.config.clone())?;
        Ok(Self::new(config))
    }
}
