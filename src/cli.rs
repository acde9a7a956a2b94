use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fileforge")]
#[command(author, version, about = "Media ingest and conversion service")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Start {
        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check that the external conversion tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Classify a file and print the conversions offered for it
    Classify {
        /// File to classify
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Display version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_flags_are_optional() {
        let cli = Cli::parse_from(["fileforge", "start"]);
        assert!(matches!(
            cli.command,
            Commands::Start {
                host: None,
                port: None
            }
        ));

        let cli = Cli::parse_from(["fileforge", "-v", "start", "--port", "9000"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Start { port: Some(9000), .. }));
    }

    #[test]
    fn classify_requires_a_file() {
        assert!(Cli::try_parse_from(["fileforge", "classify"]).is_err());
        let cli = Cli::try_parse_from(["fileforge", "-c", "ff.json", "classify", "a.png"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("ff.json")));
    }
}
