use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use reqenv::config::{load_config, print_schema};
use reqenv::startup::{self, StartupError};
use reqenv::utils::logger::init_logging;

/// Request execution environment server.
#[derive(Parser, Debug)]
#[command(name = "reqenv", version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "./config.yaml")]
    config: PathBuf,

    /// Print the configuration JSON schema and exit.
    #[arg(long)]
    schema: bool,
}

async fn serve(config_path: PathBuf) -> Result<(), StartupError> {
    let config = load_config(&config_path)?;
    init_logging(&config.logging)?;
    tracing::info!("Loaded configuration from {}", config_path.display());
    startup::run(Arc::new(config)).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.schema {
        return match print_schema() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Failed to print schema: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    match serve(cli.config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Logging may not be installed yet, so report directly.
            eprintln!("Fatal: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_defaults_and_flag_forms() {
        let cli = Cli::try_parse_from(["reqenv"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("./config.yaml"));
        assert!(!cli.schema);

        for args in [
            vec!["reqenv", "--config", "app.yaml"],
            vec!["reqenv", "--config=app.yaml"],
            vec!["reqenv", "-c", "app.yaml"],
        ] {
            let cli = Cli::try_parse_from(args).unwrap();
            assert_eq!(cli.config, PathBuf::from("app.yaml"));
        }

        assert!(Cli::try_parse_from(["reqenv", "--schema"]).unwrap().schema);
    }

    #[test]
    fn test_help_version_and_unknown_flags() {
        let err = Cli::try_parse_from(["reqenv", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);

        let err = Cli::try_parse_from(["reqenv", "--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);

        let err = Cli::try_parse_from(["reqenv", "--bogus"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);

        assert!(Cli::try_parse_from(["reqenv", "--config"]).is_err());
    }
}
