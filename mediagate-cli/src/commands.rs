//! CLI command implementations

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;
use mediagate_core::components::build_registry;
use mediagate_core::gateway::FilterPath;
use mediagate_core::{MediaGateConfig, MediaGateError};
use tracing::info;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Address to bind to, overrides the configuration
        #[arg(long)]
        host: Option<IpAddr>,
        /// Port to bind to, overrides the configuration
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Check a filtered-image path against the path grammar
    ParsePath {
        /// Path as it appears after /media/filter/, without the filter name
        path: String,
    },
    /// Print the download policy of every context
    Strategies {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

impl Commands {
    /// Configuration file named on the command line, if any.
    pub fn config_path(&self) -> Option<&Path> {
        match self {
            Commands::Serve { config, .. } | Commands::Strategies { config } => config.as_deref(),
            Commands::ParsePath { .. } => None,
        }
    }
}

/// Directory for the trace log: `--logs-dir` when given, otherwise the
/// configured `[logging] logs_dir`.
///
/// # Errors
/// Returns a user-facing error if the configuration cannot be loaded
pub fn resolve_logs_dir(explicit: Option<PathBuf>, command: &Commands) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(dir) => Ok(dir),
        None => Ok(load_config(command.config_path())
            .map_err(user_facing)?
            .logging
            .logs_dir),
    }
}

/// Handle the CLI command
///
/// # Errors
/// Returns the failure of the command, with a user-facing message
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve { config, host, port } => serve(config.as_deref(), host, port).await,
        Commands::ParsePath { path } => {
            println!("{}", describe_path(&path));
            Ok(())
        }
        Commands::Strategies { config } => {
            let config = load_config(config.as_deref()).map_err(user_facing)?;
            print!("{}", describe_strategies(&config));
            Ok(())
        }
    }
}

/// Loads the configuration file, or the defaults, then environment overrides.
///
/// # Errors
/// - `MediaGateError::Config` - If the file or an override is invalid
pub fn load_config(path: Option<&Path>) -> Result<MediaGateConfig, MediaGateError> {
    let mut config = match path {
        Some(path) => MediaGateConfig::from_file(path)?,
        None => MediaGateConfig::from_toml_str("")?,
    };
    config.apply_env_overrides()?;
    Ok(config)
}

async fn serve(
    config: Option<&Path>,
    host: Option<IpAddr>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let mut config = load_config(config).map_err(user_facing)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    info!(
        "Serving media from {} with {} context(s)",
        config.storage.media_root.display(),
        config.contexts.len()
    );
    mediagate_web::run_server(config)
        .await
        .context("Mediagate server stopped")
}

fn user_facing(error: MediaGateError) -> anyhow::Error {
    let message = error.user_message();
    anyhow::Error::new(error).context(message)
}

/// Human-readable result of parsing a filtered-image path.
pub fn describe_path(path: &str) -> String {
    match FilterPath::parse(path) {
        Some(parsed) => format!(
            "media id: {}\nfilter token: {}\nfirst segment: {}\nmiddle: {}",
            parsed.media_id, parsed.filter_token, parsed.first_segment, parsed.middle
        ),
        None => format!("{path}: no match (would answer 404)"),
    }
}

/// One block per context: strategy description, download mode and formats.
pub fn describe_strategies(config: &MediaGateConfig) -> String {
    let registry = build_registry(config);
    let mut output = String::new();

    for name in registry.context_names() {
        let Some(context) = registry.context(name) else {
            continue;
        };
        output.push_str(&format!(
            "{name}\n  strategy: {}\n  download mode: {}\n  formats: {}\n",
            context.strategy().description(),
            context.mode(),
            context.formats().join(", ")
        ));
    }
    output
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_describe_path() {
        assert_eq!(
            describe_path("abc/def/123_thumb.jpg"),
            "media id: 123\nfilter token: thumb\nfirst segment: abc\nmiddle: def"
        );
        assert_eq!(
            describe_path("abc/123_thumb.png"),
            "abc/123_thumb.png: no match (would answer 404)"
        );
    }

    #[test]
    fn test_describe_default_strategies() {
        let config = MediaGateConfig::from_toml_str("").unwrap();

        assert_eq!(
            describe_strategies(&config),
            "default\n  strategy: The media can be retrieved by users with the following roles: \
             ROLE_ADMIN.\n  download mode: http\n  formats: default_small, default_big\n"
        );
    }

    #[test]
    fn test_logs_dir_comes_from_configuration() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mediagate.toml");
        std::fs::write(&path, "[logging]\nlogs_dir = \"/var/log/mediagate\"\n").unwrap();
        let command = Commands::Strategies { config: Some(path) };

        assert_eq!(
            resolve_logs_dir(None, &command).unwrap(),
            PathBuf::from("/var/log/mediagate")
        );
        assert_eq!(
            resolve_logs_dir(Some(PathBuf::from("elsewhere")), &command).unwrap(),
            PathBuf::from("elsewhere")
        );
    }

    #[test]
    fn test_logs_dir_defaults_without_configuration() {
        let command = Commands::ParsePath {
            path: "a/b/1_x.jpg".to_string(),
        };

        assert_eq!(resolve_logs_dir(None, &command).unwrap(), PathBuf::from("logs"));
    }
}
