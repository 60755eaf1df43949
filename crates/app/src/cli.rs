//! Command line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tradepoint admin client session tool.
#[derive(Debug, Parser)]
#[command(name = "tradepoint", version, about)]
pub struct Cli {
    /// Settings file; `tradepoint.toml` in the working directory when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// API base URL, overriding the settings file.
    #[arg(long, global = true, env = "TRADEPOINT_API_BASE_URL")]
    pub api_url: Option<String>,

    /// File the session credentials are kept in.
    #[arg(long, global = true, env = "TRADEPOINT_STORAGE_PATH")]
    pub storage: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and store the session credentials.
    Login {
        /// Login name.
        username: String,
        /// Password.
        #[arg(long, env = "TRADEPOINT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored credentials.
    Logout,
    /// Show the current user.
    Whoami,
    /// Operate as another organization.
    SwitchOrg {
        /// Organization id; resets the active organization when omitted.
        organization: Option<String>,
    },
    /// Operate at another trading point.
    SwitchTp {
        /// Trading point id; resets the active trading point when omitted.
        trading_point: Option<String>,
    },
    /// Send an authenticated GET request and print the body.
    Get {
        /// Path relative to the API base URL, e.g. `/inventory/stock/`.
        path: String,
        /// Query parameter as `key=value`; repeatable.
        #[arg(long = "query", short = 'q', value_parser = parse_query_pair)]
        query: Vec<(String, String)>,
    },
    /// Change the current user's password.
    ChangePassword {
        /// Current password.
        #[arg(long, env = "TRADEPOINT_OLD_PASSWORD", hide_env_values = true)]
        old: String,
        /// New password.
        #[arg(long, env = "TRADEPOINT_NEW_PASSWORD", hide_env_values = true)]
        new: String,
    },
}

fn parse_query_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}
