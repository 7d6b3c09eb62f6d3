//! Policy-governance CLI library

pub mod ask;
pub mod auth;

// Re-export CLI types for testing
pub use clap::{Parser, Subcommand};

use anyhow::{bail, Result};
use clap::Args;
use gov_rest_client::navigation::resolve_route;
use gov_rest_client::{ClientConfig, CredentialStore, RestClient, RouteDecision, RouteState};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "gov")]
#[command(about = "Policy-governance CLI")]
#[command(version, author, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the issued token
    Login(auth::LoginArgs),
    /// Forget the stored token
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Ask a policy question and stream the answer
    Ask(ask::AskArgs),
}

/// Where the backend lives and where the credential is kept
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// URL of the governance REST service
    #[arg(long, global = true, env = "GOV_SERVER", default_value = "http://localhost:8000")]
    pub server: String,

    /// Credential file (defaults to ~/.config/gov/credentials.json)
    #[arg(long, global = true, env = "GOV_CREDENTIALS")]
    pub credentials: Option<PathBuf>,
}

impl ConnectionArgs {
    pub fn credentials_path(&self) -> Result<PathBuf> {
        match &self.credentials {
            Some(path) => Ok(path.clone()),
            None => default_credentials_path(std::env::var_os("HOME").map(PathBuf::from)),
        }
    }

    /// Build a client over the persistent credential store
    pub async fn connect(&self, current_route: &str) -> Result<RestClient> {
        let credentials = CredentialStore::persistent(self.credentials_path()?).await?;
        let config = ClientConfig::from_url(&self.server)?;
        let navigator = Arc::new(RouteState::new(current_route));
        Ok(RestClient::new(config, credentials, navigator)?)
    }
}

/// `~/.config/gov/credentials.json` under `home`
pub fn default_credentials_path(home: Option<PathBuf>) -> Result<PathBuf> {
    match home {
        Some(home) if !home.as_os_str().is_empty() => {
            Ok(home.join(".config").join("gov").join("credentials.json"))
        }
        _ => bail!("HOME is not set; pass --credentials or set GOV_CREDENTIALS"),
    }
}

/// Refuse to enter a protected route without a stored credential
pub async fn require_login(client: &RestClient, route: &str) -> Result<()> {
    let config = client.config();
    let has_token = client.credentials().is_authenticated().await;
    match resolve_route(route, true, has_token, &config.login_route, &config.home_route) {
        RouteDecision::Proceed => Ok(()),
        RouteDecision::Redirect(_) => bail!("Not logged in; run `gov login` first"),
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Login(args) => args.run(&self.connection).await,
            Commands::Logout => auth::logout(&self.connection).await,
            Commands::Whoami => auth::whoami(&self.connection).await,
            Commands::Ask(args) => args.run(&self.connection).await,
        }
    }
}
