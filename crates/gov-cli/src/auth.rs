//! Login, logout and whoami commands

use anyhow::{bail, Result};
use clap::Args;
use tracing::info;

use crate::{require_login, ConnectionArgs};

/// Arguments for the login command
#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account name
    #[arg(long, short)]
    pub username: String,

    /// Account password
    #[arg(long, short, env = "GOV_PASSWORD", hide_env_values = true)]
    pub password: String,
}

impl LoginArgs {
    pub async fn run(self, connection: &ConnectionArgs) -> Result<()> {
        let client = connection.connect("/login").await?;
        match client.login(&self.username, &self.password).await {
            Ok(credential) => {
                if let Ok(path) = connection.credentials_path() {
                    info!("Credential saved to {}", path.display());
                }
                println!("Logged in as {}", credential.user.username);
                Ok(())
            }
            Err(e) if e.is_unauthorized() => bail!("Incorrect username or password"),
            Err(e) => Err(e.into()),
        }
    }
}

pub async fn logout(connection: &ConnectionArgs) -> Result<()> {
    let client = connection.connect("/").await?;
    client.logout().await?;
    println!("Logged out");
    Ok(())
}

pub async fn whoami(connection: &ConnectionArgs) -> Result<()> {
    let client = connection.connect("/").await?;
    require_login(&client, "/me").await?;
    match client.current_user().await {
        Ok(user) => {
            println!("{}", serde_json::to_string_pretty(&user)?);
            Ok(())
        }
        Err(e) if e.is_unauthorized() => bail!("Session expired; run `gov login` again"),
        Err(e) => Err(e.into()),
    }
}
