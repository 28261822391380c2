// Mint an access token for the lifecycle endpoints
//
// Usage: cargo run --bin issue-token -- <subject> [--email ops@example.com] [--name Ops]
//
// Tokens are normally issued by the external auth service; this is for
// operators and scripts that share its secret.

use anyhow::{bail, Result};
use clap::Parser;
use locust_dashboard_control_plane::auth::{JwtConfig, JwtService};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "issue-token")]
#[command(about = "Mint a bearer token for the Locust dashboard API")]
#[command(version)]
struct Cli {
    /// Audit-log subject recorded on start/stop
    subject: String,

    /// Email claim
    #[arg(long)]
    email: Option<String>,

    /// Display name claim
    #[arg(long)]
    name: Option<String>,

    /// HS256 secret shared with the server
    #[arg(long, env = "AUTH_JWT_SECRET", hide_env_values = true)]
    secret: String,

    /// Token lifetime in seconds
    #[arg(long, env = "AUTH_JWT_ACCESS_TOKEN_LIFETIME", default_value_t = 1800)]
    lifetime: u64,
}

impl Cli {
    fn service(&self) -> Result<JwtService> {
        if self.secret.trim().is_empty() {
            bail!("secret must not be empty");
        }

        Ok(JwtService::new(JwtConfig {
            secret: self.secret.clone(),
            access_token_lifetime: Duration::from_secs(self.lifetime),
        }))
    }

    fn issue(&self, jwt: &JwtService) -> Result<String> {
        jwt.generate_access_token(&self.subject, self.email.as_deref(), self.name.as_deref())
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let jwt = cli.service()?;
    let token = cli.issue(&jwt)?;
    eprintln!(
        "token for {:?} expires in {}s",
        cli.subject,
        jwt.access_token_lifetime_secs()
    );
    println!("{token}");
    Ok(())
}
