//! aims - command-line client for the AIMS identity API
//!
//! Every subcommand maps onto one `AimsClient` operation and prints the
//! result as JSON. Settings come from `aims.toml`, `AIMS_*` variables and
//! flags, in increasing order of precedence.

mod commands;
mod config;

use aims_http::HttpClient;
use aims_iam::AimsClient;
use clap::Parser;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "aims")]
#[command(about = "Command-line client for the AIMS identity API", long_about = None)]
struct Args {
    /// API root URL
    #[arg(long, env = "AIMS_BASE_URL")]
    base_url: Option<String>,

    /// Session token from a previous login
    #[arg(long, env = "AIMS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log in as this user before running the command
    #[arg(short, long, env = "AIMS_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "AIMS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// One-time MFA code for the login
    #[arg(long, env = "AIMS_MFA_CODE")]
    mfa_code: Option<String>,

    /// Account to act on; defaults to the token's own account
    #[arg(long, env = "AIMS_ACCOUNT_ID")]
    account_id: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "AIMS_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "AIMS_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: commands::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = config::Config::load()?;

    let log_level = args.log_level.as_deref().unwrap_or(&config.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("aims={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut http_config = config.http_config();
    if let Some(base_url) = &args.base_url {
        http_config = http_config.with_base_url(base_url.as_str());
    }
    if let Some(secs) = args.timeout_secs {
        http_config.timeout_secs = secs;
    }
    debug!(base_url = %http_config.base_url, "using AIMS endpoint");

    let transport = HttpClient::new(&http_config)?;
    if let Some(token) = args.token.as_deref().or(config.token.as_deref()) {
        transport.set_token(token);
    }
    let client = AimsClient::new(Arc::new(transport));

    let ctx = commands::Context {
        username: args.username,
        password: args.password,
        mfa_code: args.mfa_code,
        account_id: args.account_id.or(config.account_id),
    };

    if let Some(output) = commands::run(&client, &ctx, args.command).await? {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    Ok(())
}
