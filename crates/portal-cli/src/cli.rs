use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "portal-session")]
#[command(about = "Inspect and manage SSO portal sessions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./portal.toml when present)
    #[arg(short, long, global = true, env = "PORTAL_CONFIG")]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show every field of a portal session, with TTL and marker keys
    Inspect(KeyArgs),
    /// List the SSO backends a portal session is authenticated on
    Backends(KeyArgs),
    /// Show the authorization state of one application in a portal session
    AppStatus(AppStatusArgs),
    /// Delete a session and its marker keys
    Destroy(DestroyArgs),
    /// Show the role of the local store node and where writes go
    Topology,
}

#[derive(clap::Args)]
pub struct KeyArgs {
    /// Portal session key (the portal cookie value)
    pub key: String,
}

#[derive(clap::Args)]
pub struct AppStatusArgs {
    /// Portal session key
    pub key: String,
    /// Application id
    pub app_id: String,
}

#[derive(clap::Args)]
pub struct DestroyArgs {
    /// Session key
    pub key: String,
    /// Treat the key as an application session cookie
    #[arg(long)]
    pub app: bool,
}
