//! Command-line interface
//!
//! Two modes: the long-running refresher (default) and a one-shot
//! `generate-refresh-token` that exchanges a freshly generated code and prints
//! the resulting refresh token for use in configuration.

use clap::{Args, Parser, Subcommand};

const AUTH_HELP: &str = "\
Follow https://www.site24x7.com/help/api/index.html#authentication to obtain a
client id, client secret and generated code.";

#[derive(Debug, Parser)]
#[command(
    name = "site24x7-oauth",
    about = "Keeps a Site24x7 OAuth access token valid",
    after_help = AUTH_HELP,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub serve: ServeArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Exchange a generated code for a refresh token and print it
    GenerateRefreshToken(GenerateArgs),
}

#[derive(Debug, Default, Args, PartialEq, Eq)]
pub struct ServeArgs {
    /// Configuration file (default: $CONFIG_PATH or site24x7-oauth.toml)
    #[arg(long)]
    pub config: Option<String>,

    /// Credential file, created as a template if it doesn't exist
    /// (default: $SITE24X7_AUTHTOKEN_FILE or ~/.site24x7/oauth.json)
    #[arg(long)]
    pub oauth_file: Option<String>,

    /// Initialize the credential file and exit
    #[arg(long)]
    pub init_oauth: bool,
}

#[derive(Debug, Args, PartialEq, Eq)]
pub struct GenerateArgs {
    /// Configuration file, read for the token endpoint
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long)]
    pub client_id: String,

    #[arg(long)]
    pub client_secret: String,

    /// Code generated in the Zoho API console
    #[arg(long)]
    pub code: String,
}
