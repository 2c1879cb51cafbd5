//! Account credential resolution from flags and environment

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgMatches, Command};
use docpkg_cosmos::{CosmosClient, CosmosConfig};
use std::time::Duration;

pub(crate) const CONNECTION_STRING_ENV: &str = "DOCPKG_CONNECTION_STRING";
pub(crate) const ENDPOINT_ENV: &str = "DOCPKG_ENDPOINT";
pub(crate) const KEY_ENV: &str = "DOCPKG_KEY";

/// Add the account connection arguments to a subcommand
pub(crate) fn args(command: Command) -> Command {
    command
        .arg(
            Arg::new("connection-string")
                .long("connection-string")
                .env(CONNECTION_STRING_ENV)
                .hide_env_values(true)
                .help("Account connection string (AccountEndpoint=...;AccountKey=...;)"),
        )
        .arg(
            Arg::new("endpoint")
                .long("endpoint")
                .env(ENDPOINT_ENV)
                .help("Account endpoint URL"),
        )
        .arg(
            Arg::new("key")
                .long("key")
                .env(KEY_ENV)
                .hide_env_values(true)
                .help("Account master key (base64)"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_parser(clap::value_parser!(u64))
                .help("Request timeout in seconds"),
        )
}

/// Account configuration from parsed arguments
///
/// A connection string takes precedence over an endpoint and key pair.
pub(crate) fn resolve(matches: &ArgMatches) -> Result<CosmosConfig> {
    let config = if let Some(connection) = matches.get_one::<String>("connection-string") {
        CosmosConfig::from_connection_string(connection).context("invalid connection string")?
    } else {
        let (Some(endpoint), Some(key)) = (
            matches.get_one::<String>("endpoint"),
            matches.get_one::<String>("key"),
        ) else {
            bail!(
                "no account credentials: pass --connection-string or --endpoint with --key \
                 (or set {CONNECTION_STRING_ENV}, {ENDPOINT_ENV} and {KEY_ENV})"
            );
        };
        CosmosConfig::new(endpoint, key.as_str()).context("invalid account endpoint")?
    };

    Ok(match matches.get_one::<u64>("timeout") {
        Some(seconds) => config.with_timeout(Duration::from_secs(*seconds)),
        None => config,
    })
}

/// Connected store for a subcommand
pub(crate) fn client(matches: &ArgMatches) -> Result<CosmosClient> {
    let config = resolve(matches)?;
    tracing::debug!(endpoint = %config.endpoint(), "connecting");
    CosmosClient::new(config).context("failed to create account client")
}
