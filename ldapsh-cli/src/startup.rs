//! Turning command-line options into the connection to open.

use std::path::PathBuf;

use ldapsh_core::{ConnectionData, ConnectionStore, HistoryError, ShellConfig};
use tracing::debug;
use url::Url;

const URI_SCHEMES: [&str; 3] = ["ldap", "ldaps", "ldapi"];

/// Where to connect and as whom.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConnectArgs {
    /// URI to connect to, in the format ldap://host[:port]
    #[arg(value_name = "URI")]
    pub uri: Option<String>,

    /// Host to connect to
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Port to connect to on host [default: 389]
    #[arg(short, long)]
    pub port: Option<String>,

    /// DN to bind as; anonymous if omitted
    #[arg(short = 'D', long)]
    pub bind_dn: Option<String>,

    /// Password for the bind DN
    #[arg(short = 'w', long)]
    pub password: Option<String>,

    /// Reconnect to the N-th most recent connection
    #[arg(
        short,
        long,
        value_name = "N",
        value_parser = clap::value_parser!(u64).range(1..),
        conflicts_with_all = ["uri", "host", "saved"]
    )]
    pub recent: Option<u64>,

    /// Connect using the connection saved under NAME
    #[arg(short, long, value_name = "NAME", conflicts_with_all = ["uri", "host"])]
    pub saved: Option<String>,

    /// Browse a directory loaded from a JSON file instead of a server
    #[arg(long, value_name = "FILE")]
    pub fixture: Option<PathBuf>,
}

/// Invalid command-line connection options.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Must specify either a host (--host) or an URI.")]
    NoTarget,

    #[error("Both host and URI specified, only one allowed.")]
    HostAndUri,

    #[error("Invalid URI format given.")]
    MalformedUri,

    #[error("Port is not a valid number.")]
    InvalidPort,

    #[error(transparent)]
    History(#[from] HistoryError),
}

fn parse_port(raw: &str) -> Result<u16, StartupError> {
    match raw.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(StartupError::InvalidPort),
        Ok(port) => Ok(port),
    }
}

/// The URI to connect to, from either a URI or a host and port.
pub fn resolve_uri(
    uri: Option<&str>,
    host: Option<&str>,
    port: Option<&str>,
    default_port: u16,
) -> Result<String, StartupError> {
    match (uri, host) {
        (None, None) => Err(StartupError::NoTarget),
        (Some(_), Some(_)) => Err(StartupError::HostAndUri),
        (Some(uri), None) => {
            let parsed = Url::parse(uri).map_err(|e| match e {
                url::ParseError::InvalidPort => StartupError::InvalidPort,
                _ => StartupError::MalformedUri,
            })?;
            if !URI_SCHEMES.contains(&parsed.scheme()) {
                return Err(StartupError::MalformedUri);
            }
            if parsed.scheme() != "ldapi" && parsed.host_str().is_none_or(str::is_empty) {
                return Err(StartupError::MalformedUri);
            }
            Ok(uri.to_string())
        }
        (None, Some(host)) => {
            let port = port.map(parse_port).transpose()?.unwrap_or(default_port);
            if port == 0 {
                return Err(StartupError::InvalidPort);
            }
            Ok(format!("ldap://{host}:{port}"))
        }
    }
}

/// Pick the connection described by `args`: a recent one, a saved one, or a
/// new one built from URI or host. Explicit credentials override stored ones.
pub fn connection_data(
    args: &ConnectArgs,
    config: &ShellConfig,
    store: &ConnectionStore,
) -> Result<ConnectionData, StartupError> {
    let stored = if let Some(n) = args.recent {
        let index = usize::try_from(n.saturating_sub(1)).unwrap_or(usize::MAX);
        Some(store.recent_connection(index)?.clone())
    } else if let Some(name) = &args.saved {
        Some(store.connection(name)?.clone())
    } else {
        None
    };

    let data = match stored {
        Some(mut data) => {
            if let Some(bind_dn) = &args.bind_dn {
                data.bind_dn = bind_dn.clone();
            }
            if args.password.is_some() {
                data.password = args.password.clone();
            }
            data
        }
        None => ConnectionData::new(
            resolve_uri(
                args.uri.as_deref(),
                args.host.as_deref(),
                args.port.as_deref(),
                config.connection.port,
            )?,
            args.bind_dn
                .clone()
                .unwrap_or_else(|| config.connection.bind_dn.clone()),
            args.password.clone(),
        ),
    };
    debug!(uri = %data.uri, bind_dn = %data.bind_dn, "Resolved connection");
    Ok(data)
}
