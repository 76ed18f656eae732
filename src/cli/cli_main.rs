// Main CLI entrypoint
// (c) 2025 Ross Younger

use std::process::ExitCode;

use super::args::CliArgs;

use crate::{
    config::{self, Store},
    net, resolver,
    util::{join_query, setup_tracing, split_host_from_query},
};
use anyhow::Context as _;
use clap::Parser;
use tracing::{info, warn};

/// Main CLI entrypoint
pub fn cli() -> anyhow::Result<ExitCode> {
    use super::styles::{ERROR_S, WARNING_S};
    use anstream::eprintln;
    use owo_colors::OwoColorize as _;

    let args = CliArgs::parse();
    if args.config_files {
        for file in config::config_files() {
            println!("{file}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    setup_tracing(args.trace_level(), args.log_file.as_deref())
        .inspect_err(|e| eprintln!("{e:?}"))?;

    let mut store = match config::load(args.config.as_deref()) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("{} {e:#}", "ERROR".style(*ERROR_S));
            return Ok(ExitCode::FAILURE);
        }
    };

    if args.show_config {
        if store.is_empty() {
            eprintln!("{}: no configuration was found", "WARNING".style(*WARNING_S));
        }
        println!("{store}");
        return Ok(ExitCode::SUCCESS);
    }

    run_query(&args, &mut store)
        .inspect_err(|e| tracing::error!("{e:#}"))
        .map(|()| ExitCode::SUCCESS)
        .or_else(|_| Ok(ExitCode::FAILURE))
}

/// Per-server configuration key naming the server to query
const SERVER_KEY: &str = "whois-server";
/// Per-server configuration key overriding the port to connect to
const PORT_KEY: &str = "port";

fn run_query(args: &CliArgs, store: &mut Store) -> anyhow::Result<()> {
    let raw = join_query(&args.query);
    let (query, forced_host) = match split_host_from_query(&raw) {
        Some((q, h)) => (q.to_string(), Some(h.to_string())),
        None => (raw, None),
    };

    let (server, port) = resolve_target(args, store, &query, forced_host.as_deref())?;
    let service = if port == 0 {
        net::DEFAULT_SERVICE.to_string()
    } else {
        port.to_string()
    };

    if args.dry_run {
        println!("{server}:{service}");
        return Ok(());
    }

    info!("querying {query:?} at {server}:{service}");
    let timeout = config::connect_timeout(store);
    let stream = net::connect(&server, port, timeout)?;
    let peer = stream.peer_addr().context("reading peer address")?;
    // We don't speak the lookup protocol itself; reaching the server is the job.
    println!("connected to {peer}");
    Ok(())
}

/// Works out which server to dial, and on which port.
///
/// The server comes from `--host`, a `query@host` override, or the first
/// `server-options` pattern matching the query; the port from `--port` or the
/// chosen server's own `port` entry, `0` meaning the `whois` service.
fn resolve_target(
    args: &CliArgs,
    store: &mut Store,
    query: &str,
    forced_host: Option<&str>,
) -> anyhow::Result<(String, u16)> {
    let server = args
        .host
        .as_deref()
        .or(forced_host)
        .map(String::from)
        .or_else(|| resolver::server_option(store, query, SERVER_KEY))
        .ok_or_else(|| anyhow::anyhow!("no server configured for {query:?} (hint: --host)"))?;

    let port = match args.port {
        Some(p) => p,
        None => server_port(store, &server),
    };
    Ok((server, port))
}

fn server_port(store: &mut Store, server: &str) -> u16 {
    let Some(value) = resolver::server_option(store, server, PORT_KEY) else {
        return 0;
    };
    value.parse().unwrap_or_else(|_| {
        warn!("ignoring unusable port {value:?} configured for {server}");
        0
    })
}

///////////////////////////////////////////////////////////////////////////
