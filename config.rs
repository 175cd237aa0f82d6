use std::{
    net::{SocketAddr, ToSocketAddrs},
    path::PathBuf,
};

use clap::Parser;

/// Startup configuration, read from flags first and then from the environment
#[derive(Debug, Clone, Parser)]
#[command(name = "todo", version, about = "Minimal single-user todo list")]
pub struct Config {
    /// Database path
    #[arg(long, env = "DBPATH", default_value = "todo.db")]
    pub dbpath: PathBuf,

    /// [int]:<port> to bind to
    #[arg(long, env = "BIND", default_value = "0.0.0.0:8000", value_parser = parse_bind)]
    pub bind: SocketAddr,
}

/// Accepts `ip:port`, a resolvable `host:port`, or `:port` for all interfaces
pub fn parse_bind(value: &str) -> Result<SocketAddr, String> {
    let value = value.trim();
    if let Some(port) = value.strip_prefix(':') {
        let port = port
            .parse::<u16>()
            .map_err(|e| format!("invalid port '{port}': {e}"))?;
        return Ok(SocketAddr::from(([0, 0, 0, 0], port)));
    }
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Ok(addr);
    }
    value
        .to_socket_addrs()
        .map_err(|e| format!("invalid bind address '{value}': {e}"))?
        .next()
        .ok_or_else(|| format!("'{value}' did not resolve to any address"))
}
