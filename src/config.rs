use std::{env, net::SocketAddr, path::PathBuf};

use anyhow::{bail, Context};

#[derive(Debug, Clone, PartialEq)]
pub enum Listen {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub pool_size: u32,
    pub listen: Listen,
    pub json_logs: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let database_url = var("DATABASE_URL").unwrap_or_else(|| "sqlite:tarjetas.db?mode=rwc".to_string());

        let pool_size = match var("POOL_SIZE") {
            Some(raw) => raw.parse::<u32>()
                .with_context(|| format!("invalid POOL_SIZE {raw:?}"))?,
            None => 5,
        };
        if pool_size == 0 {
            bail!("POOL_SIZE must be at least 1");
        }

        let listen = match var("SOCKET_DIR") {
            Some(sockets_dir) => {
                let hostname = var("HOSTNAME").unwrap_or_else(|| "tarjetas".to_string());
                Listen::Unix(PathBuf::from(format!("{sockets_dir}/{hostname}.sock")))
            }
            None => {
                let raw = var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string());
                Listen::Tcp(raw.parse().with_context(|| format!("invalid BIND_ADDR {raw:?}"))?)
            }
        };

        let json_logs = match var("LOG_FORMAT").as_deref() {
            None | Some("compact") => false,
            Some("json") => true,
            Some(other) => bail!("unknown LOG_FORMAT {other:?}, expected compact or json"),
        };

        Ok(Config { database_url, pool_size, listen, json_logs })
    }
}
