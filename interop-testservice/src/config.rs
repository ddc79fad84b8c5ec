use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Port the gRPC binding listens on by default.
pub const DEFAULT_GRPC_PORT: u16 = 10301;

/// Port the HTTP binding listens on by default.
pub const DEFAULT_HTTP_PORT: u16 = 10302;

const DEFAULT_HOP_TIMEOUT: Duration = Duration::from_secs(10);

pub const ENV_GRPC_ADDR: &str = "INTEROP_GRPC_ADDR";
pub const ENV_HTTP_ADDR: &str = "INTEROP_HTTP_ADDR";
pub const ENV_HOP_TIMEOUT_MS: &str = "INTEROP_HOP_TIMEOUT_MS";

/// Runtime settings for one node of the chain.
#[derive(Clone, Debug)]
pub struct Config {
    /// Listen address of the gRPC binding.
    pub grpc_addr: SocketAddr,
    /// Listen address of the HTTP binding.
    pub http_addr: SocketAddr,
    /// Deadline applied to each outbound hop, connect included.
    pub hop_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            grpc_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_GRPC_PORT)),
            http_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_HTTP_PORT)),
            hop_timeout: DEFAULT_HOP_TIMEOUT,
        }
    }
}

impl Config {
    /// Build from the `INTEROP_*` environment variables. Unset variables fall
    /// back to the defaults; unparsable values do too, with a warning, so a
    /// typo in deployment config cannot keep the node from starting.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            grpc_addr: parse_addr(ENV_GRPC_ADDR, env::var(ENV_GRPC_ADDR).ok(), defaults.grpc_addr),
            http_addr: parse_addr(ENV_HTTP_ADDR, env::var(ENV_HTTP_ADDR).ok(), defaults.http_addr),
            hop_timeout: parse_timeout(
                env::var(ENV_HOP_TIMEOUT_MS).ok(),
                defaults.hop_timeout,
            ),
        }
    }
}

fn parse_addr(key: &str, raw: Option<String>, default: SocketAddr) -> SocketAddr {
    match raw {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "unparsable listen address, using default");
            default
        }),
        None => default,
    }
}

fn parse_timeout(raw: Option<String>, default: Duration) -> Duration {
    match raw {
        Some(raw) => match raw.parse::<u64>() {
            Ok(millis) => Duration::from_millis(millis),
            Err(_) => {
                tracing::warn!(key = ENV_HOP_TIMEOUT_MS, value = %raw, "unparsable timeout, using default");
                default
            }
        },
        None => default,
    }
}
