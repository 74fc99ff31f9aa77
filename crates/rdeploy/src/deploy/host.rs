//! Host specifier parsing

use std::fmt;

/// Address used when a specifier has an empty host part
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port used when a specifier has no usable port
pub const DEFAULT_PORT: u16 = 23979;

/// A resolved `address:port` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAddress {
    pub address: String,
    pub port: u16,
}

impl HostAddress {
    /// Parse a `host` or `host:port` specifier
    ///
    /// Never fails; missing or unparsable parts fall back to the given
    /// defaults. Supports formats:
    /// - "host" -> ("host", default_port), taken verbatim
    /// - "Host:2222" -> ("host", 2222), host part lower-cased and trimmed
    /// - ":2222" -> (default_host, 2222)
    /// - "host:abc" -> ("host", default_port)
    ///
    /// Only the `host:port` form folds case. The bare form is passed through
    /// untouched.
    pub fn parse(spec: &str, default_host: &str, default_port: u16) -> Self {
        let Some((addr_part, port_part)) = spec.split_once(':') else {
            return Self {
                address: spec.to_string(),
                port: default_port,
            };
        };

        let address = addr_part.to_lowercase().trim().to_string();
        let address = if address.is_empty() {
            default_host.to_string()
        } else {
            address
        };

        let port = port_part.trim().parse::<u16>().unwrap_or(default_port);

        Self { address, port }
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}
