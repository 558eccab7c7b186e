// File: config.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use crate::cli::Cli;
use crate::error::ProbeError;
use crate::resilience::RetryPolicy;
use crate::verdict::DetectionPolicy;
use crate::wire::Destination;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }

    pub fn scheme(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

/// Connect-phase and read-phase deadlines; both restart on every retry
/// attempt.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            connect: Duration::from_secs(10),
            read: Duration::from_secs(30),
        }
    }
}

/// Validated run configuration assembled from the CLI. Immutable once the
/// run starts.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub target: Destination,
    pub protocol: Protocol,
    pub workers: usize,
    pub timeouts: Timeouts,
    pub retry: RetryPolicy,
    pub policy: DetectionPolicy,
    pub use_client_transport: bool,
    pub debug: bool,
}

impl ScanConfig {
    pub fn from_cli(cli: &Cli) -> Result<ScanConfig, ProbeError> {
        let (target, protocol) = parse_target(&cli.target)?;
        let timeouts = parse_timeout_pair(&cli.timeout)?;

        if !(0.0..=1.0).contains(&cli.loss_rate) {
            return Err(ProbeError::config(format!(
                "loss rate must be within 0.0..=1.0, got {}",
                cli.loss_rate
            )));
        }
        if cli.max_retries < 1 {
            return Err(ProbeError::config("max retries must be at least 1"));
        }
        if cli.threads < 1 {
            return Err(ProbeError::config("thread count must be at least 1"));
        }

        Ok(ScanConfig {
            target,
            protocol,
            workers: cli.threads,
            timeouts,
            retry: RetryPolicy {
                loss_rate: cli.loss_rate,
                max_retries: cli.max_retries,
                backoff: Duration::from_secs(1),
            },
            policy: DetectionPolicy {
                block_status: cli.custom_code,
                treat_reset_as_block: cli.rst_detect,
                block_keyword: cli.keyword.clone(),
            },
            use_client_transport: cli.client_transport,
            debug: cli.debug,
        })
    }
}

/// Parses a target such as `http://127.0.0.1`, `https://waf:8443` or a
/// bare `host[:port]` (scheme defaults to http, port to the scheme's
/// default).
pub fn parse_target(raw: &str) -> Result<(Destination, Protocol), ProbeError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ProbeError::config("target must not be empty"));
    }

    let (protocol, rest) = if let Some(rest) = raw.strip_prefix("https://") {
        (Protocol::Https, rest)
    } else if let Some(rest) = raw.strip_prefix("http://") {
        (Protocol::Http, rest)
    } else {
        (Protocol::Http, raw)
    };

    let authority = rest.split('/').next().unwrap_or("");
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| ProbeError::config(format!("invalid port in target {raw:?}")))?;
            (host, port)
        }
        None => (authority, protocol.default_port()),
    };

    if host.is_empty() {
        return Err(ProbeError::config(format!("no host in target {raw:?}")));
    }

    Ok((Destination::new(host, port), protocol))
}

/// Parses `"connect,read"` seconds; a single value is used for both
/// phases. Anything unparsable is a fatal configuration error.
pub fn parse_timeout_pair(raw: &str) -> Result<Timeouts, ProbeError> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    let parse = |value: &str| -> Result<Duration, ProbeError> {
        let seconds = value
            .parse::<f64>()
            .map_err(|_| ProbeError::config(format!("invalid timeout value {value:?}")))?;
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(ProbeError::config(format!(
                "timeout must be a positive number of seconds, got {value:?}"
            )));
        }
        Ok(Duration::from_secs_f64(seconds))
    };

    match parts.as_slice() {
        [single] => {
            let value = parse(single)?;
            Ok(Timeouts {
                connect: value,
                read: value,
            })
        }
        [connect, read] => Ok(Timeouts {
            connect: parse(connect)?,
            read: parse(read)?,
        }),
        _ => Err(ProbeError::config(format!(
            "timeout must be \"connect,read\", got {raw:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_with_scheme_and_port() {
        let (dest, protocol) = parse_target("https://10.1.2.3:8443").unwrap();
        assert_eq!(dest, Destination::new("10.1.2.3", 8443));
        assert_eq!(protocol, Protocol::Https);
    }

    #[test]
    fn bare_host_defaults_to_http_80() {
        let (dest, protocol) = parse_target("waf.local").unwrap();
        assert_eq!(dest, Destination::new("waf.local", 80));
        assert_eq!(protocol, Protocol::Http);
    }

    #[test]
    fn https_scheme_defaults_to_443() {
        let (dest, _) = parse_target("https://waf.local").unwrap();
        assert_eq!(dest.port, 443);
    }

    #[test]
    fn trailing_path_is_ignored() {
        let (dest, _) = parse_target("http://waf.local:8080/admin").unwrap();
        assert_eq!(dest, Destination::new("waf.local", 8080));
    }

    #[test]
    fn bad_port_is_config_error() {
        assert!(parse_target("http://waf.local:notaport").is_err());
    }

    #[test]
    fn empty_target_is_config_error() {
        assert!(parse_target("  ").is_err());
    }

    #[test]
    fn timeout_pair_parses_both_values() {
        let t = parse_timeout_pair("5,20").unwrap();
        assert_eq!(t.connect, Duration::from_secs(5));
        assert_eq!(t.read, Duration::from_secs(20));
    }

    #[test]
    fn single_timeout_covers_both_phases() {
        let t = parse_timeout_pair("7.5").unwrap();
        assert_eq!(t.connect, Duration::from_secs_f64(7.5));
        assert_eq!(t.read, t.connect);
    }

    #[test]
    fn garbage_timeout_is_fatal() {
        assert!(parse_timeout_pair("ten,thirty").is_err());
        assert!(parse_timeout_pair("1,2,3").is_err());
        assert!(parse_timeout_pair("-1").is_err());
    }
}
