// File: wire.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::config::Protocol;
use crate::error::ProbeError;
use crate::httpspec::RequestSpec;

/// Where a request is actually delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

impl Destination {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Destination {
            host: host.into(),
            port,
        }
    }

    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A request frozen for delivery: the parsed spec, its resolved
/// destination, and the raw byte serialization.
#[derive(Debug, Clone)]
pub struct EffectiveRequest {
    pub spec: RequestSpec,
    pub destination: Destination,
    pub raw: String,
}

impl EffectiveRequest {
    pub fn new(spec: RequestSpec, destination: Destination) -> Self {
        let raw = build_raw(&spec);
        EffectiveRequest {
            spec,
            destination,
            raw,
        }
    }
}

/// Resolves the destination for one sample.
///
/// Precedence: explicit target override, then the sample's Host header.
/// Fails closed when neither is present.
pub fn resolve_destination(
    spec: &RequestSpec,
    target: Option<&Destination>,
    protocol: Protocol,
) -> Result<Destination, ProbeError> {
    if let Some(target) = target {
        return Ok(target.clone());
    }
    let host_header = spec
        .header("Host")
        .ok_or_else(|| ProbeError::Resolution(String::new()))?;
    split_host_port(host_header, protocol.default_port())
}

fn split_host_port(raw: &str, default_port: u16) -> Result<Destination, ProbeError> {
    let raw = raw.trim();
    let (host, port) = match raw.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| ProbeError::Resolution(format!(" (bad port in {raw:?})")))?;
            (host, port)
        }
        None => (raw, default_port),
    };
    if host.is_empty() {
        return Err(ProbeError::Resolution(String::new()));
    }
    Ok(Destination::new(host, port))
}

/// Serializes a spec into the exact bytes written to a raw socket.
///
/// Headers go out in parse order. A Content-Length header is appended only
/// when the sample does not carry one (any case), valued at the UTF-8 byte
/// length of the body.
pub fn build_raw(spec: &RequestSpec) -> String {
    let mut out = format!("{} {} {}\r\n", spec.method, spec.path, spec.version);
    for (name, value) in spec.headers() {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push_str("\r\n");
    }
    if !spec.has_header("Content-Length") {
        out.push_str(&format!("Content-Length: {}\r\n", spec.body.len()));
    }
    out.push_str("\r\n");
    out.push_str(&spec.body);
    out
}

/// Header set for the HTTP-client strategy: Host and Content-Length are
/// dropped because the client computes both itself.
pub fn client_headers(spec: &RequestSpec) -> Vec<(String, String)> {
    spec.headers()
        .iter()
        .filter(|(name, _)| {
            !name.eq_ignore_ascii_case("host") && !name.eq_ignore_ascii_case("content-length")
        })
        .cloned()
        .collect()
}
