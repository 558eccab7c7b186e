// File: transport.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use log::{debug, trace};
use once_cell::sync::Lazy;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::config::{Protocol, Timeouts};
use crate::error::{classify_io_error, TransportError};
use crate::wire::{client_headers, EffectiveRequest};

/// What one delivery attempt observed.
///
/// `status == 0` with `connection_reset == false` is a non-reset failure
/// (malformed response, exhausted retries); the reason text carries the
/// detail.
#[derive(Debug, Clone)]
pub struct TransportOutcome {
    pub status: u16,
    pub reason: String,
    pub body: String,
    pub connection_reset: bool,
    pub elapsed: Duration,
}

impl TransportOutcome {
    /// Outcome for a failure that never produced a valid response.
    pub fn synthetic(reason: impl Into<String>, connection_reset: bool, elapsed: Duration) -> Self {
        TransportOutcome {
            status: 0,
            reason: reason.into(),
            body: String::new(),
            connection_reset,
            elapsed,
        }
    }
}

/// One delivery strategy. Both strategies honor the same connect/read
/// timeout pair and map peer resets onto `TransportErrorKind::Reset`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, request: &EffectiveRequest) -> Result<TransportOutcome, TransportError>;
}

// Self-signed and otherwise broken certificates are expected on test
// targets, so the raw strategy skips verification entirely.
struct AcceptAnyCert;

impl rustls::client::ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}

static TLS_CONFIG: Lazy<Arc<rustls::ClientConfig>> = Lazy::new(|| {
    let config = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
        .with_no_client_auth();
    Arc::new(config)
});

/// Raw-socket strategy: writes the serialized sample byte-for-byte and
/// reads until the peer closes or the read deadline passes.
pub struct RawTransport {
    protocol: Protocol,
    timeouts: Timeouts,
}

impl RawTransport {
    pub fn new(protocol: Protocol, timeouts: Timeouts) -> Self {
        RawTransport { protocol, timeouts }
    }

    async fn exchange<S>(
        &self,
        stream: &mut S,
        request: &EffectiveRequest,
        start: Instant,
    ) -> Result<TransportOutcome, TransportError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        stream
            .write_all(request.raw.as_bytes())
            .await
            .map_err(|e| classify_io_error(&e, "write"))?;

        let mut buffer = Vec::new();
        let deadline = Instant::now() + self.timeouts.read;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                trace!("read deadline reached after {} bytes", buffer.len());
                break;
            }
            let mut chunk = [0u8; 4096];
            match tokio::time::timeout(remaining, stream.read(&mut chunk)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => buffer.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => return Err(classify_io_error(&e, "read")),
                // Read timeout: keep whatever arrived and parse it.
                Err(_) => break,
            }
        }

        Ok(parse_response(&buffer, start.elapsed()))
    }
}

#[async_trait]
impl Transport for RawTransport {
    async fn deliver(&self, request: &EffectiveRequest) -> Result<TransportOutcome, TransportError> {
        let start = Instant::now();
        let authority = request.destination.authority();
        debug!("raw delivery to {}", authority);

        let stream = match tokio::time::timeout(
            self.timeouts.connect,
            TcpStream::connect(&authority),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(classify_io_error(&e, "connect")),
            Err(_) => {
                return Err(TransportError::timeout(format!(
                    "connect to {authority} timed out"
                )))
            }
        };

        match self.protocol {
            Protocol::Http => {
                let mut stream = stream;
                self.exchange(&mut stream, request, start).await
            }
            Protocol::Https => {
                let connector = TlsConnector::from(Arc::clone(&TLS_CONFIG));
                let domain = rustls::ServerName::try_from(request.destination.host.as_str())
                    .map_err(|e| {
                        TransportError::other(format!(
                            "invalid TLS server name {:?}: {e}",
                            request.destination.host
                        ))
                    })?;
                let handshake =
                    tokio::time::timeout(self.timeouts.connect, connector.connect(domain, stream));
                let mut tls_stream = match handshake.await {
                    Ok(Ok(tls_stream)) => tls_stream,
                    Ok(Err(e)) => return Err(classify_io_error(&e, "tls handshake")),
                    Err(_) => {
                        return Err(TransportError::timeout(format!(
                            "tls handshake with {authority} timed out"
                        )))
                    }
                };
                self.exchange(&mut tls_stream, request, start).await
            }
        }
    }
}

/// Parses the buffered response; fewer than two status-line tokens yields
/// the malformed-response outcome (status 0) instead of an error.
fn parse_response(buffer: &[u8], elapsed: Duration) -> TransportOutcome {
    let text = String::from_utf8_lossy(buffer).to_string();
    let status_line = text.split("\r\n").next().unwrap_or("");
    let parts: Vec<&str> = status_line.split_whitespace().collect();

    let status = if parts.len() < 2 {
        None
    } else {
        parts[1].parse::<u16>().ok()
    };

    match status {
        Some(status) => TransportOutcome {
            status,
            reason: parts[2..].join(" "),
            body: text,
            connection_reset: false,
            elapsed,
        },
        None => TransportOutcome {
            status: 0,
            reason: "Invalid response status line".to_string(),
            body: text,
            connection_reset: false,
            elapsed,
        },
    }
}

/// HTTP-client strategy: same contract through reqwest, with the client's
/// exception taxonomy folded back onto Timeout / Reset / Other.
pub struct ClientTransport {
    client: reqwest::Client,
    protocol: Protocol,
}

impl ClientTransport {
    pub fn new(protocol: Protocol, timeouts: Timeouts) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.read)
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| TransportError::other(format!("failed to build HTTP client: {e}")))?;
        Ok(ClientTransport { client, protocol })
    }
}

#[async_trait]
impl Transport for ClientTransport {
    async fn deliver(&self, request: &EffectiveRequest) -> Result<TransportOutcome, TransportError> {
        let spec = &request.spec;
        let url = format!(
            "{}://{}{}",
            self.protocol.scheme(),
            request.destination.authority(),
            spec.path
        );
        let method = reqwest::Method::from_bytes(spec.method.as_bytes())
            .map_err(|_| TransportError::other(format!("invalid method {:?}", spec.method)))?;

        let mut builder = self.client.request(method, &url);
        for (name, value) in client_headers(spec) {
            builder = builder.header(name, value);
        }
        if !spec.body.is_empty() {
            builder = builder.body(spec.body.clone());
        }

        debug!("client delivery to {}", url);
        let start = Instant::now();
        let response = builder.send().await.map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        let reason = response
            .status()
            .canonical_reason()
            .unwrap_or("")
            .to_string();
        let body = response.text().await.map_err(classify_reqwest_error)?;

        Ok(TransportOutcome {
            status,
            reason,
            body,
            connection_reset: false,
            elapsed: start.elapsed(),
        })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::timeout(format!("request timed out: {err}"));
    }
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted
            ) {
                return TransportError::reset("connection reset by peer");
            }
        }
        source = cause.source();
    }
    TransportError::other(format!("request failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_response_full_status_line() {
        let outcome = parse_response(
            b"HTTP/1.1 403 Forbidden\r\nServer: waf\r\n\r\ndenied",
            Duration::ZERO,
        );
        assert_eq!(outcome.status, 403);
        assert_eq!(outcome.reason, "Forbidden");
        assert!(outcome.body.contains("denied"));
        assert!(!outcome.connection_reset);
    }

    #[test]
    fn parse_response_without_reason_phrase() {
        let outcome = parse_response(b"HTTP/1.1 200\r\n\r\n", Duration::ZERO);
        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.reason, "");
    }

    #[test]
    fn short_status_line_is_malformed() {
        let outcome = parse_response(b"HTTP/1.1\r\n", Duration::ZERO);
        assert_eq!(outcome.status, 0);
        assert_eq!(outcome.reason, "Invalid response status line");
    }

    #[test]
    fn empty_response_is_malformed() {
        let outcome = parse_response(b"", Duration::ZERO);
        assert_eq!(outcome.status, 0);
        assert_eq!(outcome.reason, "Invalid response status line");
    }

    #[test]
    fn non_numeric_status_is_malformed() {
        let outcome = parse_response(b"HTTP/1.1 abc OK\r\n\r\n", Duration::ZERO);
        assert_eq!(outcome.status, 0);
    }
}
