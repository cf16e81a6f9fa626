//! Outbound delivery to the destination's write endpoint.

use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::config::HandlerSettings;

/// Maximum duration for one write request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers one newline-joined payload to a destination.
///
/// The call is synchronous; the outcome of the whole batch is the outcome of
/// this single call.
pub trait Transport {
    fn send(&self, payload: &str) -> Result<()>;
}

/// HTTP POST transport against an InfluxDB `/write` endpoint.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpTransport {
    /// Build a transport from handler settings, applying the TLS knobs.
    pub fn new(settings: &HandlerSettings) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder().timeout(REQUEST_TIMEOUT);

        if settings.ssl {
            if !settings.ssl_verify {
                builder = builder.danger_accept_invalid_certs(true);
            }
            if let Some(path) = &settings.ssl_ca_file {
                let pem = std::fs::read(path)
                    .with_context(|| format!("reading CA file {}", path.display()))?;
                let cert = reqwest::Certificate::from_pem(&pem)
                    .with_context(|| format!("parsing CA file {}", path.display()))?;
                builder = builder.add_root_certificate(cert);
            }
        }

        let client = builder.build().context("building HTTP client")?;

        Ok(Self {
            client,
            url: settings.write_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for HttpTransport {
    fn send(&self, payload: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .body(payload.to_string())
            .send()
            .context("sending write request")?;

        let status = response.status();
        // Drain the body for connection reuse.
        let _ = response.bytes();

        if !status.is_success() {
            bail!("write endpoint returned status {status}");
        }

        tracing::debug!(%status, bytes = payload.len(), "wrote batch");

        Ok(())
    }
}
