//! Configuration loading and validation for the identifier service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid.
//! Key lengths are checked separately when the codec is built, which also
//! happens before the listener binds.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Validated service configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Base64-encoded 256-bit AES key used to seal identifiers. **Required.**
    pub id_encryption_key: String,

    /// Base64-encoded 256-bit key. When set, fingerprints are HMAC-SHA-256
    /// instead of bare SHA-256.
    #[serde(default)]
    pub fingerprint_key: Option<String>,

    /// Port the HTTP(S) server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Filesystem path to a PEM-encoded TLS certificate chain.
    #[serde(default)]
    pub tls_cert_path: Option<String>,

    /// Filesystem path to the PEM-encoded TLS private key.
    #[serde(default)]
    pub tls_key_path: Option<String>,

    /// OTLP endpoint. Span export is disabled when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".into()
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("id_encryption_key", &"[REDACTED]")
            .field(
                "fingerprint_key",
                &self.fingerprint_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("listen_port", &self.listen_port)
            .field("tls_cert_path", &self.tls_cert_path)
            .field("tls_key_path", &self.tls_key_path)
            .field("otel_exporter_otlp_endpoint", &self.otel_exporter_otlp_endpoint)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Returns the certificate and key paths when TLS termination is configured.
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        match (self.tls_cert_path.as_deref(), self.tls_key_path.as_deref()) {
            (Some(cert), Some(key)) => Some((cert, key)),
            _ => None,
        }
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.id_encryption_key, "ID_ENCRYPTION_KEY")?;
        if let Some(k) = &self.fingerprint_key {
            ensure_non_empty(k, "FINGERPRINT_KEY")?;
        }
        if let Some(ep) = &self.otel_exporter_otlp_endpoint {
            ensure_non_empty(ep, "OTEL_EXPORTER_OTLP_ENDPOINT")?;
        }
        match (&self.tls_cert_path, &self.tls_key_path) {
            (Some(cert), Some(key)) => {
                ensure_non_empty(cert, "TLS_CERT_PATH")?;
                ensure_non_empty(key, "TLS_KEY_PATH")?;
            }
            (None, None) => {}
            _ => anyhow::bail!("TLS_CERT_PATH and TLS_KEY_PATH must be set together"),
        }
        if self.listen_port == 0 {
            anyhow::bail!("LISTEN_PORT must be > 0");
        }
        Ok(())
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
