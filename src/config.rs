use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::transform::template::MeasurementRule;

/// Registry name of the primary destination handler.
pub const PRIMARY_HANDLER: &str = "influxdb";

/// Top-level configuration for the relay.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Logging verbosity (debug, info, warn, error). Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Primary destination handler settings.
    pub influxdb: HandlerSettings,

    /// Additional named handlers; every unset key inherits from the primary.
    #[serde(default)]
    pub handlers: HashMap<String, HandlerOverrides>,
}

/// Settings for one destination handler.
#[derive(Debug, Clone, Deserialize)]
pub struct HandlerSettings {
    /// InfluxDB host. Default: 127.0.0.1.
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// InfluxDB HTTP port. Default: 8086.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Use HTTPS. Default: false.
    #[serde(default)]
    pub ssl: bool,

    /// Verify the server certificate. Default: true.
    #[serde(default = "default_true")]
    pub ssl_verify: bool,

    /// Additional CA certificate bundle (PEM).
    #[serde(default)]
    pub ssl_ca_file: Option<PathBuf>,

    /// Timestamp precision query parameter. Default: "s".
    #[serde(default = "default_precision")]
    pub precision: String,

    /// Retention policy query parameter, if any.
    #[serde(default)]
    pub retention_policy: Option<String>,

    /// Basic credentials passed as query parameters.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,

    /// Target database. Required.
    #[serde(default)]
    pub database: String,

    /// Buffered line count that triggers a flush. Default: 100.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Buffer age that triggers a flush. Default: 10s.
    #[serde(default = "default_buffer_max_age", with = "humantime_serde")]
    pub buffer_max_age: Duration,

    /// Forward raw output lines unmodified, bypassing transformation.
    #[serde(default)]
    pub proxy_mode: bool,

    /// Named measurement rules tried before event-level formats.
    #[serde(default)]
    pub measurement_rules: Vec<MeasurementRule>,
}

/// Partial handler settings for additional handlers; `None` inherits the
/// primary handler's value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandlerOverrides {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub ssl: Option<bool>,
    #[serde(default)]
    pub ssl_verify: Option<bool>,
    #[serde(default)]
    pub ssl_ca_file: Option<PathBuf>,
    #[serde(default)]
    pub precision: Option<String>,
    #[serde(default)]
    pub retention_policy: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub buffer_size: Option<usize>,
    #[serde(default, with = "humantime_serde::option")]
    pub buffer_max_age: Option<Duration>,
    #[serde(default)]
    pub proxy_mode: Option<bool>,
    #[serde(default)]
    pub measurement_rules: Option<Vec<MeasurementRule>>,
}

// --- Default value functions ---

fn default_log_level() -> String {
    "info".to_string()
}

fn default_hostname() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8086
}

fn default_true() -> bool {
    true
}

fn default_precision() -> String {
    "s".to_string()
}

fn default_buffer_size() -> usize {
    100
}

fn default_buffer_max_age() -> Duration {
    Duration::from_secs(10)
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            port: default_port(),
            ssl: false,
            ssl_verify: true,
            ssl_ca_file: None,
            precision: default_precision(),
            retention_policy: None,
            username: None,
            password: None,
            database: String::new(),
            buffer_size: default_buffer_size(),
            buffer_max_age: default_buffer_max_age(),
            proxy_mode: false,
            measurement_rules: Vec::new(),
        }
    }
}

// --- Validation and loading ---

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate the configuration for required fields and consistency.
    pub fn validate(&self) -> Result<()> {
        for (name, settings) in self.handler_settings() {
            if settings.hostname.is_empty() {
                bail!("handler {name}: hostname is required");
            }
            if settings.database.is_empty() {
                bail!("handler {name}: database is required");
            }
            if settings.buffer_size == 0 {
                bail!("handler {name}: buffer_size must be positive");
            }
            for rule in &settings.measurement_rules {
                if rule.name.is_empty() {
                    bail!("handler {name}: measurement rule without a name");
                }
                if rule.formats.is_empty() {
                    bail!(
                        "handler {name}: measurement rule {} has no formats",
                        rule.name
                    );
                }
            }
        }

        Ok(())
    }

    /// Effective settings for every handler, primary first, additional
    /// handlers in name order with inheritance applied.
    pub fn handler_settings(&self) -> Vec<(String, HandlerSettings)> {
        let mut all = vec![(PRIMARY_HANDLER.to_string(), self.influxdb.clone())];

        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        for name in names {
            all.push((
                name.clone(),
                self.influxdb.with_overrides(&self.handlers[name]),
            ));
        }

        all
    }
}

impl HandlerSettings {
    /// Apply an additional handler's overrides on top of these settings.
    pub fn with_overrides(&self, overrides: &HandlerOverrides) -> HandlerSettings {
        let mut merged = self.clone();
        let ov = overrides.clone();

        if let Some(v) = ov.hostname {
            merged.hostname = v;
        }
        if let Some(v) = ov.port {
            merged.port = v;
        }
        if let Some(v) = ov.ssl {
            merged.ssl = v;
        }
        if let Some(v) = ov.ssl_verify {
            merged.ssl_verify = v;
        }
        if let Some(v) = ov.ssl_ca_file {
            merged.ssl_ca_file = Some(v);
        }
        if let Some(v) = ov.precision {
            merged.precision = v;
        }
        if let Some(v) = ov.retention_policy {
            merged.retention_policy = Some(v);
        }
        if let Some(v) = ov.username {
            merged.username = Some(v);
        }
        if let Some(v) = ov.password {
            merged.password = Some(v);
        }
        if let Some(v) = ov.database {
            merged.database = v;
        }
        if let Some(v) = ov.buffer_size {
            merged.buffer_size = v;
        }
        if let Some(v) = ov.buffer_max_age {
            merged.buffer_max_age = v;
        }
        if let Some(v) = ov.proxy_mode {
            merged.proxy_mode = v;
        }
        if let Some(v) = ov.measurement_rules {
            merged.measurement_rules = v;
        }

        merged
    }

    /// Build the `/write` endpoint URL for this handler.
    pub fn write_url(&self) -> String {
        let protocol = if self.ssl { "https" } else { "http" };
        let mut url = format!(
            "{protocol}://{}:{}/write?db={}&precision={}",
            self.hostname, self.port, self.database, self.precision,
        );

        if let Some(rp) = &self.retention_policy {
            url.push_str("&rp=");
            url.push_str(rp);
        }

        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            url.push_str("&u=");
            url.push_str(username);
            url.push_str("&p=");
            url.push_str(password);
        }

        url
    }
}
