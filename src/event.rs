//! Inbound event model.
//!
//! Events arrive as JSON produced by the monitoring host, one per check
//! result. Only the fields the relay consumes are modeled; everything else in
//! the payload is ignored during deserialization.

use std::collections::HashMap;

use serde::Deserialize;

/// One check result event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Event {
    /// The client (host) the check ran on.
    #[serde(default)]
    pub client: Client,

    /// The check result itself.
    #[serde(default)]
    pub check: Check,
}

/// Client metadata attached to every event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Client {
    #[serde(default)]
    pub name: String,

    /// Tags applied to every point produced from this client's events.
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// Check result payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Check {
    /// Check name, used as the default measurement.
    #[serde(default)]
    pub name: String,

    /// Raw multi-line metric output.
    #[serde(default)]
    pub output: String,

    /// Handler names declared by the check; the first one known to the relay
    /// selects the destination.
    #[serde(default)]
    pub handlers: Vec<String>,

    /// Tags applied to every point produced from this check's events.
    #[serde(default)]
    pub tags: HashMap<String, String>,

    /// Relay-specific per-check overrides.
    #[serde(default)]
    pub influxdb: CheckOverrides,
}

/// Per-check transformation overrides carried under the `influxdb` key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckOverrides {
    /// Ordered template formats tried against each metric line.
    #[serde(default)]
    pub output_formats: Vec<OutputFormat>,

    /// Lines whose bucket path contains any of these substrings are dropped.
    #[serde(default)]
    pub ignore_fields: Vec<String>,

    /// Values for bucket paths containing any of these substrings are always
    /// rendered as quoted strings, even when numeric.
    #[serde(default)]
    pub string_fields: Vec<String>,
}

/// One entry of `output_formats`: either a plain format string, or a map of
/// measurement name to format strings (same shape as a measurement rule).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OutputFormat {
    Plain(String),
    Named(HashMap<String, Vec<String>>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_event_deserializes() {
        let event: Event = serde_json::from_str(
            r#"{"client":{"name":"rspec"},"check":{"name":"check_name","output":"rspec 69 1480697845"}}"#,
        )
        .expect("valid event");

        assert_eq!(event.client.name, "rspec");
        assert_eq!(event.check.name, "check_name");
        assert_eq!(event.check.output, "rspec 69 1480697845");
        assert!(event.check.handlers.is_empty());
    }

    #[test]
    fn test_event_without_check_name() {
        // Proxy-targeted events may omit the check name entirely.
        let event: Event = serde_json::from_str(
            r#"{"client":{"name":"rspec"},"check":{"handlers":["proxy"],"output":"rspec 69 1480697845"}}"#,
        )
        .expect("valid event");

        assert_eq!(event.check.name, "");
        assert_eq!(event.check.handlers, vec!["proxy"]);
    }

    #[test]
    fn test_output_formats_plain_and_named() {
        let event: Event = serde_json::from_str(
            r#"{"check":{"name":"c","influxdb":{"output_formats":["host.metric",{"webstats":["measurement.host.metric"]}]}}}"#,
        )
        .expect("valid event");

        let formats = &event.check.influxdb.output_formats;
        assert_eq!(formats.len(), 2);
        assert!(matches!(&formats[0], OutputFormat::Plain(f) if f == "host.metric"));
        match &formats[1] {
            OutputFormat::Named(map) => {
                assert_eq!(map["webstats"], vec!["measurement.host.metric"]);
            }
            other => panic!("expected named format, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let event: Event = serde_json::from_str(
            r#"{"client":{"name":"a","address":"10.0.0.1"},"check":{"name":"c","status":0,"output":""}}"#,
        )
        .expect("valid event");
        assert_eq!(event.check.name, "c");
    }
}
