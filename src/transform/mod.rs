//! The metric-line transformation pipeline.
//!
//! Rewrites one event's free-text check output into InfluxDB line protocol:
//! tokenize each line, match it against the compiled template candidates,
//! aggregate same-triple lines into points, and serialize.

pub mod line;
pub mod point;
pub mod template;

use std::collections::BTreeMap;

use crate::event::Event;
use template::MeasurementRule;

/// Reserved bucket-path segment carrying inline tags.
///
/// A path like `cpu.eventtags.dc.east` overrides the measurement with the
/// prefix (`cpu`) and merges the suffix as alternating key/value tag pairs
/// (`dc=east`), at the highest priority.
const EVENT_TAGS_SEGMENT: &str = "eventtags";

/// Transform one event's output into serialized line-protocol strings.
///
/// Malformed lines (too few tokens, non-numeric timestamp) and lines hit by
/// `ignore_fields` are skipped; processing always continues with the next
/// line.
pub fn transform_output(event: &Event, rules: &[MeasurementRule]) -> Vec<String> {
    let overrides = &event.check.influxdb;
    let candidates =
        template::compile_candidates(rules, &event.check.name, &overrides.output_formats);

    let mut points = point::PointSet::default();

    for raw in event.check.output.lines() {
        let parsed = match line::parse_line(raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::debug!(%err, line = raw, "skipping metric line");
                continue;
            }
        };

        if overrides
            .ignore_fields
            .iter()
            .any(|field| parsed.bucket_path.contains(field.as_str()))
        {
            continue;
        }

        let components: Vec<&str> = parsed.bucket_path.split('.').collect();

        let mut measurement = event.check.name.clone();
        let mut event_tags: Vec<(String, String)> = Vec::new();
        if let Some(idx) = components.iter().position(|c| *c == EVENT_TAGS_SEGMENT) {
            measurement = components[..idx].join(".");
            for pair in components[idx + 1..].chunks(2) {
                if let [key, value] = pair {
                    event_tags.push((key.to_string(), value.to_string()));
                }
            }
        }

        let value = line::render_value(&parsed.value, &parsed.bucket_path, &overrides.string_fields);

        // No-match fallback: the whole bucket path becomes a single field
        // under the measurement in effect.
        let (field_key, template_tags) = match template::match_candidates(&candidates, &components)
        {
            Some(outcome) => {
                if let Some(m) = outcome.measurement {
                    measurement = m;
                }
                (
                    outcome
                        .field_key
                        .unwrap_or_else(|| parsed.bucket_path.clone()),
                    outcome.tags,
                )
            }
            None => (parsed.bucket_path.clone(), Vec::new()),
        };

        let mut tags: BTreeMap<String, String> = template_tags.into_iter().collect();
        tags.extend(event_tags);

        points.record(measurement, tags, field_key, value, parsed.timestamp);
    }

    let mut base_tags: BTreeMap<String, String> = event
        .client
        .tags
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    base_tags.extend(
        event
            .check
            .tags
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );

    points.render(&base_tags)
}
