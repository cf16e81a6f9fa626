//! Point aggregation and tag serialization.
//!
//! Parsed lines that share a (measurement, tag set, timestamp) triple merge
//! into one point carrying multiple fields. Points keep the first-occurrence
//! order of their triples; fields keep the first-occurrence order of their
//! keys, with same-key writes overwriting in place.

use std::collections::BTreeMap;

/// One unit of wire serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Point {
    pub measurement: String,
    /// Line-level tags (template-derived plus event-output tags). Client and
    /// check tags are merged in at render time.
    pub tags: BTreeMap<String, String>,
    /// Field key/value pairs in first-occurrence order.
    pub fields: Vec<(String, String)>,
    pub timestamp: String,
}

/// The accumulating point list for one event's output.
#[derive(Debug, Default)]
pub struct PointSet {
    points: Vec<Point>,
}

impl PointSet {
    /// Record one parsed line, merging into an existing point when the
    /// (measurement, tags, timestamp) triple is already present.
    pub fn record(
        &mut self,
        measurement: String,
        tags: BTreeMap<String, String>,
        field_key: String,
        field_value: String,
        timestamp: String,
    ) {
        if let Some(point) = self.points.iter_mut().find(|p| {
            p.measurement == measurement && p.tags == tags && p.timestamp == timestamp
        }) {
            match point.fields.iter_mut().find(|(key, _)| *key == field_key) {
                Some(field) => field.1 = field_value,
                None => point.fields.push((field_key, field_value)),
            }
            return;
        }

        self.points.push(Point {
            measurement,
            tags,
            fields: vec![(field_key, field_value)],
            timestamp,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Render every point as a line-protocol string, merging `base_tags`
    /// (client and check tags) under the point's own tags.
    pub fn render(&self, base_tags: &BTreeMap<String, String>) -> Vec<String> {
        self.points
            .iter()
            .map(|point| {
                let mut merged = base_tags.clone();
                merged.extend(point.tags.clone());

                let fields = point
                    .fields
                    .iter()
                    .map(|(key, value)| format!("{key}={value}"))
                    .collect::<Vec<_>>()
                    .join(",");

                format!(
                    "{}{} {} {}",
                    point.measurement,
                    serialize_tags(&merged),
                    fields,
                    point.timestamp,
                )
            })
            .collect()
    }
}

/// Render a tag mapping as repeated `,key=value` substrings, keys in
/// lexicographic order.
///
/// Tags with empty values and the reserved key `metric` are skipped. The
/// sorted order is load-bearing: the destination indexes tag sets by their
/// serialized form.
pub fn serialize_tags(tags: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in tags {
        if value.is_empty() || key == "metric" {
            continue;
        }
        out.push(',');
        out.push_str(key);
        out.push('=');
        out.push_str(value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_serialize_tags_sorted() {
        let t = tags(&[("z", "1"), ("a", "1"), ("m", "1")]);
        assert_eq!(serialize_tags(&t), ",a=1,m=1,z=1");
    }

    #[test]
    fn test_serialize_tags_idempotent() {
        let t = tags(&[("b", "2"), ("a", "1")]);
        let first = serialize_tags(&t);
        assert_eq!(serialize_tags(&t), first);
    }

    #[test]
    fn test_serialize_tags_skips_empty_values_and_metric() {
        let t = tags(&[("host", "web1"), ("empty", ""), ("metric", "cpu")]);
        assert_eq!(serialize_tags(&t), ",host=web1");
    }

    #[test]
    fn test_serialize_empty_mapping() {
        assert_eq!(serialize_tags(&BTreeMap::new()), "");
    }

    #[test]
    fn test_record_merges_same_triple() {
        let mut set = PointSet::default();
        let t = tags(&[("host", "web1")]);
        set.record(
            "m".into(),
            t.clone(),
            "request".into(),
            "69".into(),
            "100".into(),
        );
        set.record("m".into(), t, "errors".into(), "1".into(), "100".into());

        let lines = set.render(&BTreeMap::new());
        assert_eq!(lines, vec!["m,host=web1 request=69,errors=1 100"]);
    }

    #[test]
    fn test_record_same_field_key_overwrites() {
        let mut set = PointSet::default();
        set.record(
            "m".into(),
            BTreeMap::new(),
            "request".into(),
            "69".into(),
            "100".into(),
        );
        set.record(
            "m".into(),
            BTreeMap::new(),
            "request".into(),
            "70".into(),
            "100".into(),
        );

        assert_eq!(set.render(&BTreeMap::new()), vec!["m request=70 100"]);
    }

    #[test]
    fn test_record_distinct_timestamps_stay_separate() {
        let mut set = PointSet::default();
        set.record(
            "m".into(),
            BTreeMap::new(),
            "request".into(),
            "69".into(),
            "100".into(),
        );
        set.record(
            "m".into(),
            BTreeMap::new(),
            "request".into(),
            "70".into(),
            "101".into(),
        );

        assert_eq!(
            set.render(&BTreeMap::new()),
            vec!["m request=69 100", "m request=70 101"]
        );
    }

    #[test]
    fn test_render_point_tags_override_base_tags() {
        let mut set = PointSet::default();
        set.record(
            "m".into(),
            tags(&[("host", "from_line")]),
            "v".into(),
            "1".into(),
            "100".into(),
        );

        let lines = set.render(&tags(&[("host", "from_client"), ("dc", "east")]));
        assert_eq!(lines, vec!["m,dc=east,host=from_line v=1 100"]);
    }

    #[test]
    fn test_render_preserves_first_occurrence_point_order() {
        let mut set = PointSet::default();
        set.record(
            "m".into(),
            tags(&[("t", "b")]),
            "x".into(),
            "1".into(),
            "100".into(),
        );
        set.record(
            "m".into(),
            tags(&[("t", "a")]),
            "y".into(),
            "2".into(),
            "100".into(),
        );
        set.record(
            "m".into(),
            tags(&[("t", "b")]),
            "z".into(),
            "3".into(),
            "100".into(),
        );

        assert_eq!(
            set.render(&BTreeMap::new()),
            vec!["m,t=b x=1,z=3 100", "m,t=a y=2 100"]
        );
    }
}
