//! Template formats and the bucket-path matcher.
//!
//! A template format is a dotted token pattern (`host.type._.metric`) that
//! decomposes a bucket path into a measurement, tags, and a field key.
//! Templates come from two places: named measurement rules configured on a
//! handler, and event-level `output_formats`. Both are compiled into one
//! ordered candidate list; the first matching candidate wins.

use serde::Deserialize;

use crate::event::OutputFormat;

/// A named, optionally check-scoped set of template formats that overrides
/// the measurement name when one of its formats matches.
#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementRule {
    /// Measurement name applied on match.
    pub name: String,

    /// Template format strings tried in order.
    pub formats: Vec<String>,

    /// Check names this rule applies to; empty means every check.
    #[serde(default)]
    pub applicable_checks: Vec<String>,
}

impl MeasurementRule {
    pub fn applies_to(&self, check_name: &str) -> bool {
        self.applicable_checks.is_empty()
            || self.applicable_checks.iter().any(|c| c == check_name)
    }
}

/// One token of a template format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateToken {
    /// Bare token: becomes a tag key, value taken from the path component.
    Tag(String),
    /// `<literal>` or `<literal|alias>`: structural match against the
    /// component; contributes a tag on match.
    Bracket {
        literal: String,
        alias: Option<String>,
    },
    /// `metric`: the component becomes the field key.
    MetricField,
    /// `metric*`: the component and everything after it become the field key.
    MetricGlob,
    /// `measurement`: the component overrides the measurement name.
    MeasurementOverride,
    /// `_`: the component is skipped.
    Wildcard,
}

/// A parsed template format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    tokens: Vec<TemplateToken>,
    glob_pos: Option<usize>,
    measurement_pos: Option<usize>,
}

impl Template {
    /// Parse a dotted format string into tokens.
    pub fn parse(format: &str) -> Self {
        let tokens: Vec<TemplateToken> = format
            .split('.')
            .map(|part| match part {
                "metric" => TemplateToken::MetricField,
                "metric*" => TemplateToken::MetricGlob,
                "measurement" => TemplateToken::MeasurementOverride,
                "_" => TemplateToken::Wildcard,
                _ => parse_bracket(part)
                    .unwrap_or_else(|| TemplateToken::Tag(part.to_string())),
            })
            .collect();

        let glob_pos = tokens
            .iter()
            .position(|t| *t == TemplateToken::MetricGlob);
        let measurement_pos = tokens
            .iter()
            .position(|t| *t == TemplateToken::MeasurementOverride);

        Self {
            tokens,
            glob_pos,
            measurement_pos,
        }
    }

    /// Decide whether this template matches the bucket-path components.
    ///
    /// Templates without a `measurement` token match on equal length, or on
    /// any length when a `metric*` glob is present (the glob must still land
    /// on an existing component). Templates with a `measurement` token match
    /// only when the component at that position equals the candidate's
    /// measurement name; nothing else governs the result.
    pub fn matches(&self, components: &[&str], measurement_name: Option<&str>) -> bool {
        if let Some(pos) = self.measurement_pos {
            if components.len() != self.tokens.len() {
                return false;
            }
            return measurement_name.is_some_and(|name| components[pos] == name);
        }

        let structural_len = match self.glob_pos {
            Some(pos) => {
                if pos >= components.len() {
                    return false;
                }
                pos
            }
            None => {
                if components.len() != self.tokens.len() {
                    return false;
                }
                self.tokens.len()
            }
        };

        // Bracketed literals are structural match points: the component must
        // equal the literal exactly (no globbing, no patterns).
        for (token, component) in self.tokens[..structural_len].iter().zip(components) {
            if let TemplateToken::Bracket { literal, .. } = token {
                if component != literal {
                    return false;
                }
            }
        }

        true
    }

    /// Extract tags, field key, and measurement override from a matched
    /// template, walking paired components left to right.
    pub fn extract(&self, components: &[&str]) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();

        for (i, token) in self.tokens.iter().enumerate() {
            let Some(component) = components.get(i) else {
                break;
            };

            match token {
                TemplateToken::Wildcard => {}
                TemplateToken::MetricField => {
                    outcome.field_key = Some((*component).to_string());
                }
                TemplateToken::MetricGlob => {
                    // Greedy tail capture: the rest of the path, dot-joined.
                    outcome.field_key = Some(components[i..].join("."));
                    break;
                }
                TemplateToken::MeasurementOverride => {
                    outcome.measurement = Some((*component).to_string());
                }
                TemplateToken::Bracket { literal, alias } => {
                    // Measurement-token matches skip the structural walk, so
                    // the literal equality is re-checked here.
                    if *component == literal.as_str() {
                        let key = alias.clone().unwrap_or_else(|| literal.clone());
                        outcome.tags.push((key, literal.clone()));
                    }
                }
                TemplateToken::Tag(key) => {
                    outcome.tags.push((key.clone(), (*component).to_string()));
                }
            }
        }

        outcome
    }
}

fn parse_bracket(part: &str) -> Option<TemplateToken> {
    let inner = part.strip_prefix('<')?.strip_suffix('>')?;
    match inner.split_once('|') {
        Some((literal, alias)) => Some(TemplateToken::Bracket {
            literal: literal.to_string(),
            alias: Some(alias.to_string()),
        }),
        None => Some(TemplateToken::Bracket {
            literal: inner.to_string(),
            alias: None,
        }),
    }
}

/// One entry of the combined candidate list.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Measurement name from the owning rule, if any.
    pub measurement_name: Option<String>,
    pub template: Template,
}

/// Extraction result of the first matching candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Measurement override (rule name or `measurement` token component).
    pub measurement: Option<String>,
    /// Tag assignments in template order.
    pub tags: Vec<(String, String)>,
    /// Field key, if any `metric`/`metric*` token was applied.
    pub field_key: Option<String>,
}

/// Build the combined, ordered candidate list for one event: formats of every
/// rule applicable to the check (in declared order, tagged with the rule
/// name), followed by the event's own formats.
pub fn compile_candidates(
    rules: &[MeasurementRule],
    check_name: &str,
    event_formats: &[OutputFormat],
) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for rule in rules {
        if !rule.applies_to(check_name) {
            continue;
        }
        for format in &rule.formats {
            candidates.push(Candidate {
                measurement_name: Some(rule.name.clone()),
                template: Template::parse(format),
            });
        }
    }

    for format in event_formats {
        match format {
            OutputFormat::Plain(format) => candidates.push(Candidate {
                measurement_name: None,
                template: Template::parse(format),
            }),
            OutputFormat::Named(map) => {
                for (name, formats) in map {
                    for format in formats {
                        candidates.push(Candidate {
                            measurement_name: Some(name.clone()),
                            template: Template::parse(format),
                        });
                    }
                }
            }
        }
    }

    candidates
}

/// Run the candidate list in order against the components; first match wins.
///
/// A rule-tagged match overrides the measurement to the rule's name. Returns
/// `None` when no candidate matches; the caller falls back to emitting the
/// whole bucket path as a single field.
pub fn match_candidates(candidates: &[Candidate], components: &[&str]) -> Option<MatchOutcome> {
    for candidate in candidates {
        if candidate
            .template
            .matches(components, candidate.measurement_name.as_deref())
        {
            let mut outcome = candidate.template.extract(components);
            if candidate.measurement_name.is_some() {
                outcome.measurement = candidate.measurement_name.clone();
            }
            return Some(outcome);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components(path: &str) -> Vec<&str> {
        path.split('.').collect()
    }

    fn plain(format: &str) -> Vec<Candidate> {
        vec![Candidate {
            measurement_name: None,
            template: Template::parse(format),
        }]
    }

    #[test]
    fn test_parse_token_kinds() {
        let t = Template::parse("host.type._.metric");
        assert_eq!(
            t.tokens,
            vec![
                TemplateToken::Tag("host".to_string()),
                TemplateToken::Tag("type".to_string()),
                TemplateToken::Wildcard,
                TemplateToken::MetricField,
            ]
        );

        let t = Template::parse("host.metric*");
        assert_eq!(t.glob_pos, Some(1));

        let t = Template::parse("measurement.host.metric");
        assert_eq!(t.measurement_pos, Some(0));
    }

    #[test]
    fn test_parse_bracket_tokens() {
        let t = Template::parse("<prod>.host.metric");
        assert_eq!(
            t.tokens[0],
            TemplateToken::Bracket {
                literal: "prod".to_string(),
                alias: None,
            }
        );

        let t = Template::parse("<prod|env>.host.metric");
        assert_eq!(
            t.tokens[0],
            TemplateToken::Bracket {
                literal: "prod".to_string(),
                alias: Some("env".to_string()),
            }
        );
    }

    #[test]
    fn test_match_requires_equal_length_without_glob() {
        let t = Template::parse("host.type.metric");
        assert!(t.matches(&components("a.b.c"), None));
        assert!(!t.matches(&components("a.b"), None));
        assert!(!t.matches(&components("a.b.c.d"), None));
    }

    #[test]
    fn test_match_glob_allows_longer_paths() {
        let t = Template::parse("host.metric*");
        assert!(t.matches(&components("a.b.c.d"), None));
        assert!(t.matches(&components("a.b"), None));
        // Glob must land on an existing component.
        assert!(!t.matches(&components("a"), None));
    }

    #[test]
    fn test_extract_tags_and_field() {
        let out = Template::parse("host.type.metric").extract(&components(
            "host_name.apache.request",
        ));
        assert_eq!(
            out.tags,
            vec![
                ("host".to_string(), "host_name".to_string()),
                ("type".to_string(), "apache".to_string()),
            ]
        );
        assert_eq!(out.field_key.as_deref(), Some("request"));
        assert_eq!(out.measurement, None);
    }

    #[test]
    fn test_extract_glob_captures_tail() {
        let out = Template::parse("host.metric*")
            .extract(&components("host_name.server1.unwanted.request"));
        assert_eq!(out.field_key.as_deref(), Some("server1.unwanted.request"));
        assert_eq!(out.tags, vec![("host".to_string(), "host_name".to_string())]);
    }

    #[test]
    fn test_extract_glob_stops_remaining_tokens() {
        // Tokens after the glob are never applied.
        let out = Template::parse("host.metric*.ignored")
            .extract(&components("host_name.a.b"));
        assert_eq!(out.field_key.as_deref(), Some("a.b"));
        assert_eq!(out.tags.len(), 1);
    }

    #[test]
    fn test_bracket_literal_is_structural() {
        let t = Template::parse("<prod|env>.host.metric");
        assert!(t.matches(&components("prod.web1.request"), None));
        assert!(!t.matches(&components("staging.web1.request"), None));

        let out = t.extract(&components("prod.web1.request"));
        assert_eq!(out.tags[0], ("env".to_string(), "prod".to_string()));
        assert_eq!(out.field_key.as_deref(), Some("request"));
    }

    #[test]
    fn test_bracket_in_measurement_template_requires_literal_equality() {
        let t = Template::parse("measurement.<prod|env>.metric");

        // The measurement-token rule matches on the positional name alone,
        // even when the bracket component differs from its literal.
        assert!(t.matches(&components("webstats.staging.request"), Some("webstats")));

        // The mismatched bracket contributes no tag.
        let out = t.extract(&components("webstats.staging.request"));
        assert!(out.tags.is_empty());
        assert_eq!(out.field_key.as_deref(), Some("request"));

        let out = t.extract(&components("webstats.prod.request"));
        assert_eq!(out.tags, vec![("env".to_string(), "prod".to_string())]);
    }

    #[test]
    fn test_measurement_template_matches_on_name_only() {
        let t = Template::parse("measurement.host.metric");
        // Matches when the component at the measurement position equals the
        // rule's name.
        assert!(t.matches(&components("webstats.web1.request"), Some("webstats")));
        assert!(!t.matches(&components("other.web1.request"), Some("webstats")));
        // Untagged candidates never satisfy a measurement template.
        assert!(!t.matches(&components("webstats.web1.request"), None));
        // Length mismatch rejects regardless of the positional comparison.
        assert!(!t.matches(&components("webstats.web1"), Some("webstats")));
        assert!(!t.matches(
            &components("webstats.web1.request.extra"),
            Some("webstats")
        ));
    }

    #[test]
    fn test_candidates_first_match_wins() {
        let candidates = vec![
            Candidate {
                measurement_name: None,
                template: Template::parse("host.metric"),
            },
            Candidate {
                measurement_name: None,
                template: Template::parse("host.type.metric"),
            },
        ];

        let out =
            match_candidates(&candidates, &components("a.b.c")).expect("second template matches");
        assert_eq!(out.field_key.as_deref(), Some("c"));
    }

    #[test]
    fn test_rule_formats_take_priority_over_event_formats() {
        let rules = vec![MeasurementRule {
            name: "webstats".to_string(),
            formats: vec!["host.metric".to_string()],
            applicable_checks: Vec::new(),
        }];
        let event_formats = vec![OutputFormat::Plain("host.metric".to_string())];

        let candidates = compile_candidates(&rules, "any_check", &event_formats);
        assert_eq!(candidates.len(), 2);

        let out = match_candidates(&candidates, &components("web1.request"))
            .expect("rule format matches");
        assert_eq!(out.measurement.as_deref(), Some("webstats"));
    }

    #[test]
    fn test_rule_scoped_to_other_check_is_skipped() {
        let rules = vec![MeasurementRule {
            name: "webstats".to_string(),
            formats: vec!["host.metric".to_string()],
            applicable_checks: vec!["statsd".to_string()],
        }];

        let candidates = compile_candidates(&rules, "not_statsd", &[]);
        assert!(candidates.is_empty());

        let candidates = compile_candidates(&rules, "statsd", &[]);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_no_match_returns_none() {
        assert_eq!(
            match_candidates(&plain("host.type.metric"), &components("a.b")),
            None
        );
    }

    #[test]
    fn test_matched_template_without_metric_token_leaves_field_unset() {
        let out = match_candidates(&plain("host.type"), &components("a.b"))
            .expect("template matches");
        assert_eq!(out.field_key, None);
        assert_eq!(out.tags.len(), 2);
    }
}
