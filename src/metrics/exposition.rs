use std::collections::HashMap;

use tracing::trace;

/// One parsed line of the proxy's plaintext metrics output.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: String,
    pub labels: HashMap<String, String>,
    pub value: f64,
    /// Optional sample timestamp in epoch milliseconds.
    pub timestamp: Option<i64>,
}

/// Outcome of parsing a single line. The exposition text comes from an
/// external process and is not guaranteed well-formed, so a bad line is
/// skipped rather than failing the whole scrape.
#[derive(Debug)]
enum LineOutcome {
    Sample(MetricSample),
    Skip,
}

/// Parses a full exposition payload into a flat sample list.
///
/// Comment lines (`#`) and blank lines are ignored. Each remaining line is
/// tried against the labeled form `name{k="v",...} value [timestamp]` first,
/// then the bare form `name value [timestamp]`; lines matching neither are
/// dropped.
pub fn parse(text: &str) -> Vec<MetricSample> {
    text.lines()
        .filter_map(|line| match parse_line(line) {
            LineOutcome::Sample(sample) => Some(sample),
            LineOutcome::Skip => None,
        })
        .collect()
}

fn parse_line(line: &str) -> LineOutcome {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return LineOutcome::Skip;
    }

    let outcome = match line.find('{') {
        Some(brace) => parse_labeled(line, brace),
        None => parse_unlabeled(line),
    };

    if outcome.is_none() {
        trace!(line, "Skipping unparseable metrics line.");
    }

    match outcome {
        Some(sample) => LineOutcome::Sample(sample),
        None => LineOutcome::Skip,
    }
}

fn parse_labeled(line: &str, brace: usize) -> Option<MetricSample> {
    let name = line[..brace].trim_end();
    if !is_valid_metric_name(name) {
        return None;
    }

    let body_start = brace + 1;
    let close = find_closing_brace(&line[body_start..])? + body_start;
    let labels = parse_labels(&line[body_start..close])?;

    let (value, timestamp) = parse_value_and_timestamp(&line[close + 1..])?;
    Some(MetricSample {
        name: name.to_string(),
        labels,
        value,
        timestamp,
    })
}

fn parse_unlabeled(line: &str) -> Option<MetricSample> {
    let mut parts = line.split_whitespace();
    let name = parts.next()?;
    if !is_valid_metric_name(name) {
        return None;
    }
    let rest = line[name.len()..].trim_start();
    let (value, timestamp) = parse_value_and_timestamp(rest)?;
    Some(MetricSample {
        name: name.to_string(),
        labels: HashMap::new(),
        value,
        timestamp,
    })
}

/// Parses the `value [timestamp]` tail shared by both line forms.
fn parse_value_and_timestamp(rest: &str) -> Option<(f64, Option<i64>)> {
    let mut parts = rest.split_whitespace();
    let value: f64 = parts.next()?.parse().ok()?;
    let timestamp = match parts.next() {
        Some(ts) => Some(ts.parse::<i64>().ok()?),
        None => None,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((value, timestamp))
}

fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Finds the index of the closing `}` in the label body, honouring quoted
/// values so a `}` inside a label value does not terminate the block.
fn find_closing_brace(body_and_rest: &str) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in body_and_rest.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '}' if !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

/// Parses `k1="v1",k2="v2"` label pairs. Values support the `\"`, `\\` and
/// `\n` escapes used by the exposition format. Duplicate keys keep the last
/// occurrence.
fn parse_labels(body: &str) -> Option<HashMap<String, String>> {
    let mut labels = HashMap::new();
    let mut chars = body.char_indices().peekable();

    loop {
        // Skip separators and whitespace between pairs.
        while let Some(&(_, c)) = chars.peek() {
            if c == ',' || c.is_whitespace() {
                chars.next();
            } else {
                break;
            }
        }
        let Some(&(key_start, _)) = chars.peek() else {
            return Some(labels);
        };

        let mut key_end = key_start;
        for (i, c) in chars.by_ref() {
            if c == '=' {
                key_end = i;
                break;
            }
        }
        let key = body[key_start..key_end].trim();
        if key.is_empty() {
            return None;
        }

        match chars.next() {
            Some((_, '"')) => {}
            _ => return None,
        }

        let mut value = String::new();
        let mut closed = false;
        while let Some((_, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, '"')) => value.push('"'),
                    Some((_, '\\')) => value.push('\\'),
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, other)) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => return None,
                },
                '"' => {
                    closed = true;
                    break;
                }
                _ => value.push(c),
            }
        }
        if !closed {
            return None;
        }

        labels.insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labeled_line() {
        let samples = parse(r#"traefik_service_requests_total{code="200",service="web@docker"} 42"#);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "traefik_service_requests_total");
        assert_eq!(samples[0].labels["code"], "200");
        assert_eq!(samples[0].labels["service"], "web@docker");
        assert_eq!(samples[0].value, 42.0);
        assert_eq!(samples[0].timestamp, None);
    }

    #[test]
    fn parses_unlabeled_line_with_timestamp() {
        let samples = parse("process_open_fds 17 1712345678901");
        assert_eq!(samples.len(), 1);
        assert!(samples[0].labels.is_empty());
        assert_eq!(samples[0].value, 17.0);
        assert_eq!(samples[0].timestamp, Some(1_712_345_678_901));
    }

    #[test]
    fn parses_scientific_notation_and_signs() {
        let samples = parse("a_metric 1.5e3\nb_metric -2.5\nc_metric +0.25");
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![1500.0, -2.5, 0.25]);
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let text = "# HELP x something\n# TYPE x counter\n\n   \nx 1";
        assert_eq!(parse(text).len(), 1);
    }

    #[test]
    fn one_good_line_among_garbage_yields_one_sample() {
        let text = "good_metric 5\nthis is not a metric line at all {{{";
        let samples = parse(text);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "good_metric");
    }

    #[test]
    fn malformed_labels_are_skipped_not_fatal() {
        assert!(parse(r#"m{code="200} 1"#).is_empty()); // unterminated quote
        assert!(parse("m{code=200} 1").is_empty()); // unquoted value
        assert!(parse("m{} ").is_empty()); // missing value
    }

    #[test]
    fn handles_escaped_quotes_in_label_values() {
        let samples = parse(r#"m{msg="say \"hi\"",path="c:\\tmp"} 1"#);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].labels["msg"], r#"say "hi""#);
        assert_eq!(samples[0].labels["path"], r"c:\tmp");
    }

    #[test]
    fn empty_label_body_is_accepted() {
        let samples = parse("m{} 3.5");
        assert_eq!(samples.len(), 1);
        assert!(samples[0].labels.is_empty());
    }

    #[test]
    fn parsing_is_idempotent() {
        let text = r#"a{service="s1",code="200"} 10 123
garbage line
b 2.5"#;
        assert_eq!(parse(text), parse(text));
    }

    #[test]
    fn trailing_junk_after_timestamp_skips_line() {
        assert!(parse("m 1 123 extra").is_empty());
    }
}
