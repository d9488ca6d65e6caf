use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::exposition::MetricSample;

/// Per-service roll-up of one collection cycle. Append-only once persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceAggregate {
    pub service_name: String,
    pub requests_total: i64,
    pub errors_4xx: i64,
    pub errors_5xx: i64,
    pub avg_latency_ms: i64,
    /// Derived across cycles at persist time; always 0.0 here.
    pub requests_per_second: f64,
    pub collected_at: DateTime<Utc>,
}

/// The metric families the proxy exposes that this service cares about.
enum Family {
    RequestsTotal,
    DurationSum,
    DurationCount,
    Gauge,
    Other,
}

fn classify(name: &str) -> Family {
    if name.ends_with("_requests_total") {
        Family::RequestsTotal
    } else if name.ends_with("_request_duration_seconds_sum") {
        Family::DurationSum
    } else if name.ends_with("_request_duration_seconds_count") {
        Family::DurationCount
    } else if name.ends_with("_open_connections") || name.ends_with("_requests_in_flight") {
        // In-flight/connection gauges are recognised but carry no aggregate field.
        Family::Gauge
    } else {
        Family::Other
    }
}

/// Grouping key for a sample: the `service` label (provider suffix stripped),
/// falling back to `entrypoint`, falling back to "unknown".
fn group_key(labels: &HashMap<String, String>) -> String {
    if let Some(service) = labels.get("service") {
        // Traefik emits "web@docker"-style values; the provider part is noise
        // for per-service statistics.
        return service
            .split('@')
            .next()
            .unwrap_or(service)
            .to_string();
    }
    if let Some(entrypoint) = labels.get("entrypoint") {
        return entrypoint.clone();
    }
    "unknown".to_string()
}

#[derive(Default)]
struct Accumulator {
    requests: f64,
    errors_4xx: f64,
    errors_5xx: f64,
    duration_sum: f64,
    duration_count: f64,
    saw_counter: bool,
}

/// Reduces one cycle's samples into per-service aggregates.
///
/// Groups emit in first-seen order. Services observed only through duration
/// or gauge series (no request counter) emit no row.
pub fn aggregate(samples: &[MetricSample]) -> Vec<ServiceAggregate> {
    let collected_at = Utc::now();
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Accumulator> = HashMap::new();

    for sample in samples {
        let family = classify(&sample.name);
        if matches!(family, Family::Other | Family::Gauge) {
            continue;
        }

        let key = group_key(&sample.labels);
        let acc = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Accumulator::default()
        });

        match family {
            Family::RequestsTotal => {
                acc.saw_counter = true;
                acc.requests += sample.value;
                if let Some(code) = sample.labels.get("code") {
                    if code.starts_with('4') {
                        acc.errors_4xx += sample.value;
                    } else if code.starts_with('5') {
                        acc.errors_5xx += sample.value;
                    }
                }
            }
            Family::DurationSum => acc.duration_sum += sample.value,
            Family::DurationCount => acc.duration_count += sample.value,
            Family::Gauge | Family::Other => unreachable!(),
        }
    }

    order
        .into_iter()
        .filter_map(|service_name| {
            let acc = groups.remove(&service_name)?;
            if !acc.saw_counter {
                return None;
            }
            let avg_latency_ms = if acc.duration_count > 0.0 {
                (acc.duration_sum * 1000.0 / acc.duration_count).round() as i64
            } else {
                0
            };
            Some(ServiceAggregate {
                service_name,
                requests_total: acc.requests.round() as i64,
                errors_4xx: acc.errors_4xx.round() as i64,
                errors_5xx: acc.errors_5xx.round() as i64,
                avg_latency_ms,
                requests_per_second: 0.0,
                collected_at,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::exposition::parse;

    #[test]
    fn sums_counters_and_splits_error_codes() {
        let text = r#"
traefik_service_requests_total{service="a@docker",code="200"} 10
traefik_service_requests_total{service="a@docker",code="404"} 2
traefik_service_requests_total{service="a@docker",code="500"} 1
"#;
        let aggregates = aggregate(&parse(text));
        assert_eq!(aggregates.len(), 1);
        let a = &aggregates[0];
        assert_eq!(a.service_name, "a");
        assert_eq!(a.requests_total, 13);
        assert_eq!(a.errors_4xx, 2);
        assert_eq!(a.errors_5xx, 1);
    }

    #[test]
    fn derives_average_latency_in_millis() {
        let text = r#"
traefik_service_requests_total{service="a",code="200"} 10
traefik_service_request_duration_seconds_sum{service="a"} 2.5
traefik_service_request_duration_seconds_count{service="a"} 10
"#;
        let aggregates = aggregate(&parse(text));
        assert_eq!(aggregates[0].avg_latency_ms, 250);
    }

    #[test]
    fn latency_is_zero_without_duration_counts() {
        let text = r#"traefik_service_requests_total{service="a",code="200"} 1"#;
        assert_eq!(aggregate(&parse(text))[0].avg_latency_ms, 0);
    }

    #[test]
    fn falls_back_to_entrypoint_then_unknown() {
        let text = r#"
traefik_entrypoint_requests_total{entrypoint="websecure",code="200"} 7
traefik_entrypoint_requests_total{code="200"} 3
"#;
        let aggregates = aggregate(&parse(text));
        assert_eq!(aggregates.len(), 2);
        assert_eq!(aggregates[0].service_name, "websecure");
        assert_eq!(aggregates[0].requests_total, 7);
        assert_eq!(aggregates[1].service_name, "unknown");
        assert_eq!(aggregates[1].requests_total, 3);
    }

    #[test]
    fn duration_only_services_emit_no_row() {
        let text = r#"traefik_service_request_duration_seconds_sum{service="quiet"} 1.0"#;
        assert!(aggregate(&parse(text)).is_empty());
    }

    #[test]
    fn gauges_are_ignored() {
        let text = r#"
traefik_service_requests_total{service="a",code="200"} 5
traefik_service_open_connections{service="a"} 99
"#;
        let aggregates = aggregate(&parse(text));
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].requests_total, 5);
    }

    #[test]
    fn requests_per_second_is_left_zero() {
        let text = r#"traefik_service_requests_total{service="a",code="200"} 5"#;
        assert_eq!(aggregate(&parse(text))[0].requests_per_second, 0.0);
    }
}
