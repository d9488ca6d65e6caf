use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::Serialize;
use sqlx::{PgPool, Result};

use crate::db::enums::TrendPeriod;
use crate::db::models::ServiceAggregateRow;
use crate::metrics::aggregator::ServiceAggregate;

/// Time-bucketed trend series for charts. One value per observed bucket
/// label, arrays aligned by index.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendSeries {
    pub labels: Vec<String>,
    pub requests_total: Vec<i64>,
    pub avg_latency: Vec<i64>,
    pub errors_4xx: Vec<i64>,
    pub errors_5xx: Vec<i64>,
}

/// Persists one cycle's aggregates. Returns the number of rows written.
///
/// The aggregator leaves `requests_per_second` at zero; it is derived here by
/// comparing each aggregate's counter against the most recent persisted row
/// for the same service.
pub async fn save(pool: &PgPool, aggregates: &[ServiceAggregate]) -> Result<u64> {
    let mut saved = 0u64;
    for aggregate in aggregates {
        let previous: Option<(i64, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT requests_total, collected_at FROM service_aggregates
            WHERE service_name = $1
            ORDER BY collected_at DESC
            LIMIT 1
            "#,
        )
        .bind(&aggregate.service_name)
        .fetch_optional(pool)
        .await?;

        let requests_per_second = match previous {
            Some((prev_total, prev_at)) => rate_between(
                prev_total,
                prev_at,
                aggregate.requests_total,
                aggregate.collected_at,
            ),
            None => 0.0,
        };

        sqlx::query(
            r#"
            INSERT INTO service_aggregates
                (service_name, requests_total, errors_4xx, errors_5xx,
                 avg_latency_ms, requests_per_second, collected_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&aggregate.service_name)
        .bind(aggregate.requests_total)
        .bind(aggregate.errors_4xx)
        .bind(aggregate.errors_5xx)
        .bind(aggregate.avg_latency_ms)
        .bind(requests_per_second)
        .bind(aggregate.collected_at)
        .execute(pool)
        .await?;
        saved += 1;
    }
    Ok(saved)
}

/// Counter delta over elapsed wall time. Zero when the counter went backwards
/// (proxy restart) or no time elapsed.
fn rate_between(
    previous_total: i64,
    previous_at: DateTime<Utc>,
    current_total: i64,
    current_at: DateTime<Utc>,
) -> f64 {
    let elapsed_ms = (current_at - previous_at).num_milliseconds();
    if elapsed_ms <= 0 || current_total < previous_total {
        return 0.0;
    }
    (current_total - previous_total) as f64 / (elapsed_ms as f64 / 1000.0)
}

/// Queries persisted aggregates, newest first.
pub async fn query(
    pool: &PgPool,
    service_name: Option<&str>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<ServiceAggregateRow>> {
    sqlx::query_as::<_, ServiceAggregateRow>(
        r#"
        SELECT * FROM service_aggregates
        WHERE ($1::text IS NULL OR service_name = $1)
          AND ($2::timestamptz IS NULL OR collected_at >= $2)
          AND ($3::timestamptz IS NULL OR collected_at <= $3)
        ORDER BY collected_at DESC
        LIMIT $4
        "#,
    )
    .bind(service_name)
    .bind(start)
    .bind(end)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Deletes rows strictly older than the retention cutoff. Returns the number
/// of rows removed.
pub async fn prune_older_than(pool: &PgPool, retention_days: i64) -> Result<u64> {
    let cutoff = Utc::now() - Duration::days(retention_days);
    let result = sqlx::query("DELETE FROM service_aggregates WHERE collected_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Computes the trend series for a period, optionally scoped to one service.
pub async fn trend(
    pool: &PgPool,
    service_name: Option<&str>,
    period: TrendPeriod,
) -> Result<TrendSeries> {
    let now = Utc::now();
    let rows = sqlx::query_as::<_, ServiceAggregateRow>(
        r#"
        SELECT * FROM service_aggregates
        WHERE collected_at >= $1
          AND ($2::text IS NULL OR service_name = $2)
        ORDER BY collected_at ASC
        "#,
    )
    .bind(now - window_for(period))
    .bind(service_name)
    .fetch_all(pool)
    .await?;

    Ok(bucketize(&rows, period, now))
}

fn window_for(period: TrendPeriod) -> Duration {
    match period {
        TrendPeriod::Hour => Duration::hours(1),
        TrendPeriod::Day => Duration::hours(24),
        TrendPeriod::Week => Duration::days(7),
    }
}

fn bucket_label(collected_at: DateTime<Utc>, period: TrendPeriod) -> String {
    match period {
        TrendPeriod::Hour => {
            let floored = collected_at.minute() / 5 * 5;
            format!("{:02}:{:02}", collected_at.hour(), floored)
        }
        TrendPeriod::Day => format!("{:02}:00", collected_at.hour()),
        TrendPeriod::Week => collected_at.weekday().to_string(),
    }
}

/// Folds time-ordered rows into bucket arrays. Rows outside the trailing
/// window are dropped, bucket labels appear in first-seen order, and only
/// observed buckets are emitted; counters are summed, latencies averaged.
fn bucketize(rows: &[ServiceAggregateRow], period: TrendPeriod, now: DateTime<Utc>) -> TrendSeries {
    let window_start = now - window_for(period);
    struct Bucket {
        requests_total: i64,
        latency_sum: i64,
        errors_4xx: i64,
        errors_5xx: i64,
        count: i64,
    }

    let mut labels: Vec<String> = Vec::new();
    let mut buckets: Vec<Bucket> = Vec::new();

    for row in rows {
        if row.collected_at < window_start || row.collected_at > now {
            continue;
        }
        let label = bucket_label(row.collected_at, period);
        let idx = match labels.iter().position(|l| *l == label) {
            Some(idx) => idx,
            None => {
                labels.push(label);
                buckets.push(Bucket {
                    requests_total: 0,
                    latency_sum: 0,
                    errors_4xx: 0,
                    errors_5xx: 0,
                    count: 0,
                });
                buckets.len() - 1
            }
        };
        let bucket = &mut buckets[idx];
        bucket.requests_total += row.requests_total;
        bucket.latency_sum += row.avg_latency_ms;
        bucket.errors_4xx += row.errors_4xx;
        bucket.errors_5xx += row.errors_5xx;
        bucket.count += 1;
    }

    TrendSeries {
        labels,
        requests_total: buckets.iter().map(|b| b.requests_total).collect(),
        avg_latency: buckets
            .iter()
            .map(|b| if b.count > 0 { b.latency_sum / b.count } else { 0 })
            .collect(),
        errors_4xx: buckets.iter().map(|b| b.errors_4xx).collect(),
        errors_5xx: buckets.iter().map(|b| b.errors_5xx).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(service: &str, at: DateTime<Utc>, requests: i64, latency: i64) -> ServiceAggregateRow {
        ServiceAggregateRow {
            id: 0,
            service_name: service.to_string(),
            requests_total: requests,
            errors_4xx: 1,
            errors_5xx: 2,
            avg_latency_ms: latency,
            requests_per_second: 0.0,
            collected_at: at,
        }
    }

    #[test]
    fn rate_uses_counter_delta_over_elapsed_seconds() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let t1 = t0 + Duration::seconds(60);
        assert_eq!(rate_between(100, t0, 160, t1), 1.0);
    }

    #[test]
    fn rate_is_zero_on_counter_reset_or_no_elapsed_time() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let t1 = t0 + Duration::seconds(60);
        assert_eq!(rate_between(500, t0, 20, t1), 0.0);
        assert_eq!(rate_between(100, t0, 160, t0), 0.0);
    }

    #[test]
    fn hour_buckets_floor_to_five_minutes() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 14, 23, 45).unwrap();
        assert_eq!(bucket_label(at, TrendPeriod::Hour), "14:20");
        assert_eq!(bucket_label(at, TrendPeriod::Day), "14:00");
    }

    #[test]
    fn week_buckets_use_weekday_abbreviations() {
        // 2025-06-01 is a Sunday.
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        assert_eq!(bucket_label(at, TrendPeriod::Week), "Sun");
        assert_eq!(bucket_label(at + Duration::days(1), TrendPeriod::Week), "Mon");
    }

    #[test]
    fn bucketize_sums_counters_and_averages_latency() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 10, 1, 0).unwrap();
        let rows = vec![
            row("a", t0, 10, 100),
            row("a", t0 + Duration::minutes(2), 20, 300),
            row("a", t0 + Duration::minutes(6), 5, 50),
        ];
        let series = bucketize(&rows, TrendPeriod::Hour, t0 + Duration::minutes(10));
        assert_eq!(series.labels, vec!["10:00", "10:05"]);
        assert_eq!(series.requests_total, vec![30, 5]);
        assert_eq!(series.avg_latency, vec![200, 50]);
        assert_eq!(series.errors_4xx, vec![2, 1]);
        assert_eq!(series.errors_5xx, vec![4, 2]);
    }

    #[test]
    fn bucketize_emits_observed_buckets_only_in_first_seen_order() {
        let sun = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let rows = vec![
            row("a", sun, 1, 0),
            row("a", sun + Duration::days(3), 2, 0),
        ];
        let series = bucketize(&rows, TrendPeriod::Week, sun + Duration::days(4));
        // No placeholder buckets for the quiet days in between.
        assert_eq!(series.labels, vec!["Sun", "Wed"]);
    }

    #[test]
    fn week_series_keeps_only_the_trailing_seven_days() {
        let now = Utc.with_ymd_and_hms(2025, 6, 9, 12, 0, 0).unwrap(); // a Monday
        let rows: Vec<ServiceAggregateRow> = (0..9)
            .map(|days_ago| row("a", now - Duration::days(days_ago), 1, 0))
            .collect();
        let series = bucketize(&rows, TrendPeriod::Week, now);
        // The row from 8 days back falls outside the window; the same-weekday
        // row from exactly 7 days back survives and folds into "Mon".
        assert_eq!(series.labels.len(), 7);
        assert_eq!(series.requests_total.iter().sum::<i64>(), 8);
    }

    #[test]
    fn empty_rows_produce_empty_series() {
        let series = bucketize(&[], TrendPeriod::Day, Utc::now());
        assert!(series.labels.is_empty());
        assert!(series.requests_total.is_empty());
    }
}
