use crate::clock::PeriodKind;
use crate::metric::SampleValue;

use super::{MetricSeries, Point};

/// Odd moving-average width for a series of `n` buckets.
///
/// Grows with the square root of the bucket count: 7 days give 3, a month
/// gives 5. Never wider than the series itself.
pub fn window_size(n: usize) -> usize {
    let half = ((n as f64).sqrt() / 2.0).floor() as usize;
    (2 * half + 1).min(n.max(1))
}

/// Centered moving average over weekly and monthly series.
///
/// Daily reports and non-mean kinds are returned unchanged. Each contiguous
/// run is smoothed on its own and the window shrinks symmetrically near run
/// edges, so output length always equals input length.
pub fn smooth(series: &MetricSeries, period: PeriodKind) -> MetricSeries {
    if period == PeriodKind::Daily || !series.metric.is_smoothable() {
        return series.clone();
    }

    let radius = window_size(series.points.len()) / 2;
    if radius == 0 {
        return series.clone();
    }

    let vector = series.is_vector();
    let mut points = Vec::with_capacity(series.points.len());

    for segment in series.segments() {
        let run = &series.points[segment];
        for (i, point) in run.iter().enumerate() {
            let r = radius.min(i).min(run.len() - 1 - i);
            let neighbours = &run[i - r..=i + r];
            points.push(Point {
                timestamp: point.timestamp,
                value: SampleValue::from_components(vector, mean_components(neighbours)),
            });
        }
    }

    MetricSeries {
        metric: series.metric.clone(),
        bucketing: series.bucketing,
        points,
    }
}

fn mean_components(points: &[Point]) -> Vec<f64> {
    let width = points.first().map_or(0, |p| p.value.width());
    let mut sums = vec![0.0; width];
    for point in points {
        for (sum, v) in sums.iter_mut().zip(point.value.components()) {
            *sum += v;
        }
    }
    let n = points.len().max(1) as f64;
    sums.into_iter().map(|s| s / n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{CpuMode, MetricKind};
    use crate::series::Bucketing;
    use chrono::{DateTime, FixedOffset, TimeZone};

    const DAY: i64 = 86_400;

    fn at(secs: i64) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .expect("utc offset")
            .timestamp_opt(secs, 0)
            .single()
            .expect("valid instant")
    }

    fn daily(metric: MetricKind, values: &[(i64, f64)]) -> MetricSeries {
        MetricSeries {
            metric,
            bucketing: Bucketing::Daily,
            points: values
                .iter()
                .map(|(day, v)| Point {
                    timestamp: at(day * DAY + DAY / 2),
                    value: SampleValue::Scalar(*v),
                })
                .collect(),
        }
    }

    fn values(series: &MetricSeries) -> Vec<f64> {
        series
            .points
            .iter()
            .map(|p| p.value.components()[0])
            .collect()
    }

    fn cpu() -> MetricKind {
        MetricKind::CpuUsage(CpuMode::User)
    }

    #[test]
    fn test_window_size() {
        assert_eq!(window_size(0), 1);
        assert_eq!(window_size(1), 1);
        assert_eq!(window_size(2), 1);
        assert_eq!(window_size(7), 3);
        for n in 28..=31 {
            assert_eq!(window_size(n), 5, "n = {n}");
        }
        for n in 1..200 {
            let w = window_size(n);
            assert_eq!(w % 2, 1);
            assert!(w <= n);
        }
    }

    #[test]
    fn test_weekly_centered_mean() {
        let input: Vec<(i64, f64)> = (0..7).map(|d| (d, (d * 3) as f64)).collect();
        let out = smooth(&daily(cpu(), &input), PeriodKind::Weekly);
        // Width 3: edges keep their own value, interior averages neighbours.
        assert_eq!(
            values(&out),
            vec![0.0, 3.0, 6.0, 9.0, 12.0, 15.0, 18.0]
        );

        let spiky = daily(
            cpu(),
            &[(0, 0.0), (1, 0.0), (2, 9.0), (3, 0.0), (4, 0.0), (5, 0.0), (6, 0.0)],
        );
        assert_eq!(
            values(&smooth(&spiky, PeriodKind::Weekly)),
            vec![0.0, 3.0, 3.0, 3.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_length_preserved() {
        for period in [PeriodKind::Weekly, PeriodKind::Monthly] {
            for n in 1i64..=62 {
                // A missing day every ten days splits the series into segments.
                let input: Vec<(i64, f64)> = (0..n).map(|d| (d + d / 10, d as f64)).collect();
                let series = daily(cpu(), &input);
                let out = smooth(&series, period);
                assert_eq!(out.points.len(), series.points.len(), "{period} n={n}");
                let stamps: Vec<_> = out.points.iter().map(|p| p.timestamp).collect();
                let original: Vec<_> = series.points.iter().map(|p| p.timestamp).collect();
                assert_eq!(stamps, original, "{period} n={n}");
            }
        }
    }

    #[test]
    fn test_daily_period_is_noop() {
        let series = daily(cpu(), &[(0, 1.0), (1, 9.0), (2, 1.0)]);
        assert_eq!(smooth(&series, PeriodKind::Daily), series);
    }

    #[test]
    fn test_counter_kinds_are_not_smoothed() {
        let series = daily(
            MetricKind::TcpStateTransition,
            &[(0, 1.0), (1, 9.0), (2, 1.0)],
        );
        assert_eq!(smooth(&series, PeriodKind::Weekly), series);
    }

    #[test]
    fn test_gap_is_not_bridged() {
        // Days 0..=3 and 5..=8, so day 4 is missing.
        let input = [
            (0, 1.0),
            (1, 1.0),
            (2, 1.0),
            (3, 1.0),
            (5, 100.0),
            (6, 100.0),
            (7, 100.0),
            (8, 100.0),
        ];
        let out = smooth(&daily(cpu(), &input), PeriodKind::Weekly);
        assert_eq!(
            values(&out),
            vec![1.0, 1.0, 1.0, 1.0, 100.0, 100.0, 100.0, 100.0]
        );
    }
}
