use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};

use crate::clock::TimeWindow;
use crate::metric::{MetricKind, Reduction, Sample, SampleValue};

use super::{Bucketing, MetricSeries, Point};

/// Accumulates the samples of one bucket.
///
/// Tracks sum, count and component-wise max so any [`Reduction`] can be
/// applied once the bucket is closed.
#[derive(Debug)]
struct BucketAggregate {
    stamp: DateTime<FixedOffset>,
    vector: bool,
    sum: Vec<f64>,
    max: Vec<f64>,
    count: u32,
}

impl BucketAggregate {
    fn new(stamp: DateTime<FixedOffset>, metric: &MetricKind) -> Self {
        let width = value_width(metric);
        Self {
            stamp,
            vector: !metric.components().is_empty(),
            sum: vec![0.0; width],
            max: vec![f64::MIN; width],
            count: 0,
        }
    }

    /// Records a value whose width already matches the bucket.
    fn record(&mut self, value: &SampleValue) {
        for (i, v) in value.components().iter().enumerate().take(self.sum.len()) {
            self.sum[i] += v;
            if *v > self.max[i] {
                self.max[i] = *v;
            }
        }
        self.count += 1;
    }

    fn reduce(&self, reduction: Reduction) -> SampleValue {
        let components = match reduction {
            Reduction::Mean => {
                let n = f64::from(self.count.max(1));
                self.sum.iter().map(|s| s / n).collect()
            }
            Reduction::Max | Reduction::Passthrough => self.max.clone(),
        };
        SampleValue::from_components(self.vector, components)
    }
}

/// Bucket and reduce `samples` into one series per metric kind.
///
/// Samples outside `window` are discarded. Daily windows keep one bucket per
/// native timestamp; weekly and monthly windows keep one bucket per calendar
/// day, stamped at the day's real-time midpoint. Reboot events always keep
/// their own instant. Missing buckets are left as gaps.
pub fn aggregate(window: &TimeWindow, samples: &[Sample]) -> Vec<MetricSeries> {
    let mut buckets: BTreeMap<MetricKind, BTreeMap<i64, BucketAggregate>> = BTreeMap::new();
    let mut discarded = 0usize;
    let mut mismatched = 0usize;

    for sample in samples {
        if sample.value.width() != value_width(&sample.metric) {
            mismatched += 1;
            continue;
        }

        let Some(day_idx) = window.day_index(sample.timestamp.date_naive()) else {
            discarded += 1;
            continue;
        };

        let (key, stamp) = match bucketing_for(window, &sample.metric) {
            Bucketing::Native => (sample.timestamp.timestamp(), sample.timestamp),
            Bucketing::Daily => match window.day_midpoint(day_idx) {
                Some(mid) => (day_idx as i64, mid),
                None => {
                    discarded += 1;
                    continue;
                }
            },
        };

        let bucket = buckets
            .entry(sample.metric.clone())
            .or_default()
            .entry(key)
            .or_insert_with(|| BucketAggregate::new(stamp, &sample.metric));
        bucket.record(&sample.value);
    }

    if discarded > 0 || mismatched > 0 {
        tracing::debug!(discarded, mismatched, "samples dropped during aggregation");
    }

    buckets
        .into_iter()
        .map(|(metric, per_bucket)| {
            let reduction = metric.reduction();
            let points = per_bucket
                .into_values()
                .map(|bucket| Point {
                    timestamp: bucket.stamp,
                    value: bucket.reduce(reduction),
                })
                .collect();
            MetricSeries {
                bucketing: bucketing_for(window, &metric),
                metric,
                points,
            }
        })
        .collect()
}

/// Components per value of `metric`: 1 for scalars.
fn value_width(metric: &MetricKind) -> usize {
    metric.components().len().max(1)
}

fn bucketing_for(window: &TimeWindow, metric: &MetricKind) -> Bucketing {
    if window.period.buckets_by_day() && metric.reduction() != Reduction::Passthrough {
        Bucketing::Daily
    } else {
        Bucketing::Native
    }
}
