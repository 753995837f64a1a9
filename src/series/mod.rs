//! Per-metric time series built from accounting samples.

pub mod aggregate;
pub mod smooth;

use std::ops::Range;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::metric::{MetricKind, SampleValue};

pub use aggregate::aggregate;
pub use smooth::{smooth, window_size};

/// Gap factor over the median step that splits a native-interval series.
const NATIVE_GAP_FACTOR: i64 = 2;

/// Bucket granularity of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucketing {
    /// One point per native accounting timestamp.
    Native,
    /// One point per calendar day, stamped at the day's midpoint.
    Daily,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub timestamp: DateTime<FixedOffset>,
    pub value: SampleValue,
}

/// Reduced points of one metric, strictly increasing in time.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    pub metric: MetricKind,
    pub bucketing: Bucketing,
    pub points: Vec<Point>,
}

impl MetricSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether points carry vector values.
    pub fn is_vector(&self) -> bool {
        !self.metric.components().is_empty()
    }

    /// Index ranges of contiguous data.
    ///
    /// Daily series break wherever a calendar day is missing. Native series
    /// break where the step exceeds twice the median step.
    pub fn segments(&self) -> Vec<Range<usize>> {
        let n = self.points.len();
        if n < 2 {
            return if n == 0 { Vec::new() } else { vec![0..1] };
        }

        let limit = match self.bucketing {
            Bucketing::Native => median_step(&self.points).map(|step| step * NATIVE_GAP_FACTOR),
            Bucketing::Daily => None,
        };

        let mut segments = Vec::new();
        let mut start = 0;
        for i in 1..n {
            let broken = match self.bucketing {
                Bucketing::Daily => {
                    let prev = self.points[i - 1].timestamp.date_naive();
                    let cur = self.points[i].timestamp.date_naive();
                    (cur - prev).num_days() > 1
                }
                Bucketing::Native => limit.is_some_and(|limit| self.step(i) > limit),
            };
            if broken {
                segments.push(start..i);
                start = i;
            }
        }
        segments.push(start..n);
        segments
    }

    fn step(&self, i: usize) -> i64 {
        (self.points[i].timestamp - self.points[i - 1].timestamp).num_seconds()
    }
}

fn median_step(points: &[Point]) -> Option<i64> {
    let mut steps: Vec<i64> = points
        .windows(2)
        .map(|w| (w[1].timestamp - w[0].timestamp).num_seconds())
        .filter(|s| *s > 0)
        .collect();
    if steps.is_empty() {
        return None;
    }
    steps.sort_unstable();
    Some(steps[steps.len() / 2])
}
