//! Axis scaling from observed data and host capacity.

pub mod facts;

use serde::Serialize;

use crate::metric::{MetricKind, SampleValue};
use crate::series::MetricSeries;

pub use facts::{ProcSystemFacts, StaticFacts, SystemFacts};

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;
const PERCENT_MAX: f64 = 100.0;
const EMPTY_AXIS_MAX: f64 = 1.0;

/// Suggested y-axis bounds for one metric, or one component of a vector metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleHint {
    pub metric: MetricKind,
    /// Vector component index; `None` for scalars and stacked vectors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<usize>,
    pub min: f64,
    pub max: f64,
    pub unit: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleOptions {
    /// Multiplier applied to the observed maximum.
    pub headroom: f64,
    /// Vector metrics are drawn stacked, so one hint bounds the component sum.
    pub stacked_vectors: bool,
}

impl Default for ScaleOptions {
    fn default() -> Self {
        Self {
            headroom: 1.1,
            stacked_vectors: false,
        }
    }
}

/// Compute axis hints for every non-empty series.
///
/// Bounds start at zero. The upper bound is the observed maximum times the
/// headroom, pinned to host capacity where one is known: installed memory
/// and swap, 100 % for CPU and filesystems, at least the CPU count for load
/// and at least the link speed for network traffic.
pub fn scale_hints<F: SystemFacts + ?Sized>(
    series: &[MetricSeries],
    facts: &F,
    options: &ScaleOptions,
) -> Vec<ScaleHint> {
    let mut hints = Vec::new();

    for s in series {
        if s.is_empty() || s.metric == MetricKind::RebootEvent {
            continue;
        }

        let unit = s.metric.unit();
        let hint = |component: Option<usize>, max: f64| ScaleHint {
            metric: s.metric.clone(),
            component,
            min: 0.0,
            max,
            unit,
        };

        if s.is_vector() {
            if options.stacked_vectors {
                let observed = observed_max(s, |v| v.total());
                hints.push(hint(None, with_headroom(observed, options)));
            } else {
                for idx in 0..s.metric.components().len() {
                    let observed =
                        observed_max(s, |v| v.components().get(idx).copied().unwrap_or(0.0));
                    hints.push(hint(Some(idx), with_headroom(observed, options)));
                }
            }
            continue;
        }

        let default = with_headroom(observed_max(s, |v| v.components()[0]), options);
        let max = match &s.metric {
            MetricKind::MemoryUsed(_) => {
                capacity_mib(facts.total_memory_bytes()).unwrap_or(default)
            }
            MetricKind::SwapUsed => capacity_mib(facts.total_swap_bytes()).unwrap_or(default),
            MetricKind::CpuUsage(_) | MetricKind::FilesystemUsage { .. } => PERCENT_MAX,
            MetricKind::LoadAverage(_) => match facts.cpu_count() {
                Some(cpus) => default.max(f64::from(cpus)),
                None => default,
            },
            MetricKind::NetworkIo { .. } => match facts.max_link_speed_mbps() {
                Some(speed) => default.max(speed as f64),
                None => default,
            },
            _ => default,
        };
        hints.push(hint(None, max));
    }

    hints
}

fn observed_max(series: &MetricSeries, value: impl Fn(&SampleValue) -> f64) -> f64 {
    series
        .points
        .iter()
        .map(|p| value(&p.value))
        .fold(0.0, f64::max)
}

fn with_headroom(observed: f64, options: &ScaleOptions) -> f64 {
    if observed > 0.0 {
        observed * options.headroom
    } else {
        EMPTY_AXIS_MAX
    }
}

fn capacity_mib(bytes: Option<u64>) -> Option<f64> {
    bytes.filter(|b| *b > 0).map(|b| b as f64 / BYTES_PER_MIB)
}
