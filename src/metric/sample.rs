use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use super::MetricKind;

/// Value carried by a sample or a series point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SampleValue {
    Scalar(f64),
    /// Fixed-size per-component values (socket or TCP-state counts).
    Vector(Vec<f64>),
}

impl SampleValue {
    /// Number of components (1 for scalars).
    pub fn width(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Vector(values) => values.len(),
        }
    }

    pub fn components(&self) -> &[f64] {
        match self {
            Self::Scalar(value) => std::slice::from_ref(value),
            Self::Vector(values) => values,
        }
    }

    /// Sum of all components, used for stacked rendering bounds.
    pub fn total(&self) -> f64 {
        self.components().iter().sum()
    }

    /// Rebuilds a value of the same shape from components.
    pub fn from_components(like_vector: bool, components: Vec<f64>) -> Self {
        match (like_vector, components.as_slice()) {
            (false, [value]) => Self::Scalar(*value),
            _ => Self::Vector(components),
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Vector(_))
    }
}

/// One decoded accounting measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Instant of the measurement, in the report zone's offset.
    pub timestamp: DateTime<FixedOffset>,
    pub metric: MetricKind,
    pub value: SampleValue,
}

impl Sample {
    pub fn scalar(timestamp: DateTime<FixedOffset>, metric: MetricKind, value: f64) -> Self {
        Self {
            timestamp,
            metric,
            value: SampleValue::Scalar(value),
        }
    }

    pub fn vector(timestamp: DateTime<FixedOffset>, metric: MetricKind, values: Vec<f64>) -> Self {
        Self {
            timestamp,
            metric,
            value: SampleValue::Vector(values),
        }
    }
}
