//! Renderer-agnostic graph description.
//!
//! [`build`] is pure assembly: it never reads data or touches the host, so the
//! same inputs always serialize to the same JSON.

use std::ops::Range;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;

use crate::clock::{PeriodKind, TimeWindow};
use crate::metric::{MetricGroup, MetricKind};
use crate::scale::ScaleHint;
use crate::series::{MetricSeries, Point};

const HOUR: i64 = 3600;
const DAY: i64 = 24 * HOUR;

/// Presentation choices that do not depend on data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderHints {
    /// Overrides the default `"Sysstat <period> report"` title.
    pub title: Option<String>,
    pub stacked_vectors: bool,
}

/// Complete description of one report's graphs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSpec {
    pub title: String,
    pub window: WindowSpec,
    pub panels: Vec<Panel>,
    pub scale_hints: Vec<ScaleHint>,
    pub events: Vec<Event>,
}

impl GraphSpec {
    pub fn has_data(&self) -> bool {
        !self.panels.is_empty()
    }

    /// All series across panels, in panel order.
    pub fn series(&self) -> impl Iterator<Item = &GraphSeries> {
        self.panels.iter().flat_map(|p| p.series.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowSpec {
    pub period: PeriodKind,
    pub days: Vec<NaiveDate>,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub ticks: TickSpec,
}

/// X-axis labelling hint: strftime format and spacing between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickSpec {
    pub format: &'static str,
    pub step_seconds: i64,
}

impl TickSpec {
    pub const fn for_period(period: PeriodKind) -> Self {
        match period {
            PeriodKind::Daily => Self {
                format: "%H:%M",
                step_seconds: 3 * HOUR,
            },
            PeriodKind::Weekly => Self {
                format: "%a %d/%m",
                step_seconds: DAY,
            },
            PeriodKind::Monthly => Self {
                format: "%d",
                step_seconds: 2 * DAY,
            },
        }
    }
}

/// One graph: all series of a metric group on a shared axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Panel {
    pub group: MetricGroup,
    pub title: String,
    pub y_label: String,
    pub unit: String,
    pub axis: Axis,
    pub stacked: bool,
    pub series: Vec<GraphSeries>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Axis {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSeries {
    pub metric: MetricKind,
    pub label: String,
    pub unit: String,
    /// Component labels of vector values, in value order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<&'static str>,
    pub points: Vec<Point>,
    /// Index ranges into `points` of contiguous data; lines break between them.
    pub segments: Vec<Range<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Reboot,
}

/// Vertical marker shared by every panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub kind: EventKind,
    pub timestamp: DateTime<FixedOffset>,
}

/// Assemble a [`GraphSpec`] from processed series.
///
/// Panels follow canonical group order and hold their series sorted by
/// metric key. Empty series are dropped; with none left the spec is a valid
/// "no data" report. Reboots outside the window are dropped, the rest are
/// sorted and deduplicated.
pub fn build(
    window: &TimeWindow,
    series: &[MetricSeries],
    hints: &[ScaleHint],
    reboots: &[DateTime<FixedOffset>],
    render: &RenderHints,
) -> GraphSpec {
    let panels = MetricGroup::all()
        .iter()
        .filter(|group| **group != MetricGroup::Reboot)
        .filter_map(|group| build_panel(*group, series, hints, render))
        .collect();

    let mut instants: Vec<DateTime<FixedOffset>> = reboots
        .iter()
        .filter(|ts| window.contains(ts))
        .copied()
        .collect();
    instants.sort();
    instants.dedup();

    GraphSpec {
        title: render
            .title
            .clone()
            .unwrap_or_else(|| format!("Sysstat {} report", window.period)),
        window: WindowSpec {
            period: window.period,
            days: window.days.clone(),
            start: window.start,
            end: window.end,
            ticks: TickSpec::for_period(window.period),
        },
        panels,
        scale_hints: hints.to_vec(),
        events: instants
            .into_iter()
            .map(|timestamp| Event {
                kind: EventKind::Reboot,
                timestamp,
            })
            .collect(),
    }
}

fn build_panel(
    group: MetricGroup,
    series: &[MetricSeries],
    hints: &[ScaleHint],
    render: &RenderHints,
) -> Option<Panel> {
    let mut members: Vec<&MetricSeries> = series
        .iter()
        .filter(|s| s.metric.group() == group && !s.is_empty())
        .collect();
    if members.is_empty() {
        return None;
    }
    members.sort_by_key(|s| s.metric.key());

    let axis = hints
        .iter()
        .filter(|h| h.metric.group() == group)
        .fold(None, |acc: Option<Axis>, h| {
            Some(match acc {
                Some(axis) => Axis {
                    min: axis.min.min(h.min),
                    max: axis.max.max(h.max),
                },
                None => Axis {
                    min: h.min,
                    max: h.max,
                },
            })
        })
        .unwrap_or(Axis { min: 0.0, max: 1.0 });

    let stacked = render.stacked_vectors && members.iter().any(|s| s.is_vector());

    Some(Panel {
        group,
        title: group.title().to_string(),
        y_label: group.y_label().to_string(),
        unit: group.unit().to_string(),
        axis,
        stacked,
        series: members
            .into_iter()
            .map(|s| GraphSeries {
                metric: s.metric.clone(),
                label: s.metric.label(),
                unit: s.metric.unit().to_string(),
                components: s.metric.components().to_vec(),
                points: s.points.clone(),
                segments: s.segments(),
            })
            .collect(),
    })
}
