//! Report orchestration: window resolution, concurrent day reads, series
//! processing and graph assembly.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::accounting::{AccountingSource, DayRead, ReadError};
use crate::clock::{resolve, PeriodKind, ReportZone, TimeWindow, WindowError};
use crate::graph::{build, GraphSpec, RenderHints};
use crate::metric::{MetricGroup, MetricKind, Sample};
use crate::scale::{scale_hints, ScaleOptions, SystemFacts};
use crate::series::{aggregate, smooth, MetricSeries};

/// Fatal report failures.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("invalid period or date: {0}")]
    InvalidPeriodOrDate(#[from] WindowError),

    #[error("no accounting data for any requested metric between {first} and {last}")]
    NoDataForWindow { first: NaiveDate, last: NaiveDate },

    #[error("external tool {tool} failed: {reason}")]
    ExternalCollaboratorFailure { tool: String, reason: String },

    #[error("reader task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl ReportError {
    fn from_read(err: ReadError) -> Self {
        match err {
            ReadError::Tool(e) => Self::ExternalCollaboratorFailure {
                tool: e.tool().to_string(),
                reason: e.to_string(),
            },
            other => Self::ExternalCollaboratorFailure {
                tool: "decompress".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// What to report on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    pub period: PeriodKind,
    pub reference: NaiveDate,
    /// Metric groups to include, in any order. Empty means all.
    pub groups: Vec<MetricGroup>,
}

impl ReportRequest {
    pub fn new(period: PeriodKind, reference: NaiveDate, groups: Vec<MetricGroup>) -> Self {
        let mut groups = if groups.is_empty() {
            MetricGroup::all().to_vec()
        } else {
            groups
        };
        groups.sort();
        groups.dedup();
        Self {
            period,
            reference,
            groups,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportOptions {
    /// Maximum days read at once.
    pub concurrency: usize,
    pub scale: ScaleOptions,
    pub render: RenderHints,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            scale: ScaleOptions::default(),
            render: RenderHints::default(),
        }
    }
}

/// Runs the report pipeline against an accounting source and host facts.
pub struct Reporter<S, F> {
    source: Arc<S>,
    facts: F,
    zone: ReportZone,
    options: ReportOptions,
}

impl<S: AccountingSource, F: SystemFacts> Reporter<S, F> {
    pub fn new(source: S, facts: F, zone: ReportZone, options: ReportOptions) -> Self {
        Self {
            source: Arc::new(source),
            facts,
            zone,
            options,
        }
    }

    /// Produce the graph spec for `request`.
    pub async fn run(&self, request: &ReportRequest) -> Result<GraphSpec, ReportError> {
        let window = resolve(request.period, request.reference, &self.zone)?;

        tracing::info!(
            period = %window.period,
            first = %window.first_day(),
            last = %window.last_day(),
            days = window.days.len(),
            groups = request.groups.len(),
            "resolved report window",
        );

        let samples = self.read_window(&window, &request.groups).await?;
        let series = aggregate(&window, &samples);

        let (reboot_series, series): (Vec<MetricSeries>, Vec<MetricSeries>) = series
            .into_iter()
            .partition(|s| s.metric == MetricKind::RebootEvent);
        let reboots: Vec<DateTime<FixedOffset>> = reboot_series
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p.timestamp))
            .collect();

        // Reboot markers annotate panels; they never make a report on their own.
        let mut any_data = false;
        for group in request.groups.iter().filter(|g| **g != MetricGroup::Reboot) {
            let present = series
                .iter()
                .any(|s| s.metric.group() == *group && !s.is_empty());
            if present {
                any_data = true;
            } else {
                tracing::info!(group = %group, "no data for metric group, omitting");
            }
        }
        if !any_data {
            return Err(ReportError::NoDataForWindow {
                first: window.first_day(),
                last: window.last_day(),
            });
        }

        let smoothed: Vec<MetricSeries> = series
            .iter()
            .map(|s| smooth(s, window.period))
            .collect();
        let hints = scale_hints(&smoothed, &self.facts, &self.options.scale);
        let spec = build(&window, &smoothed, &hints, &reboots, &self.options.render);

        tracing::info!(
            panels = spec.panels.len(),
            series = spec.series().count(),
            events = spec.events.len(),
            "built graph spec",
        );

        Ok(spec)
    }

    /// Read every day of `window` concurrently and merge samples in day order.
    ///
    /// The first fatal read error aborts the run; outstanding reads are
    /// cancelled when the task set is dropped.
    async fn read_window(
        &self,
        window: &TimeWindow,
        groups: &[MetricGroup],
    ) -> Result<Vec<Sample>, ReportError> {
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let groups: Arc<[MetricGroup]> = groups.into();
        let mut tasks = JoinSet::new();

        for day in &window.days {
            let day = *day;
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let groups = Arc::clone(&groups);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = source.read_day(day, &groups).await;
                (day, result)
            });
        }

        let mut days: Vec<(NaiveDate, DayRead)> = Vec::with_capacity(window.days.len());
        while let Some(joined) = tasks.join_next().await {
            let (day, result) = joined?;
            match result {
                Ok(read) => days.push((day, read)),
                Err(ReadError::DataUnavailable { .. }) => {
                    tracing::info!(%day, "no accounting data for day, leaving a gap");
                }
                Err(e) => {
                    tracing::error!(%day, error = %e, "reading accounting data failed");
                    return Err(ReportError::from_read(e));
                }
            }
        }
        days.sort_by_key(|(day, _)| *day);

        let mut samples = Vec::new();
        for (day, read) in days {
            if read.corrupt_records > 0 {
                tracing::warn!(
                    %day,
                    corrupt_records = read.corrupt_records,
                    first_error = ?read.first_error,
                    "skipped corrupt accounting records",
                );
            }
            for group in &read.unavailable {
                tracing::debug!(%day, group = %group, "activity not collected on day");
            }
            samples.extend(read.samples);
        }

        Ok(samples)
    }
}

/// Serialize `spec` as pretty, deterministic JSON.
pub fn to_json(spec: &GraphSpec) -> serde_json::Result<String> {
    serde_json::to_string_pretty(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::CpuMode;
    use crate::scale::StaticFacts;
    use crate::tool::ToolError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn utc() -> ReportZone {
        ReportZone::Named(chrono_tz::UTC)
    }

    enum Canned {
        Samples(Vec<Sample>),
        Fatal,
    }

    struct CannedSource {
        days: HashMap<NaiveDate, Canned>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl CannedSource {
        fn new(days: HashMap<NaiveDate, Canned>) -> Self {
            Self {
                days,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    impl AccountingSource for CannedSource {
        async fn read_day(
            &self,
            day: NaiveDate,
            _groups: &[MetricGroup],
        ) -> Result<DayRead, ReadError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.days.get(&day) {
                None => Err(ReadError::DataUnavailable { day }),
                Some(Canned::Fatal) => Err(ReadError::Tool(ToolError::Timeout {
                    tool: "sadf".to_string(),
                    timeout: std::time::Duration::from_secs(60),
                })),
                Some(Canned::Samples(samples)) => Ok(DayRead {
                    samples: samples.clone(),
                    ..DayRead::default()
                }),
            }
        }
    }

    fn cpu_day(day: NaiveDate, values: &[f64]) -> Vec<Sample> {
        let start = utc().day_start(day);
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                Sample::scalar(
                    start + chrono::Duration::hours(i as i64 + 1),
                    MetricKind::CpuUsage(CpuMode::User),
                    *v,
                )
            })
            .collect()
    }

    fn reporter(
        days: HashMap<NaiveDate, Canned>,
        concurrency: usize,
    ) -> Reporter<CannedSource, StaticFacts> {
        Reporter::new(
            CannedSource::new(days),
            StaticFacts::default(),
            utc(),
            ReportOptions {
                concurrency,
                ..ReportOptions::default()
            },
        )
    }

    #[test]
    fn test_request_defaults_to_all_groups() {
        let req = ReportRequest::new(PeriodKind::Daily, date(2024, 5, 13), Vec::new());
        assert_eq!(req.groups, MetricGroup::all());

        let req = ReportRequest::new(
            PeriodKind::Daily,
            date(2024, 5, 13),
            vec![MetricGroup::Tcp, MetricGroup::Cpu, MetricGroup::Tcp],
        );
        assert_eq!(req.groups, vec![MetricGroup::Cpu, MetricGroup::Tcp]);
    }

    #[tokio::test]
    async fn test_weekly_run_merges_days_in_order() {
        let mut days = HashMap::new();
        for (day, values) in [
            (date(2024, 5, 6), [10.0, 20.0, 30.0]),
            (date(2024, 5, 8), [40.0, 50.0, 60.0]),
            (date(2024, 5, 12), [70.0, 80.0, 90.0]),
        ] {
            days.insert(day, Canned::Samples(cpu_day(day, &values)));
        }

        let reporter = reporter(days, 2);
        let req = ReportRequest::new(
            PeriodKind::Weekly,
            date(2024, 5, 13),
            vec![MetricGroup::Cpu],
        );
        let spec = reporter.run(&req).await.expect("report");

        let series: Vec<_> = spec.series().collect();
        assert_eq!(series.len(), 1);
        let stamps: Vec<_> = series[0].points.iter().map(|p| p.timestamp).collect();
        let mut sorted = stamps.clone();
        sorted.sort();
        assert_eq!(stamps, sorted);
        assert_eq!(series[0].points.len(), 3);
        assert_eq!(series[0].segments.len(), 3);
        assert!(reporter.source.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_all_days_missing_is_no_data() {
        let reporter = reporter(HashMap::new(), 4);
        let req = ReportRequest::new(PeriodKind::Weekly, date(2024, 5, 13), Vec::new());
        let err = reporter.run(&req).await.unwrap_err();
        assert!(matches!(err, ReportError::NoDataForWindow { .. }));
    }

    #[tokio::test]
    async fn test_empty_group_is_omitted_not_fatal() {
        let mut days = HashMap::new();
        let day = date(2024, 5, 12);
        days.insert(day, Canned::Samples(cpu_day(day, &[5.0])));
        let reporter = reporter(days, 4);
        let req = ReportRequest::new(
            PeriodKind::Daily,
            date(2024, 5, 13),
            vec![MetricGroup::Cpu, MetricGroup::Sockets],
        );
        let spec = reporter.run(&req).await.expect("report");
        assert_eq!(spec.panels.len(), 1);
        assert_eq!(spec.panels[0].group, MetricGroup::Cpu);
        assert!(spec
            .panels
            .iter()
            .all(|p| p.group != MetricGroup::Sockets));
    }

    #[tokio::test]
    async fn test_collaborator_failure_is_fatal() {
        let mut days = HashMap::new();
        let day = date(2024, 5, 6);
        days.insert(day, Canned::Samples(cpu_day(day, &[1.0])));
        days.insert(date(2024, 5, 9), Canned::Fatal);
        let reporter = reporter(days, 4);
        let req = ReportRequest::new(PeriodKind::Weekly, date(2024, 5, 13), Vec::new());
        let err = reporter.run(&req).await.unwrap_err();
        match err {
            ReportError::ExternalCollaboratorFailure { tool, .. } => assert_eq!(tool, "sadf"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_reboots_alone_are_no_data() {
        let day = date(2024, 5, 12);
        let reboot = Sample::scalar(
            utc().day_start(day) + chrono::Duration::hours(2),
            MetricKind::RebootEvent,
            1.0,
        );
        for groups in [Vec::new(), vec![MetricGroup::Reboot]] {
            let mut days = HashMap::new();
            days.insert(day, Canned::Samples(vec![reboot.clone()]));
            let req = ReportRequest::new(PeriodKind::Daily, date(2024, 5, 13), groups);
            let err = reporter(days, 1).run(&req).await.unwrap_err();
            assert!(matches!(err, ReportError::NoDataForWindow { .. }));
        }
    }

    #[tokio::test]
    async fn test_reboot_markers_deduplicated_across_panels() {
        let day = date(2024, 5, 12);
        let reboot = Sample::scalar(
            utc().day_start(day) + chrono::Duration::hours(2),
            MetricKind::RebootEvent,
            1.0,
        );
        let mut samples = cpu_day(day, &[5.0, 6.0]);
        samples.push(reboot.clone());
        samples.push(reboot);
        let mut days = HashMap::new();
        days.insert(day, Canned::Samples(samples));
        let req = ReportRequest::new(
            PeriodKind::Daily,
            date(2024, 5, 13),
            vec![MetricGroup::Cpu],
        );
        let spec = reporter(days, 1).run(&req).await.expect("report");
        assert_eq!(spec.panels.len(), 1);
        assert_eq!(spec.events.len(), 1);
    }
}
