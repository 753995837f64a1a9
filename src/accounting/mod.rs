//! Accounting reader: locates a day's sysstat file, decompresses it when
//! needed and decodes the requested activities into samples.

pub mod locate;
pub mod parse;

use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::clock::ReportZone;
use crate::metric::{MetricGroup, MetricKind, Sample};
use crate::tool::{ToolError, ToolRunner};

pub use locate::{locate, Encoding, LocatedSource};
pub use parse::{decode, Decoded, ParseError};

/// Errors reading one day of accounting data.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("no accounting data for {day}")]
    DataUnavailable { day: NaiveDate },

    #[error("decompressing {}: {source}", path.display())]
    Decompress {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Everything decoded for one calendar day.
#[derive(Debug, Default)]
pub struct DayRead {
    pub samples: Vec<Sample>,
    pub corrupt_records: usize,
    pub first_error: Option<ParseError>,
    /// Requested groups whose activity was not collected that day.
    pub unavailable: Vec<MetricGroup>,
}

/// Source of per-day accounting samples.
pub trait AccountingSource: Send + Sync + 'static {
    fn read_day(
        &self,
        day: NaiveDate,
        groups: &[MetricGroup],
    ) -> impl Future<Output = Result<DayRead, ReadError>> + Send;
}

/// Names of the sysstat-side binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysstatTools {
    pub sadf: String,
    pub bzip2: String,
    pub xz: String,
}

impl Default for SysstatTools {
    fn default() -> Self {
        Self {
            sadf: "sadf".to_string(),
            bzip2: "bzip2".to_string(),
            xz: "xz".to_string(),
        }
    }
}

/// [`AccountingSource`] reading sysstat `saDD` files through `sadf`.
pub struct SysstatSource<R> {
    data_dir: PathBuf,
    tools: SysstatTools,
    runner: R,
    zone: ReportZone,
}

/// A readable plain accounting file. Decompressed copies live as long as this value.
enum Materialized {
    InPlace(PathBuf),
    Scratch(NamedTempFile),
}

impl Materialized {
    fn path(&self) -> &Path {
        match self {
            Self::InPlace(path) => path,
            Self::Scratch(file) => file.path(),
        }
    }
}

impl<R: ToolRunner> SysstatSource<R> {
    pub fn new(data_dir: PathBuf, tools: SysstatTools, runner: R, zone: ReportZone) -> Self {
        Self {
            data_dir,
            tools,
            runner,
            zone,
        }
    }

    async fn materialize(&self, source: LocatedSource) -> Result<Materialized, ReadError> {
        let LocatedSource { path, encoding } = source;
        match encoding {
            Encoding::Plain => Ok(Materialized::InPlace(path)),
            Encoding::Gzip | Encoding::Zstd => {
                let origin = path.clone();
                tokio::task::spawn_blocking(move || decompress_in_process(&origin, encoding))
                    .await
                    .map_err(|e| ReadError::Decompress {
                        path: path.clone(),
                        source: io::Error::other(e),
                    })?
                    .map(Materialized::Scratch)
                    .map_err(|source| ReadError::Decompress { path, source })
            }
            Encoding::Bzip2 | Encoding::Xz => {
                let tool = if encoding == Encoding::Bzip2 {
                    &self.tools.bzip2
                } else {
                    &self.tools.xz
                };
                let args = vec!["-dc".to_string(), path.display().to_string()];
                let bytes = self.runner.invoke(tool, &args, None).await?;
                tokio::task::spawn_blocking(move || scratch_with(&bytes))
                    .await
                    .map_err(|e| ReadError::Decompress {
                        path: path.clone(),
                        source: io::Error::other(e),
                    })?
                    .map(Materialized::Scratch)
                    .map_err(|source| ReadError::Decompress { path, source })
            }
        }
    }
}

impl<R: ToolRunner> AccountingSource for SysstatSource<R> {
    async fn read_day(&self, day: NaiveDate, groups: &[MetricGroup]) -> Result<DayRead, ReadError> {
        let located = locate(&self.data_dir, day).ok_or(ReadError::DataUnavailable { day })?;

        tracing::debug!(
            %day,
            path = %located.path.display(),
            encoding = %located.encoding,
            "located accounting file",
        );

        let file = self.materialize(located).await?;
        let mut read = DayRead::default();

        for (activity, run_groups) in plan_runs(groups) {
            let mut args: Vec<String> = ["-d", "-U", "--"].iter().map(|s| s.to_string()).collect();
            args.extend(activity.iter().map(|s| s.to_string()));
            args.push(file.path().display().to_string());

            let stdout = match self.runner.invoke(&self.tools.sadf, &args, None).await {
                Ok(stdout) => stdout,
                Err(e) if e.is_exit_failure() => {
                    tracing::debug!(%day, ?activity, error = %e, "activity not collected");
                    read.unavailable.extend(run_groups);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let decoded = decode(&String::from_utf8_lossy(&stdout), &self.zone);
            read.corrupt_records += decoded.corrupt_records;
            if read.first_error.is_none() {
                read.first_error = decoded.first_error;
            }
            // Restart records appear in every activity dump and annotate every panel.
            read.samples.extend(decoded.samples.into_iter().filter(|s| {
                s.metric == MetricKind::RebootEvent || run_groups.contains(&s.metric.group())
            }));
        }

        Ok(read)
    }
}

/// Groups sharing a `sadf` activity selection are decoded from one invocation.
fn plan_runs(groups: &[MetricGroup]) -> Vec<(&'static [&'static str], Vec<MetricGroup>)> {
    let mut runs: Vec<(&'static [&'static str], Vec<MetricGroup>)> = Vec::new();
    for group in groups {
        let activity = group.sadf_args();
        match runs.iter_mut().find(|(args, _)| *args == activity) {
            Some((_, members)) => {
                if !members.contains(group) {
                    members.push(*group);
                }
            }
            None => runs.push((activity, vec![*group])),
        }
    }
    runs
}

fn decompress_in_process(path: &Path, encoding: Encoding) -> io::Result<NamedTempFile> {
    let input = std::fs::File::open(path)?;
    let mut scratch = NamedTempFile::new()?;
    match encoding {
        Encoding::Gzip => {
            io::copy(&mut flate2::read::GzDecoder::new(input), &mut scratch)?;
        }
        Encoding::Zstd => {
            zstd::stream::copy_decode(input, &mut scratch)?;
        }
        other => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{other} is not decoded in-process"),
            ))
        }
    }
    scratch.flush()?;
    Ok(scratch)
}

fn scratch_with(bytes: &[u8]) -> io::Result<NamedTempFile> {
    let mut scratch = NamedTempFile::new()?;
    scratch.write_all(bytes)?;
    scratch.flush()?;
    Ok(scratch)
}
