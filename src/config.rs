use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::accounting::SysstatTools;
use crate::clock::ReportZone;
use crate::graph::RenderHints;
use crate::metric::MetricGroup;
use crate::report::ReportOptions;
use crate::scale::ScaleOptions;

/// Top-level configuration for sysreport.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// IANA time zone the report is expressed in. Default: the system zone.
    #[serde(default)]
    pub timezone: Option<String>,

    /// Metric groups to report. Default: all groups.
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,

    /// Report title. Default: "Sysstat <period> report".
    #[serde(default)]
    pub title: Option<String>,

    /// Accounting data location.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// External tool configuration.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Accounting reader configuration.
    #[serde(default)]
    pub reader: ReaderConfig,

    /// Axis scaling configuration.
    #[serde(default)]
    pub scale: ScaleConfig,

    /// Optional renderer the graph spec is piped into.
    #[serde(default)]
    pub renderer: RendererConfig,
}

/// Accounting data location.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    /// Directory holding `saDD` files. Default: /var/log/sysstat.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// External tool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    /// `sadf` binary. Default: "sadf".
    #[serde(default = "default_sadf")]
    pub sadf: String,

    /// `bzip2` binary. Default: "bzip2".
    #[serde(default = "default_bzip2")]
    pub bzip2: String,

    /// `xz` binary. Default: "xz".
    #[serde(default = "default_xz")]
    pub xz: String,

    /// Per-invocation timeout. Default: 60s.
    #[serde(default = "default_tool_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

/// Accounting reader configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReaderConfig {
    /// Days read concurrently. Default: 4.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

/// Axis scaling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScaleConfig {
    /// Multiplier over the observed maximum. Default: 1.1.
    #[serde(default = "default_headroom")]
    pub headroom: f64,

    /// Render vector metrics stacked. Default: false.
    #[serde(default)]
    pub stacked_vectors: bool,
}

/// Renderer hook configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RendererConfig {
    /// Pipe the graph spec into `command`. Default: false.
    #[serde(default)]
    pub enabled: bool,

    /// Renderer binary.
    #[serde(default)]
    pub command: String,

    /// Renderer arguments.
    #[serde(default)]
    pub args: Vec<String>,

    /// Renderer timeout. Default: 120s.
    #[serde(default = "default_renderer_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

// --- Default value functions ---

fn default_metrics() -> Vec<String> {
    MetricGroup::all()
        .iter()
        .map(|g| g.as_str().to_string())
        .collect()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/log/sysstat")
}

fn default_sadf() -> String {
    "sadf".to_string()
}

fn default_bzip2() -> String {
    "bzip2".to_string()
}

fn default_xz() -> String {
    "xz".to_string()
}

fn default_tool_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_concurrency() -> usize {
    4
}

fn default_headroom() -> f64 {
    1.1
}

fn default_renderer_timeout() -> Duration {
    Duration::from_secs(120)
}

// --- Default trait impls ---

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: None,
            metrics: default_metrics(),
            title: None,
            sources: SourcesConfig::default(),
            tools: ToolsConfig::default(),
            reader: ReaderConfig::default(),
            scale: ScaleConfig::default(),
            renderer: RendererConfig::default(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            sadf: default_sadf(),
            bzip2: default_bzip2(),
            xz: default_xz(),
            timeout: default_tool_timeout(),
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            headroom: default_headroom(),
            stacked_vectors: false,
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: String::new(),
            args: Vec::new(),
            timeout: default_renderer_timeout(),
        }
    }
}

// --- Validation and loading ---

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate the configuration for required fields and consistency.
    pub fn validate(&self) -> Result<()> {
        if let Some(tz) = &self.timezone {
            ReportZone::from_name(Some(tz.as_str()))
                .context("timezone must be an IANA zone name")?;
        }

        if self.metrics.is_empty() {
            bail!("metrics must name at least one metric group");
        }
        parse_metric_groups(&self.metrics).context("metrics")?;

        if self.sources.data_dir.as_os_str().is_empty() {
            bail!("sources.data_dir is required");
        }

        if self.tools.sadf.is_empty() {
            bail!("tools.sadf is required");
        }

        if self.tools.bzip2.is_empty() || self.tools.xz.is_empty() {
            bail!("tools.bzip2 and tools.xz must not be empty");
        }

        if self.tools.timeout.is_zero() {
            bail!("tools.timeout must be positive");
        }

        if self.reader.concurrency == 0 {
            bail!("reader.concurrency must be positive");
        }

        if !self.scale.headroom.is_finite() || self.scale.headroom < 1.0 {
            bail!("scale.headroom must be a finite number >= 1.0");
        }

        if self.renderer.enabled {
            if self.renderer.command.is_empty() {
                bail!("renderer.command is required when renderer.enabled=true");
            }
            if self.renderer.timeout.is_zero() {
                bail!("renderer.timeout must be positive");
            }
        }

        Ok(())
    }

    /// Report zone selected by `timezone`.
    pub fn zone(&self) -> Result<ReportZone> {
        ReportZone::from_name(self.timezone.as_deref())
    }

    /// Metric groups selected by `metrics`.
    pub fn metric_groups(&self) -> Result<Vec<MetricGroup>> {
        parse_metric_groups(&self.metrics)
    }

    pub fn sysstat_tools(&self) -> SysstatTools {
        SysstatTools {
            sadf: self.tools.sadf.clone(),
            bzip2: self.tools.bzip2.clone(),
            xz: self.tools.xz.clone(),
        }
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            concurrency: self.reader.concurrency,
            scale: ScaleOptions {
                headroom: self.scale.headroom,
                stacked_vectors: self.scale.stacked_vectors,
            },
            render: RenderHints {
                title: self.title.clone(),
                stacked_vectors: self.scale.stacked_vectors,
            },
        }
    }
}

/// Parse metric group names, accepting `io` for disk.
pub fn parse_metric_groups<S: AsRef<str>>(names: &[S]) -> Result<Vec<MetricGroup>> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref().trim();
            match MetricGroup::from_name(&name.to_ascii_lowercase()) {
                Some(group) => Ok(group),
                None => bail!("unknown metric group: {name}"),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.timezone, None);
        assert_eq!(cfg.metrics.len(), MetricGroup::all().len());
        assert_eq!(cfg.sources.data_dir, PathBuf::from("/var/log/sysstat"));
        assert_eq!(cfg.tools.sadf, "sadf");
        assert_eq!(cfg.tools.timeout, Duration::from_secs(60));
        assert_eq!(cfg.reader.concurrency, 4);
        assert_eq!(cfg.scale.headroom, 1.1);
        assert!(!cfg.renderer.enabled);
        assert_eq!(cfg.renderer.timeout, Duration::from_secs(120));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
timezone: Europe/Paris
metrics: [cpu, mem, io]
title: db01 weekly
sources:
  data_dir: /srv/sa
tools:
  sadf: /usr/local/bin/sadf
  timeout: 90s
reader:
  concurrency: 2
scale:
  headroom: 1.25
  stacked_vectors: true
renderer:
  enabled: true
  command: graph-render
  args: ["--format", "png"]
  timeout: 5m
"#;
        let cfg: Config = serde_yaml::from_str(yaml).expect("parse yaml");
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.timezone.as_deref(), Some("Europe/Paris"));
        assert_eq!(
            cfg.metric_groups().expect("groups"),
            vec![MetricGroup::Cpu, MetricGroup::Memory, MetricGroup::Disk]
        );
        assert_eq!(cfg.sources.data_dir, PathBuf::from("/srv/sa"));
        assert_eq!(cfg.tools.sadf, "/usr/local/bin/sadf");
        assert_eq!(cfg.tools.xz, "xz");
        assert_eq!(cfg.tools.timeout, Duration::from_secs(90));
        assert_eq!(cfg.renderer.timeout, Duration::from_secs(300));
        assert_eq!(cfg.renderer.args, vec!["--format", "png"]);

        let options = cfg.report_options();
        assert_eq!(options.concurrency, 2);
        assert_eq!(options.scale.headroom, 1.25);
        assert!(options.render.stacked_vectors);
        assert_eq!(options.render.title.as_deref(), Some("db01 weekly"));
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let cfg: Config = serde_yaml::from_str("{}").expect("parse yaml");
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.metrics, default_metrics());
        assert_eq!(cfg.zone().expect("zone"), ReportZone::Local);
    }

    #[test]
    fn test_validate_unknown_timezone() {
        let cfg = Config {
            timezone: Some("Atlantis/Capital".to_string()),
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("timezone"));
    }

    #[test]
    fn test_validate_unknown_metric() {
        let cfg = Config {
            metrics: vec!["cpu".to_string(), "gpu".to_string()],
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(format!("{err:#}").contains("unknown metric group: gpu"));
    }

    #[test]
    fn test_validate_empty_metrics() {
        let cfg = Config {
            metrics: Vec::new(),
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("metrics must name"));
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let mut cfg = Config::default();
        cfg.reader.concurrency = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("reader.concurrency"));
    }

    #[test]
    fn test_validate_headroom() {
        let mut cfg = Config::default();
        cfg.scale.headroom = 0.5;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("scale.headroom"));

        cfg.scale.headroom = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_renderer_requires_command() {
        let mut cfg = Config::default();
        cfg.renderer.enabled = true;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("renderer.command"));

        cfg.renderer.command = "render".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_tool_timeout() {
        let mut cfg = Config::default();
        cfg.tools.timeout = Duration::ZERO;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("tools.timeout"));
    }

    #[test]
    fn test_parse_metric_groups_is_case_insensitive() {
        assert_eq!(
            parse_metric_groups(&["CPU", " net "]).expect("groups"),
            vec![MetricGroup::Cpu, MetricGroup::Network]
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sysreport.yaml");
        std::fs::write(&path, "reader:\n  concurrency: 8\n").expect("write config");
        let cfg = Config::load(&path).expect("load");
        assert_eq!(cfg.reader.concurrency, 8);

        let err = Config::load(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(err.to_string().contains("reading config file"));
    }
}
