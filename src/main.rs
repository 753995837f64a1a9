use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use sysreport::accounting::SysstatSource;
use sysreport::clock::{parse_reference_date, PeriodKind};
use sysreport::config::{parse_metric_groups, Config};
use sysreport::report::{to_json, ReportRequest, Reporter};
use sysreport::scale::ProcSystemFacts;
use sysreport::tool::{ProcessRunner, ToolRunner};

/// Builds period-scoped graph specs from sysstat accounting data.
#[derive(Parser)]
#[command(name = "sysreport", about)]
struct Cli {
    /// Path to the YAML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logging verbosity level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Build the graph spec for one period.
    Generate {
        /// Report period: daily, weekly or monthly.
        period: String,

        /// Reference date (YYYY-MM-DD). Defaults to today in the report zone.
        #[arg(long)]
        date: Option<String>,

        /// Metric groups to include, overriding the config.
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<String>,

        /// Write the JSON spec here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print version information and exit.
    Version,
}

/// Build-time version info, injected via the environment.
mod version {
    /// Release version string (set at build time).
    pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

    /// Git commit hash (set at build time via env, or "unknown").
    pub fn git_commit() -> &'static str {
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    }

    pub fn target_os() -> &'static str {
        std::env::consts::OS
    }

    pub fn target_arch() -> &'static str {
        std::env::consts::ARCH
    }

    /// Full version string with platform info.
    pub fn full() -> String {
        format!(
            "{} (commit: {}, {}/{})",
            RELEASE,
            git_commit(),
            target_os(),
            target_arch(),
        )
    }
}

struct Invocation {
    period: String,
    date: Option<String>,
    metrics: Vec<String>,
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let invocation = match cli.command {
        Some(Command::Version) => {
            println!("sysreport {}", version::full());
            return Ok(());
        }
        Some(Command::Generate {
            period,
            date,
            metrics,
            output,
        }) => Invocation {
            period,
            date,
            metrics,
            output,
        },
        None => anyhow::bail!("no command given (use --help for usage)"),
    };

    // Logs go to stderr so stdout stays clean for the JSON spec.
    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cfg = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    tracing::info!(
        version = version::RELEASE,
        commit = version::git_commit(),
        "starting sysreport",
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    rt.block_on(async { run(cfg, invocation).await })
}

async fn run(cfg: Config, invocation: Invocation) -> Result<()> {
    let zone = cfg.zone()?;
    let period: PeriodKind = invocation.period.parse()?;
    let reference = match &invocation.date {
        Some(date) => parse_reference_date(date)?,
        None => zone.today(),
    };
    let groups = if invocation.metrics.is_empty() {
        cfg.metric_groups()?
    } else {
        parse_metric_groups(&invocation.metrics).context("--metrics")?
    };

    let runner = ProcessRunner::new(cfg.tools.timeout);
    let source = SysstatSource::new(
        cfg.sources.data_dir.clone(),
        cfg.sysstat_tools(),
        runner,
        zone,
    );
    let reporter = Reporter::new(source, ProcSystemFacts::default(), zone, cfg.report_options());

    let request = ReportRequest::new(period, reference, groups);
    let spec = reporter
        .run(&request)
        .await
        .with_context(|| format!("generating {period} report for {reference}"))?;
    let json = to_json(&spec).context("serializing graph spec")?;

    match &invocation.output {
        Some(path) => write_output(path, &json).await?,
        None => println!("{json}"),
    }

    if cfg.renderer.enabled {
        let renderer = ProcessRunner::new(cfg.renderer.timeout);
        let output = renderer
            .invoke(
                &cfg.renderer.command,
                &cfg.renderer.args,
                Some(json.into_bytes()),
            )
            .await
            .context("running renderer")?;
        tracing::info!(
            command = %cfg.renderer.command,
            output_bytes = output.len(),
            "renderer finished",
        );
    }

    Ok(())
}

async fn write_output(path: &Path, json: &str) -> Result<()> {
    tokio::fs::write(path, format!("{json}\n"))
        .await
        .with_context(|| format!("writing graph spec to {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote graph spec");
    Ok(())
}
