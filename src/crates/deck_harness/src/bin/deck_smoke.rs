use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use deck_harness::{
    parse_seconds, BuildIdentity, HarnessError, HarnessResult, LinkConfig, ReportDocument,
    RunConfig, RunReport, Scenario, ScenarioDriver, Session,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Smoke test runner for the motor-control deck firmware.
#[derive(Debug, Parser)]
#[command(name = "deck_smoke", version)]
struct Args {
    /// Serial port connected to the control deck.
    #[arg(long)]
    port: String,
    /// Serial baud rate.
    #[arg(long, default_value_t = 115_200)]
    baud: u32,
    /// Motor channel to exercise.
    #[arg(long, default_value_t = 0)]
    channel: u8,
    /// Soft limit (steps) to verify during motion bounds.
    #[arg(long, default_value_t = 1200, value_parser = clap::value_parser!(i32).range(1..))]
    limit: i32,
    /// Serial read timeout in seconds, also the per-command exchange bound.
    #[arg(long, default_value = "1.0", value_parser = parse_seconds)]
    timeout: Duration,
    /// Seconds to wait for a channel to reach IDLE during scripted flows.
    #[arg(long, default_value = "25.0", value_parser = parse_seconds)]
    idle_timeout: Duration,
    /// Seconds between STATUS polls while waiting for IDLE.
    #[arg(long, default_value = "0.2", value_parser = parse_seconds)]
    poll_interval: Duration,
    /// Flow to run (homing, bounds, fault); repeat to pick several. Defaults to all.
    #[arg(long = "scenario")]
    scenarios: Vec<Scenario>,
    /// Write a JSON run report to this path.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Firmware checkout used to resolve the build identity.
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let identity = BuildIdentity::resolve(&args.root);
    for line in identity.banner() {
        info!("{line}");
    }

    let report = match run(&args) {
        Ok(report) => report,
        Err(err) => return fail(&err),
    };

    if let Some(path) = &args.report {
        if let Err(err) = ReportDocument::new(&identity, &report).write_json(path) {
            error!(path = %path.display(), "{err}");
        }
    }

    match report.into_result() {
        Ok(_) => {
            info!("All smoke test sequences completed successfully.");
            ExitCode::SUCCESS
        }
        Err(err) => fail(&err),
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(args: &Args) -> HarnessResult<RunReport> {
    let link_config = LinkConfig::new(&args.port)
        .with_baud_rate(args.baud)
        .with_timeout(args.timeout);
    let run_config = RunConfig::default()
        .with_channel(args.channel)
        .with_limit(args.limit)
        .with_idle_timeout(args.idle_timeout)
        .with_poll_interval(args.poll_interval)
        .with_scenarios(args.scenarios.iter().copied());

    let session_config = (&link_config).into();
    let link = open_link(link_config)?;
    let mut session = Session::connect(link, session_config)?;
    let report = ScenarioDriver::new(run_config).run_all(&mut session);
    session.close();
    Ok(report)
}

#[cfg(feature = "serial")]
fn open_link(config: LinkConfig) -> HarnessResult<deck_harness::SerialLink> {
    Ok(deck_harness::SerialLink::new(config))
}

#[cfg(not(feature = "serial"))]
fn open_link(_config: LinkConfig) -> HarnessResult<deck_harness::ScriptedLink> {
    Err(HarnessError::TransportUnavailable)
}

fn fail(err: &HarnessError) -> ExitCode {
    error!("{err}");
    if err.is_timeout() {
        info!("Hint: Increase --idle-timeout or verify mechanics before retrying.");
    }
    if matches!(err, HarnessError::TransportUnavailable) {
        info!("Rebuild deck_smoke with `--features serial` to talk to hardware.");
    }
    ExitCode::from(err.exit_code())
}
