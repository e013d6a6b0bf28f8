use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use crate::clock::Clock;
use crate::config::RunConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::idle::IdleWaiter;
use crate::link::Link;
use crate::protocol::{
    extract_status_line, Command, StatusLine, LIMIT_CLIPPED_TOKEN, LIMIT_ERROR_CODE,
};
use crate::session::Session;

/// Named smoke-test flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Scenario {
    #[serde(rename = "homing")]
    Homing,
    #[serde(rename = "bounds")]
    MotionBounds,
    #[serde(rename = "fault")]
    FaultInjection,
}

impl Scenario {
    /// Every flow in the order a full run executes them.
    pub const ALL: [Scenario; 3] = [
        Scenario::Homing,
        Scenario::MotionBounds,
        Scenario::FaultInjection,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Homing => "homing",
            Scenario::MotionBounds => "bounds",
            Scenario::FaultInjection => "fault",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown scenario `{value}` (expected homing, bounds or fault)"))
    }
}

/// Result of one flow within a run.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    pub passed: bool,
    /// Failure description; `None` when the flow passed.
    pub reason: Option<String>,
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
    pub elapsed: Duration,
}

/// Everything that happened during [`ScenarioDriver::run_all`].
///
/// A run stops at the first failing flow, so `outcomes` holds the flows that
/// passed followed by at most one failure, and `error` holds what aborted it.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<ScenarioOutcome>,
    pub error: Option<HarnessError>,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> HarnessResult<Vec<ScenarioOutcome>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.outcomes),
        }
    }
}

/// Sequences session exchanges into the homing, bounds and fault flows.
///
/// Each flow returns on the first violated expectation; nothing inside a flow
/// is retried or skipped.
#[derive(Debug, Clone)]
pub struct ScenarioDriver {
    config: RunConfig,
    waiter: IdleWaiter,
}

impl ScenarioDriver {
    pub fn new(config: RunConfig) -> Self {
        let waiter =
            IdleWaiter::new(config.poll_interval).with_report_interval(config.report_interval);
        Self { config, waiter }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run the configured flows in order, stopping at the first failure.
    pub fn run_all<L: Link, C: Clock>(&self, session: &mut Session<L, C>) -> RunReport {
        let mut report = RunReport::default();
        for &scenario in &self.config.scenarios {
            let started = session.clock().now();
            let result = self.run(scenario, session);
            let elapsed = session.clock().now().saturating_sub(started);
            match result {
                Ok(()) => report.outcomes.push(ScenarioOutcome {
                    scenario,
                    passed: true,
                    reason: None,
                    elapsed,
                }),
                Err(err) => {
                    error!(%scenario, "{err}");
                    report.outcomes.push(ScenarioOutcome {
                        scenario,
                        passed: false,
                        reason: Some(err.to_string()),
                        elapsed,
                    });
                    report.error = Some(err);
                    break;
                }
            }
        }
        report
    }

    pub fn run<L: Link, C: Clock>(
        &self,
        scenario: Scenario,
        session: &mut Session<L, C>,
    ) -> HarnessResult<()> {
        match scenario {
            Scenario::Homing => self.run_homing(session).map(|_| ()),
            Scenario::MotionBounds => self.run_motion_bounds(session).map(|_| ()),
            Scenario::FaultInjection => self.run_fault_injection(session).map(|_| ()),
        }
    }

    /// Home the channel and wait for it to settle.
    pub fn run_homing<L: Link, C: Clock>(
        &self,
        session: &mut Session<L, C>,
    ) -> HarnessResult<StatusLine> {
        let channel = self.config.channel;
        info!("[homing] channel {channel}");
        session.send(Command::Home(channel))?;
        let idle = self
            .waiter
            .wait(session, channel, self.config.idle_timeout)?;
        info!("[homing] complete");
        Ok(idle)
    }

    /// Drive to `+limit` and `-limit`, confirming idle after each excursion.
    pub fn run_motion_bounds<L: Link, C: Clock>(
        &self,
        session: &mut Session<L, C>,
    ) -> HarnessResult<Vec<StatusLine>> {
        let channel = self.config.channel;
        let limit = self.config.limit;
        let reverse = limit
            .checked_neg()
            .filter(|_| limit > 0)
            .ok_or_else(|| {
                HarnessError::InvalidConfig(format!("soft limit must be positive, got {limit}"))
            })?;
        info!("[bounds] exercising +/-{limit} steps on channel {channel}");

        session.send(Command::Wake(channel))?;
        let mut confirmations = Vec::with_capacity(2);
        for steps in [limit, reverse] {
            session.send(Command::Move { channel, steps })?;
            confirmations.push(
                self.waiter
                    .wait(session, channel, self.config.idle_timeout)?,
            );
        }
        session.send(Command::Sleep(channel))?;

        info!("[bounds] complete");
        Ok(confirmations)
    }

    /// Request a move past the soft limit and check the firmware flags it.
    ///
    /// The MOVE reply must carry the clipping marker. A follow-up status line
    /// is optional, but when one arrives it must report `ERR=ERR_LIMIT`.
    pub fn run_fault_injection<L: Link, C: Clock>(
        &self,
        session: &mut Session<L, C>,
    ) -> HarnessResult<Option<StatusLine>> {
        let channel = self.config.channel;
        info!("[fault] injecting limit violation on channel {channel}");

        let steps = self.config.limit.saturating_add(self.config.fault_overshoot);
        let reply = session.send(Command::Move { channel, steps })?;
        if !reply.iter().any(|line| line.contains(LIMIT_CLIPPED_TOKEN)) {
            return Err(HarnessError::violation(
                "expected limit clipping indicator missing from MOVE response",
            ));
        }

        let status = extract_status_line(&session.send_quiet(Command::Status(channel))?);
        if let Some(status) = &status {
            info!("[fault-status] {status}");
            if !status.has_error(LIMIT_ERROR_CODE) {
                return Err(HarnessError::violation(format!(
                    "STATUS response did not surface {LIMIT_ERROR_CODE} after fault injection"
                )));
            }
        }

        info!("[fault] limit violation acknowledged");
        Ok(status)
    }
}

fn as_secs<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
