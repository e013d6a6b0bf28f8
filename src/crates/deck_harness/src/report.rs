use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::build_info::BuildIdentity;
use crate::error::HarnessResult;
use crate::scenario::{RunReport, ScenarioOutcome};

/// JSON shape written by `--report` for CI consumption.
#[derive(Debug, Serialize)]
pub struct ReportDocument<'a> {
    pub build: &'a BuildIdentity,
    pub passed: bool,
    pub scenarios: &'a [ScenarioOutcome],
    pub error: Option<String>,
}

impl<'a> ReportDocument<'a> {
    pub fn new(build: &'a BuildIdentity, report: &'a RunReport) -> Self {
        Self {
            build,
            passed: report.passed(),
            scenarios: &report.outcomes,
            error: report.error.as_ref().map(ToString::to_string),
        }
    }

    pub fn to_json(&self) -> HarnessResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> HarnessResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
