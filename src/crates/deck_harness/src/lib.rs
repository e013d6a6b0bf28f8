//! Host-side smoke testing for a motor-control deck that speaks a line-based
//! serial protocol.
//!
//! Typical usage:
//! ```no_run
//! use deck_harness::{LinkConfig, RunConfig, ScenarioDriver, SerialLink, Session};
//!
//! let link_config = LinkConfig::new("/dev/ttyACM0");
//! let session_config = (&link_config).into();
//! let mut session = Session::connect(SerialLink::new(link_config), session_config)
//!     .expect("deck should be reachable");
//!
//! let report = ScenarioDriver::new(RunConfig::default()).run_all(&mut session);
//! for outcome in &report.outcomes {
//!     println!("{}: {}", outcome.scenario, if outcome.passed { "pass" } else { "FAIL" });
//! }
//! ```
//!
//! Tests and dry runs swap the serial port for a [`ScriptedLink`] driven by a
//! [`ManualClock`], so no hardware or real waiting is involved.

mod build_info;
mod clock;
mod config;
mod error;
mod idle;
mod link;
mod protocol;
mod report;
mod scenario;
mod scripted;
#[cfg(feature = "serial")]
mod serial;
mod session;

pub use build_info::{config_version_path, read_config_version, read_git_hash, BuildIdentity};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{parse_seconds, LinkConfig, RunConfig, SessionConfig};
pub use error::{HarnessError, HarnessResult};
pub use idle::{wait_for_idle, IdleWaiter};
pub use link::{LineBuffer, Link};
pub use protocol::{
    extract_status_line, Command, ResponseLine, StatusLine, IDLE_TOKEN, LIMIT_CLIPPED_TOKEN,
    LIMIT_ERROR_CODE,
};
pub use report::ReportDocument;
pub use scenario::{RunReport, Scenario, ScenarioDriver, ScenarioOutcome};
pub use scripted::{ScriptHandle, ScriptedLink};
#[cfg(feature = "serial")]
pub use serial::SerialLink;
pub use session::Session;
