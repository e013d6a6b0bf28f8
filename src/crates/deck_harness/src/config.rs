use std::time::Duration;

use crate::scenario::Scenario;

/// Connection-level settings for the byte-stream link to the deck.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Device path or port name, e.g. `/dev/ttyACM0` or `COM3`.
    pub endpoint: String,
    /// Serial baud rate.
    pub baud_rate: u32,
    /// Read/write timeout; also bounds a single command exchange.
    pub timeout: Duration,
    /// Pause after opening the port before boot chatter is drained.
    pub settle_delay: Duration,
}

impl LinkConfig {
    /// Create a config for a specific endpoint with the deck's defaults.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            baud_rate: 115_200,
            timeout: Duration::from_secs(1),
            settle_delay: Duration::from_millis(100),
        }
    }

    /// Override the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Override the read/write and per-exchange timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the post-open settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

/// Tunables for command/response correlation inside a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Per-exchange collection bound.
    pub timeout: Duration,
    /// Pause after the link opens.
    pub settle_delay: Duration,
    /// Upper bound on how long boot chatter is drained after opening.
    pub boot_grace: Duration,
    /// A lone `CTRL:` burst ends the exchange once this close to the deadline.
    pub ctrl_margin: Duration,
}

impl SessionConfig {
    /// Override how long boot chatter may be drained after opening.
    pub fn with_boot_grace(mut self, grace: Duration) -> Self {
        self.boot_grace = grace;
        self
    }

    /// Override how close to the deadline a lone `CTRL:` reply ends an exchange.
    pub fn with_ctrl_margin(mut self, margin: Duration) -> Self {
        self.ctrl_margin = margin;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            settle_delay: Duration::from_millis(100),
            boot_grace: Duration::from_secs(2),
            ctrl_margin: Duration::from_millis(100),
        }
    }
}

impl From<&LinkConfig> for SessionConfig {
    fn from(link: &LinkConfig) -> Self {
        Self {
            timeout: link.timeout,
            settle_delay: link.settle_delay,
            ..Self::default()
        }
    }
}

/// Parameters for one smoke-test run against a single channel.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Motor channel to exercise.
    pub channel: u8,
    /// Soft limit in steps used for the bounds excursion.
    pub limit: i32,
    /// How long a channel may take to report `STATE=IDLE`.
    pub idle_timeout: Duration,
    /// Delay between `STATUS` polls.
    pub poll_interval: Duration,
    /// Minimum spacing between progress log lines while polling.
    pub report_interval: Duration,
    /// Extra steps past the limit requested by the fault scenario.
    pub fault_overshoot: i32,
    /// Flows to run, in order.
    pub scenarios: Vec<Scenario>,
}

impl RunConfig {
    /// Target a different motor channel.
    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    /// Override the soft limit in steps; the bounds flow requires it to be positive.
    pub fn with_limit(mut self, limit: i32) -> Self {
        self.limit = limit;
        self
    }

    /// Override how long each flow waits for `STATE=IDLE`.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Override the pause between `STATUS` polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Override the minimum spacing between progress log lines.
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Restrict the run to a subset of flows. An empty list keeps the current selection.
    pub fn with_scenarios(mut self, scenarios: impl IntoIterator<Item = Scenario>) -> Self {
        let selected: Vec<_> = scenarios.into_iter().collect();
        if !selected.is_empty() {
            self.scenarios = selected;
        }
        self
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            limit: 1200,
            idle_timeout: Duration::from_secs(25),
            poll_interval: Duration::from_millis(200),
            report_interval: Duration::from_secs(2),
            fault_overshoot: 400,
            scenarios: Scenario::ALL.to_vec(),
        }
    }
}

/// Parse a non-negative, finite number of seconds such as `0.2` or `25`.
pub fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("`{value}` is not a number of seconds"))?;
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| format!("`{value}` must be a finite, non-negative number of seconds"))
}
