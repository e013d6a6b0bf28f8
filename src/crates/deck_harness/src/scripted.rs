use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::clock::ManualClock;
use crate::error::{HarnessError, HarnessResult};
use crate::link::{LineBuffer, Link};

/// Simulated cost of delivering one buffered line.
const LINE_LATENCY: Duration = Duration::from_millis(1);

/// In-memory link that answers commands from a script instead of hardware.
///
/// Each command maps to a queue of reply bursts. A write pops the next burst
/// into the receive buffer; once a queue is down to its last burst, that burst
/// is repeated for every later write of the same command. Commands with no
/// script get no reply. Time is charged against a shared [`ManualClock`].
#[derive(Debug, Clone)]
pub struct ScriptedLink {
    clock: ManualClock,
    state: Arc<Mutex<ScriptState>>,
}

#[derive(Debug, Default)]
struct ScriptState {
    open: bool,
    fail_open: Option<String>,
    open_calls: usize,
    close_calls: usize,
    boot: Vec<Vec<u8>>,
    replies: HashMap<String, VecDeque<Vec<Vec<u8>>>>,
    inbound: LineBuffer,
    written: Vec<String>,
}

impl ScriptedLink {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            state: Arc::new(Mutex::new(ScriptState::default())),
        }
    }

    /// Line emitted unprompted right after `open`.
    pub fn with_boot_line(self, line: impl AsRef<str>) -> Self {
        self.lock().boot.push(terminated(line.as_ref()));
        self
    }

    /// Queue one reply burst for an exact command string (e.g. `"STATUS:0"`).
    pub fn on<I, S>(self, command: impl Into<String>, burst: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines = burst
            .into_iter()
            .map(|line| terminated(line.as_ref()))
            .collect();
        self.on_raw(command, lines)
    }

    /// Queue a reply burst of raw byte chunks; chunks need not end on a line boundary.
    pub fn on_raw(self, command: impl Into<String>, chunks: Vec<Vec<u8>>) -> Self {
        self.lock()
            .replies
            .entry(command.into())
            .or_default()
            .push_back(chunks);
        self
    }

    /// Make every `open` fail with a connection error.
    pub fn failing_open(self, reason: impl Into<String>) -> Self {
        self.lock().fail_open = Some(reason.into());
        self
    }

    /// Inspection handle that stays valid after the link moves into a session.
    pub fn handle(&self) -> ScriptHandle {
        ScriptHandle {
            state: self.state.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        lock_state(&self.state)
    }
}

impl Link for ScriptedLink {
    fn open(&mut self) -> HarnessResult<()> {
        let mut state = self.lock();
        state.open_calls += 1;
        if state.open {
            return Ok(());
        }
        if let Some(reason) = &state.fail_open {
            return Err(HarnessError::connection("scripted", reason));
        }
        state.open = true;
        state.inbound.clear();
        let boot = state.boot.clone();
        for line in boot {
            state.inbound.extend(&line);
        }
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.lock();
        state.close_calls += 1;
        state.open = false;
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn write(&mut self, bytes: &[u8]) -> HarnessResult<()> {
        let mut state = self.lock();
        if !state.open {
            return Err(HarnessError::NotOpen);
        }
        let command = String::from_utf8_lossy(bytes).trim().to_string();
        let burst = match state.replies.get_mut(&command) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        for chunk in burst.unwrap_or_default() {
            state.inbound.extend(&chunk);
        }
        state.written.push(command);
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> HarnessResult<Option<Vec<u8>>> {
        let line = {
            let mut state = self.lock();
            if !state.open {
                return Err(HarnessError::NotOpen);
            }
            state.inbound.next_line()
        };
        match line {
            Some(line) => {
                self.clock.advance(LINE_LATENCY.min(timeout));
                Ok(Some(line))
            }
            None => {
                self.clock.advance(timeout);
                Ok(None)
            }
        }
    }
}

/// Read-only view of what a [`ScriptedLink`] has seen.
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptHandle {
    /// Commands written so far, trimmed, in order.
    pub fn written(&self) -> Vec<String> {
        lock_state(&self.state).written.clone()
    }

    pub fn open_calls(&self) -> usize {
        lock_state(&self.state).open_calls
    }

    pub fn close_calls(&self) -> usize {
        lock_state(&self.state).close_calls
    }

    pub fn is_open(&self) -> bool {
        lock_state(&self.state).open
    }
}

fn lock_state(state: &Mutex<ScriptState>) -> MutexGuard<'_, ScriptState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn terminated(line: &str) -> Vec<u8> {
    let mut bytes = line.as_bytes().to_vec();
    bytes.extend_from_slice(b"\r\n");
    bytes
}
