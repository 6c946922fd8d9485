//! Trace controller: waveform timestamps derived from clock-edge detection.
//!
//! The controller has exactly two states, selected once at handle
//! construction and immutable afterward: disabled (every hook is a no-op)
//! and enabled. In the enabled state, after each evaluation step the
//! designated clock port is compared against its previously observed value;
//! any transition, rising or falling alike, advances the timestamp by one
//! quantum (one half clock period in
//! sink time units). The full signal snapshot is then recorded at the
//! current timestamp and flushed immediately, so a crash mid-run leaves the
//! trace usable up to the last completed step.
//!
//! Edge detection only sees what evaluation exposes: if the host steps the
//! model less often than the clock toggles, the missed edges are silently
//! dropped. That is an accepted timing-resolution limit of the protocol, and
//! it is deterministic under a fixed call cadence.

use crate::error::BridgeError;
use crate::ports::PortTable;

/// Destination for timestamped signal snapshots.
///
/// The seam between trace timing and output format: the controller decides
/// *when* a snapshot is taken and at what timestamp, the sink decides how it
/// is encoded and stored. Implementations must flush durably on every
/// [`WaveformSink::sample`] call.
pub trait WaveformSink {
    /// Writes any header material plus the baseline snapshot at time zero.
    ///
    /// Called exactly once, before the first `sample`, with the port values
    /// observed immediately after kernel allocation, in declaration order.
    fn open(&mut self, values: &[u64]) -> Result<(), BridgeError>;

    /// Records a full snapshot at `time` and flushes it to the backing
    /// store. `time` is non-decreasing across calls.
    fn sample(&mut self, time: u64, values: &[u64]) -> Result<(), BridgeError>;

    /// Writes any trailer and flushes remaining buffered output.
    fn finish(&mut self) -> Result<(), BridgeError>;
}

/// Per-handle trace state: the sink plus the clock-edge timing counters.
pub(crate) struct TraceState {
    sink: Box<dyn WaveformSink>,
    /// Declaration index of the designated clock port.
    clock: usize,
    /// Timestamp increment per detected clock transition.
    quantum: u64,
    /// Monotonically non-decreasing trace timestamp.
    trace_time: u64,
    /// Clock value observed after the previous step; starts at 0.
    prev_clock: u64,
    /// Reused snapshot buffer, one slot per port.
    snapshot: Vec<u64>,
}

impl TraceState {
    /// Opens the sink with the baseline snapshot and zeroed timing state.
    pub(crate) fn open(
        mut sink: Box<dyn WaveformSink>,
        clock: usize,
        quantum: u64,
        ports: &PortTable,
    ) -> Result<Self, BridgeError> {
        let mut snapshot = Vec::with_capacity(ports.len());
        ports.snapshot_into(&mut snapshot);
        sink.open(&snapshot)?;
        Ok(Self {
            sink,
            clock,
            quantum,
            trace_time: 0,
            prev_clock: 0,
            snapshot,
        })
    }

    /// Runs the post-evaluation trace step: edge detection, timestamp
    /// advance, snapshot, durable flush.
    pub(crate) fn after_eval(&mut self, ports: &PortTable) -> Result<(), BridgeError> {
        let clock = ports.at(self.clock).read();
        if clock != self.prev_clock {
            self.trace_time += self.quantum;
        }
        self.prev_clock = clock;
        ports.snapshot_into(&mut self.snapshot);
        self.sink.sample(self.trace_time, &self.snapshot)
    }

    /// Current trace timestamp.
    pub(crate) fn trace_time(&self) -> u64 {
        self.trace_time
    }

    /// Closes out the sink.
    pub(crate) fn finish(&mut self) -> Result<(), BridgeError> {
        self.sink.finish()
    }
}

/// The handle's tracing mode, fixed at construction.
pub(crate) enum Tracing {
    /// No sink, no timing state; every hook is a no-op.
    Disabled,
    /// Sink plus timing state.
    Enabled(TraceState),
}

impl Tracing {
    /// Post-evaluation hook.
    pub(crate) fn after_eval(&mut self, ports: &PortTable) -> Result<(), BridgeError> {
        match self {
            Tracing::Disabled => Ok(()),
            Tracing::Enabled(state) => state.after_eval(ports),
        }
    }

    /// Current trace timestamp, if tracing is enabled.
    pub(crate) fn trace_time(&self) -> Option<u64> {
        match self {
            Tracing::Disabled => None,
            Tracing::Enabled(state) => Some(state.trace_time()),
        }
    }

    /// Teardown hook.
    pub(crate) fn finish(&mut self) -> Result<(), BridgeError> {
        match self {
            Tracing::Disabled => Ok(()),
            Tracing::Enabled(state) => state.finish(),
        }
    }
}
