//! Per-step simulation driver over an opaque hardware-model kernel.
//!
//! This crate bridges an externally-compiled evaluation kernel to a host
//! process through a narrow, stable boundary: the host writes stimulus
//! directly to published port addresses, triggers one evaluation step at a
//! time, and reads results back from the same addresses, without linking
//! against the kernel's native interface or knowing its object layout.
//!
//! # Architecture
//!
//! A [`ModelHandle`] owns exactly one kernel instance, created from a
//! statically-declared `cosim_abi::ModelDescriptor`. At construction the
//! descriptor's `(name, offset, width)` port declarations are resolved to
//! raw addresses inside the freshly-allocated kernel and published as the
//! fixed [`PortTable`]. When a trace path is supplied, a [`VcdSink`] is
//! opened against the same kernel and the trace controller derives
//! timestamps from edge detection on the model's designated clock port:
//! any observed transition advances the trace time by one quantum, and every
//! step's snapshot is flushed to disk immediately.
//!
//! # Usage
//!
//! ```ignore
//! use cosim_bridge::ModelHandle;
//!
//! let mut dut = ModelHandle::create(&COUNTER, Some("counter.vcd".as_ref()))?;
//! for step in 0..100 {
//!     dut.write_port("clk", u64::from(step % 2 == 0))?;
//!     dut.eval()?;
//! }
//! dut.destroy()?;
//! ```
//!
//! # Modules
//!
//! - `error` — bridge error types
//! - `ports` — the port exposure table over kernel-owned memory
//! - `handle` — model-handle lifecycle and the evaluation step
//! - `trace` — clock-edge timestamp derivation and the sink trait
//! - `vcd` — VCD waveform sink (IEEE 1364)

#![warn(missing_docs)]

pub mod error;
pub mod handle;
pub mod ports;
pub mod trace;
pub mod vcd;

pub use error::BridgeError;
pub use handle::ModelHandle;
pub use ports::{Port, PortTable};
pub use trace::WaveformSink;
pub use vcd::VcdSink;
