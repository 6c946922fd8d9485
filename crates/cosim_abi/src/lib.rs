//! Foreign-kernel invocation contract for the cosim bridge.
//!
//! An externally-compiled hardware-model kernel is opaque: the host never
//! links against its native interface or learns its object layout. What the
//! host *does* get is a narrow, fixed contract, materialized once per model
//! by the code that accompanies the compiled kernel:
//!
//! - [`KernelVTable`] — the four `unsafe extern "C"` entry points every
//!   kernel provides (allocate, evaluate one step, finalize, free).
//! - [`PortDecl`] — a statically-declared `(name, offset, width, direction)`
//!   entry for each signal the model exposes. Offsets are byte offsets into
//!   the kernel object and only become addresses once an instance exists.
//! - [`ModelDescriptor`] — the build-time constants of one bridge instance:
//!   model name, port table, designated clock, trace timescale and quantum,
//!   and the kernel release policy.
//!
//! This crate holds contract *types* only; lifecycle logic lives in
//! `cosim_bridge`.
//!
//! # Modules
//!
//! - `descriptor` — port declarations, timescale, the model descriptor
//! - `kernel` — the kernel vtable and release policy

#![warn(missing_docs)]

pub mod descriptor;
pub mod kernel;

pub use descriptor::{
    DescriptorError, ModelDescriptor, PortClass, PortDecl, PortDirection, TimeUnit, Timescale,
    DEFAULT_TRACE_QUANTUM,
};
pub use kernel::{KernelPtr, KernelVTable, ReleasePolicy};
