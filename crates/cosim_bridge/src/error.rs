//! Bridge error types.
//!
//! The taxonomy is deliberately small: the bridge is a transparent
//! pass-through, so the only failures it owns are construction failures and
//! trace I/O. Kernel-internal faults are out of scope; the wrapped kernel
//! is trusted to be correct for well-formed input.

use std::io;

use cosim_abi::DescriptorError;

/// Errors raised by handle construction, port lookup, or trace output.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The model descriptor failed structural validation.
    #[error("invalid model descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    /// The kernel's `alloc` entry point returned null.
    #[error("kernel allocation failed for model `{model}`")]
    KernelAlloc {
        /// The model name.
        model: &'static str,
    },

    /// The designated clock port is missing from the wired port table.
    #[error("clock port `{name}` is not in the port table")]
    ClockPortMissing {
        /// The designated clock name.
        name: &'static str,
    },

    /// A port name lookup found no declaration.
    #[error("unknown port `{name}`")]
    UnknownPort {
        /// The name that failed to resolve.
        name: String,
    },

    /// An I/O error occurred while opening or writing the trace sink.
    #[error("trace I/O error: {0}")]
    TraceIo(#[from] io::Error),
}
