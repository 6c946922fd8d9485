//! Static per-model configuration of a bridge instance.
//!
//! Model name, port shape, clock designation, and trace timing are fixed at
//! build time of a bridge instance (the port table's shape depends on them),
//! so they live in a statically-declared [`ModelDescriptor`] rather than in
//! any runtime configuration surface.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kernel::{KernelVTable, ReleasePolicy};

/// Default trace-timestamp increment per detected clock edge, in sink time
/// units: one half clock period.
pub const DEFAULT_TRACE_QUANTUM: u64 = 50;

/// Direction of a model signal, as seen from the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Driven by the host, read by the model.
    Input,
    /// Driven by the model, read by the host.
    Output,
    /// Driven by both sides.
    InOut,
}

/// Storage class of a port: the integer width the kernel lays the signal
/// out as, and therefore the width of every host access to its address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortClass {
    /// Signals of 1 to 8 bits, stored as `u8`.
    U8,
    /// Signals of 9 to 16 bits, stored as `u16`.
    U16,
    /// Signals of 17 to 32 bits, stored as `u32`.
    U32,
    /// Signals of 33 to 64 bits, stored as `u64`.
    U64,
}

impl PortClass {
    /// Returns the storage class for a signal width in bits, or `None` for
    /// widths outside 1..=64.
    pub const fn for_width(bits: u32) -> Option<PortClass> {
        match bits {
            1..=8 => Some(PortClass::U8),
            9..=16 => Some(PortClass::U16),
            17..=32 => Some(PortClass::U32),
            33..=64 => Some(PortClass::U64),
            _ => None,
        }
    }

    /// Size of the storage class in bytes. Equals its alignment.
    pub const fn size(self) -> usize {
        match self {
            PortClass::U8 => 1,
            PortClass::U16 => 2,
            PortClass::U32 => 4,
            PortClass::U64 => 8,
        }
    }
}

/// One statically-declared model signal.
///
/// `offset` is the byte offset of the signal's storage inside the kernel
/// object; it becomes an address only once a kernel instance exists. The
/// declaration carries no runtime state and is shared by every handle of the
/// same model.
#[derive(Clone, Copy, Debug)]
pub struct PortDecl {
    /// Signal name, unique within the model.
    pub name: &'static str,
    /// Direction as seen from the host.
    pub direction: PortDirection,
    /// Signal width in bits, 1..=64.
    pub width: u32,
    /// Byte offset of the signal's storage inside the kernel object.
    pub offset: usize,
}

impl PortDecl {
    /// Storage class implied by the declared width.
    ///
    /// Assumes a declaration that passed [`ModelDescriptor::validate`];
    /// out-of-range widths are rejected there.
    pub const fn class(&self) -> PortClass {
        match self.width {
            0..=8 => PortClass::U8,
            9..=16 => PortClass::U16,
            17..=32 => PortClass::U32,
            _ => PortClass::U64,
        }
    }
}

/// Unit of waveform timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    /// Femtoseconds.
    Fs,
    /// Picoseconds.
    Ps,
    /// Nanoseconds.
    Ns,
    /// Microseconds.
    Us,
    /// Milliseconds.
    Ms,
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeUnit::Fs => "fs",
            TimeUnit::Ps => "ps",
            TimeUnit::Ns => "ns",
            TimeUnit::Us => "us",
            TimeUnit::Ms => "ms",
        };
        f.write_str(s)
    }
}

/// Waveform time resolution: a magnitude of 1, 10, or 100 times a unit,
/// e.g. `10ps`. One trace time unit equals one `Timescale`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timescale {
    /// Magnitude: 1, 10, or 100.
    pub magnitude: u32,
    /// Time unit the magnitude scales.
    pub unit: TimeUnit,
}

impl Timescale {
    /// The default resolution, `10ps`.
    pub const DEFAULT: Timescale = Timescale::new(10, TimeUnit::Ps);

    /// Creates a timescale. Magnitude is checked by
    /// [`ModelDescriptor::validate`], not here.
    pub const fn new(magnitude: u32, unit: TimeUnit) -> Self {
        Self { magnitude, unit }
    }

    /// True for the magnitudes the VCD format admits: 1, 10, 100.
    pub const fn is_canonical(&self) -> bool {
        matches!(self.magnitude, 1 | 10 | 100)
    }
}

impl fmt::Display for Timescale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.magnitude, self.unit)
    }
}

/// Structural defects in a model descriptor.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// The model name is empty.
    #[error("model name is empty")]
    EmptyName,

    /// The port table is empty.
    #[error("model `{model}` declares no ports")]
    NoPorts {
        /// The model name.
        model: &'static str,
    },

    /// A declared width is outside 1..=64.
    #[error("port `{port}` has unsupported width {width}")]
    InvalidWidth {
        /// The offending port name.
        port: &'static str,
        /// The declared width in bits.
        width: u32,
    },

    /// A declared offset is not aligned to the port's storage class.
    #[error("port `{port}` offset {offset} is not aligned to its storage class")]
    MisalignedOffset {
        /// The offending port name.
        port: &'static str,
        /// The declared byte offset.
        offset: usize,
    },

    /// Two declarations share a name.
    #[error("port `{name}` is declared more than once")]
    DuplicatePort {
        /// The duplicated name.
        name: &'static str,
    },

    /// The designated clock is not in the port table.
    #[error("clock port `{name}` is not declared")]
    ClockNotDeclared {
        /// The designated clock name.
        name: &'static str,
    },

    /// The trace quantum is zero.
    #[error("trace quantum must be non-zero")]
    ZeroQuantum,

    /// The timescale magnitude is not 1, 10, or 100.
    #[error("timescale magnitude {magnitude} is not 1, 10, or 100")]
    BadTimescale {
        /// The offending magnitude.
        magnitude: u32,
    },
}

/// The build-time constants of one bridge instance.
///
/// A per-model bridge declares exactly one descriptor as a static and hands
/// it to every handle it creates. Descriptors are plain data; creating or
/// destroying one touches no kernel.
#[derive(Clone, Copy, Debug)]
pub struct ModelDescriptor {
    /// Model name; also the waveform scope name.
    pub name: &'static str,
    /// The fixed port table, one entry per exposed signal.
    pub ports: &'static [PortDecl],
    /// Name of the designated clock port for trace timing.
    pub clock: &'static str,
    /// Waveform time resolution.
    pub timescale: Timescale,
    /// Trace-timestamp increment per detected clock edge.
    pub trace_quantum: u64,
    /// The kernel's invocation contract.
    pub kernel: KernelVTable,
    /// What teardown does with the kernel allocation.
    pub release: ReleasePolicy,
}

impl ModelDescriptor {
    /// Checks the descriptor's structural invariants.
    ///
    /// Performed once at handle creation; a descriptor that passes never
    /// fails later operations for structural reasons.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.name.is_empty() {
            return Err(DescriptorError::EmptyName);
        }
        if self.ports.is_empty() {
            return Err(DescriptorError::NoPorts { model: self.name });
        }
        for (i, decl) in self.ports.iter().enumerate() {
            let class = match PortClass::for_width(decl.width) {
                Some(class) => class,
                None => {
                    return Err(DescriptorError::InvalidWidth {
                        port: decl.name,
                        width: decl.width,
                    })
                }
            };
            if decl.offset % class.size() != 0 {
                return Err(DescriptorError::MisalignedOffset {
                    port: decl.name,
                    offset: decl.offset,
                });
            }
            if self.ports[..i].iter().any(|d| d.name == decl.name) {
                return Err(DescriptorError::DuplicatePort { name: decl.name });
            }
        }
        if self.port(self.clock).is_none() {
            return Err(DescriptorError::ClockNotDeclared { name: self.clock });
        }
        if self.trace_quantum == 0 {
            return Err(DescriptorError::ZeroQuantum);
        }
        if !self.timescale.is_canonical() {
            return Err(DescriptorError::BadTimescale {
                magnitude: self.timescale.magnitude,
            });
        }
        Ok(())
    }

    /// Looks up a port declaration by name.
    pub fn port(&self, name: &str) -> Option<&'static PortDecl> {
        self.ports.iter().find(|d| d.name == name)
    }

    /// Index of a port in the declared table.
    pub fn port_index(&self, name: &str) -> Option<usize> {
        self.ports.iter().position(|d| d.name == name)
    }
}
