//! The port exposure table: raw addresses into kernel-owned memory.
//!
//! At handle construction, every declared signal is resolved to an address
//! inside the freshly-allocated kernel object: base pointer plus the
//! statically-declared offset. The table is populated once and never
//! resized; the handle publishes addresses into kernel memory but does not
//! own that memory.
//!
//! # Safety
//!
//! A [`Port`] is only reachable through a live `ModelHandle`, whose
//! invariant is that the kernel stays allocated for the handle's whole
//! lifetime, so [`Port::read`] and [`Port::write`] are sound in-process
//! accessors. [`Port::address`] escapes that discipline by design: it is the
//! zero-copy path for foreign hosts, and any use of the raw address beyond
//! the owning handle's lifetime is the host's responsibility. This is an
//! encapsulation boundary, not a memory-safety guarantee.

use std::ffi::c_void;
use std::ptr::NonNull;

use cosim_abi::{ModelDescriptor, PortClass, PortDecl, PortDirection};

/// One published signal: its declaration plus the resolved raw address.
#[derive(Debug)]
pub struct Port {
    decl: &'static PortDecl,
    addr: NonNull<u8>,
}

impl Port {
    /// Signal name.
    pub fn name(&self) -> &'static str {
        self.decl.name
    }

    /// Direction as seen from the host.
    pub fn direction(&self) -> PortDirection {
        self.decl.direction
    }

    /// Declared width in bits.
    pub fn width(&self) -> u32 {
        self.decl.width
    }

    /// Storage class every access to this port uses.
    pub fn class(&self) -> PortClass {
        self.decl.class()
    }

    /// The raw address of the signal's storage inside the kernel object.
    ///
    /// Hosts read and write this address directly at the declared storage
    /// class, once per signal, with no per-access calls into the bridge.
    pub fn address(&self) -> *mut u8 {
        self.addr.as_ptr()
    }

    /// Reads the current value at the port's address, zero-extended to u64.
    pub fn read(&self) -> u64 {
        let p = self.addr.as_ptr();
        unsafe {
            match self.decl.class() {
                PortClass::U8 => u64::from(*p),
                PortClass::U16 => u64::from(*p.cast::<u16>()),
                PortClass::U32 => u64::from(*p.cast::<u32>()),
                PortClass::U64 => *p.cast::<u64>(),
            }
        }
    }

    /// Writes a value at the port's address, truncated to the storage class.
    ///
    /// No width or direction validation happens here: the bridge is a
    /// transparent pass-through, and bits beyond the declared width are the
    /// host's responsibility.
    pub fn write(&self, value: u64) {
        let p = self.addr.as_ptr();
        unsafe {
            match self.decl.class() {
                PortClass::U8 => *p = value as u8,
                PortClass::U16 => *p.cast::<u16>() = value as u16,
                PortClass::U32 => *p.cast::<u32>() = value as u32,
                PortClass::U64 => *p.cast::<u64>() = value,
            }
        }
    }
}

/// The fixed, enumerable set of published ports of one handle.
#[derive(Debug)]
pub struct PortTable {
    ports: Vec<Port>,
}

impl PortTable {
    /// Resolves every declared port against a freshly-allocated kernel.
    ///
    /// Must run strictly after kernel allocation (offsets only become
    /// addresses once the object exists) and strictly before the handle is
    /// returned to the caller.
    pub(crate) fn wire(descriptor: &ModelDescriptor, kernel: NonNull<c_void>) -> Self {
        let base = kernel.cast::<u8>().as_ptr();
        let ports = descriptor
            .ports
            .iter()
            .map(|decl| Port {
                decl,
                // Base is non-null and offsets stay inside the kernel object
                // per the descriptor contract.
                addr: unsafe { NonNull::new_unchecked(base.add(decl.offset)) },
            })
            .collect();
        Self { ports }
    }

    /// Number of published ports.
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// True when no ports are published. Unreachable for a validated
    /// descriptor, kept for completeness.
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Looks up a port by name.
    pub fn get(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.decl.name == name)
    }

    /// Iterates the ports in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter()
    }

    /// Port at a declaration index.
    pub(crate) fn at(&self, index: usize) -> &Port {
        &self.ports[index]
    }

    /// Reads all port values in declaration order into `buf`.
    pub(crate) fn snapshot_into(&self, buf: &mut Vec<u64>) {
        buf.clear();
        buf.extend(self.ports.iter().map(Port::read));
    }
}
