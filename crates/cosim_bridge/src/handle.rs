//! Model handle: ownership and lifecycle of one running simulation instance.
//!
//! A [`ModelHandle`] exclusively owns one opaque kernel instance across the
//! language boundary, plus the trace sink when tracing is enabled. It is the
//! unit of lifecycle management: created by [`ModelHandle::create`], stepped
//! by [`ModelHandle::eval`], torn down by [`ModelHandle::destroy`]. Nothing
//! else frees the kernel, and the kernel pointer stays non-null for the
//! handle's entire lifetime.
//!
//! The handle is an encapsulation boundary, not a memory-safety guarantee:
//! the published port addresses point into foreign memory the bridge cannot
//! police. It is also neither `Send` nor `Sync`: the per-step protocol is
//! single-threaded, one calling thread per handle. Whether two
//! handles of the same model may coexist in one process depends on the
//! compiled kernel and must be established by the integrator.

use std::ffi::c_void;
use std::fs::File;
use std::io::BufWriter;
use std::mem;
use std::path::Path;
use std::ptr::NonNull;

use cosim_abi::{ModelDescriptor, ReleasePolicy};

use crate::error::BridgeError;
use crate::ports::{Port, PortTable};
use crate::trace::{TraceState, Tracing, WaveformSink};
use crate::vcd::VcdSink;

/// One running simulation instance: the owned kernel, the published port
/// table, and the tracing mode fixed at construction.
pub struct ModelHandle {
    descriptor: &'static ModelDescriptor,
    kernel: NonNull<c_void>,
    ports: PortTable,
    tracing: Tracing,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("descriptor", &self.descriptor)
            .field("kernel", &self.kernel)
            .field("ports", &self.ports)
            .finish_non_exhaustive()
    }
}

impl ModelHandle {
    /// Allocates the kernel, wires the port table, and, when `trace_path`
    /// is given, opens a VCD sink bound to the new kernel with the trace
    /// clock at zero.
    ///
    /// Construction is all-or-nothing: if the kernel cannot be allocated no
    /// file is touched, and if the sink cannot be opened the
    /// already-allocated kernel is finalized and released before the error
    /// is returned. No partially-initialized handle ever escapes.
    pub fn create(
        descriptor: &'static ModelDescriptor,
        trace_path: Option<&Path>,
    ) -> Result<Self, BridgeError> {
        descriptor.validate()?;
        let kernel = alloc_kernel(descriptor)?;
        let ports = PortTable::wire(descriptor, kernel);

        let tracing = match trace_path {
            None => Tracing::Disabled,
            Some(path) => {
                let sink: Box<dyn WaveformSink> = match File::create(path) {
                    Ok(file) => Box::new(VcdSink::new(BufWriter::new(file), descriptor)),
                    Err(err) => {
                        release_kernel(descriptor, kernel);
                        return Err(BridgeError::TraceIo(err));
                    }
                };
                match enable_tracing(descriptor, sink, &ports) {
                    Ok(tracing) => tracing,
                    Err(err) => {
                        release_kernel(descriptor, kernel);
                        return Err(err);
                    }
                }
            }
        };

        Ok(Self {
            descriptor,
            kernel,
            ports,
            tracing,
        })
    }

    /// Like [`ModelHandle::create`] with tracing enabled, but recording into
    /// a caller-supplied sink instead of a VCD file.
    pub fn create_with_sink(
        descriptor: &'static ModelDescriptor,
        sink: Box<dyn WaveformSink>,
    ) -> Result<Self, BridgeError> {
        descriptor.validate()?;
        let kernel = alloc_kernel(descriptor)?;
        let ports = PortTable::wire(descriptor, kernel);
        let tracing = match enable_tracing(descriptor, sink, &ports) {
            Ok(tracing) => tracing,
            Err(err) => {
                release_kernel(descriptor, kernel);
                return Err(err);
            }
        };
        Ok(Self {
            descriptor,
            kernel,
            ports,
            tracing,
        })
    }

    /// Advances the kernel by exactly one delta/time step.
    ///
    /// No batching, no retries, no notion of simulated wall-clock: the
    /// caller mutates port values beforehand and calls `eval` as often as
    /// the desired time granularity requires (e.g. once per half clock
    /// period). After return, every published address reflects post-step
    /// values. The kernel call itself is infallible by contract; the only
    /// error source is trace I/O when tracing is enabled.
    pub fn eval(&mut self) -> Result<(), BridgeError> {
        unsafe { (self.descriptor.kernel.eval)(self.kernel.as_ptr()) };
        self.tracing.after_eval(&self.ports)
    }

    /// Tears the instance down: the kernel's own finalization first (letting
    /// it flush kernel-internal pending state), then the trace sink, then
    /// the kernel allocation per [`ReleasePolicy`].
    ///
    /// Consuming `self` makes double-destroy unrepresentable in safe code.
    /// Handles dropped without an explicit `destroy` run the same teardown
    /// best-effort, discarding any sink error.
    pub fn destroy(mut self) -> Result<(), BridgeError> {
        let result = self.teardown();
        mem::forget(self);
        result
    }

    /// The descriptor this handle was created from.
    pub fn descriptor(&self) -> &'static ModelDescriptor {
        self.descriptor
    }

    /// The published port table.
    pub fn ports(&self) -> &PortTable {
        &self.ports
    }

    /// Looks up a published port by name.
    pub fn port(&self, name: &str) -> Result<&Port, BridgeError> {
        self.ports.get(name).ok_or_else(|| BridgeError::UnknownPort {
            name: name.to_owned(),
        })
    }

    /// Reads a port value, zero-extended to u64.
    pub fn read_port(&self, name: &str) -> Result<u64, BridgeError> {
        Ok(self.port(name)?.read())
    }

    /// Writes a port value, truncated to its storage class.
    ///
    /// The write goes straight into kernel memory, not into handle state,
    /// which is why `&self` suffices.
    pub fn write_port(&self, name: &str, value: u64) -> Result<(), BridgeError> {
        self.port(name)?.write(value);
        Ok(())
    }

    /// True when this handle records a waveform.
    pub fn is_tracing(&self) -> bool {
        self.tracing.trace_time().is_some()
    }

    /// Current trace timestamp, or `None` when tracing is disabled.
    pub fn trace_time(&self) -> Option<u64> {
        self.tracing.trace_time()
    }

    fn teardown(&mut self) -> Result<(), BridgeError> {
        unsafe { (self.descriptor.kernel.finalize)(self.kernel.as_ptr()) };
        let result = self.tracing.finish();
        if self.descriptor.release == ReleasePolicy::Free {
            unsafe { (self.descriptor.kernel.free)(self.kernel.as_ptr()) };
        }
        result
    }
}

impl Drop for ModelHandle {
    fn drop(&mut self) {
        let _ = self.teardown();
    }
}

/// Calls the kernel's `alloc` entry point; null becomes a construction error.
fn alloc_kernel(descriptor: &ModelDescriptor) -> Result<NonNull<c_void>, BridgeError> {
    let raw = unsafe { (descriptor.kernel.alloc)() };
    NonNull::new(raw).ok_or(BridgeError::KernelAlloc {
        model: descriptor.name,
    })
}

/// Finalizes and, policy permitting, frees a kernel that never made it into
/// a handle.
fn release_kernel(descriptor: &ModelDescriptor, kernel: NonNull<c_void>) {
    unsafe {
        (descriptor.kernel.finalize)(kernel.as_ptr());
        if descriptor.release == ReleasePolicy::Free {
            (descriptor.kernel.free)(kernel.as_ptr());
        }
    }
}

/// Resolves the designated clock and opens the sink with the baseline
/// snapshot.
fn enable_tracing(
    descriptor: &ModelDescriptor,
    sink: Box<dyn WaveformSink>,
    ports: &PortTable,
) -> Result<Tracing, BridgeError> {
    let clock = descriptor
        .port_index(descriptor.clock)
        .ok_or(BridgeError::ClockPortMissing {
            name: descriptor.clock,
        })?;
    let state = TraceState::open(sink, clock, descriptor.trace_quantum, ports)?;
    Ok(Tracing::Enabled(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosim_abi::{
        KernelPtr, KernelVTable, PortDecl, PortDirection, Timescale, DEFAULT_TRACE_QUANTUM,
    };
    use std::cell::RefCell;
    use std::mem::offset_of;
    use std::rc::Rc;

    #[repr(C)]
    struct NopKernel {
        clk: u8,
        data: u8,
    }

    unsafe extern "C" fn nop_alloc() -> KernelPtr {
        Box::into_raw(Box::new(NopKernel { clk: 0, data: 0 })) as KernelPtr
    }

    unsafe extern "C" fn nop_eval(_kernel: KernelPtr) {}

    unsafe extern "C" fn nop_finalize(_kernel: KernelPtr) {}

    unsafe extern "C" fn nop_free(kernel: KernelPtr) {
        drop(Box::from_raw(kernel as *mut NopKernel));
    }

    unsafe extern "C" fn failing_alloc() -> KernelPtr {
        std::ptr::null_mut()
    }

    static PORTS: [PortDecl; 2] = [
        PortDecl {
            name: "clk",
            direction: PortDirection::Input,
            width: 1,
            offset: offset_of!(NopKernel, clk),
        },
        PortDecl {
            name: "data",
            direction: PortDirection::Input,
            width: 8,
            offset: offset_of!(NopKernel, data),
        },
    ];

    static NOP_MODEL: ModelDescriptor = ModelDescriptor {
        name: "nop",
        ports: &PORTS,
        clock: "clk",
        timescale: Timescale::DEFAULT,
        trace_quantum: DEFAULT_TRACE_QUANTUM,
        kernel: KernelVTable {
            alloc: nop_alloc,
            eval: nop_eval,
            finalize: nop_finalize,
            free: nop_free,
        },
        release: ReleasePolicy::Free,
    };

    static NULL_ALLOC_MODEL: ModelDescriptor = ModelDescriptor {
        name: "null_alloc",
        ports: &PORTS,
        clock: "clk",
        timescale: Timescale::DEFAULT,
        trace_quantum: DEFAULT_TRACE_QUANTUM,
        kernel: KernelVTable {
            alloc: failing_alloc,
            eval: nop_eval,
            finalize: nop_finalize,
            free: nop_free,
        },
        release: ReleasePolicy::Free,
    };

    static BAD_MODEL: ModelDescriptor = ModelDescriptor {
        name: "bad",
        ports: &PORTS,
        clock: "clk",
        timescale: Timescale::DEFAULT,
        trace_quantum: 0,
        kernel: KernelVTable {
            alloc: nop_alloc,
            eval: nop_eval,
            finalize: nop_finalize,
            free: nop_free,
        },
        release: ReleasePolicy::Free,
    };

    struct CountingSink {
        log: Rc<RefCell<(usize, usize, usize)>>, // (opens, samples, finishes)
    }

    impl WaveformSink for CountingSink {
        fn open(&mut self, _values: &[u64]) -> Result<(), BridgeError> {
            self.log.borrow_mut().0 += 1;
            Ok(())
        }

        fn sample(&mut self, _time: u64, _values: &[u64]) -> Result<(), BridgeError> {
            self.log.borrow_mut().1 += 1;
            Ok(())
        }

        fn finish(&mut self) -> Result<(), BridgeError> {
            self.log.borrow_mut().2 += 1;
            Ok(())
        }
    }

    #[test]
    fn create_eval_destroy_without_tracing() {
        let mut handle = ModelHandle::create(&NOP_MODEL, None).unwrap();
        assert!(!handle.is_tracing());
        assert_eq!(handle.trace_time(), None);
        for _ in 0..3 {
            handle.eval().unwrap();
        }
        handle.destroy().unwrap();
    }

    #[test]
    fn invalid_descriptor_rejected_before_allocation() {
        let err = ModelHandle::create(&BAD_MODEL, None).unwrap_err();
        assert!(matches!(err, BridgeError::Descriptor(_)));
    }

    #[test]
    fn null_alloc_reported() {
        let err = ModelHandle::create(&NULL_ALLOC_MODEL, None).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::KernelAlloc { model: "null_alloc" }
        ));
    }

    #[test]
    fn port_access_through_handle() {
        let handle = ModelHandle::create(&NOP_MODEL, None).unwrap();
        handle.write_port("data", 0x42).unwrap();
        assert_eq!(handle.read_port("data").unwrap(), 0x42);
        assert_eq!(handle.ports().len(), 2);
        assert!(matches!(
            handle.read_port("missing"),
            Err(BridgeError::UnknownPort { .. })
        ));
        handle.destroy().unwrap();
    }

    #[test]
    fn custom_sink_sees_baseline_and_samples() {
        let log = Rc::new(RefCell::new((0, 0, 0)));
        let sink = Box::new(CountingSink { log: log.clone() });
        let mut handle = ModelHandle::create_with_sink(&NOP_MODEL, sink).unwrap();
        assert!(handle.is_tracing());
        handle.eval().unwrap();
        handle.eval().unwrap();
        handle.destroy().unwrap();
        assert_eq!(*log.borrow(), (1, 2, 1));
    }

    #[test]
    fn drop_runs_teardown() {
        let log = Rc::new(RefCell::new((0, 0, 0)));
        let sink = Box::new(CountingSink { log: log.clone() });
        {
            let _handle = ModelHandle::create_with_sink(&NOP_MODEL, sink).unwrap();
        }
        assert_eq!(log.borrow().2, 1);
    }
}
