//! Invocation contract of an externally-compiled model kernel.
//!
//! A kernel is an opaque, non-relocatable simulation object. The bridge
//! holds it only through a raw pointer and drives it exclusively through the
//! entry points collected in [`KernelVTable`].

use std::ffi::c_void;

use serde::{Deserialize, Serialize};

/// Raw pointer to an opaque kernel instance.
pub type KernelPtr = *mut c_void;

/// The fixed entry points of one compiled kernel.
///
/// A per-model bridge materializes this table once, alongside the port
/// declarations, and never changes it afterward. The bridge calls `alloc`
/// exactly once per handle, `eval` once per step, and `finalize` followed by
/// (policy permitting) `free` exactly once at teardown.
///
/// # Safety
///
/// The table is only as good as the kernel behind it. Callers must uphold:
///
/// - `alloc` returns either a pointer to a fully-constructed kernel instance
///   or null on allocation failure; nothing else.
/// - `eval`, `finalize`, and `free` are only ever passed a non-null pointer
///   previously returned by this table's `alloc`.
/// - `finalize` is called at most once per instance, and `free` only after
///   `finalize`.
/// - No entry point is invoked concurrently for the same instance; the
///   per-step protocol is single-threaded, call-and-return.
///
/// Whether two kernel instances may coexist in one process is a property of
/// the compiled kernel, not of this contract, and must be established by the
/// integrator.
#[derive(Clone, Copy, Debug)]
pub struct KernelVTable {
    /// Constructs a kernel instance. Null signals allocation failure.
    pub alloc: unsafe extern "C" fn() -> KernelPtr,
    /// Advances the instance by one delta/time step. Infallible under
    /// well-formed input; the kernel is trusted to be correct.
    pub eval: unsafe extern "C" fn(KernelPtr),
    /// The kernel's own finalization: flushes kernel-internal pending state
    /// (e.g. buffered writes) so the instance is quiescent before release.
    pub finalize: unsafe extern "C" fn(KernelPtr),
    /// Deallocates the instance. Skipped under [`ReleasePolicy::LeakToExit`].
    pub free: unsafe extern "C" fn(KernelPtr),
}

/// What teardown does with the kernel allocation after finalization.
///
/// The default is proper release. Some embedding runtimes have proven
/// unstable when kernel memory is reclaimed before process exit; integrating
/// with such a host is the one reason to pick [`ReleasePolicy::LeakToExit`],
/// under which teardown still finalizes the kernel and closes the trace sink
/// but leaves the allocation for process-exit reclamation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleasePolicy {
    /// Call the kernel's `free` entry point after finalization.
    #[default]
    Free,
    /// Leave the kernel allocation to be reclaimed at process exit.
    LeakToExit,
}
