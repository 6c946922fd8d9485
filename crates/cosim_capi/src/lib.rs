//! C-callable boundary for one materialized model bridge.
//!
//! A host in any language drives a model through four entry points:
//! `create_model`, `destroy_model`, `eval`, and a one-time `model_port`
//! address lookup per signal. Everything model-shaped (name, port table,
//! clock, timescale) is fixed at build time in the `ModelDescriptor` the
//! bridge is exported with, so the boundary itself stays narrow and stable.
//!
//! A per-model bridge crate declares its descriptor as a static and exports
//! the boundary once:
//!
//! ```ignore
//! use cosim_abi::ModelDescriptor;
//!
//! static COUNTER: ModelDescriptor = ModelDescriptor { /* generated */ };
//!
//! cosim_capi::export_model!(COUNTER);
//! ```
//!
//! Port access is zero-copy: the host calls `model_port` once per signal at
//! setup time, caches the returned raw address, and reads/writes it directly
//! at the declared width on every step. No per-signal calls cross the
//! boundary inside the simulation loop.
//!
//! Misuse that the C type system cannot prevent (null or stale handles) is
//! detected where feasible and reported to stderr rather than left fully
//! undefined; construction failures are reported synchronously at the
//! `create_model` call site by returning null.

#![warn(missing_docs)]

use std::ffi::{c_char, CStr};
use std::path::PathBuf;
use std::ptr;

use cosim_abi::ModelDescriptor;
use cosim_bridge::ModelHandle;

/// Opaque simulation instance handed across the C boundary.
///
/// Hosts treat this as an opaque pointer: beyond the published port
/// addresses, its only uses are as the first argument to the exported
/// entry points.
pub struct CosimModel {
    handle: ModelHandle,
}

/// Backing implementation of the exported `create_model`.
///
/// A null `trace_path` disables tracing; a non-null path names the waveform
/// file. On construction failure the error is reported to stderr and null
/// is returned; no partially-initialized instance escapes.
///
/// # Safety
///
/// `trace_path` must be null or a NUL-terminated string valid for the
/// duration of the call.
pub unsafe fn create_model_impl(
    descriptor: &'static ModelDescriptor,
    trace_path: *const c_char,
) -> *mut CosimModel {
    let path = if trace_path.is_null() {
        None
    } else {
        match CStr::from_ptr(trace_path).to_str() {
            Ok(s) => Some(PathBuf::from(s)),
            Err(_) => {
                eprintln!(
                    "cosim: trace path for model `{}` is not valid UTF-8",
                    descriptor.name
                );
                return ptr::null_mut();
            }
        }
    };
    match ModelHandle::create(descriptor, path.as_deref()) {
        Ok(handle) => Box::into_raw(Box::new(CosimModel { handle })),
        Err(err) => {
            eprintln!("cosim: failed to create model `{}`: {err}", descriptor.name);
            ptr::null_mut()
        }
    }
}

/// Backing implementation of the exported `destroy_model`.
///
/// Finalizes the kernel, closes the trace sink, and releases the instance.
/// Null handles are detected and reported; exactly one destroy per handle
/// is valid, and the caller must not use the pointer afterwards.
///
/// # Safety
///
/// `model` must be null or a pointer previously returned by `create_model`
/// that has not been destroyed yet.
pub unsafe fn destroy_model_impl(model: *mut CosimModel) {
    if model.is_null() {
        eprintln!("cosim: destroy_model called with a null handle");
        return;
    }
    let model = Box::from_raw(model);
    if let Err(err) = model.handle.destroy() {
        eprintln!("cosim: error while destroying model: {err}");
    }
}

/// Backing implementation of the exported `eval`.
///
/// Advances the model by one step. The step itself cannot fail; a trace
/// I/O error is reported to stderr to keep the void-return contract.
///
/// # Safety
///
/// `model` must be null or a live pointer from `create_model`.
pub unsafe fn eval_impl(model: *mut CosimModel) {
    let Some(model) = model.as_mut() else {
        eprintln!("cosim: eval called with a null handle");
        return;
    };
    if let Err(err) = model.handle.eval() {
        eprintln!("cosim: trace error during eval: {err}");
    }
}

/// Backing implementation of the exported `model_port`.
///
/// Resolves a signal name to its raw address inside the kernel, or null for
/// unknown names. The address stays valid until the handle is destroyed.
///
/// # Safety
///
/// `model` must be null or a live pointer from `create_model`; `name` must
/// be null or a NUL-terminated string valid for the duration of the call.
pub unsafe fn model_port_impl(model: *const CosimModel, name: *const c_char) -> *mut u8 {
    let Some(model) = model.as_ref() else {
        return ptr::null_mut();
    };
    if name.is_null() {
        return ptr::null_mut();
    }
    let Ok(name) = CStr::from_ptr(name).to_str() else {
        return ptr::null_mut();
    };
    match model.handle.ports().get(name) {
        Some(port) => port.address(),
        None => ptr::null_mut(),
    }
}

/// Backing implementation of the exported `model_port_width`.
///
/// Declared width of a signal in bits, or 0 for unknown names.
///
/// # Safety
///
/// Same contract as [`model_port_impl`].
pub unsafe fn model_port_width_impl(model: *const CosimModel, name: *const c_char) -> u32 {
    let Some(model) = model.as_ref() else {
        return 0;
    };
    if name.is_null() {
        return 0;
    }
    let Ok(name) = CStr::from_ptr(name).to_str() else {
        return 0;
    };
    model
        .handle
        .ports()
        .get(name)
        .map(|port| port.width())
        .unwrap_or(0)
}

/// Exports the C boundary for one model descriptor.
///
/// Expands to the five `extern "C"` entry points a host links against:
/// `create_model`, `destroy_model`, `eval`, `model_port`, and
/// `model_port_width`. Use exactly once per bridge crate: the symbol names
/// are fixed, one exported model per compiled bridge.
#[macro_export]
macro_rules! export_model {
    ($descriptor:expr) => {
        /// Creates a simulation instance of the exported model.
        ///
        /// A null `trace_path` disables tracing. Returns null on
        /// construction failure, reported synchronously to stderr.
        #[no_mangle]
        pub unsafe extern "C" fn create_model(
            trace_path: *const ::std::ffi::c_char,
        ) -> *mut $crate::CosimModel {
            $crate::create_model_impl(&$descriptor, trace_path)
        }

        /// Finalizes the kernel, closes the trace file if any, and releases
        /// the instance. Exactly one call per handle is valid.
        #[no_mangle]
        pub unsafe extern "C" fn destroy_model(model: *mut $crate::CosimModel) {
            $crate::destroy_model_impl(model)
        }

        /// Advances the model by one delta/time step.
        #[no_mangle]
        pub unsafe extern "C" fn eval(model: *mut $crate::CosimModel) {
            $crate::eval_impl(model)
        }

        /// Resolves a signal name to the raw address the host reads and
        /// writes directly at the declared width. Null for unknown names.
        #[no_mangle]
        pub unsafe extern "C" fn model_port(
            model: *const $crate::CosimModel,
            name: *const ::std::ffi::c_char,
        ) -> *mut u8 {
            $crate::model_port_impl(model, name)
        }

        /// Declared width of a signal in bits; 0 for unknown names.
        #[no_mangle]
        pub unsafe extern "C" fn model_port_width(
            model: *const $crate::CosimModel,
            name: *const ::std::ffi::c_char,
        ) -> u32 {
            $crate::model_port_width_impl(model, name)
        }
    };
}
