//! OptiX device context handling and diagnostics.

use std::ffi::{c_void, CStr};
use std::mem::MaybeUninit;
use std::os::raw::{c_char, c_uint};
use std::ptr;

use crate::error::Error;
use crate::{optix_call, sys};

type Result<T, E = Error> = std::result::Result<T, E>;

/// Callback level registered with the context. The vendor defines the levels
/// as: 0 disables the callback, 1 fatal, 2 error, 3 warning, 4 status/progress.
pub const LOG_CALLBACK_LEVEL: u32 = 4;

/// Messages strictly below this level (numerically lower = more severe) are
/// forwarded to stderr by the default callback; level-4 progress chatter is
/// dropped.
const STDERR_FORWARD_BELOW: u32 = 4;

/// Owns one OptiX device context on the current CUDA device.
#[derive(Debug)]
#[repr(transparent)]
pub struct DeviceContext {
    pub(crate) raw: sys::OptixDeviceContext,
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            sys::optixDeviceContextDestroy(self.raw);
        }
    }
}

impl DeviceContext {
    /// Creates a context on the current CUDA context with the stderr
    /// diagnostic callback installed at [`LOG_CALLBACK_LEVEL`].
    pub fn new() -> Result<Self> {
        let options = sys::OptixDeviceContextOptions {
            logCallbackFunction: Some(stderr_log_callback),
            logCallbackData: ptr::null_mut(),
            logCallbackLevel: LOG_CALLBACK_LEVEL as i32,
            validationMode:
                sys::OptixDeviceContextValidationMode::OPTIX_DEVICE_CONTEXT_VALIDATION_MODE_OFF,
        };
        let mut raw = MaybeUninit::uninit();
        unsafe {
            // null means take the current CUDA context
            optix_call!(optixDeviceContextCreate(
                ptr::null_mut(),
                &options as *const _,
                raw.as_mut_ptr()
            ))?;
            Ok(Self {
                raw: raw.assume_init(),
            })
        }
    }

    pub fn as_raw(&self) -> sys::OptixDeviceContext {
        self.raw
    }

    /// Replaces the diagnostic callback with an arbitrary closure.
    ///
    /// The closure receives the severity level, the category tag, and the
    /// message text. Levels at or above `level` are filtered out by the
    /// library before the closure is invoked.
    pub fn set_log_callback<F>(&mut self, cb: F, level: u32) -> Result<()>
    where
        F: FnMut(u32, &str, &str) + 'static,
    {
        let (closure, trampoline) = unsafe { unpack_closure(cb) };
        unsafe {
            Ok(optix_call!(optixDeviceContextSetLogCallback(
                self.raw,
                Some(trampoline),
                closure,
                level
            ))?)
        }
    }
}

/// Renders one diagnostic line in the wrapper's fixed shape:
/// a two-column level, a twelve-column category tag, then the message.
pub(crate) fn format_log_line(level: u32, tag: &str, message: &str) -> String {
    format!("[{:2}][{:>12}]: {}", level, tag, message)
}

unsafe extern "C" fn stderr_log_callback(
    level: c_uint,
    tag: *const c_char,
    message: *const c_char,
    _cbdata: *mut c_void,
) {
    if level >= STDERR_FORWARD_BELOW {
        return;
    }
    // never unwind across the ABI boundary
    let _ = std::panic::catch_unwind(|| {
        let tag = unsafe { CStr::from_ptr(tag).to_string_lossy() };
        let message = unsafe { CStr::from_ptr(message).to_string_lossy() };
        eprintln!("{}", format_log_line(level, &tag, &message));
    });
}

type LogCallback = unsafe extern "C" fn(c_uint, *const c_char, *const c_char, *mut c_void);

/// Unpack a Rust closure, extracting a `void*` pointer to the data and a
/// trampoline function which can be used to invoke it.
///
/// # Safety
///
/// It is the user's responsibility to ensure the closure outlives the returned
/// `void*` pointer.
///
/// Calling the trampoline function with anything except the `void*` pointer
/// will result in *Undefined Behaviour*.
unsafe fn unpack_closure<F>(closure: F) -> (*mut c_void, LogCallback)
where
    F: FnMut(u32, &str, &str),
{
    unsafe extern "C" fn trampoline<F>(
        level: c_uint,
        tag: *const c_char,
        msg: *const c_char,
        data: *mut c_void,
    ) where
        F: FnMut(u32, &str, &str),
    {
        if let Err(e) = std::panic::catch_unwind(|| {
            let tag = unsafe { CStr::from_ptr(tag).to_string_lossy().into_owned() };
            let msg = unsafe { CStr::from_ptr(msg).to_string_lossy().into_owned() };
            let closure: &mut F = unsafe { &mut *(data as *mut F) };

            (*closure)(level, &tag, &msg);
        }) {
            eprintln!("Caught a panic calling log closure: {:?}", e);
        }
    }

    let cb = Box::new(closure);
    let cb = Box::leak(cb);

    (cb as *mut F as *mut c_void, trampoline::<F>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_lines_carry_level_and_tag_columns() {
        assert_eq!(
            format_log_line(2, "ERROR", "denoiser setup failed"),
            "[ 2][       ERROR]: denoiser setup failed"
        );
        assert_eq!(
            format_log_line(12, "DISK CACHE", "cache disabled"),
            "[12][  DISK CACHE]: cache disabled"
        );
    }
}
