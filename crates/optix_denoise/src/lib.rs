//! GPU-accelerated image denoising built on OptiX's AI denoiser.
//!
//! The crate wraps the denoiser subset of the OptiX ABI behind safe types:
//! [`context::DeviceContext`] for the device context and its diagnostics,
//! [`denoiser::Denoiser`] for the engine handle and its call protocol, and
//! [`session::DenoiserSession`] for the full init → exec → finish lifecycle
//! of denoising one fixed-resolution frame set in place.
//!
//! The denoising model itself is the vendor's; nothing here touches pixels
//! beyond describing where they live.

pub mod context;
pub mod denoiser;
pub mod error;
pub mod memory;
pub mod prelude;
pub mod session;

pub use optix_denoise_sys as sys;

use std::sync::atomic::{AtomicBool, Ordering};

use error::{OptixResult, ToResult};

static OPTIX_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the OptiX library. This must be called before using any other
/// OptiX function. It may be called before or after initializing CUDA.
pub fn init() -> OptixResult<()> {
    // avoid initializing multiple times because that will try to load the
    // driver library every time.
    if !optix_is_initialized() {
        init_cold()
    } else {
        Ok(())
    }
}

#[cold]
#[inline(never)]
fn init_cold() -> OptixResult<()> {
    unsafe { sys::optixInit().to_result()? };
    OPTIX_INITIALIZED.store(true, Ordering::Release);
    Ok(())
}

/// Whether OptiX is initialized. If you are calling raw [`sys`] functions you
/// must make sure this is true, otherwise OptiX will segfault. In the safe
/// wrapper it is done automatically and optix not being initialized will
/// return an error result.
pub fn optix_is_initialized() -> bool {
    OPTIX_INITIALIZED.load(Ordering::Acquire)
}

/// Call a raw OptiX sys function, making sure that OptiX is initialized.
/// Returns an OptixNotInitialized error if it is not initialized. See
/// [`optix_is_initialized`].
#[macro_export]
macro_rules! optix_call {
    ($name:ident($($param:expr),* $(,)?)) => {{
          if !$crate::optix_is_initialized() {
              Err($crate::error::OptixError::OptixNotInitialized)
          } else {
              <$crate::sys::OptixResult as $crate::error::ToResult>::to_result($crate::sys::$name($($param),*))
          }
    }};
}
