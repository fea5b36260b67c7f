//! Raw bindings to the OptiX 7.1 AI denoiser ABI, plus the few CUDA runtime
//! entry points the denoiser call sequence drives (`cudaMalloc`, `cudaFree`,
//! `cudaMemcpy`, `cudaDeviceSynchronize`).
//!
//! The bindings are hand-curated to the denoiser subset instead of generated
//! from the full SDK headers; layouts and constant values follow
//! `optix_types.h` from the 7.1 SDK.
//!
//! When the build script finds no OptiX SDK or CUDA toolkit, the same symbol
//! surface is provided by a host-side simulation (see [`stub_counters`]),
//! keeping builds and contract tests working on machines without the vendor
//! stack.

#![allow(non_camel_case_types, non_snake_case, non_upper_case_globals)]

use std::os::raw::{c_char, c_int, c_uint, c_void};

pub type CUdeviceptr = ::std::os::raw::c_ulonglong;
pub type CUcontext = *mut c_void;
pub type CUstream = *mut c_void;

pub type OptixDeviceContext = *mut c_void;
pub type OptixDenoiser = *mut c_void;

/// Status code returned by every OptiX entry point.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OptixResult(pub c_int);

pub const OPTIX_SUCCESS: OptixResult = OptixResult(0);
pub const OPTIX_ERROR_INVALID_VALUE: OptixResult = OptixResult(7001);
pub const OPTIX_ERROR_HOST_OUT_OF_MEMORY: OptixResult = OptixResult(7002);
pub const OPTIX_ERROR_INVALID_OPERATION: OptixResult = OptixResult(7003);
pub const OPTIX_ERROR_LAUNCH_FAILURE: OptixResult = OptixResult(7050);
pub const OPTIX_ERROR_INVALID_DEVICE_CONTEXT: OptixResult = OptixResult(7051);
pub const OPTIX_ERROR_CUDA_NOT_INITIALIZED: OptixResult = OptixResult(7052);
pub const OPTIX_ERROR_DENOISER_MODEL_NOT_SET: OptixResult = OptixResult(7300);
pub const OPTIX_ERROR_DENOISER_NOT_INITIALIZED: OptixResult = OptixResult(7301);
pub const OPTIX_ERROR_NOT_SUPPORTED: OptixResult = OptixResult(7800);
pub const OPTIX_ERROR_UNSUPPORTED_ABI_VERSION: OptixResult = OptixResult(7801);
pub const OPTIX_ERROR_FUNCTION_TABLE_SIZE_MISMATCH: OptixResult = OptixResult(7802);
pub const OPTIX_ERROR_INVALID_ENTRY_FUNCTION_OPTIONS: OptixResult = OptixResult(7803);
pub const OPTIX_ERROR_LIBRARY_NOT_FOUND: OptixResult = OptixResult(7804);
pub const OPTIX_ERROR_ENTRY_SYMBOL_NOT_FOUND: OptixResult = OptixResult(7805);
pub const OPTIX_ERROR_CUDA_ERROR: OptixResult = OptixResult(7900);
pub const OPTIX_ERROR_INTERNAL_ERROR: OptixResult = OptixResult(7990);
pub const OPTIX_ERROR_UNKNOWN: OptixResult = OptixResult(7999);

/// Status code returned by the CUDA runtime entry points.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct cudaError_t(pub c_int);

pub const cudaSuccess: cudaError_t = cudaError_t(0);
pub const cudaErrorInvalidValue: cudaError_t = cudaError_t(1);
pub const cudaErrorMemoryAllocation: cudaError_t = cudaError_t(2);
pub const cudaErrorInitializationError: cudaError_t = cudaError_t(3);
pub const cudaErrorNoDevice: cudaError_t = cudaError_t(100);
pub const cudaErrorUnknown: cudaError_t = cudaError_t(999);

pub mod OptixDenoiserInputKind {
    pub type Type = ::std::os::raw::c_uint;
    pub const OPTIX_DENOISER_INPUT_RGB: Type = 0x2301;
    pub const OPTIX_DENOISER_INPUT_RGB_ALBEDO: Type = 0x2302;
    pub const OPTIX_DENOISER_INPUT_RGB_ALBEDO_NORMAL: Type = 0x2303;
}

pub mod OptixDenoiserModelKind {
    pub type Type = ::std::os::raw::c_uint;
    pub const OPTIX_DENOISER_MODEL_KIND_USER: Type = 0x2321;
    pub const OPTIX_DENOISER_MODEL_KIND_LDR: Type = 0x2322;
    pub const OPTIX_DENOISER_MODEL_KIND_HDR: Type = 0x2323;
}

pub mod OptixPixelFormat {
    pub type Type = ::std::os::raw::c_uint;
    pub const OPTIX_PIXEL_FORMAT_HALF3: Type = 0x2201;
    pub const OPTIX_PIXEL_FORMAT_HALF4: Type = 0x2202;
    pub const OPTIX_PIXEL_FORMAT_FLOAT3: Type = 0x2203;
    pub const OPTIX_PIXEL_FORMAT_FLOAT4: Type = 0x2204;
    pub const OPTIX_PIXEL_FORMAT_UCHAR3: Type = 0x2205;
    pub const OPTIX_PIXEL_FORMAT_UCHAR4: Type = 0x2206;
}

pub mod OptixDeviceContextValidationMode {
    pub type Type = ::std::os::raw::c_uint;
    pub const OPTIX_DEVICE_CONTEXT_VALIDATION_MODE_OFF: Type = 0;
    pub const OPTIX_DEVICE_CONTEXT_VALIDATION_MODE_ALL: Type = 0xFFFFFFFF;
}

pub mod cudaMemcpyKind {
    pub type Type = ::std::os::raw::c_uint;
    pub const cudaMemcpyHostToHost: Type = 0;
    pub const cudaMemcpyHostToDevice: Type = 1;
    pub const cudaMemcpyDeviceToHost: Type = 2;
    pub const cudaMemcpyDeviceToDevice: Type = 3;
    pub const cudaMemcpyDefault: Type = 4;
}

pub type OptixLogCallback = Option<
    unsafe extern "C" fn(
        level: c_uint,
        tag: *const c_char,
        message: *const c_char,
        cbdata: *mut c_void,
    ),
>;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct OptixDeviceContextOptions {
    pub logCallbackFunction: OptixLogCallback,
    pub logCallbackData: *mut c_void,
    pub logCallbackLevel: c_int,
    pub validationMode: OptixDeviceContextValidationMode::Type,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct OptixDenoiserOptions {
    pub inputKind: OptixDenoiserInputKind::Type,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct OptixImage2D {
    pub data: CUdeviceptr,
    pub width: c_uint,
    pub height: c_uint,
    pub rowStrideInBytes: c_uint,
    pub pixelStrideInBytes: c_uint,
    pub format: OptixPixelFormat::Type,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct OptixDenoiserParams {
    pub denoiseAlpha: c_uint,
    pub hdrIntensity: CUdeviceptr,
    pub blendFactor: f32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct OptixDenoiserSizes {
    pub stateSizeInBytes: usize,
    pub withOverlapScratchSizeInBytes: usize,
    pub withoutOverlapScratchSizeInBytes: usize,
    pub overlapWindowSizeInPixels: c_uint,
}

/// Resource and launch accounting reported by the simulation mode.
///
/// Counters are cumulative for the process; tests that assert on them should
/// diff before/after snapshots.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StubCounters {
    pub live_allocations: usize,
    pub total_allocations: usize,
    pub live_contexts: usize,
    pub live_denoisers: usize,
    pub intensity_launches: usize,
    pub invoke_launches: usize,
    pub device_syncs: usize,
    pub last_invoke_layers: c_uint,
}

#[cfg(optix_denoise_stub)]
#[path = "stub.rs"]
mod functions;
#[cfg(not(optix_denoise_stub))]
#[path = "linked.rs"]
mod functions;

pub use functions::*;
