//! Host-side simulation of the linked surface, selected by the build script
//! when no OptiX SDK / CUDA toolkit is found.
//!
//! The simulation keeps the call protocol honest: handles must exist, models
//! must be set before setup, setup must precede invocation, layer counts must
//! match the input kind, and every allocation is tracked until freed.
//! "Device" pointers are plain host allocations, the intensity pass writes a
//! fixed exposure scalar, and the denoise pass copies the color layer to the
//! output layer so end-to-end runs produce observable output.

use std::collections::HashMap;
use std::os::raw::{c_char, c_uint, c_void};
use std::sync::{Mutex, MutexGuard, OnceLock};

use crate::*;

struct Allocation {
    len: usize,
}

struct ContextRec {
    #[allow(dead_code)]
    log_fn: OptixLogCallback,
    #[allow(dead_code)]
    log_data: usize,
    #[allow(dead_code)]
    log_level: c_uint,
}

struct DenoiserRec {
    #[allow(dead_code)]
    context: usize,
    input_kind: OptixDenoiserInputKind::Type,
    model: Option<OptixDenoiserModelKind::Type>,
    setup: Option<(c_uint, c_uint)>,
}

#[derive(Default)]
struct StubState {
    initialized: bool,
    allocations: HashMap<usize, Allocation>,
    contexts: HashMap<usize, ContextRec>,
    denoisers: HashMap<usize, DenoiserRec>,
    counters: StubCounters,
}

fn state() -> MutexGuard<'static, StubState> {
    static STATE: OnceLock<Mutex<StubState>> = OnceLock::new();
    STATE
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn new_token() -> usize {
    Box::into_raw(Box::new(0u8)) as usize
}

// SAFETY: token was produced by new_token and removed from the registry first.
unsafe fn release_token(token: usize) {
    drop(Box::from_raw(token as *mut u8));
}

fn layers_for(kind: OptixDenoiserInputKind::Type) -> c_uint {
    match kind {
        OptixDenoiserInputKind::OPTIX_DENOISER_INPUT_RGB => 1,
        OptixDenoiserInputKind::OPTIX_DENOISER_INPUT_RGB_ALBEDO => 2,
        OptixDenoiserInputKind::OPTIX_DENOISER_INPUT_RGB_ALBEDO_NORMAL => 3,
        _ => 0,
    }
}

fn pixel_bytes(format: OptixPixelFormat::Type) -> Option<c_uint> {
    match format {
        OptixPixelFormat::OPTIX_PIXEL_FORMAT_HALF3 => Some(6),
        OptixPixelFormat::OPTIX_PIXEL_FORMAT_HALF4 => Some(8),
        OptixPixelFormat::OPTIX_PIXEL_FORMAT_FLOAT3 => Some(12),
        OptixPixelFormat::OPTIX_PIXEL_FORMAT_FLOAT4 => Some(16),
        OptixPixelFormat::OPTIX_PIXEL_FORMAT_UCHAR3 => Some(3),
        OptixPixelFormat::OPTIX_PIXEL_FORMAT_UCHAR4 => Some(4),
        _ => None,
    }
}

fn simulated_sizes(width: c_uint, height: c_uint) -> OptixDenoiserSizes {
    let pixels = width as usize * height as usize;
    OptixDenoiserSizes {
        stateSizeInBytes: pixels * 16 + 256,
        withOverlapScratchSizeInBytes: (width as usize + 128) * (height as usize + 128) * 8 + 256,
        withoutOverlapScratchSizeInBytes: pixels * 8 + 256,
        overlapWindowSizeInPixels: 64,
    }
}

pub unsafe extern "C" fn optixInit() -> OptixResult {
    state().initialized = true;
    OPTIX_SUCCESS
}

pub unsafe extern "C" fn optixGetErrorName(result: OptixResult) -> *const c_char {
    let name: &'static [u8] = match result {
        OPTIX_SUCCESS => b"OPTIX_SUCCESS\0",
        OPTIX_ERROR_INVALID_VALUE => b"OPTIX_ERROR_INVALID_VALUE\0",
        OPTIX_ERROR_HOST_OUT_OF_MEMORY => b"OPTIX_ERROR_HOST_OUT_OF_MEMORY\0",
        OPTIX_ERROR_INVALID_OPERATION => b"OPTIX_ERROR_INVALID_OPERATION\0",
        OPTIX_ERROR_LAUNCH_FAILURE => b"OPTIX_ERROR_LAUNCH_FAILURE\0",
        OPTIX_ERROR_INVALID_DEVICE_CONTEXT => b"OPTIX_ERROR_INVALID_DEVICE_CONTEXT\0",
        OPTIX_ERROR_CUDA_NOT_INITIALIZED => b"OPTIX_ERROR_CUDA_NOT_INITIALIZED\0",
        OPTIX_ERROR_DENOISER_MODEL_NOT_SET => b"OPTIX_ERROR_DENOISER_MODEL_NOT_SET\0",
        OPTIX_ERROR_DENOISER_NOT_INITIALIZED => b"OPTIX_ERROR_DENOISER_NOT_INITIALIZED\0",
        OPTIX_ERROR_LIBRARY_NOT_FOUND => b"OPTIX_ERROR_LIBRARY_NOT_FOUND\0",
        OPTIX_ERROR_CUDA_ERROR => b"OPTIX_ERROR_CUDA_ERROR\0",
        OPTIX_ERROR_INTERNAL_ERROR => b"OPTIX_ERROR_INTERNAL_ERROR\0",
        _ => b"OPTIX_ERROR_UNKNOWN\0",
    };
    name.as_ptr() as *const c_char
}

pub unsafe extern "C" fn optixGetErrorString(result: OptixResult) -> *const c_char {
    optixGetErrorName(result)
}

pub unsafe extern "C" fn optixDeviceContextCreate(
    _fromContext: CUcontext,
    options: *const OptixDeviceContextOptions,
    context: *mut OptixDeviceContext,
) -> OptixResult {
    if context.is_null() {
        return OPTIX_ERROR_INVALID_VALUE;
    }
    let mut st = state();
    if !st.initialized {
        return OPTIX_ERROR_LIBRARY_NOT_FOUND;
    }
    let rec = if options.is_null() {
        ContextRec {
            log_fn: None,
            log_data: 0,
            log_level: 0,
        }
    } else {
        let opts = &*options;
        ContextRec {
            log_fn: opts.logCallbackFunction,
            log_data: opts.logCallbackData as usize,
            log_level: opts.logCallbackLevel as c_uint,
        }
    };
    let token = new_token();
    st.contexts.insert(token, rec);
    st.counters.live_contexts = st.contexts.len();
    *context = token as OptixDeviceContext;
    OPTIX_SUCCESS
}

pub unsafe extern "C" fn optixDeviceContextDestroy(context: OptixDeviceContext) -> OptixResult {
    let mut st = state();
    if st.contexts.remove(&(context as usize)).is_none() {
        return OPTIX_ERROR_INVALID_DEVICE_CONTEXT;
    }
    st.counters.live_contexts = st.contexts.len();
    drop(st);
    release_token(context as usize);
    OPTIX_SUCCESS
}

pub unsafe extern "C" fn optixDeviceContextSetLogCallback(
    context: OptixDeviceContext,
    callbackFunction: OptixLogCallback,
    callbackData: *mut c_void,
    callbackLevel: c_uint,
) -> OptixResult {
    let mut st = state();
    match st.contexts.get_mut(&(context as usize)) {
        Some(rec) => {
            rec.log_fn = callbackFunction;
            rec.log_data = callbackData as usize;
            rec.log_level = callbackLevel;
            OPTIX_SUCCESS
        }
        None => OPTIX_ERROR_INVALID_DEVICE_CONTEXT,
    }
}

pub unsafe extern "C" fn optixDenoiserCreate(
    context: OptixDeviceContext,
    options: *const OptixDenoiserOptions,
    denoiser: *mut OptixDenoiser,
) -> OptixResult {
    if options.is_null() || denoiser.is_null() {
        return OPTIX_ERROR_INVALID_VALUE;
    }
    let mut st = state();
    if !st.contexts.contains_key(&(context as usize)) {
        return OPTIX_ERROR_INVALID_DEVICE_CONTEXT;
    }
    let kind = (*options).inputKind;
    if layers_for(kind) == 0 {
        return OPTIX_ERROR_INVALID_VALUE;
    }
    let token = new_token();
    st.denoisers.insert(
        token,
        DenoiserRec {
            context: context as usize,
            input_kind: kind,
            model: None,
            setup: None,
        },
    );
    st.counters.live_denoisers = st.denoisers.len();
    *denoiser = token as OptixDenoiser;
    OPTIX_SUCCESS
}

pub unsafe extern "C" fn optixDenoiserDestroy(denoiser: OptixDenoiser) -> OptixResult {
    let mut st = state();
    if st.denoisers.remove(&(denoiser as usize)).is_none() {
        return OPTIX_ERROR_INVALID_VALUE;
    }
    st.counters.live_denoisers = st.denoisers.len();
    drop(st);
    release_token(denoiser as usize);
    OPTIX_SUCCESS
}

pub unsafe extern "C" fn optixDenoiserSetModel(
    denoiser: OptixDenoiser,
    kind: OptixDenoiserModelKind::Type,
    _data: *mut c_void,
    _sizeInBytes: usize,
) -> OptixResult {
    if !matches!(
        kind,
        OptixDenoiserModelKind::OPTIX_DENOISER_MODEL_KIND_LDR
            | OptixDenoiserModelKind::OPTIX_DENOISER_MODEL_KIND_HDR
    ) {
        return OPTIX_ERROR_INVALID_VALUE;
    }
    let mut st = state();
    match st.denoisers.get_mut(&(denoiser as usize)) {
        Some(rec) => {
            rec.model = Some(kind);
            OPTIX_SUCCESS
        }
        None => OPTIX_ERROR_INVALID_VALUE,
    }
}

pub unsafe extern "C" fn optixDenoiserComputeMemoryResources(
    denoiser: OptixDenoiser,
    outputWidth: c_uint,
    outputHeight: c_uint,
    returnSizes: *mut OptixDenoiserSizes,
) -> OptixResult {
    if returnSizes.is_null() || outputWidth == 0 || outputHeight == 0 {
        return OPTIX_ERROR_INVALID_VALUE;
    }
    let st = state();
    if !st.denoisers.contains_key(&(denoiser as usize)) {
        return OPTIX_ERROR_INVALID_VALUE;
    }
    *returnSizes = simulated_sizes(outputWidth, outputHeight);
    OPTIX_SUCCESS
}

pub unsafe extern "C" fn optixDenoiserSetup(
    denoiser: OptixDenoiser,
    _stream: CUstream,
    inputWidth: c_uint,
    inputHeight: c_uint,
    denoiserState: CUdeviceptr,
    denoiserStateSizeInBytes: usize,
    scratch: CUdeviceptr,
    scratchSizeInBytes: usize,
) -> OptixResult {
    if denoiserState == 0 || scratch == 0 || inputWidth == 0 || inputHeight == 0 {
        return OPTIX_ERROR_INVALID_VALUE;
    }
    let needed = simulated_sizes(inputWidth, inputHeight);
    if denoiserStateSizeInBytes < needed.stateSizeInBytes
        || scratchSizeInBytes < needed.withoutOverlapScratchSizeInBytes
    {
        return OPTIX_ERROR_INVALID_VALUE;
    }
    let mut st = state();
    match st.denoisers.get_mut(&(denoiser as usize)) {
        Some(rec) => {
            if rec.model.is_none() {
                return OPTIX_ERROR_DENOISER_MODEL_NOT_SET;
            }
            rec.setup = Some((inputWidth, inputHeight));
            OPTIX_SUCCESS
        }
        None => OPTIX_ERROR_INVALID_VALUE,
    }
}

pub unsafe extern "C" fn optixDenoiserComputeIntensity(
    denoiser: OptixDenoiser,
    _stream: CUstream,
    inputImage: *const OptixImage2D,
    outputIntensity: CUdeviceptr,
    scratch: CUdeviceptr,
    _scratchSizeInBytes: usize,
) -> OptixResult {
    if inputImage.is_null() || outputIntensity == 0 || scratch == 0 {
        return OPTIX_ERROR_INVALID_VALUE;
    }
    let mut st = state();
    match st.denoisers.get(&(denoiser as usize)) {
        Some(rec) if rec.model.is_some() => {}
        Some(_) => return OPTIX_ERROR_DENOISER_MODEL_NOT_SET,
        None => return OPTIX_ERROR_INVALID_VALUE,
    }
    // A perfectly exposed frame: log-average intensity of 1.0.
    *(outputIntensity as *mut f32) = 1.0;
    st.counters.intensity_launches += 1;
    OPTIX_SUCCESS
}

pub unsafe extern "C" fn optixDenoiserInvoke(
    denoiser: OptixDenoiser,
    _stream: CUstream,
    params: *const OptixDenoiserParams,
    denoiserState: CUdeviceptr,
    _denoiserStateSizeInBytes: usize,
    inputLayers: *const OptixImage2D,
    numInputLayers: c_uint,
    _inputOffsetX: c_uint,
    _inputOffsetY: c_uint,
    outputLayer: *const OptixImage2D,
    scratch: CUdeviceptr,
    _scratchSizeInBytes: usize,
) -> OptixResult {
    if params.is_null() || inputLayers.is_null() || outputLayer.is_null() {
        return OPTIX_ERROR_INVALID_VALUE;
    }
    if denoiserState == 0 || scratch == 0 {
        return OPTIX_ERROR_INVALID_VALUE;
    }
    let mut st = state();
    let expected = match st.denoisers.get(&(denoiser as usize)) {
        Some(rec) => {
            if rec.model.is_none() {
                return OPTIX_ERROR_DENOISER_MODEL_NOT_SET;
            }
            if rec.setup.is_none() {
                return OPTIX_ERROR_DENOISER_NOT_INITIALIZED;
            }
            layers_for(rec.input_kind)
        }
        None => return OPTIX_ERROR_INVALID_VALUE,
    };
    if numInputLayers != expected {
        return OPTIX_ERROR_INVALID_VALUE;
    }

    let color = &*inputLayers;
    let out = &*outputLayer;
    if color.data == 0 || out.data == 0 {
        return OPTIX_ERROR_INVALID_VALUE;
    }
    let Some(px) = pixel_bytes(out.format) else {
        return OPTIX_ERROR_INVALID_VALUE;
    };

    // Identity "denoise": pass the color layer through to the output layer.
    let rows = color.height.min(out.height);
    let row_bytes = (color.width.min(out.width) * px) as usize;
    for y in 0..rows as usize {
        let src = (color.data as usize + y * color.rowStrideInBytes as usize) as *const u8;
        let dst = (out.data as usize + y * out.rowStrideInBytes as usize) as *mut u8;
        std::ptr::copy(src, dst, row_bytes);
    }

    st.counters.invoke_launches += 1;
    st.counters.last_invoke_layers = numInputLayers;
    OPTIX_SUCCESS
}

pub unsafe extern "C" fn cudaMalloc(devPtr: *mut *mut c_void, size: usize) -> cudaError_t {
    if devPtr.is_null() {
        return cudaErrorInvalidValue;
    }
    let len = size.max(1);
    let block = vec![0u8; len].into_boxed_slice();
    let ptr = Box::into_raw(block) as *mut u8;
    let mut st = state();
    st.allocations.insert(ptr as usize, Allocation { len });
    st.counters.live_allocations = st.allocations.len();
    st.counters.total_allocations += 1;
    *devPtr = ptr as *mut c_void;
    cudaSuccess
}

pub unsafe extern "C" fn cudaFree(devPtr: *mut c_void) -> cudaError_t {
    // Freeing the null pointer is defined to succeed; the wrapper relies on
    // it to bootstrap the runtime.
    if devPtr.is_null() {
        return cudaSuccess;
    }
    let mut st = state();
    let Some(alloc) = st.allocations.remove(&(devPtr as usize)) else {
        return cudaErrorInvalidValue;
    };
    st.counters.live_allocations = st.allocations.len();
    drop(st);
    drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
        devPtr as *mut u8,
        alloc.len,
    )));
    cudaSuccess
}

pub unsafe extern "C" fn cudaMemcpy(
    dst: *mut c_void,
    src: *const c_void,
    count: usize,
    _kind: cudaMemcpyKind::Type,
) -> cudaError_t {
    if count == 0 {
        return cudaSuccess;
    }
    if dst.is_null() || src.is_null() {
        return cudaErrorInvalidValue;
    }
    std::ptr::copy(src as *const u8, dst as *mut u8, count);
    cudaSuccess
}

pub unsafe extern "C" fn cudaDeviceSynchronize() -> cudaError_t {
    state().counters.device_syncs += 1;
    cudaSuccess
}

/// Snapshot of the simulation's resource accounting.
pub fn stub_counters() -> Option<StubCounters> {
    Some(state().counters)
}
