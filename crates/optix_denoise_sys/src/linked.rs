//! Declarations resolved against the compiled `optix_stubs` translation unit
//! and the CUDA runtime library.

use std::os::raw::{c_char, c_uint, c_void};

use crate::{
    cudaError_t, cudaMemcpyKind, CUcontext, CUdeviceptr, CUstream, OptixDenoiser,
    OptixDenoiserModelKind, OptixDenoiserOptions, OptixDenoiserParams, OptixDenoiserSizes,
    OptixDeviceContext, OptixDeviceContextOptions, OptixImage2D, OptixLogCallback, OptixResult,
    StubCounters,
};

extern "C" {
    pub fn optixInit() -> OptixResult;

    pub fn optixGetErrorName(result: OptixResult) -> *const c_char;
    pub fn optixGetErrorString(result: OptixResult) -> *const c_char;

    pub fn optixDeviceContextCreate(
        fromContext: CUcontext,
        options: *const OptixDeviceContextOptions,
        context: *mut OptixDeviceContext,
    ) -> OptixResult;
    pub fn optixDeviceContextDestroy(context: OptixDeviceContext) -> OptixResult;
    pub fn optixDeviceContextSetLogCallback(
        context: OptixDeviceContext,
        callbackFunction: OptixLogCallback,
        callbackData: *mut c_void,
        callbackLevel: c_uint,
    ) -> OptixResult;

    pub fn optixDenoiserCreate(
        context: OptixDeviceContext,
        options: *const OptixDenoiserOptions,
        denoiser: *mut OptixDenoiser,
    ) -> OptixResult;
    pub fn optixDenoiserDestroy(denoiser: OptixDenoiser) -> OptixResult;
    pub fn optixDenoiserSetModel(
        denoiser: OptixDenoiser,
        kind: OptixDenoiserModelKind::Type,
        data: *mut c_void,
        sizeInBytes: usize,
    ) -> OptixResult;
    pub fn optixDenoiserComputeMemoryResources(
        denoiser: OptixDenoiser,
        outputWidth: c_uint,
        outputHeight: c_uint,
        returnSizes: *mut OptixDenoiserSizes,
    ) -> OptixResult;
    pub fn optixDenoiserSetup(
        denoiser: OptixDenoiser,
        stream: CUstream,
        inputWidth: c_uint,
        inputHeight: c_uint,
        denoiserState: CUdeviceptr,
        denoiserStateSizeInBytes: usize,
        scratch: CUdeviceptr,
        scratchSizeInBytes: usize,
    ) -> OptixResult;
    pub fn optixDenoiserComputeIntensity(
        denoiser: OptixDenoiser,
        stream: CUstream,
        inputImage: *const OptixImage2D,
        outputIntensity: CUdeviceptr,
        scratch: CUdeviceptr,
        scratchSizeInBytes: usize,
    ) -> OptixResult;
    pub fn optixDenoiserInvoke(
        denoiser: OptixDenoiser,
        stream: CUstream,
        params: *const OptixDenoiserParams,
        denoiserState: CUdeviceptr,
        denoiserStateSizeInBytes: usize,
        inputLayers: *const OptixImage2D,
        numInputLayers: c_uint,
        inputOffsetX: c_uint,
        inputOffsetY: c_uint,
        outputLayer: *const OptixImage2D,
        scratch: CUdeviceptr,
        scratchSizeInBytes: usize,
    ) -> OptixResult;

    pub fn cudaMalloc(devPtr: *mut *mut c_void, size: usize) -> cudaError_t;
    pub fn cudaFree(devPtr: *mut c_void) -> cudaError_t;
    pub fn cudaMemcpy(
        dst: *mut c_void,
        src: *const c_void,
        count: usize,
        kind: cudaMemcpyKind::Type,
    ) -> cudaError_t;
    pub fn cudaDeviceSynchronize() -> cudaError_t;
}

/// The real SDK is linked; there is no simulation to report on.
pub fn stub_counters() -> Option<StubCounters> {
    None
}
