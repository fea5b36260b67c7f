use std::ffi::CStr;
use std::fmt::{self, Display};

use crate::sys;

/// Any error which may occur when executing an OptiX denoiser function.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptixError {
    InvalidValue,
    HostOutOfMemory,
    InvalidOperation,
    LaunchFailure,
    InvalidDeviceContext,
    CudaNotInitialized,
    DenoiserModelNotSet,
    DenoiserNotInitialized,
    NotSupported,
    UnsupportedAbiVersion,
    FunctionTableSizeMismatch,
    InvalidEntryFunctionOptions,
    LibraryNotFound,
    EntrySymbolNotFound,
    CudaError,
    InternalError,
    Unknown,

    /// Raised by the safe wrapper when an entry point is reached before
    /// [`crate::init`] has succeeded; the raw library would segfault instead.
    OptixNotInitialized,
}

impl OptixError {
    pub fn to_raw(self) -> sys::OptixResult {
        use OptixError::*;
        match self {
            InvalidValue => sys::OPTIX_ERROR_INVALID_VALUE,
            HostOutOfMemory => sys::OPTIX_ERROR_HOST_OUT_OF_MEMORY,
            InvalidOperation => sys::OPTIX_ERROR_INVALID_OPERATION,
            LaunchFailure => sys::OPTIX_ERROR_LAUNCH_FAILURE,
            InvalidDeviceContext => sys::OPTIX_ERROR_INVALID_DEVICE_CONTEXT,
            CudaNotInitialized => sys::OPTIX_ERROR_CUDA_NOT_INITIALIZED,
            DenoiserModelNotSet => sys::OPTIX_ERROR_DENOISER_MODEL_NOT_SET,
            DenoiserNotInitialized => sys::OPTIX_ERROR_DENOISER_NOT_INITIALIZED,
            NotSupported => sys::OPTIX_ERROR_NOT_SUPPORTED,
            UnsupportedAbiVersion => sys::OPTIX_ERROR_UNSUPPORTED_ABI_VERSION,
            FunctionTableSizeMismatch => sys::OPTIX_ERROR_FUNCTION_TABLE_SIZE_MISMATCH,
            InvalidEntryFunctionOptions => sys::OPTIX_ERROR_INVALID_ENTRY_FUNCTION_OPTIONS,
            LibraryNotFound => sys::OPTIX_ERROR_LIBRARY_NOT_FOUND,
            EntrySymbolNotFound => sys::OPTIX_ERROR_ENTRY_SYMBOL_NOT_FOUND,
            CudaError => sys::OPTIX_ERROR_CUDA_ERROR,
            InternalError => sys::OPTIX_ERROR_INTERNAL_ERROR,
            Unknown => sys::OPTIX_ERROR_UNKNOWN,
            // close enough
            OptixNotInitialized => sys::OPTIX_ERROR_CUDA_NOT_INITIALIZED,
        }
    }
}

impl Display for OptixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == OptixError::OptixNotInitialized {
            return f.write_str("OptiX was not initialized");
        }
        // optix_stubs special cases the error-string query so it is safe to
        // call even before the function table is loaded.
        unsafe {
            let ptr = sys::optixGetErrorString(self.to_raw());
            let cow = CStr::from_ptr(ptr).to_string_lossy();
            f.write_str(cow.as_ref())
        }
    }
}

impl std::error::Error for OptixError {}

pub type OptixResult<T> = Result<T, OptixError>;

/// Errors reported by the CUDA runtime entry points the wrapper drives.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CudaError {
    InvalidValue,
    OutOfMemory,
    InitializationError,
    NoDevice,
    Unknown,
}

impl Display for CudaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            CudaError::InvalidValue => "invalid value passed to the CUDA runtime",
            CudaError::OutOfMemory => "CUDA device memory allocation failed",
            CudaError::InitializationError => "the CUDA runtime could not be initialized",
            CudaError::NoDevice => "no CUDA-capable device is available",
            CudaError::Unknown => "unknown CUDA runtime error",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for CudaError {}

/// Result type for the CUDA runtime side of the wrapper.
pub type CudaResult<T> = Result<T, CudaError>;

/// Special result type for `drop` functions which includes the un-dropped
/// value with the error.
pub type DropResult<T> = Result<(), (CudaError, T)>;

/// Conversion from a raw status code to a `Result`.
pub trait ToResult {
    type Error;
    fn to_result(self) -> Result<(), Self::Error>;
}

impl ToResult for sys::OptixResult {
    type Error = OptixError;

    fn to_result(self) -> Result<(), OptixError> {
        use OptixError::*;

        Err(match self {
            sys::OPTIX_SUCCESS => return Ok(()),
            sys::OPTIX_ERROR_INVALID_VALUE => InvalidValue,
            sys::OPTIX_ERROR_HOST_OUT_OF_MEMORY => HostOutOfMemory,
            sys::OPTIX_ERROR_INVALID_OPERATION => InvalidOperation,
            sys::OPTIX_ERROR_LAUNCH_FAILURE => LaunchFailure,
            sys::OPTIX_ERROR_INVALID_DEVICE_CONTEXT => InvalidDeviceContext,
            sys::OPTIX_ERROR_CUDA_NOT_INITIALIZED => CudaNotInitialized,
            sys::OPTIX_ERROR_DENOISER_MODEL_NOT_SET => DenoiserModelNotSet,
            sys::OPTIX_ERROR_DENOISER_NOT_INITIALIZED => DenoiserNotInitialized,
            sys::OPTIX_ERROR_NOT_SUPPORTED => NotSupported,
            sys::OPTIX_ERROR_UNSUPPORTED_ABI_VERSION => UnsupportedAbiVersion,
            sys::OPTIX_ERROR_FUNCTION_TABLE_SIZE_MISMATCH => FunctionTableSizeMismatch,
            sys::OPTIX_ERROR_INVALID_ENTRY_FUNCTION_OPTIONS => InvalidEntryFunctionOptions,
            sys::OPTIX_ERROR_LIBRARY_NOT_FOUND => LibraryNotFound,
            sys::OPTIX_ERROR_ENTRY_SYMBOL_NOT_FOUND => EntrySymbolNotFound,
            sys::OPTIX_ERROR_CUDA_ERROR => CudaError,
            sys::OPTIX_ERROR_INTERNAL_ERROR => InternalError,
            _ => Unknown,
        })
    }
}

impl ToResult for sys::cudaError_t {
    type Error = CudaError;

    fn to_result(self) -> Result<(), CudaError> {
        Err(match self {
            sys::cudaSuccess => return Ok(()),
            sys::cudaErrorInvalidValue => CudaError::InvalidValue,
            sys::cudaErrorMemoryAllocation => CudaError::OutOfMemory,
            sys::cudaErrorInitializationError => CudaError::InitializationError,
            sys::cudaErrorNoDevice => CudaError::NoDevice,
            _ => CudaError::Unknown,
        })
    }
}

/// Top-level error type for the denoiser session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Optix(OptixError),
    Cuda(CudaError),
    /// The request named no color buffer; the denoiser cannot run without one.
    MissingColorBuffer,
    /// The request named no output buffer to write the denoised frame into.
    MissingOutputBuffer,
    /// Width or height of the requested frame was zero.
    ZeroSizedFrame { width: u32, height: u32 },
    /// A normal guide buffer was supplied without an albedo guide buffer; the
    /// model requires albedo whenever normals are given.
    NormalWithoutAlbedo,
    /// The session was already finished; no further denoise passes can run.
    SessionFinished,
}

impl From<OptixError> for Error {
    fn from(e: OptixError) -> Self {
        Self::Optix(e)
    }
}

impl From<CudaError> for Error {
    fn from(e: CudaError) -> Self {
        Self::Cuda(e)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Optix(e) => Some(e),
            Self::Cuda(e) => Some(e),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Optix(e) => write!(f, "OptiX error: {}", e),
            Self::Cuda(e) => write!(f, "CUDA error: {}", e),
            Self::MissingColorBuffer => write!(f, "denoise request has no color buffer"),
            Self::MissingOutputBuffer => write!(f, "denoise request has no output buffer"),
            Self::ZeroSizedFrame { width, height } => {
                write!(f, "denoise request has a zero-sized frame ({}x{})", width, height)
            }
            Self::NormalWithoutAlbedo => {
                write!(f, "albedo is required if a normal input is given")
            }
            Self::SessionFinished => write!(f, "denoiser session was already finished"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_success_maps_to_ok() {
        assert!(sys::OPTIX_SUCCESS.to_result().is_ok());
        assert!(sys::cudaSuccess.to_result().is_ok());
    }

    #[test]
    fn raw_errors_map_to_variants() {
        assert_eq!(
            sys::OPTIX_ERROR_DENOISER_MODEL_NOT_SET.to_result(),
            Err(OptixError::DenoiserModelNotSet)
        );
        assert_eq!(
            sys::cudaErrorMemoryAllocation.to_result(),
            Err(CudaError::OutOfMemory)
        );
    }

    #[test]
    fn unrecognized_codes_collapse_to_unknown() {
        assert_eq!(
            sys::OptixResult(-17).to_result(),
            Err(OptixError::Unknown)
        );
        assert_eq!(sys::cudaError_t(717).to_result(), Err(CudaError::Unknown));
    }
}
