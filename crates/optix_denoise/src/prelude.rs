//! Convenience re-export of the types most programs need.

pub use crate::context::DeviceContext;
pub use crate::denoiser::{
    Denoiser, DenoiserParams, DenoiserSizes, Image, ImageFormat, InputKind, ModelKind,
};
pub use crate::error::{CudaError, Error, OptixError};
pub use crate::memory::{DeviceBox, DeviceBuffer, DevicePointer};
pub use crate::session::{DenoiseRequest, DenoiserSession};
