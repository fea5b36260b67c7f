//! Safe wrapper around the OptiX AI denoiser engine handle and its call
//! protocol: create, size query, setup, intensity estimation, invocation.

use std::mem::MaybeUninit;
use std::os::raw::c_uint;
use std::ptr;

use crate::context::DeviceContext;
use crate::error::Error;
use crate::memory::{DeviceBox, DeviceBuffer, DevicePointer};
use crate::{optix_call, sys};

type Result<T, E = Error> = std::result::Result<T, E>;

/// Which guide layers accompany the noisy color layer.
///
/// More guide layers generally improve quality at added compute cost; the
/// model requires albedo whenever normals are supplied, which is why there is
/// no normal-without-albedo combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    /// Color only.
    Rgb,
    /// Color guided by albedo.
    RgbAlbedo,
    /// Color guided by albedo and normals.
    RgbAlbedoNormal,
}

impl InputKind {
    /// Converts this input kind to its raw counterpart.
    pub fn to_raw(self) -> sys::OptixDenoiserInputKind::Type {
        match self {
            Self::Rgb => sys::OptixDenoiserInputKind::OPTIX_DENOISER_INPUT_RGB,
            Self::RgbAlbedo => sys::OptixDenoiserInputKind::OPTIX_DENOISER_INPUT_RGB_ALBEDO,
            Self::RgbAlbedoNormal => {
                sys::OptixDenoiserInputKind::OPTIX_DENOISER_INPUT_RGB_ALBEDO_NORMAL
            }
        }
    }

    /// How many input layers this kind feeds to the invoke call.
    pub fn layer_count(self) -> u32 {
        match self {
            Self::Rgb => 1,
            Self::RgbAlbedo => 2,
            Self::RgbAlbedoNormal => 3,
        }
    }
}

/// Built-in model kinds of the denoiser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// A model suited for low dynamic range input.
    Ldr,
    /// A model suited for high dynamic range input.
    Hdr,
}

impl ModelKind {
    /// Converts this model kind to its raw counterpart.
    pub fn to_raw(self) -> sys::OptixDenoiserModelKind::Type {
        match self {
            Self::Ldr => sys::OptixDenoiserModelKind::OPTIX_DENOISER_MODEL_KIND_LDR,
            Self::Hdr => sys::OptixDenoiserModelKind::OPTIX_DENOISER_MODEL_KIND_HDR,
        }
    }
}

/// Working-memory requirements reported by the engine for a given resolution.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DenoiserSizes {
    pub state_size_in_bytes: usize,
    pub scratch_size_in_bytes_with_overlap: usize,
    pub scratch_size_in_bytes_without_overlap: usize,
    pub overlap_window_size_in_pixels: u32,
}

impl DenoiserSizes {
    pub fn from_raw(raw: sys::OptixDenoiserSizes) -> Self {
        Self {
            state_size_in_bytes: raw.stateSizeInBytes,
            scratch_size_in_bytes_with_overlap: raw.withOverlapScratchSizeInBytes,
            scratch_size_in_bytes_without_overlap: raw.withoutOverlapScratchSizeInBytes,
            overlap_window_size_in_pixels: raw.overlapWindowSizeInPixels,
        }
    }
}

/// The pixel formats an image handed to the denoiser can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Three 16-bit half values, RGB.
    Half3,
    /// Four 16-bit half values, RGBA.
    Half4,
    /// Three 32-bit float values, RGB.
    Float3,
    /// Four 32-bit float values, RGBA.
    Float4,
}

impl ImageFormat {
    pub fn to_raw(self) -> sys::OptixPixelFormat::Type {
        use ImageFormat::*;

        match self {
            Half3 => sys::OptixPixelFormat::OPTIX_PIXEL_FORMAT_HALF3,
            Half4 => sys::OptixPixelFormat::OPTIX_PIXEL_FORMAT_HALF4,
            Float3 => sys::OptixPixelFormat::OPTIX_PIXEL_FORMAT_FLOAT3,
            Float4 => sys::OptixPixelFormat::OPTIX_PIXEL_FORMAT_FLOAT4,
        }
    }

    pub fn byte_size(self) -> u32 {
        match self {
            Self::Half3 => 6,
            Self::Half4 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
        }
    }
}

/// A borrowed device buffer interpreted as a densely packed, row-major image.
///
/// Non-owning: the descriptor records the address, dimensions, and layout of
/// pixels that somebody else keeps alive. Row stride is
/// `width * format.byte_size()`, pixel stride is `format.byte_size()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Image {
    data: DevicePointer,
    format: ImageFormat,
    width: u32,
    height: u32,
}

impl Image {
    pub fn new(data: DevicePointer, format: ImageFormat, width: u32, height: u32) -> Self {
        Self {
            data,
            format,
            width,
            height,
        }
    }

    pub fn row_stride_in_bytes(&self) -> u32 {
        self.width * self.format.byte_size()
    }

    pub fn pixel_stride_in_bytes(&self) -> u32 {
        self.format.byte_size()
    }

    /// Total bytes the described pixels occupy.
    pub fn size_in_bytes(&self) -> usize {
        self.row_stride_in_bytes() as usize * self.height as usize
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn to_raw(&self) -> sys::OptixImage2D {
        sys::OptixImage2D {
            data: self.data.as_raw(),
            width: self.width,
            height: self.height,
            rowStrideInBytes: self.row_stride_in_bytes(),
            pixelStrideInBytes: self.pixel_stride_in_bytes(),
            format: self.format.to_raw(),
        }
    }
}

/// Parameters for one denoiser invocation.
#[derive(Debug, Clone, Copy)]
pub struct DenoiserParams {
    /// Whether to denoise the alpha channel if present.
    pub denoise_alpha: bool,
    /// Device address of a single float holding the average log intensity of
    /// the input image, normally produced by [`Denoiser::compute_intensity`].
    /// Null means no exposure hint; very dark or bright frames will denoise
    /// worse.
    pub hdr_intensity: DevicePointer,
    /// How much of the noisy input to blend back into the result: 0.0 is the
    /// fully denoised image, 1.0 is the untouched input.
    pub blend_factor: f32,
}

impl Default for DenoiserParams {
    fn default() -> Self {
        Self {
            denoise_alpha: false,
            hdr_intensity: DevicePointer::null(),
            blend_factor: 0.0,
        }
    }
}

impl DenoiserParams {
    pub fn to_raw(self) -> sys::OptixDenoiserParams {
        sys::OptixDenoiserParams {
            denoiseAlpha: self.denoise_alpha as c_uint,
            hdrIntensity: self.hdr_intensity.as_raw(),
            blendFactor: self.blend_factor,
        }
    }
}

/// Handle to one denoiser engine instance, fixed to one input-kind
/// configuration at creation.
#[derive(Debug)]
pub struct Denoiser {
    raw: sys::OptixDenoiser,
    input_kind: InputKind,
}

impl Drop for Denoiser {
    fn drop(&mut self) {
        unsafe {
            sys::optixDenoiserDestroy(self.raw);
        }
    }
}

impl Denoiser {
    /// Create a new [`Denoiser`] on a context for one input-kind
    /// configuration.
    pub fn new(ctx: &DeviceContext, input_kind: InputKind) -> Result<Self> {
        let options = sys::OptixDenoiserOptions {
            inputKind: input_kind.to_raw(),
        };
        let mut raw = MaybeUninit::uninit();
        unsafe {
            optix_call!(optixDenoiserCreate(
                ctx.as_raw(),
                &options as *const _,
                raw.as_mut_ptr()
            ))?;
            Ok(Self {
                raw: raw.assume_init(),
                input_kind,
            })
        }
    }

    pub fn input_kind(&self) -> InputKind {
        self.input_kind
    }

    /// Select one of the built-in models. No user data blob is involved;
    /// those belong to user-trained models, which this wrapper does not
    /// drive.
    pub fn set_model(&mut self, kind: ModelKind) -> Result<()> {
        unsafe {
            optix_call!(optixDenoiserSetModel(
                self.raw,
                kind.to_raw(),
                ptr::null_mut(),
                0
            ))?;
        }
        Ok(())
    }

    /// Query the working-memory requirements for denoising `width` x `height`
    /// frames.
    ///
    /// If tiling is being used, `width` and `height` should not contain the
    /// overlap size.
    pub fn required_gpu_memory(&self, width: u32, height: u32) -> Result<DenoiserSizes> {
        let mut sizes = MaybeUninit::uninit();
        unsafe {
            optix_call!(optixDenoiserComputeMemoryResources(
                self.raw,
                width,
                height,
                sizes.as_mut_ptr()
            ))?;
            Ok(DenoiserSizes::from_raw(sizes.assume_init()))
        }
    }

    /// Bind state and scratch memory to this engine for `width` x `height`
    /// frames. The buffers must be at least as large as reported by
    /// [`Self::required_gpu_memory`] and stay bound until the engine is
    /// dropped.
    ///
    /// Work is issued on the default stream.
    pub fn setup(
        &mut self,
        width: u32,
        height: u32,
        state: &mut DeviceBuffer<u8>,
        scratch: &mut DeviceBuffer<u8>,
    ) -> Result<()> {
        unsafe {
            optix_call!(optixDenoiserSetup(
                self.raw,
                ptr::null_mut(), // default stream
                width,
                height,
                state.as_device_ptr().as_raw(),
                state.size_in_bytes(),
                scratch.as_device_ptr().as_raw(),
                scratch.size_in_bytes()
            ))?;
        }
        Ok(())
    }

    /// Run the intensity-estimation kernel over the color layer, writing the
    /// average log intensity into `intensity` for the denoise pass to use as
    /// an exposure hint.
    pub fn compute_intensity(
        &self,
        color: &Image,
        intensity: &mut DeviceBox<f32>,
        scratch: &mut DeviceBuffer<u8>,
    ) -> Result<()> {
        let raw_color = color.to_raw();
        unsafe {
            optix_call!(optixDenoiserComputeIntensity(
                self.raw,
                ptr::null_mut(), // default stream
                &raw_color as *const _,
                intensity.as_device_ptr().as_raw(),
                scratch.as_device_ptr().as_raw(),
                scratch.size_in_bytes()
            ))?;
        }
        Ok(())
    }

    /// Run the denoise kernel over `layers` (color first, then any guide
    /// layers), writing the result to `output`. The layer count must match
    /// the input kind the engine was created with.
    ///
    /// The work is queued on the default stream; callers that need the result
    /// must synchronize afterwards.
    pub fn invoke(
        &self,
        params: &DenoiserParams,
        state: &mut DeviceBuffer<u8>,
        layers: &[Image],
        output: &Image,
        scratch: &mut DeviceBuffer<u8>,
    ) -> Result<()> {
        let raw_params = params.to_raw();
        let raw_layers: Vec<sys::OptixImage2D> = layers.iter().map(Image::to_raw).collect();
        let raw_output = output.to_raw();
        unsafe {
            optix_call!(optixDenoiserInvoke(
                self.raw,
                ptr::null_mut(), // default stream
                &raw_params as *const _,
                state.as_device_ptr().as_raw(),
                state.size_in_bytes(),
                raw_layers.as_ptr(),
                raw_layers.len() as c_uint,
                0, // input offset X
                0, // input offset Y
                &raw_output as *const _,
                scratch.as_device_ptr().as_raw(),
                scratch.size_in_bytes()
            ))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_counts_follow_input_kind() {
        assert_eq!(InputKind::Rgb.layer_count(), 1);
        assert_eq!(InputKind::RgbAlbedo.layer_count(), 2);
        assert_eq!(InputKind::RgbAlbedoNormal.layer_count(), 3);
    }

    #[test]
    fn float4_descriptor_strides() {
        let image = Image::new(DevicePointer::from_raw(0x1000), ImageFormat::Float4, 64, 32);
        assert_eq!(image.pixel_stride_in_bytes(), 16);
        assert_eq!(image.row_stride_in_bytes(), 64 * 16);
        assert_eq!(image.size_in_bytes(), 64 * 32 * 16);

        let raw = image.to_raw();
        assert_eq!(raw.data, 0x1000);
        assert_eq!(raw.rowStrideInBytes, 1024);
        assert_eq!(raw.pixelStrideInBytes, 16);
        assert_eq!(
            raw.format,
            crate::sys::OptixPixelFormat::OPTIX_PIXEL_FORMAT_FLOAT4
        );
    }

    #[test]
    fn default_params_disable_alpha_and_blending() {
        let raw = DenoiserParams::default().to_raw();
        assert_eq!(raw.denoiseAlpha, 0);
        assert_eq!(raw.hdrIntensity, 0);
        assert_eq!(raw.blendFactor, 0.0);
    }

    #[test]
    fn sizes_from_raw_keep_every_field() {
        let sizes = DenoiserSizes::from_raw(crate::sys::OptixDenoiserSizes {
            stateSizeInBytes: 4096,
            withOverlapScratchSizeInBytes: 16384,
            withoutOverlapScratchSizeInBytes: 8192,
            overlapWindowSizeInPixels: 64,
        });
        assert_eq!(sizes.state_size_in_bytes, 4096);
        assert_eq!(sizes.scratch_size_in_bytes_with_overlap, 16384);
        assert_eq!(sizes.scratch_size_in_bytes_without_overlap, 8192);
        assert_eq!(sizes.overlap_window_size_in_pixels, 64);
    }
}
