//! One denoise pipeline instance bound to one fixed resolution and one fixed
//! combination of input layers: init, denoise any number of times, finish.

use crate::context::DeviceContext;
use crate::denoiser::{
    Denoiser, DenoiserParams, DenoiserSizes, Image, ImageFormat, InputKind, ModelKind,
};
use crate::error::Error;
use crate::memory::{self, DeviceBox, DeviceBuffer, DevicePointer};

type Result<T, E = Error> = std::result::Result<T, E>;

/// Caller-supplied description of one frame set to denoise.
///
/// Every address refers to a device-resident, row-major, 4-channel float
/// (RGBA32F) buffer of `width` x `height` pixels. The session records the
/// addresses without copying or taking ownership: the buffers must stay valid
/// device memory for the whole session lifetime, and the inputs must not be
/// written while a denoise pass is running.
#[derive(Debug, Clone, Copy)]
pub struct DenoiseRequest {
    /// Frame width in pixels. Must be nonzero.
    pub width: u32,
    /// Frame height in pixels. Must be nonzero.
    pub height: u32,
    /// The noisy color (beauty) layer. Required.
    pub color: DevicePointer,
    /// Albedo guide layer, if available.
    pub albedo: Option<DevicePointer>,
    /// Normal guide layer, if available. Requires `albedo` as well.
    pub normal: Option<DevicePointer>,
    /// Where the denoised frame is written. Required. May alias `color` for
    /// in-place denoising.
    pub output: DevicePointer,
}

impl DenoiseRequest {
    /// A request with only the mandatory color and output layers.
    pub fn new(width: u32, height: u32, color: DevicePointer, output: DevicePointer) -> Self {
        Self {
            width,
            height,
            color,
            albedo: None,
            normal: None,
            output,
        }
    }

    fn albedo_ptr(&self) -> Option<DevicePointer> {
        self.albedo.filter(|ptr| !ptr.is_null())
    }

    fn normal_ptr(&self) -> Option<DevicePointer> {
        self.normal.filter(|ptr| !ptr.is_null())
    }

    /// Which engine configuration this request calls for.
    pub fn input_kind(&self) -> InputKind {
        if self.normal_ptr().is_some() {
            InputKind::RgbAlbedoNormal
        } else if self.albedo_ptr().is_some() {
            InputKind::RgbAlbedo
        } else {
            InputKind::Rgb
        }
    }

    /// Rejects malformed requests before anything touches the GPU.
    fn validate(&self) -> Result<()> {
        if self.color.is_null() {
            return Err(Error::MissingColorBuffer);
        }
        if self.output.is_null() {
            return Err(Error::MissingOutputBuffer);
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::ZeroSizedFrame {
                width: self.width,
                height: self.height,
            });
        }
        if self.normal_ptr().is_some() && self.albedo_ptr().is_none() {
            return Err(Error::NormalWithoutAlbedo);
        }
        Ok(())
    }
}

/// A denoiser pipeline holding the engine, its working memory, and the layer
/// descriptors for one frame set.
///
/// Lifecycle: [`DenoiserSession::init`] → any number of
/// [`DenoiserSession::exec`] calls → [`DenoiserSession::finish`]. There is no
/// way back from finished; start a new session instead. Dropping an
/// unfinished session releases the same resources best-effort.
///
/// Calls on one session must be serialized by the caller.
#[derive(Debug)]
pub struct DenoiserSession {
    context: Option<DeviceContext>,
    denoiser: Option<Denoiser>,
    intensity: Option<DeviceBox<f32>>,
    scratch: Option<DeviceBuffer<u8>>,
    state: Option<DeviceBuffer<u8>>,
    sizes: DenoiserSizes,
    params: DenoiserParams,
    color: Image,
    albedo: Option<Image>,
    normal: Option<Image>,
    output: Image,
}

impl DenoiserSession {
    /// Build the whole pipeline for `request`: bring up the runtime, create
    /// the context and engine, size and allocate the working buffers, record
    /// the layer descriptors, and run the engine's setup pass.
    pub fn init(request: &DenoiseRequest) -> Result<Self> {
        request.validate()?;

        memory::cuda_init()?;
        crate::init()?;
        let context = DeviceContext::new()?;

        let mut denoiser = Denoiser::new(&context, request.input_kind())?;
        denoiser.set_model(ModelKind::Hdr)?;

        // Full-frame, single-pass denoising: the overlap sizing variant never
        // applies.
        let sizes = denoiser.required_gpu_memory(request.width, request.height)?;
        let intensity = DeviceBox::new(&0.0f32)?;
        // SAFETY: both buffers are written by the engine before being read.
        let mut scratch =
            unsafe { DeviceBuffer::uninitialized(sizes.scratch_size_in_bytes_without_overlap)? };
        let mut state = unsafe { DeviceBuffer::uninitialized(sizes.state_size_in_bytes)? };

        // The caller's buffers are already device-resident; record their
        // addresses, no staging copies.
        let descriptor =
            |ptr| Image::new(ptr, ImageFormat::Float4, request.width, request.height);
        let color = descriptor(request.color);
        let albedo = request.albedo_ptr().map(descriptor);
        let normal = request.normal_ptr().map(descriptor);
        let output = descriptor(request.output);

        denoiser.setup(request.width, request.height, &mut state, &mut scratch)?;

        let params = DenoiserParams {
            denoise_alpha: false,
            hdr_intensity: intensity.as_device_ptr(),
            blend_factor: 0.0,
        };

        Ok(Self {
            context: Some(context),
            denoiser: Some(denoiser),
            intensity: Some(intensity),
            scratch: Some(scratch),
            state: Some(state),
            sizes,
            params,
            color,
            albedo,
            normal,
            output,
        })
    }

    /// Denoise the bound frame set once: estimate the exposure hint, invoke
    /// the denoise kernel, and block until the device has finished. The
    /// result lands in the output buffer named at init time.
    ///
    /// Repeated calls re-read whatever the inputs hold by then, so a render
    /// loop can keep accumulating samples into the color buffer and denoise
    /// each iteration.
    pub fn exec(&mut self) -> Result<()> {
        let denoiser = self.denoiser.as_ref().ok_or(Error::SessionFinished)?;
        let intensity = self.intensity.as_mut().ok_or(Error::SessionFinished)?;
        let scratch = self.scratch.as_mut().ok_or(Error::SessionFinished)?;
        let state = self.state.as_mut().ok_or(Error::SessionFinished)?;

        denoiser.compute_intensity(&self.color, intensity, scratch)?;

        // Layer order is fixed by the engine: color, then albedo, then
        // normal. The count follows from which descriptors are populated.
        let mut layers = [self.color; 3];
        let mut count = 1;
        if let Some(albedo) = self.albedo {
            layers[count] = albedo;
            count += 1;
        }
        if let Some(normal) = self.normal {
            layers[count] = normal;
            count += 1;
        }

        denoiser.invoke(&self.params, state, &layers[..count], &self.output, scratch)?;

        // Synchronous contract: nothing returns until the frame is written.
        memory::synchronize()?;
        Ok(())
    }

    /// Tear the pipeline down: destroy the engine and context, then free the
    /// intensity, scratch, and state buffers. Safe to call more than once;
    /// anything after the first successful call is a no-op.
    pub fn finish(&mut self) -> Result<()> {
        let Some(denoiser) = self.denoiser.take() else {
            return Ok(());
        };
        // Engine and context teardown is best-effort; the handles report
        // nothing useful at this point.
        drop(denoiser);
        drop(self.context.take());

        // Buffer frees are checked; surface the first failure.
        if let Some(buf) = self.intensity.take() {
            DeviceBox::drop(buf).map_err(|(e, _)| Error::Cuda(e))?;
        }
        if let Some(buf) = self.scratch.take() {
            DeviceBuffer::drop(buf).map_err(|(e, _)| Error::Cuda(e))?;
        }
        if let Some(buf) = self.state.take() {
            DeviceBuffer::drop(buf).map_err(|(e, _)| Error::Cuda(e))?;
        }
        Ok(())
    }

    /// Whether [`Self::finish`] already ran.
    pub fn is_finished(&self) -> bool {
        self.denoiser.is_none()
    }

    /// The engine's working-memory requirements for this session's
    /// resolution, as queried during init.
    pub fn gpu_memory(&self) -> DenoiserSizes {
        self.sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ptr(raw: u64) -> DevicePointer {
        DevicePointer::from_raw(raw)
    }

    fn request() -> DenoiseRequest {
        DenoiseRequest::new(64, 64, ptr(0x1000), ptr(0x2000))
    }

    #[test]
    fn input_kind_follows_populated_guides() {
        let mut req = request();
        assert_eq!(req.input_kind(), InputKind::Rgb);

        req.albedo = Some(ptr(0x3000));
        assert_eq!(req.input_kind(), InputKind::RgbAlbedo);

        req.normal = Some(ptr(0x4000));
        assert_eq!(req.input_kind(), InputKind::RgbAlbedoNormal);
    }

    #[test]
    fn null_guide_pointers_count_as_absent() {
        let mut req = request();
        req.albedo = Some(DevicePointer::null());
        assert_eq!(req.input_kind(), InputKind::Rgb);
    }

    #[test]
    fn missing_color_is_rejected() {
        let mut req = request();
        req.color = DevicePointer::null();
        assert_eq!(req.validate(), Err(Error::MissingColorBuffer));
    }

    #[test]
    fn missing_output_is_rejected() {
        let mut req = request();
        req.output = DevicePointer::null();
        assert_eq!(req.validate(), Err(Error::MissingOutputBuffer));
    }

    #[test]
    fn zero_extents_are_rejected() {
        let mut req = request();
        req.width = 0;
        assert_eq!(
            req.validate(),
            Err(Error::ZeroSizedFrame {
                width: 0,
                height: 64
            })
        );

        let mut req = request();
        req.height = 0;
        assert_eq!(
            req.validate(),
            Err(Error::ZeroSizedFrame {
                width: 64,
                height: 0
            })
        );
    }

    #[test]
    fn normal_without_albedo_is_rejected() {
        let mut req = request();
        req.normal = Some(ptr(0x4000));
        assert_eq!(req.validate(), Err(Error::NormalWithoutAlbedo));

        // a null albedo does not satisfy the requirement either
        req.albedo = Some(DevicePointer::null());
        assert_eq!(req.validate(), Err(Error::NormalWithoutAlbedo));
    }

    #[test]
    fn well_formed_requests_pass_validation() {
        assert!(request().validate().is_ok());

        let mut req = request();
        req.albedo = Some(ptr(0x3000));
        req.normal = Some(ptr(0x4000));
        assert!(req.validate().is_ok());
    }
}
