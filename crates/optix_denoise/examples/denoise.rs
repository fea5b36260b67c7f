use std::error::Error;
use std::path::PathBuf;

use image::ImageReader;
use optix_denoise::memory::DeviceBuffer;
use optix_denoise::session::{DenoiseRequest, DenoiserSession};
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(
    name = "denoise",
    about = "Denoises an input image using the OptiX AI Denoiser"
)]
struct Opt {
    /// Input image to denoise.
    #[structopt(parse(from_os_str))]
    input: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    let opt = Opt::from_args();
    let name = opt
        .input
        .file_name()
        .expect("input was not a file")
        .to_string_lossy()
        .to_string();
    let img = ImageReader::open(opt.input)?.decode()?;

    let rgb = img.into_rgb8();
    let width = rgb.width();
    let height = rgb.height();

    // expand to linear RGBA32F, the layout the denoiser session expects
    let mut linear = Vec::with_capacity((width * height * 4) as usize);
    for pixel in rgb.pixels() {
        for channel in pixel.0 {
            linear.push(channel as f32 / 255.0);
        }
        linear.push(1.0);
    }

    // stage the noisy frame into device memory and zero an output frame
    let color = DeviceBuffer::from_slice(&linear)?;
    let output = DeviceBuffer::from_slice(&vec![0.0f32; linear.len()])?;

    let mut session = DenoiserSession::init(&DenoiseRequest::new(
        width,
        height,
        color.as_device_ptr(),
        output.as_device_ptr(),
    ))?;

    // exec blocks until the denoised frame is fully written
    session.exec()?;

    let denoised = output.as_host_vec()?;
    session.finish()?;

    // back to 8-bit for saving, dropping the alpha channel again
    let mut rgb = rgb;
    for (pixel, chunk) in rgb.pixels_mut().zip(denoised.chunks_exact(4)) {
        for (channel, value) in pixel.0.iter_mut().zip(chunk) {
            *channel = (value * 255.0).clamp(0.0, 255.0) as u8;
        }
    }
    rgb.save(format!("./{}_denoised.png", name))?;

    Ok(())
}
